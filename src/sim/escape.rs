//! Escape conditions: outrun the adversary or hold the safe zone

use glam::Vec3;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::state::EscapeRoute;
use crate::consts::{
    SAFE_ZONE_ATTEMPTS, SAFE_ZONE_MIN_FROM_ADVERSARY, SAFE_ZONE_MIN_FROM_PLAYER,
    SAFE_ZONE_SEARCH_EXTENT, SAFE_ZONE_TOLERANCE,
};
use crate::flat_distance;
use crate::tuning::Tuning;

/// Escape timers (read-only for the HUD)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EscapeState {
    pub in_escape_by_distance: bool,
    pub distance_timer: f32,
    pub in_safe_zone: bool,
    pub zone_timer: f32,
}

/// Tracks both escape routes tick by tick
#[derive(Debug, Clone, Default)]
pub struct EscapeTracker {
    state: EscapeState,
}

impl EscapeTracker {
    /// Advance both timers; returns the route that completed this tick, if any
    ///
    /// The distance route is checked first. Leaving either region resets its
    /// timer to zero.
    pub fn update(
        &mut self,
        distance: f32,
        in_safe_zone: bool,
        tuning: &Tuning,
        dt: f32,
    ) -> Option<EscapeRoute> {
        let s = &mut self.state;

        let mut fired = None;

        s.in_escape_by_distance =
            tuning.enable_escape_by_distance && distance >= tuning.escape_distance;
        if s.in_escape_by_distance {
            if tuning.enable_escape_by_time {
                s.distance_timer += dt;
                if s.distance_timer >= tuning.escape_time {
                    fired = Some(EscapeRoute::Distance);
                }
            } else {
                fired = Some(EscapeRoute::Distance);
            }
        } else {
            s.distance_timer = 0.0;
        }

        s.in_safe_zone = in_safe_zone;
        if in_safe_zone {
            s.zone_timer += dt;
            if fired.is_none() && s.zone_timer >= tuning.zone_time {
                fired = Some(EscapeRoute::SafeZone);
            }
        } else {
            s.zone_timer = 0.0;
        }

        fired
    }

    pub fn state(&self) -> EscapeState {
        self.state
    }

    /// Fraction of the safe-zone hold completed, in [0, 1]
    pub fn zone_progress(&self, zone_time: f32) -> f32 {
        if zone_time <= 0.0 {
            return if self.state.in_safe_zone { 1.0 } else { 0.0 };
        }
        (self.state.zone_timer / zone_time).clamp(0.0, 1.0)
    }

    /// Zero both timers
    pub fn reset(&mut self) {
        self.state = EscapeState::default();
    }
}

/// Flat disk the player must hold to escape
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafeZone {
    pub center: Vec3,
    pub radius: f32,
}

impl SafeZone {
    /// Used when no random candidate is far enough from both actors
    pub const DEFAULT_FALLBACK: Vec3 = Vec3::new(10.0, -0.5, 10.0);

    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// True if `point` is inside, ignoring height
    #[inline]
    pub fn contains(&self, point: Vec3) -> bool {
        flat_distance(self.center, point) <= self.radius + SAFE_ZONE_TOLERANCE
    }

    /// Pick a spot away from both the player and the adversary
    pub fn place(
        rng: &mut Pcg32,
        player: Vec3,
        adversary: Vec3,
        fallback: Vec3,
        radius: f32,
    ) -> Self {
        for _ in 0..SAFE_ZONE_ATTEMPTS {
            let candidate = Vec3::new(
                rng.random_range(-SAFE_ZONE_SEARCH_EXTENT..=SAFE_ZONE_SEARCH_EXTENT),
                fallback.y,
                rng.random_range(-SAFE_ZONE_SEARCH_EXTENT..=SAFE_ZONE_SEARCH_EXTENT),
            );
            if flat_distance(candidate, player) >= SAFE_ZONE_MIN_FROM_PLAYER
                && flat_distance(candidate, adversary) >= SAFE_ZONE_MIN_FROM_ADVERSARY
            {
                log::debug!("Safe zone placed at {candidate}");
                return Self::new(candidate, radius);
            }
        }
        log::debug!("Safe zone placement fell back to {fallback}");
        Self::new(fallback, radius)
    }
}
