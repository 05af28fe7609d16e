//! Perception: range, field of view, occlusion and concealment
//!
//! [`evaluate`] is a pure query. [`DetectionEngine`] throttles it to a fixed
//! interval, independent of the tick rate, and keeps the latest result
//! between passes.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::collaborators::ConcealmentOracle;
use super::geometry::GeometryQuery;
use super::state::Adversary;
use crate::angle_between_deg;
use crate::consts::{EYE_HEIGHT, TARGET_HEIGHT};
use crate::tuning::Tuning;

/// Outcome of one perception pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub in_range: bool,
    pub in_field_of_view: bool,
    pub has_clear_line_of_sight: bool,
    pub is_concealed: bool,
}

impl DetectionResult {
    /// Combined signal: the adversary can see the player right now
    #[inline]
    pub fn visible(&self) -> bool {
        self.in_range && self.in_field_of_view && self.has_clear_line_of_sight && !self.is_concealed
    }
}

/// Run one perception pass
///
/// With no player, nothing is detected.
pub fn evaluate(
    adversary: &Adversary,
    player: Option<&dyn ConcealmentOracle>,
    geometry: &dyn GeometryQuery,
    tuning: &Tuning,
) -> DetectionResult {
    let Some(player) = player else {
        return DetectionResult::default();
    };

    let player_pos = player.position();
    let to_player = player_pos - adversary.position;

    DetectionResult {
        in_range: to_player.length() <= tuning.detection_range,
        in_field_of_view: angle_between_deg(adversary.forward(), to_player)
            <= tuning.fov_half_angle(),
        has_clear_line_of_sight: line_of_sight(adversary.position, player, geometry, tuning),
        is_concealed: player.is_concealed(),
    }
}

/// Eye-to-player ray test
///
/// Only a hit on something other than the player blocks. No hit at all is
/// treated as clear.
pub fn line_of_sight(
    from: Vec3,
    player: &dyn ConcealmentOracle,
    geometry: &dyn GeometryQuery,
    tuning: &Tuning,
) -> bool {
    let origin = from + Vec3::Y * EYE_HEIGHT;
    let target = player.position() + Vec3::Y * TARGET_HEIGHT;
    let to_target = target - origin;
    let dist = to_target.length();
    if dist < 1e-6 {
        return true;
    }

    match geometry.raycast(origin, to_target / dist, dist, tuning.sight_mask) {
        Some(hit) => player.entity_id() == Some(hit.entity),
        None => true,
    }
}

/// Interval-throttled perception
///
/// Between passes the state machine sees the last result, so a change in
/// visibility (losing the target included) reaches it up to one interval late.
#[derive(Debug, Clone)]
pub struct DetectionEngine {
    interval: f32,
    since_last: f32,
    last: DetectionResult,
    passes: u64,
}

impl DetectionEngine {
    pub fn new(interval: f32) -> Self {
        Self {
            interval,
            // First poll is due immediately
            since_last: interval,
            last: DetectionResult::default(),
            passes: 0,
        }
    }

    /// Advance the throttle clock; true if a pass is due this tick
    pub fn poll(&mut self, dt: f32) -> bool {
        self.since_last += dt;
        if self.since_last >= self.interval {
            self.since_last = 0.0;
            true
        } else {
            false
        }
    }

    /// Store the result of a pass
    pub fn record(&mut self, result: DetectionResult) {
        self.last = result;
        self.passes += 1;
    }

    /// Latest result (stale by at most one interval)
    pub fn last(&self) -> DetectionResult {
        self.last
    }

    /// Number of passes run so far
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Drop any remembered sighting (missing player, inert adversary)
    pub fn clear(&mut self) {
        self.last = DetectionResult::default();
    }
}
