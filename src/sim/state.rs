//! Round state and core simulation types
//!
//! Everything a round owns lives here. A restart rebuilds it wholesale.

use std::rc::Rc;

use glam::Vec3;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::collaborators::ConcealmentOracle;
use super::detection::{DetectionEngine, DetectionResult};
use super::escape::{EscapeTracker, SafeZone};
use super::movement::PatrolPlan;
use crate::tuning::Tuning;
use crate::yaw_to_forward;

/// How a round ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// The adversary reached the player
    Captured,
    /// The player got away
    Escaped,
}

/// Which escape condition the player satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscapeRoute {
    /// Stayed beyond the escape distance long enough
    Distance,
    /// Stayed inside the safe zone long enough
    SafeZone,
}

/// Adversary behavior state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PursuitState {
    /// Following the patrol plan (a sighting may be pending confirmation)
    Patrolling,
    /// Pursuing the player, tracking its position every tick
    Chasing { last_known: Vec3 },
    /// Lost the player, heading to where it was last known
    Searching { last_known: Vec3, elapsed: f32 },
    /// Reached the player, waiting to report the capture
    Attacking,
    /// Round over
    Ended(Outcome),
}

impl PursuitState {
    pub fn label(&self) -> &'static str {
        match self {
            PursuitState::Patrolling => "Patrolling",
            PursuitState::Chasing { .. } => "Chasing",
            PursuitState::Searching { .. } => "Searching",
            PursuitState::Attacking => "Attacking",
            PursuitState::Ended(_) => "Ended",
        }
    }

    /// Attacking or Ended: no more detection or transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, PursuitState::Attacking | PursuitState::Ended(_))
    }

    pub fn last_known(&self) -> Option<Vec3> {
        match *self {
            PursuitState::Chasing { last_known } | PursuitState::Searching { last_known, .. } => {
                Some(last_known)
            }
            _ => None,
        }
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match *self {
            PursuitState::Ended(outcome) => Some(outcome),
            _ => None,
        }
    }
}

/// Something observable happened this tick (for audio, effects, HUD)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// Activation delay elapsed, the adversary starts hunting
    Activated,
    /// Player spotted, confirmation pending
    SightingStarted { at: Vec3 },
    /// Player slipped out of view before confirmation
    SightingCancelled,
    ChaseStarted { last_known: Vec3 },
    TargetLost { last_known: Vec3 },
    SearchAbandoned,
    WaypointReached { index: usize },
    Captured,
    Escaped { route: EscapeRoute },
    /// The outcome sink was notified
    OutcomeDispatched { outcome: Outcome },
}

/// The hunting entity
#[derive(Debug, Clone)]
pub struct Adversary {
    pub position: Vec3,
    /// Heading about +Y (0 faces +Z)
    pub yaw: f32,
    pub state: PursuitState,
    /// Round time when `state` was entered
    pub state_entered_at: f32,
    /// Visible time accumulated toward a confirmed sighting
    pub confirmation: Option<f32>,
    /// Set once a terminal outcome has been triggered, cleared only by restart
    pub terminal_fired: bool,
    pub patrol: PatrolPlan,
}

impl Adversary {
    /// Place the adversary on the ground at its start pose
    pub fn spawn(position: Vec3, yaw: f32, patrol: PatrolPlan, ground_height: f32) -> Self {
        Self {
            position: Vec3::new(position.x, ground_height, position.z),
            yaw,
            state: PursuitState::Patrolling,
            state_entered_at: 0.0,
            confirmation: None,
            terminal_fired: false,
            patrol,
        }
    }

    #[inline]
    pub fn forward(&self) -> Vec3 {
        yaw_to_forward(self.yaw)
    }

    /// Change state, stamping the entry time if it actually changed
    pub fn set_state(&mut self, state: PursuitState, now: f32) {
        if std::mem::discriminant(&self.state) != std::mem::discriminant(&state) {
            self.state_entered_at = now;
        }
        self.state = state;
    }

    /// Seconds spent searching, if searching
    pub fn search_timer(&self) -> Option<f32> {
        match self.state {
            PursuitState::Searching { elapsed, .. } => Some(elapsed),
            _ => None,
        }
    }
}

/// Where to put the safe zone when a round starts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SafeZonePlacement {
    /// No safe zone this round
    Disabled,
    /// Fixed center
    At(Vec3),
    /// Pick a spot away from both player and adversary, else use the fallback
    Auto { fallback: Vec3 },
}

impl Default for SafeZonePlacement {
    fn default() -> Self {
        SafeZonePlacement::Auto {
            fallback: SafeZone::DEFAULT_FALLBACK,
        }
    }
}

/// Static layout of a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundSetup {
    pub adversary_start: Vec3,
    pub adversary_yaw: f32,
    /// Patrol route; empty means wander around the start position
    pub waypoints: Vec<Vec3>,
    pub safe_zone: SafeZonePlacement,
}

impl Default for RoundSetup {
    fn default() -> Self {
        Self {
            adversary_start: Vec3::ZERO,
            adversary_yaw: 0.0,
            waypoints: Vec::new(),
            safe_zone: SafeZonePlacement::default(),
        }
    }
}

/// Outcome waiting for its dispatch delay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingOutcome {
    pub outcome: Outcome,
    pub elapsed: f32,
}

/// One round of the game
pub struct Round {
    pub tuning: Tuning,
    pub setup: RoundSetup,
    /// Run seed for reproducibility
    pub seed: u64,
    pub(crate) rng: Pcg32,
    pub adversary: Adversary,
    pub detection: DetectionEngine,
    pub escape: EscapeTracker,
    pub safe_zone: Option<SafeZone>,
    pub(crate) player: Option<Rc<dyn ConcealmentOracle>>,
    /// Seconds since round start
    pub elapsed: f32,
    /// Simulation tick counter
    pub time_ticks: u64,
    pub(crate) pending_outcome: Option<PendingOutcome>,
    /// Outcome already handed to the sink
    pub dispatched: Option<Outcome>,
    pub(crate) activated: bool,
    pub(crate) missing_player_warned: bool,
    /// Pending events, emptied only by `drain_events`
    events: Vec<GameEvent>,
}

impl Round {
    /// Create a round; the player oracle is injected here, never looked up
    pub fn new(
        tuning: Tuning,
        setup: RoundSetup,
        seed: u64,
        player: Option<Rc<dyn ConcealmentOracle>>,
    ) -> Self {
        let tuning = tuning.sanitized();
        let mut rng = Pcg32::seed_from_u64(seed);

        let patrol = if tuning.random_patrol || setup.waypoints.is_empty() {
            PatrolPlan::wander(setup.adversary_start, &tuning, &mut rng)
        } else {
            PatrolPlan::waypoints(setup.waypoints.clone())
        };
        let adversary = Adversary::spawn(
            setup.adversary_start,
            setup.adversary_yaw,
            patrol,
            tuning.ground_height,
        );

        let player_pos = player.as_ref().map(|p| p.position());
        let safe_zone = match setup.safe_zone {
            SafeZonePlacement::Disabled => None,
            SafeZonePlacement::At(center) => Some(SafeZone::new(center, tuning.safe_zone_radius)),
            SafeZonePlacement::Auto { fallback } => Some(SafeZone::place(
                &mut rng,
                player_pos.unwrap_or(Vec3::ZERO),
                adversary.position,
                fallback,
                tuning.safe_zone_radius,
            )),
        };

        if player.is_none() {
            log::warn!("Round created without a player; the adversary will stay inert");
        }

        Self {
            detection: DetectionEngine::new(tuning.detection_interval),
            escape: EscapeTracker::default(),
            tuning,
            setup,
            seed,
            rng,
            adversary,
            safe_zone,
            player,
            elapsed: 0.0,
            time_ticks: 0,
            pending_outcome: None,
            dispatched: None,
            activated: false,
            missing_player_warned: false,
            events: Vec::new(),
        }
    }

    /// Rebuild the round from its setup (timers, flags and RNG included)
    pub fn restart(&mut self) {
        let player = self.player.take();
        *self = Round::new(self.tuning.clone(), self.setup.clone(), self.seed, player);
        log::info!("Round restarted (seed {})", self.seed);
    }

    /// Restart with a new seed
    pub fn restart_with_seed(&mut self, seed: u64) {
        self.seed = seed;
        self.restart();
    }

    /// Current behavior state (read-only for rendering collaborators)
    pub fn state(&self) -> PursuitState {
        self.adversary.state
    }

    /// Line-of-sight signal from the latest detection pass
    pub fn last_detection(&self) -> DetectionResult {
        self.detection.last()
    }

    /// True once the outcome has been reported; further ticks do nothing
    pub fn is_over(&self) -> bool {
        self.dispatched.is_some()
    }

    /// True once the activation window has elapsed
    pub fn is_active(&self) -> bool {
        self.elapsed >= self.tuning.activation_delay
    }

    /// Seconds until the adversary activates
    pub fn activation_countdown(&self) -> f32 {
        (self.tuning.activation_delay - self.elapsed).max(0.0)
    }

    /// Confirmation time still needed for the pending sighting
    pub fn detection_time_left(&self) -> Option<f32> {
        self.adversary
            .confirmation
            .map(|t| (self.tuning.detection_delay - t).max(0.0))
    }

    pub fn player_position(&self) -> Option<Vec3> {
        self.player.as_ref().map(|p| p.position())
    }

    pub fn player_concealed(&self) -> bool {
        self.player.as_ref().is_some_and(|p| p.is_concealed())
    }

    pub fn distance_to_player(&self) -> Option<f32> {
        self.player_position()
            .map(|p| self.adversary.position.distance(p))
    }

    /// True if the player stands inside the safe zone
    pub fn player_in_safe_zone(&self) -> bool {
        match (&self.safe_zone, self.player_position()) {
            (Some(zone), Some(pos)) => zone.contains(pos),
            _ => false,
        }
    }

    /// Proximity warning volume for the audio collaborator, 0..=max
    pub fn warning_level(&self) -> f32 {
        let Some(player) = self.player_position() else {
            return 0.0;
        };
        let chasing = matches!(self.adversary.state, PursuitState::Chasing { .. });
        let d = self.adversary.position.distance(player);
        let range = self.tuning.warning_distance;
        if chasing && self.detection.last().visible() && range > 0.0 && d <= range {
            (1.0 - d / range) * self.tuning.max_warning_volume
        } else {
            0.0
        }
    }

    pub(crate) fn push_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Events raised since the last drain
    ///
    /// The round never discards events on its own: the host must call
    /// [`Round::drain_events`] once per frame or the log keeps growing.
    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    /// Take all pending events (call once per frame)
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}
