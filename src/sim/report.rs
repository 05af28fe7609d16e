//! HUD snapshot of a round

use serde::{Deserialize, Serialize};

use super::state::{Outcome, Round};

/// Player awareness indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Awareness {
    /// Player is concealed
    Hidden,
    /// Adversary has line of sight to the player
    Detected,
    Normal,
}

/// Read-only view of a round for UI collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundReport {
    pub state: String,
    pub awareness: Awareness,
    pub distance: Option<f32>,
    pub activation_countdown: f32,
    pub detection_time_left: Option<f32>,
    pub in_safe_zone: bool,
    pub safe_zone_time: f32,
    pub safe_zone_progress: f32,
    pub escape_timer: f32,
    pub warning_level: f32,
    pub elapsed: f32,
    pub detection_passes: u64,
    pub outcome: Option<Outcome>,
}

impl Round {
    pub fn report(&self) -> RoundReport {
        let escape = self.escape.state();
        let awareness = if self.player_concealed() {
            Awareness::Hidden
        } else if self.detection.last().visible() {
            Awareness::Detected
        } else {
            Awareness::Normal
        };

        RoundReport {
            state: self.state().label().to_string(),
            awareness,
            distance: self.distance_to_player(),
            activation_countdown: self.activation_countdown(),
            detection_time_left: self.detection_time_left(),
            in_safe_zone: escape.in_safe_zone,
            safe_zone_time: escape.zone_timer,
            safe_zone_progress: self.escape.zone_progress(self.tuning.zone_time),
            escape_timer: escape.distance_timer,
            warning_level: self.warning_level(),
            elapsed: self.elapsed,
            detection_passes: self.detection.passes(),
            outcome: self.dispatched,
        }
    }
}
