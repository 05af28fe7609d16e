//! Adversary tuning
//!
//! Read once when a round is created, never mutated by the simulation.
//! Loaded from JSON; missing fields fall back to the defaults below.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::GROUND_HEIGHT;
use crate::sim::geometry::LayerMask;

/// Errors raised while loading a tuning file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read tuning file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid tuning JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Adversary and round balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    // === Detection ===
    /// Maximum sighting distance
    pub detection_range: f32,
    /// Distance beyond which an unseen, chased player is considered lost
    pub lose_target_range: f32,
    /// Full field-of-view cone angle in degrees
    pub field_of_view_angle: f32,
    /// Continuous visibility required before a sighting becomes a chase
    pub detection_delay: f32,
    /// Seconds between line-of-sight evaluations
    pub detection_interval: f32,
    /// Inert window after round start
    pub activation_delay: f32,

    // === Movement ===
    pub patrol_speed: f32,
    pub chase_speed: f32,
    /// Fraction of the remaining turn covered per second
    pub rotation_speed: f32,
    /// Distance at which a patrol/search target counts as reached
    pub arrival_threshold: f32,
    /// Dwell time at each patrol target
    pub patrol_wait_time: f32,
    /// Wander randomly around the start position even if waypoints exist
    pub random_patrol: bool,
    /// Maximum wander distance from the start position
    pub random_patrol_range: f32,
    pub ground_height: f32,
    /// Radius used to keep the body out of obstacles
    pub body_radius: f32,

    // === Obstacle avoidance ===
    pub enable_collision_avoidance: bool,
    /// Length of the forward and side obstacle probes
    pub probe_distance: f32,
    /// Obstacle classes that force a perpendicular deflection
    pub avoid_mask: LayerMask,
    /// Layers that block line of sight
    pub sight_mask: LayerMask,

    // === Pursuit ===
    pub capture_distance: f32,
    /// How long to search the last-known position before resuming patrol
    pub search_duration: f32,
    /// Delay between a terminal outcome and notifying the session
    pub outcome_delay: f32,

    // === Escape ===
    pub enable_escape_by_distance: bool,
    pub enable_escape_by_time: bool,
    pub escape_distance: f32,
    pub escape_time: f32,
    /// Continuous safe zone occupancy required to win
    pub zone_time: f32,
    pub safe_zone_radius: f32,

    // === Warning cue ===
    pub warning_distance: f32,
    pub max_warning_volume: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            detection_range: 10.0,
            lose_target_range: 12.0,
            field_of_view_angle: 180.0,
            detection_delay: 1.0,
            detection_interval: 0.15,
            activation_delay: 3.0,

            patrol_speed: 1.0,
            chase_speed: 2.0,
            rotation_speed: 2.0,
            arrival_threshold: 0.8,
            patrol_wait_time: 2.0,
            random_patrol: false,
            random_patrol_range: 5.0,
            ground_height: GROUND_HEIGHT,
            body_radius: 0.5,

            enable_collision_avoidance: true,
            probe_distance: 1.5,
            avoid_mask: LayerMask::OBSTACLES,
            sight_mask: LayerMask::ALL.without(LayerMask::PLAYER),

            capture_distance: 1.0,
            search_duration: 8.0,
            outcome_delay: 1.0,

            enable_escape_by_distance: true,
            enable_escape_by_time: true,
            escape_distance: 12.0,
            escape_time: 10.0,
            zone_time: 5.0,
            safe_zone_radius: 4.0,

            warning_distance: 4.0,
            max_warning_volume: 0.7,
        }
    }
}

impl Tuning {
    /// Parse tuning from JSON and sanitize it
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let tuning: Tuning = serde_json::from_str(json)?;
        Ok(tuning.sanitized())
    }

    /// Load tuning from a JSON file and sanitize it
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let tuning = Self::from_json_str(&json)?;
        log::info!("Loaded tuning from {}", path.display());
        Ok(tuning)
    }

    /// Serialize to pretty JSON (for writing a starter file)
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Clamp negative or NaN numeric fields to zero and reset infinite ones
    /// to their defaults
    ///
    /// `ground_height` is a coordinate and may be negative.
    pub fn sanitized(mut self) -> Self {
        let defaults = Tuning::default();
        let fields: [(&str, &mut f32, f32); 24] = [
            ("detection_range", &mut self.detection_range, defaults.detection_range),
            ("lose_target_range", &mut self.lose_target_range, defaults.lose_target_range),
            ("field_of_view_angle", &mut self.field_of_view_angle, defaults.field_of_view_angle),
            ("detection_delay", &mut self.detection_delay, defaults.detection_delay),
            ("detection_interval", &mut self.detection_interval, defaults.detection_interval),
            ("activation_delay", &mut self.activation_delay, defaults.activation_delay),
            ("patrol_speed", &mut self.patrol_speed, defaults.patrol_speed),
            ("chase_speed", &mut self.chase_speed, defaults.chase_speed),
            ("rotation_speed", &mut self.rotation_speed, defaults.rotation_speed),
            ("arrival_threshold", &mut self.arrival_threshold, defaults.arrival_threshold),
            ("patrol_wait_time", &mut self.patrol_wait_time, defaults.patrol_wait_time),
            ("random_patrol_range", &mut self.random_patrol_range, defaults.random_patrol_range),
            ("body_radius", &mut self.body_radius, defaults.body_radius),
            ("probe_distance", &mut self.probe_distance, defaults.probe_distance),
            ("capture_distance", &mut self.capture_distance, defaults.capture_distance),
            ("search_duration", &mut self.search_duration, defaults.search_duration),
            ("outcome_delay", &mut self.outcome_delay, defaults.outcome_delay),
            ("escape_distance", &mut self.escape_distance, defaults.escape_distance),
            ("escape_time", &mut self.escape_time, defaults.escape_time),
            ("zone_time", &mut self.zone_time, defaults.zone_time),
            ("safe_zone_radius", &mut self.safe_zone_radius, defaults.safe_zone_radius),
            ("warning_distance", &mut self.warning_distance, defaults.warning_distance),
            ("max_warning_volume", &mut self.max_warning_volume, defaults.max_warning_volume),
            // A coordinate: only NaN and infinity are rejected
            ("ground_height", &mut self.ground_height, defaults.ground_height),
        ];

        for (name, value, default) in fields {
            if value.is_nan() {
                log::warn!("Tuning field {name} is NaN, using 0");
                *value = 0.0;
            } else if value.is_infinite() {
                log::warn!("Tuning field {name} is infinite, using default {default}");
                *value = default;
            } else if *value < 0.0 && name != "ground_height" {
                log::warn!("Tuning field {name} is negative ({value}), clamping to 0");
                *value = 0.0;
            }
        }

        if self.lose_target_range < self.detection_range {
            log::warn!(
                "lose_target_range ({}) is shorter than detection_range ({}); chases will flicker",
                self.lose_target_range,
                self.detection_range
            );
        }

        self
    }

    /// Half of the field-of-view cone, in degrees
    #[inline]
    pub fn fov_half_angle(&self) -> f32 {
        self.field_of_view_angle * 0.5
    }
}
