//! Pursuit Arena - A hide-and-seek arena game
//!
//! Core modules:
//! - `sim`: Deterministic simulation (detection, pursuit, steering, escape)
//! - `tuning`: Data-driven adversary balance, loaded from JSON
//! - `logging`: env_logger setup for the native driver

pub mod logging;
pub mod sim;
pub mod tuning;

pub use tuning::{ConfigError, Tuning};

use glam::Vec3;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Height the adversary walks at
    pub const GROUND_HEIGHT: f32 = -0.3;
    /// Line-of-sight ray starts this far above the adversary
    pub const EYE_HEIGHT: f32 = 0.5;
    /// Line-of-sight ray aims this far above the player
    pub const TARGET_HEIGHT: f32 = 0.2;
    /// Obstacle probes start this far above the adversary
    pub const PROBE_HEIGHT: f32 = 0.1;
    /// Lateral offset of the side whisker probes
    pub const WHISKER_OFFSET: f32 = 0.5;

    /// Spin rate while searching an empty last-known position (radians/s, 60°)
    pub const SEARCH_SPIN_RATE: f32 = std::f32::consts::FRAC_PI_3;
    /// Wander targets are never closer than this to the start position
    pub const WANDER_MIN_RADIUS: f32 = 2.0;

    /// Safe zone occupancy tolerance beyond its radius
    pub const SAFE_ZONE_TOLERANCE: f32 = 0.05;
    /// Safe zone auto-placement: candidate square half extent
    pub const SAFE_ZONE_SEARCH_EXTENT: f32 = 15.0;
    /// Safe zone auto-placement: attempts before falling back
    pub const SAFE_ZONE_ATTEMPTS: u32 = 20;
    /// Safe zone auto-placement: minimum distance from the player
    pub const SAFE_ZONE_MIN_FROM_PLAYER: f32 = 8.0;
    /// Safe zone auto-placement: minimum distance from the adversary
    pub const SAFE_ZONE_MIN_FROM_ADVERSARY: f32 = 6.0;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Unit forward vector for a yaw angle (rotation about +Y, yaw 0 faces +Z)
#[inline]
pub fn yaw_to_forward(yaw: f32) -> Vec3 {
    Vec3::new(yaw.sin(), 0.0, yaw.cos())
}

/// Yaw angle of a direction projected onto the ground plane
///
/// Returns `None` for directions with no horizontal component.
#[inline]
pub fn forward_to_yaw(dir: Vec3) -> Option<f32> {
    if dir.x * dir.x + dir.z * dir.z < 1e-8 {
        return None;
    }
    Some(dir.x.atan2(dir.z))
}

/// Angle in degrees between two vectors, `0` if either is degenerate
pub fn angle_between_deg(a: Vec3, b: Vec3) -> f32 {
    let denom = (a.length_squared() * b.length_squared()).sqrt();
    if denom < 1e-12 {
        return 0.0;
    }
    (a.dot(b) / denom).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Distance between two points ignoring height
#[inline]
pub fn flat_distance(a: Vec3, b: Vec3) -> f32 {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    (dx * dx + dz * dz).sqrt()
}
