//! Deterministic simulation module
//!
//! All adversary logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - World access only through the collaborator traits
//! - No rendering, audio or platform dependencies

pub mod collaborators;
pub mod detection;
pub mod escape;
pub mod geometry;
pub mod movement;
pub mod pursuit;
pub mod report;
pub mod sdf;
pub mod state;
pub mod tick;

pub use collaborators::{ConcealmentOracle, OutcomeCounter, OutcomeSink, PlayerHandle};
pub use detection::{DetectionEngine, DetectionResult};
pub use escape::{EscapeState, EscapeTracker, SafeZone};
pub use geometry::{EntityId, GeometryQuery, LayerMask, RayHit, StaticScene};
pub use movement::PatrolPlan;
pub use pursuit::{Senses, Step, next_state};
pub use report::{Awareness, RoundReport};
pub use state::{
    Adversary, EscapeRoute, GameEvent, Outcome, PursuitState, Round, RoundSetup, SafeZonePlacement,
};
pub use tick::tick;
