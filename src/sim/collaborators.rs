//! Interfaces to the entities the adversary does not own
//!
//! The player is read through [`ConcealmentOracle`]; terminal outcomes are
//! reported to an [`OutcomeSink`] (the session manager).

use std::cell::Cell;

use glam::Vec3;

use super::geometry::EntityId;

/// Read-only view of the player
pub trait ConcealmentOracle {
    /// True while the player is disguised/hidden from the adversary
    fn is_concealed(&self) -> bool;

    /// World position of the player
    fn position(&self) -> Vec3;

    /// Scene entity of the player's collider, if it has one
    ///
    /// A line-of-sight ray that stops on this entity counts as clear.
    fn entity_id(&self) -> Option<EntityId> {
        None
    }
}

/// Receives terminal outcomes, at most once each per round
pub trait OutcomeSink {
    fn on_capture(&mut self);
    fn on_victory(&mut self);
}

/// Shared player state written by the host, read by the adversary
///
/// Hand an `Rc<PlayerHandle>` to the round and keep a clone to update it.
#[derive(Debug, Default)]
pub struct PlayerHandle {
    position: Cell<Vec3>,
    concealed: Cell<bool>,
    entity: Cell<Option<EntityId>>,
}

impl PlayerHandle {
    pub fn new(position: Vec3) -> Self {
        Self {
            position: Cell::new(position),
            ..Default::default()
        }
    }

    pub fn with_entity(self, entity: EntityId) -> Self {
        self.entity.set(Some(entity));
        self
    }

    pub fn set_position(&self, position: Vec3) {
        self.position.set(position);
    }

    pub fn set_concealed(&self, concealed: bool) {
        self.concealed.set(concealed);
    }
}

impl ConcealmentOracle for PlayerHandle {
    fn is_concealed(&self) -> bool {
        self.concealed.get()
    }

    fn position(&self) -> Vec3 {
        self.position.get()
    }

    fn entity_id(&self) -> Option<EntityId> {
        self.entity.get()
    }
}

/// Sink that counts notifications
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounter {
    pub captures: u32,
    pub victories: u32,
}

impl OutcomeCounter {
    /// Total notifications received
    pub fn total(&self) -> u32 {
        self.captures + self.victories
    }
}

impl OutcomeSink for OutcomeCounter {
    fn on_capture(&mut self) {
        self.captures += 1;
    }

    fn on_victory(&mut self) {
        self.victories += 1;
    }
}
