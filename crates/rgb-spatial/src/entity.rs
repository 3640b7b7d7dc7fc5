//! The handle contract for entities indexed by this crate.
//!
//! Entities are owned elsewhere; the index only stores cheap clonable
//! handles (typically an `Arc` or an arena key) and reads state through
//! [`EntityAccess`].

use std::fmt;
use std::hash::Hash;

use uuid::Uuid;

use crate::{Aabb, SectionPos, Vec3};

/// Process-local entity id, unique among loaded entities.
pub type EntityId = u32;

/// Why an entity is leaving the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemovalReason {
    Killed,
    Discarded,
    UnloadedToChunk,
    UnloadedWithPlayer,
    ChangedDimension,
}

impl RemovalReason {
    /// The entity is gone for good; destruction callbacks fire.
    #[must_use]
    pub const fn should_destroy(self) -> bool {
        matches!(self, Self::Killed | Self::Discarded)
    }

    /// The entity is being written back to its column.
    #[must_use]
    pub const fn should_save(self) -> bool {
        matches!(self, Self::UnloadedToChunk)
    }
}

/// A handle to a live entity.
///
/// Handles are compared by [`EntityAccess::id`]. `Kind` is the runtime type
/// tag sections bucket entities by, so type-filtered scans never visit
/// entities of unrelated kinds.
pub trait EntityAccess: Clone + fmt::Debug {
    type Kind: Copy + Eq + Hash + fmt::Debug;

    fn id(&self) -> EntityId;

    fn uuid(&self) -> Uuid;

    fn kind(&self) -> Self::Kind;

    /// Current feet position.
    fn position(&self) -> Vec3;

    fn bounding_box(&self) -> Aabb;

    /// Simulated regardless of the visibility of the section it is in.
    fn is_always_ticking(&self) -> bool {
        false
    }

    /// Written to durable storage when its column is saved.
    fn should_be_saved(&self) -> bool {
        true
    }

    /// Record that the entity left the world. Called by the managers when
    /// they remove an entity, including on column unload.
    fn set_removed(&self, reason: RemovalReason);

    fn section_pos(&self) -> SectionPos {
        SectionPos::of(self.position())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_reason_flags() {
        assert!(RemovalReason::Killed.should_destroy());
        assert!(RemovalReason::Discarded.should_destroy());
        assert!(!RemovalReason::UnloadedToChunk.should_destroy());
        assert!(RemovalReason::UnloadedToChunk.should_save());
        assert!(!RemovalReason::UnloadedWithPlayer.should_save());
        assert!(!RemovalReason::ChangedDimension.should_destroy());
    }
}
