//! Minimal handle used by the unit tests of this crate.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use uuid::Uuid;

use crate::{Aabb, EntityAccess, EntityId, RemovalReason, Vec3};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Zombie,
    Item,
}

#[derive(Debug)]
struct Inner {
    id: EntityId,
    kind: Kind,
    pos: Vec3,
    width: f64,
    height: f64,
    removed: AtomicU8,
}

#[derive(Clone, Debug)]
pub struct TestEntity(Arc<Inner>);

impl TestEntity {
    pub fn new(id: EntityId, kind: Kind, pos: Vec3) -> Self {
        Self::with_size(id, kind, pos, 0.6, 1.8)
    }

    pub fn with_size(id: EntityId, kind: Kind, pos: Vec3, width: f64, height: f64) -> Self {
        Self(Arc::new(Inner {
            id,
            kind,
            pos,
            width,
            height,
            removed: AtomicU8::new(0),
        }))
    }
}

impl EntityAccess for TestEntity {
    type Kind = Kind;

    fn id(&self) -> EntityId {
        self.0.id
    }

    fn uuid(&self) -> Uuid {
        Uuid::from_u128(u128::from(self.0.id))
    }

    fn kind(&self) -> Kind {
        self.0.kind
    }

    fn position(&self) -> Vec3 {
        self.0.pos
    }

    fn bounding_box(&self) -> Aabb {
        Aabb::standing_at(self.0.pos, self.0.width, self.0.height)
    }

    fn set_removed(&self, _reason: RemovalReason) {
        self.0.removed.store(1, Ordering::Relaxed);
    }
}
