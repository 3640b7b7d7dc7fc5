//! Entity handle shared by the unit tests and the integration tests.

use std::sync::Arc;

use parking_lot::Mutex;
use rgb_spatial::{Aabb, EntityAccess, EntityId, RemovalReason, Vec3};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MobKind {
    Sheep,
    Arrow,
    Player,
}

#[derive(Debug)]
struct State {
    position: Vec3,
    removed: Option<RemovalReason>,
}

#[derive(Debug)]
struct Inner {
    id: EntityId,
    uuid: Uuid,
    kind: MobKind,
    state: Mutex<State>,
}

/// Cheap to clone; clones share position and removal state like a real
/// entity reference.
#[derive(Clone, Debug)]
pub struct Mob(Arc<Inner>);

impl Mob {
    pub fn new(id: EntityId, kind: MobKind, position: Vec3) -> Self {
        Self::with_uuid(id, Uuid::from_u128(u128::from(id) << 64 | 0xbeef), kind, position)
    }

    pub fn with_uuid(id: EntityId, uuid: Uuid, kind: MobKind, position: Vec3) -> Self {
        Self(Arc::new(Inner {
            id,
            uuid,
            kind,
            state: Mutex::new(State {
                position,
                removed: None,
            }),
        }))
    }

    pub fn sheep(id: EntityId, x: f64, y: f64, z: f64) -> Self {
        Self::new(id, MobKind::Sheep, Vec3::new(x, y, z))
    }

    pub fn teleport(&self, position: Vec3) {
        self.0.state.lock().position = position;
    }

    pub fn removal(&self) -> Option<RemovalReason> {
        self.0.state.lock().removed
    }
}

impl EntityAccess for Mob {
    type Kind = MobKind;

    fn id(&self) -> EntityId {
        self.0.id
    }

    fn uuid(&self) -> Uuid {
        self.0.uuid
    }

    fn kind(&self) -> MobKind {
        self.0.kind
    }

    fn position(&self) -> Vec3 {
        self.0.state.lock().position
    }

    fn bounding_box(&self) -> Aabb {
        Aabb::standing_at(self.position(), 0.9, 1.3)
    }

    fn is_always_ticking(&self) -> bool {
        self.0.kind == MobKind::Player
    }

    fn should_be_saved(&self) -> bool {
        self.0.kind == MobKind::Sheep
    }

    fn set_removed(&self, reason: RemovalReason) {
        self.0.state.lock().removed = Some(reason);
    }
}
