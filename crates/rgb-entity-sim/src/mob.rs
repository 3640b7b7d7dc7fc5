//! Simulated mobs and their on-disk records.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use rgb_spatial::{Aabb, EntityAccess, EntityId, RemovalReason, Vec3};
use rgb_storage::EntityCodec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MobKind {
    Sheep,
    Zombie,
    /// Invisible bookkeeping entity; never saved.
    Marker,
    /// Simulated wherever it is; never saved with a column.
    Player,
}

impl MobKind {
    const fn size(self) -> (f64, f64) {
        match self {
            Self::Sheep => (0.9, 1.3),
            Self::Zombie | Self::Player => (0.6, 1.8),
            Self::Marker => (0.0, 0.0),
        }
    }
}

#[derive(Debug)]
struct State {
    position: Vec3,
    health: f32,
    removed: Option<RemovalReason>,
}

#[derive(Debug)]
struct Inner {
    id: EntityId,
    uuid: Uuid,
    kind: MobKind,
    state: Mutex<State>,
}

#[derive(Clone, Debug)]
pub struct Mob(Arc<Inner>);

impl Mob {
    pub fn new(id: EntityId, uuid: Uuid, kind: MobKind, position: Vec3, health: f32) -> Self {
        Self(Arc::new(Inner {
            id,
            uuid,
            kind,
            state: Mutex::new(State {
                position,
                health,
                removed: None,
            }),
        }))
    }

    pub fn health(&self) -> f32 {
        self.0.state.lock().health
    }

    pub fn hurt(&self, amount: f32) -> f32 {
        let mut state = self.0.state.lock();
        state.health -= amount;
        state.health
    }

    pub fn move_by(&self, dx: f64, dz: f64) {
        let mut state = self.0.state.lock();
        state.position = state.position.offset(dx, 0.0, dz);
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
        let (width, height) = self.0.kind.size();
        Aabb::standing_at(self.position(), width, height)
    }

    fn is_always_ticking(&self) -> bool {
        self.0.kind == MobKind::Player
    }

    fn should_be_saved(&self) -> bool {
        matches!(self.0.kind, MobKind::Sheep | MobKind::Zombie)
    }

    fn set_removed(&self, reason: RemovalReason) {
        self.0.state.lock().removed = Some(reason);
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MobRecord {
    uuid: u128,
    kind: MobKind,
    position: [f64; 3],
    health: f32,
}

/// Hands out process-local ids, both to spawned mobs and to mobs read
/// back from storage on the I/O thread.
#[derive(Clone, Debug, Default)]
pub struct IdAllocator(Arc<AtomicU32>);

impl IdAllocator {
    pub fn next(&self) -> EntityId {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

pub struct MobCodec {
    ids: IdAllocator,
}

impl MobCodec {
    pub const fn new(ids: IdAllocator) -> Self {
        Self { ids }
    }
}

impl EntityCodec for MobCodec {
    type Entity = Mob;
    type Record = MobRecord;

    fn encode(&self, mob: &Mob) -> Option<MobRecord> {
        if !mob.should_be_saved() {
            return None;
        }
        let state = mob.0.state.lock();
        (state.health > 0.0).then(|| MobRecord {
            uuid: mob.uuid().as_u128(),
            kind: mob.kind(),
            position: [state.position.x, state.position.y, state.position.z],
            health: state.health,
        })
    }

    fn decode(&self, record: MobRecord) -> Option<Mob> {
        let [x, y, z] = record.position;
        Some(Mob::new(
            self.ids.next(),
            Uuid::from_u128(record.uuid),
            record.kind,
            Vec3::new(x, y, z),
            record.health,
        ))
    }
}
