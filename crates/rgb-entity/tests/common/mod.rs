#![allow(dead_code)]

mod mob;

use std::sync::Arc;

pub use mob::{Mob, MobKind};
use rgb_entity::{EventLog, PersistentEntitySectionManager};
use rgb_spatial::{EntityAccess, EntityId};
use rgb_storage::InMemoryEntityStorage;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

pub type Storage = Arc<InMemoryEntityStorage<Mob>>;
pub type Manager = PersistentEntitySectionManager<Mob, Storage, EventLog>;

pub fn manager_with(storage: InMemoryEntityStorage<Mob>) -> (Manager, Storage) {
    init_tracing();
    let storage = Arc::new(storage);
    (
        PersistentEntitySectionManager::new(Arc::clone(&storage), EventLog::new()),
        storage,
    )
}

pub fn ids(entities: &[Mob]) -> Vec<EntityId> {
    let mut ids: Vec<_> = entities.iter().map(EntityAccess::id).collect();
    ids.sort_unstable();
    ids
}
