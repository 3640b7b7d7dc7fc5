//! Flat identity index over loaded entities.

use std::ops::ControlFlow;

use hashbrown::HashMap;
use rgb_spatial::{EntityAccess, EntityId, EntityTypeTest};
use tracing::warn;
use uuid::Uuid;

/// id → handle and uuid → handle, independent of position.
pub struct EntityLookup<T: EntityAccess> {
    by_id: HashMap<EntityId, T>,
    by_uuid: HashMap<Uuid, T>,
}

impl<T: EntityAccess> Default for EntityLookup<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: EntityAccess> EntityLookup<T> {
    /// An empty lookup.
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_id: HashMap::new(),
            by_uuid: HashMap::new(),
        }
    }

    /// Index an entity. A UUID that is already present is a data
    /// corruption alarm: the new handle is logged and dropped.
    pub fn add(&mut self, entity: T) -> bool {
        let uuid = entity.uuid();
        if self.by_uuid.contains_key(&uuid) {
            warn!("Duplicate entity UUID {uuid}: {entity:?}");
            return false;
        }
        self.by_id.insert(entity.id(), entity.clone());
        self.by_uuid.insert(uuid, entity);
        true
    }

    /// Drop an entity from both maps. Returns `false` if its id was not
    /// indexed.
    pub fn remove(&mut self, entity: &T) -> bool {
        let removed = self.by_id.remove(&entity.id()).is_some();
        self.by_uuid.remove(&entity.uuid());
        removed
    }

    /// Entity with this id, accessible or not.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.by_id.get(&id)
    }

    #[must_use]
    pub fn get_by_uuid(&self, uuid: Uuid) -> Option<&T> {
        self.by_uuid.get(&uuid)
    }

    #[must_use]
    pub fn contains_uuid(&self, uuid: Uuid) -> bool {
        self.by_uuid.contains_key(&uuid)
    }

    /// Every indexed entity in no particular order.
    pub fn all(&self) -> impl Iterator<Item = &T> + '_ {
        self.by_id.values()
    }

    /// Visit every entity accepted by `test`, stopping when the visitor breaks.
    pub fn get_entities<U>(
        &self,
        test: &EntityTypeTest<T, U>,
        mut visitor: impl FnMut(U) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        for entity in self.by_id.values() {
            if let Some(cast) = test.try_cast(entity) {
                visitor(cast)?;
            }
        }
        ControlFlow::Continue(())
    }

    /// Number of indexed entities.
    #[must_use]
    pub fn count(&self) -> usize {
        self.by_id.len()
    }
}
