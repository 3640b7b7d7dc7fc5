//! Read-only queries over accessible entities.

use std::ops::ControlFlow;

use rgb_spatial::{Aabb, EntityAccess, EntityId, EntityTypeTest};
use uuid::Uuid;

use crate::index::EntityIndex;

/// Queries that only ever see entities in accessible sections.
///
/// Identity lookups consult the flat lookup and then check the entity's
/// section; spatial queries go through the section grid directly.
pub struct EntityGetter<'a, T: EntityAccess> {
    index: &'a EntityIndex<T>,
}

impl<'a, T: EntityAccess> EntityGetter<'a, T> {
    pub(crate) const fn new(index: &'a EntityIndex<T>) -> Self {
        Self { index }
    }

    fn is_accessible(&self, entity: &T) -> bool {
        self.index
            .visibility_of(entity)
            .is_some_and(rgb_spatial::Visibility::is_accessible)
    }

    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&'a T> {
        self.index
            .lookup()
            .get(id)
            .filter(|entity| self.is_accessible(entity))
    }

    #[must_use]
    pub fn get_by_uuid(&self, uuid: Uuid) -> Option<&'a T> {
        self.index
            .lookup()
            .get_by_uuid(uuid)
            .filter(|entity| self.is_accessible(entity))
    }

    pub fn all(&self) -> impl Iterator<Item = &'a T> + '_ {
        self.index
            .lookup()
            .all()
            .filter(|entity| self.is_accessible(entity))
    }

    /// Entities whose box intersects `bounds`.
    pub fn get_entities(
        &self,
        bounds: &Aabb,
        visitor: impl FnMut(&T) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        self.index.sections().get_entities(bounds, visitor)
    }

    /// Entities of the tested type whose box intersects `bounds`.
    pub fn get_entities_of<U>(
        &self,
        test: &EntityTypeTest<T, U>,
        bounds: &Aabb,
        visitor: impl FnMut(U) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        self.index.sections().get_entities_of(test, bounds, visitor)
    }

    /// Every accessible entity of the tested type, anywhere.
    pub fn get_all_of<U>(
        &self,
        test: &EntityTypeTest<T, U>,
        mut visitor: impl FnMut(U) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        for entity in self.all() {
            if let Some(cast) = test.try_cast(entity) {
                visitor(cast)?;
            }
        }
        ControlFlow::Continue(())
    }
}
