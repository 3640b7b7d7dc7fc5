//! Sparse grid of sections keyed by packed section position.

use std::collections::BTreeSet;
use std::ops::ControlFlow;

use hashbrown::{HashMap, HashSet};

use crate::{
    Aabb, ChunkPos, EntityAccess, EntitySection, EntityTypeTest, SectionPos, Visibility,
    section_coord,
};

/// Horizontal slack added to query boxes, in world units.
///
/// An entity is filed under the section of its feet position, but its box
/// may protrude into neighbours. This must cover half the widest entity.
pub const HORIZONTAL_QUERY_MARGIN: f64 = 2.0;

/// Slack below query boxes: a tall entity standing in a lower section can
/// reach up into the queried one.
pub const BELOW_QUERY_MARGIN: f64 = 4.0;

/// Slack above query boxes. Boxes grow upward from the feet, so none is needed.
pub const ABOVE_QUERY_MARGIN: f64 = 0.0;

/// All sections that currently hold storage.
///
/// `section_ids` mirrors the keys of `sections` in sorted order so that a
/// column, or a slab sharing one `x`, is a contiguous range.
pub struct EntitySectionStorage<T: EntityAccess> {
    sections: HashMap<u64, EntitySection<T>>,
    section_ids: BTreeSet<u64>,
}

impl<T: EntityAccess> Default for EntitySectionStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: EntityAccess> EntitySectionStorage<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sections: HashMap::new(),
            section_ids: BTreeSet::new(),
        }
    }

    /// Get the section at `pos`, creating it with `visibility` if absent.
    pub fn get_or_create_section(
        &mut self,
        pos: SectionPos,
        visibility: Visibility,
    ) -> &mut EntitySection<T> {
        let key = pos.as_long();
        self.sections.entry(key).or_insert_with(|| {
            self.section_ids.insert(key);
            EntitySection::new(visibility)
        })
    }

    #[must_use]
    pub fn section(&self, pos: SectionPos) -> Option<&EntitySection<T>> {
        self.sections.get(&pos.as_long())
    }

    pub fn section_mut(&mut self, pos: SectionPos) -> Option<&mut EntitySection<T>> {
        self.sections.get_mut(&pos.as_long())
    }

    /// Drop a section from the grid.
    pub fn remove(&mut self, pos: SectionPos) -> Option<EntitySection<T>> {
        let key = pos.as_long();
        self.section_ids.remove(&key);
        self.sections.remove(&key)
    }

    /// Drop the section at `pos` if it holds no entities.
    pub fn remove_if_empty(&mut self, pos: SectionPos) -> bool {
        if self.section(pos).is_some_and(EntitySection::is_empty) {
            self.remove(pos);
            true
        } else {
            false
        }
    }

    /// Visit every non-empty, accessible section that may hold an entity
    /// whose box intersects `bounds`.
    pub fn for_each_accessible_non_empty_section(
        &self,
        bounds: &Aabb,
        mut visitor: impl FnMut(&EntitySection<T>) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        let min_x = section_coord(bounds.min.x - HORIZONTAL_QUERY_MARGIN);
        let min_y = section_coord(bounds.min.y - BELOW_QUERY_MARGIN);
        let min_z = section_coord(bounds.min.z - HORIZONTAL_QUERY_MARGIN);
        let max_x = section_coord(bounds.max.x + HORIZONTAL_QUERY_MARGIN);
        let max_y = section_coord(bounds.max.y + ABOVE_QUERY_MARGIN);
        let max_z = section_coord(bounds.max.z + HORIZONTAL_QUERY_MARGIN);

        for x in min_x..=max_x {
            for z in min_z..=max_z {
                for key in self.section_ids.range(ChunkPos::new(x, z).section_key_range()) {
                    let y = SectionPos::from_long(*key).y;
                    if y < min_y || y > max_y {
                        continue;
                    }
                    let Some(section) = self.sections.get(key) else {
                        continue;
                    };
                    if section.is_empty() || !section.visibility().is_accessible() {
                        continue;
                    }
                    visitor(section)?;
                }
            }
        }
        ControlFlow::Continue(())
    }

    /// Visit every entity in accessible sections whose box intersects `bounds`.
    pub fn get_entities(
        &self,
        bounds: &Aabb,
        mut visitor: impl FnMut(&T) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        self.for_each_accessible_non_empty_section(bounds, |section| {
            section.get_entities(bounds, &mut visitor)
        })
    }

    /// Type-filtered variant of [`EntitySectionStorage::get_entities`].
    pub fn get_entities_of<U>(
        &self,
        test: &EntityTypeTest<T, U>,
        bounds: &Aabb,
        mut visitor: impl FnMut(U) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        self.for_each_accessible_non_empty_section(bounds, |section| {
            section.get_entities_of(test, bounds, &mut visitor)
        })
    }

    /// Positions of the sections of `column` that currently hold storage.
    pub fn existing_section_positions_in_column(
        &self,
        column: ChunkPos,
    ) -> impl Iterator<Item = SectionPos> + '_ {
        self.section_ids
            .range(column.section_key_range())
            .map(|key| SectionPos::from_long(*key))
    }

    /// Sections of `column` that currently hold storage.
    pub fn existing_sections_in_column(
        &self,
        column: ChunkPos,
    ) -> impl Iterator<Item = &EntitySection<T>> + '_ {
        self.section_ids
            .range(column.section_key_range())
            .filter_map(|key| self.sections.get(key))
    }

    /// Every column with at least one section.
    #[must_use]
    pub fn columns_with_sections(&self) -> HashSet<ChunkPos> {
        self.section_ids
            .iter()
            .map(|key| SectionPos::from_long(*key).chunk())
            .collect()
    }

    /// Every section with its position, in key order.
    pub fn iter(&self) -> impl Iterator<Item = (SectionPos, &EntitySection<T>)> + '_ {
        self.section_ids.iter().filter_map(|key| {
            self.sections
                .get(key)
                .map(|section| (SectionPos::from_long(*key), section))
        })
    }

    /// Number of sections.
    #[must_use]
    pub fn count(&self) -> usize {
        self.sections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vec3;
    use crate::test_entity::{Kind, TestEntity};

    fn storage_with(entities: &[TestEntity], visibility: Visibility) -> EntitySectionStorage<TestEntity> {
        let mut storage = EntitySectionStorage::new();
        for entity in entities {
            storage
                .get_or_create_section(entity.section_pos(), visibility)
                .add(entity.clone());
        }
        storage
    }

    fn ids_in(storage: &EntitySectionStorage<TestEntity>, bounds: &Aabb) -> Vec<u32> {
        let mut ids = Vec::new();
        let _ = storage.get_entities(bounds, |e| {
            ids.push(e.id());
            ControlFlow::Continue(())
        });
        ids.sort_unstable();
        ids
    }

    #[test]
    fn column_enumeration_touches_only_that_column() {
        let storage = storage_with(
            &[
                TestEntity::new(1, Kind::Zombie, Vec3::new(1.0, 1.0, 1.0)),
                TestEntity::new(2, Kind::Zombie, Vec3::new(1.0, 40.0, 1.0)),
                TestEntity::new(3, Kind::Zombie, Vec3::new(1.0, -40.0, 1.0)),
                TestEntity::new(4, Kind::Zombie, Vec3::new(17.0, 1.0, 1.0)),
                TestEntity::new(5, Kind::Zombie, Vec3::new(1.0, 1.0, 17.0)),
            ],
            Visibility::Tracked,
        );

        let mut ys: Vec<i32> = storage
            .existing_section_positions_in_column(ChunkPos::new(0, 0))
            .map(|pos| pos.y)
            .collect();
        ys.sort_unstable();
        assert_eq!(ys, vec![-3, 0, 2]);
        assert_eq!(storage.existing_sections_in_column(ChunkPos::new(1, 0)).count(), 1);
        assert_eq!(storage.existing_sections_in_column(ChunkPos::new(5, 5)).count(), 0);
        assert_eq!(storage.columns_with_sections().len(), 3);
    }

    #[test]
    fn protruding_box_is_found_through_margin() {
        // Feet just across the x boundary, box reaching back into section 0.
        let wide = TestEntity::with_size(1, Kind::Zombie, Vec3::new(16.5, 1.0, 8.0), 2.0, 2.0);
        let storage = storage_with(&[wide], Visibility::Tracked);

        let query = Aabb::new(Vec3::new(14.0, 0.0, 0.0), Vec3::new(15.9, 4.0, 16.0));
        assert_eq!(ids_in(&storage, &query), vec![1]);
    }

    #[test]
    fn tall_entity_below_is_found() {
        let tall = TestEntity::with_size(1, Kind::Zombie, Vec3::new(8.0, 14.0, 8.0), 0.6, 3.0);
        let storage = storage_with(&[tall], Visibility::Tracked);

        let query = Aabb::new(Vec3::new(0.0, 16.0, 0.0), Vec3::new(16.0, 20.0, 16.0));
        assert_eq!(ids_in(&storage, &query), vec![1]);
    }

    #[test]
    fn hidden_sections_are_skipped() {
        let storage = storage_with(
            &[TestEntity::new(1, Kind::Zombie, Vec3::new(1.0, 1.0, 1.0))],
            Visibility::Hidden,
        );
        let query = Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(16.0, 16.0, 16.0));
        assert!(ids_in(&storage, &query).is_empty());
    }

    #[test]
    fn abort_propagates_across_sections() {
        let entities: Vec<_> = (0..8)
            .map(|i| TestEntity::new(i, Kind::Zombie, Vec3::new(f64::from(i) * 16.0 + 1.0, 1.0, 1.0)))
            .collect();
        let storage = storage_with(&entities, Visibility::Ticking);
        let query = Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(128.0, 16.0, 16.0));

        let mut sections_seen = 0;
        let flow = storage.for_each_accessible_non_empty_section(&query, |_| {
            sections_seen += 1;
            ControlFlow::Break(())
        });
        assert_eq!(flow, ControlFlow::Break(()));
        assert_eq!(sections_seen, 1);
    }

    #[test]
    fn remove_if_empty_only_drops_empty_sections() {
        let entity = TestEntity::new(1, Kind::Zombie, Vec3::new(1.0, 1.0, 1.0));
        let mut storage = storage_with(&[entity.clone()], Visibility::Tracked);
        let pos = entity.section_pos();

        assert!(!storage.remove_if_empty(pos));
        assert!(storage.section_mut(pos).is_some_and(|s| s.remove(&entity)));
        assert!(storage.remove_if_empty(pos));
        assert!(storage.section(pos).is_none());
        assert_eq!(storage.existing_section_positions_in_column(pos.chunk()).count(), 0);
    }

    #[test]
    fn typed_query_across_sections() {
        let storage = storage_with(
            &[
                TestEntity::new(1, Kind::Zombie, Vec3::new(1.0, 1.0, 1.0)),
                TestEntity::new(2, Kind::Item, Vec3::new(20.0, 1.0, 1.0)),
                TestEntity::new(3, Kind::Zombie, Vec3::new(20.0, 1.0, 1.0)),
            ],
            Visibility::Tracked,
        );
        let query = Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(32.0, 16.0, 16.0));
        let test = EntityTypeTest::kind(Kind::Zombie);

        let mut ids = Vec::new();
        let _ = storage.get_entities_of(&test, &query, |e| {
            ids.push(e.id());
            ControlFlow::Continue(())
        });
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 3]);
    }
}
