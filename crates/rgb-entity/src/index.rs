//! Lookup, sections, and the side table tying each entity to its section.
//!
//! Both managers own one [`EntityIndex`]. It keeps the three structures in
//! step; the managers decide which callbacks follow.

use hashbrown::HashMap;
use rgb_spatial::{
    ChunkPos, EntityAccess, EntityId, EntitySectionStorage, SectionPos, Visibility,
};
use smallvec::SmallVec;
use tracing::warn;

use crate::EntityLookup;

/// Outcome of re-filing a moved entity. Visibilities are effective ones,
/// with always-ticking already applied.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Relocation {
    pub from: SectionPos,
    pub to: SectionPos,
    pub old: Visibility,
    pub new: Visibility,
}

impl Relocation {
    pub fn changed_section(&self) -> bool {
        self.from != self.to
    }
}

pub(crate) struct EntityIndex<T: EntityAccess> {
    lookup: EntityLookup<T>,
    sections: EntitySectionStorage<T>,
    /// Section each indexed entity is currently filed under.
    filed_at: HashMap<EntityId, SectionPos>,
}

impl<T: EntityAccess> EntityIndex<T> {
    pub fn new() -> Self {
        Self {
            lookup: EntityLookup::new(),
            sections: EntitySectionStorage::new(),
            filed_at: HashMap::new(),
        }
    }

    pub const fn lookup(&self) -> &EntityLookup<T> {
        &self.lookup
    }

    pub const fn sections(&self) -> &EntitySectionStorage<T> {
        &self.sections
    }

    pub fn section_of(&self, id: EntityId) -> Option<SectionPos> {
        self.filed_at.get(&id).copied()
    }

    /// Effective visibility of an indexed entity.
    pub fn visibility_of(&self, entity: &T) -> Option<Visibility> {
        let pos = self.section_of(entity.id())?;
        let visibility = self
            .sections
            .section(pos)
            .map_or(Visibility::Hidden, rgb_spatial::EntitySection::visibility);
        Some(visibility.effective(entity.is_always_ticking()))
    }

    /// File a new entity. New sections take their visibility from
    /// `column_visibility`. Returns the entity's effective visibility, or
    /// `None` if its id or UUID is already indexed.
    pub fn insert(
        &mut self,
        entity: T,
        column_visibility: impl FnOnce(ChunkPos) -> Visibility,
    ) -> Option<Visibility> {
        let id = entity.id();
        if self.filed_at.contains_key(&id) {
            warn!("Entity id {id} is already indexed, ignoring {entity:?}");
            return None;
        }
        if !self.lookup.add(entity.clone()) {
            return None;
        }

        let pos = entity.section_pos();
        let always_ticking = entity.is_always_ticking();
        let section = self
            .sections
            .get_or_create_section(pos, column_visibility(pos.chunk()));
        section.add(entity);
        let visibility = section.visibility();
        self.filed_at.insert(id, pos);

        Some(visibility.effective(always_ticking))
    }

    /// Move an entity to the section of its current position. Returns
    /// `None` if it is not indexed.
    pub fn relocate(
        &mut self,
        entity: &T,
        column_visibility: impl FnOnce(ChunkPos) -> Visibility,
    ) -> Option<Relocation> {
        let id = entity.id();
        let from = self.section_of(id)?;
        let to = entity.section_pos();
        let always_ticking = entity.is_always_ticking();

        if from == to {
            let visibility = self.visibility_of(entity)?;
            return Some(Relocation {
                from,
                to,
                old: visibility,
                new: visibility,
            });
        }

        let old = match self.sections.section_mut(from) {
            Some(section) => {
                if !section.remove(entity) {
                    warn!("Entity {entity:?} wasn't found in section {from:?} (moving to {to:?})");
                }
                section.visibility()
            }
            None => {
                warn!("Section {from:?} of moving entity {entity:?} is missing");
                Visibility::Hidden
            }
        };
        self.sections.remove_if_empty(from);

        let section = self
            .sections
            .get_or_create_section(to, column_visibility(to.chunk()));
        section.add(entity.clone());
        let new = section.visibility();
        self.filed_at.insert(id, to);

        Some(Relocation {
            from,
            to,
            old: old.effective(always_ticking),
            new: new.effective(always_ticking),
        })
    }

    /// Drop an entity from every structure. Returns the effective visibility
    /// it had, or `None` if it was not indexed.
    pub fn detach(&mut self, entity: &T) -> Option<Visibility> {
        let pos = self.filed_at.remove(&entity.id())?;

        let visibility = match self.sections.section_mut(pos) {
            Some(section) => {
                if !section.remove(entity) {
                    warn!("Entity {entity:?} wasn't found in section {pos:?} (destroying due to removal)");
                }
                section.visibility()
            }
            None => {
                warn!("Section {pos:?} of removed entity {entity:?} is missing");
                Visibility::Hidden
            }
        };
        self.sections.remove_if_empty(pos);
        self.lookup.remove(entity);

        Some(visibility.effective(entity.is_always_ticking()))
    }

    /// Set every existing section of `column` to `visibility`. Returns, per
    /// section, its previous visibility and the entities whose effective
    /// visibility follows the section's.
    pub fn update_column_visibility(
        &mut self,
        column: ChunkPos,
        visibility: Visibility,
    ) -> Vec<(Visibility, Vec<T>)> {
        let positions: SmallVec<[SectionPos; 8]> = self
            .sections
            .existing_section_positions_in_column(column)
            .collect();

        positions
            .into_iter()
            .filter_map(|pos| {
                let section = self.sections.section_mut(pos)?;
                let old = section.update_visibility(visibility);
                let affected = section
                    .entities()
                    .filter(|entity| !entity.is_always_ticking())
                    .cloned()
                    .collect();
                Some((old, affected))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mob::{Mob, MobKind};
    use rgb_spatial::Vec3;

    fn tracked(_: ChunkPos) -> Visibility {
        Visibility::Tracked
    }

    #[test]
    fn insert_files_under_feet_section() {
        let mut index = EntityIndex::new();
        let entity = Mob::new(1, MobKind::Sheep, Vec3::new(17.0, 40.0, -3.0));

        assert_eq!(index.insert(entity.clone(), tracked), Some(Visibility::Tracked));
        assert_eq!(index.section_of(1), Some(SectionPos::new(1, 2, -1)));
        assert_eq!(index.lookup().count(), 1);
        assert_eq!(index.sections().count(), 1);
    }

    #[test]
    fn duplicate_id_or_uuid_is_rejected() {
        let mut index = EntityIndex::new();
        let first = Mob::new(1, MobKind::Sheep, Vec3::new(0.0, 0.0, 0.0));
        index.insert(first.clone(), tracked);

        assert_eq!(index.insert(first.clone(), tracked), None);

        let same_uuid =
            Mob::with_uuid(2, first.uuid(), MobKind::Sheep, Vec3::new(50.0, 0.0, 0.0));
        assert_eq!(index.insert(same_uuid, tracked), None);

        assert_eq!(index.lookup().count(), 1);
        assert_eq!(index.sections().count(), 1);
    }

    #[test]
    fn relocate_moves_between_sections_and_prunes() {
        let mut index = EntityIndex::new();
        let entity = Mob::new(1, MobKind::Sheep, Vec3::new(1.0, 1.0, 1.0));
        index.insert(entity.clone(), |_| Visibility::Ticking);

        entity.teleport(Vec3::new(100.0, 1.0, 1.0));
        let relocation = index.relocate(&entity, |_| Visibility::Hidden).unwrap();

        assert!(relocation.changed_section());
        assert_eq!(relocation.old, Visibility::Ticking);
        assert_eq!(relocation.new, Visibility::Hidden);
        assert_eq!(index.sections().count(), 1);
        assert_eq!(index.section_of(1), Some(SectionPos::new(6, 0, 0)));
    }

    #[test]
    fn relocate_within_section_keeps_filing() {
        let mut index = EntityIndex::new();
        let entity = Mob::new(1, MobKind::Arrow, Vec3::new(1.0, 1.0, 1.0));
        index.insert(entity.clone(), tracked);

        entity.teleport(Vec3::new(2.0, 3.0, 4.0));
        let relocation = index.relocate(&entity, tracked).unwrap();

        assert!(!relocation.changed_section());
        assert_eq!(relocation.new, Visibility::Tracked);
    }

    #[test]
    fn detach_removes_everywhere() {
        let mut index = EntityIndex::new();
        let entity = Mob::new(1, MobKind::Sheep, Vec3::new(1.0, 1.0, 1.0));
        index.insert(entity.clone(), tracked);

        assert_eq!(index.detach(&entity), Some(Visibility::Tracked));
        assert_eq!(index.detach(&entity), None);
        assert_eq!(index.lookup().count(), 0);
        assert_eq!(index.sections().count(), 0);
    }

    #[test]
    fn column_update_skips_always_ticking() {
        let mut index = EntityIndex::new();
        let mob = Mob::new(1, MobKind::Sheep, Vec3::new(1.0, 1.0, 1.0));
        let player = Mob::new(2, MobKind::Player, Vec3::new(1.0, 20.0, 1.0));
        index.insert(mob, |_| Visibility::Hidden);
        index.insert(player.clone(), |_| Visibility::Hidden);
        assert_eq!(index.visibility_of(&player), Some(Visibility::Ticking));

        let updates = index.update_column_visibility(ChunkPos::new(0, 0), Visibility::Tracked);

        assert_eq!(updates.len(), 2);
        let affected: Vec<_> = updates
            .iter()
            .flat_map(|(_, entities)| entities.iter().map(EntityAccess::id))
            .collect();
        assert_eq!(affected, [1]);
    }
}
