//! A single section: the entities whose position lies in one cell.

use std::ops::ControlFlow;

use smallvec::SmallVec;

use crate::{Aabb, EntityAccess, EntityTypeTest, Visibility};

/// Entities currently located in one section, bucketed by runtime kind.
///
/// Sections hold few kinds at once, so buckets live in a small inline vec
/// and are found by linear scan. Insertion order is kept within a bucket.
pub struct EntitySection<T: EntityAccess> {
    buckets: SmallVec<[(T::Kind, Vec<T>); 4]>,
    len: usize,
    visibility: Visibility,
}

impl<T: EntityAccess> EntitySection<T> {
    #[must_use]
    pub fn new(visibility: Visibility) -> Self {
        Self {
            buckets: SmallVec::new(),
            len: 0,
            visibility,
        }
    }

    pub fn add(&mut self, entity: T) {
        let kind = entity.kind();
        self.len += 1;
        match self.buckets.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, bucket)) => bucket.push(entity),
            None => self.buckets.push((kind, vec![entity])),
        }
    }

    /// Remove a handle. Returns `false` if it was not present.
    pub fn remove(&mut self, entity: &T) -> bool {
        let id = entity.id();
        // The kind may have been reported differently at insertion; fall back
        // to scanning every bucket.
        let kind = entity.kind();
        let order = self
            .buckets
            .iter()
            .position(|(k, _)| *k == kind)
            .into_iter()
            .chain(0..self.buckets.len());

        for index in order {
            let bucket = &mut self.buckets[index].1;
            if let Some(slot) = bucket.iter().position(|e| e.id() == id) {
                bucket.remove(slot);
                if bucket.is_empty() {
                    self.buckets.remove(index);
                }
                self.len -= 1;
                return true;
            }
        }
        false
    }

    #[must_use]
    pub fn contains(&self, entity: &T) -> bool {
        let id = entity.id();
        self.entities().any(|e| e.id() == id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &T> + '_ {
        self.buckets.iter().flat_map(|(_, bucket)| bucket.iter())
    }

    /// Visit every entity whose bounding box intersects `bounds`.
    pub fn get_entities(
        &self,
        bounds: &Aabb,
        visitor: &mut impl FnMut(&T) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        for entity in self.entities() {
            if entity.bounding_box().intersects(bounds) {
                visitor(entity)?;
            }
        }
        ControlFlow::Continue(())
    }

    /// Visit every entity accepted by `test` whose bounding box intersects
    /// `bounds`. Buckets of kinds the test rejects are skipped whole.
    pub fn get_entities_of<U>(
        &self,
        test: &EntityTypeTest<T, U>,
        bounds: &Aabb,
        visitor: &mut impl FnMut(U) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        for (kind, bucket) in &self.buckets {
            if !test.accepts_kind(*kind) {
                continue;
            }
            for entity in bucket {
                let Some(cast) = test.try_cast(entity) else {
                    continue;
                };
                if entity.bounding_box().intersects(bounds) {
                    visitor(cast)?;
                }
            }
        }
        ControlFlow::Continue(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Set a new visibility, returning the previous one.
    pub fn update_visibility(&mut self, visibility: Visibility) -> Visibility {
        std::mem::replace(&mut self.visibility, visibility)
    }
}

impl<T: EntityAccess> std::fmt::Debug for EntitySection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitySection")
            .field("len", &self.len)
            .field("kinds", &self.buckets.len())
            .field("visibility", &self.visibility)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_entity::{Kind, TestEntity};
    use crate::Vec3;

    fn everywhere() -> Aabb {
        Aabb::new(Vec3::new(-1e6, -1e6, -1e6), Vec3::new(1e6, 1e6, 1e6))
    }

    #[test]
    fn add_and_remove() {
        let mut section = EntitySection::new(Visibility::Tracked);
        let a = TestEntity::new(1, Kind::Zombie, Vec3::new(1.0, 1.0, 1.0));
        let b = TestEntity::new(2, Kind::Item, Vec3::new(2.0, 1.0, 1.0));

        section.add(a.clone());
        section.add(b.clone());
        assert_eq!(section.len(), 2);
        assert!(section.contains(&a));

        assert!(section.remove(&a));
        assert!(!section.remove(&a));
        assert_eq!(section.len(), 1);
        assert!(section.remove(&b));
        assert!(section.is_empty());
    }

    #[test]
    fn update_visibility_returns_previous() {
        let mut section = EntitySection::<TestEntity>::new(Visibility::Hidden);
        assert_eq!(section.update_visibility(Visibility::Ticking), Visibility::Hidden);
        assert_eq!(section.update_visibility(Visibility::Tracked), Visibility::Ticking);
        assert_eq!(section.visibility(), Visibility::Tracked);
    }

    #[test]
    fn bounding_box_filter() {
        let mut section = EntitySection::new(Visibility::Tracked);
        section.add(TestEntity::new(1, Kind::Zombie, Vec3::new(1.0, 1.0, 1.0)));
        section.add(TestEntity::new(2, Kind::Zombie, Vec3::new(12.0, 1.0, 12.0)));

        let query = Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(4.0, 4.0, 4.0));
        let mut seen = Vec::new();
        let flow = section.get_entities(&query, &mut |e| {
            seen.push(e.id());
            ControlFlow::Continue(())
        });
        assert_eq!(flow, ControlFlow::Continue(()));
        assert_eq!(seen, vec![1]);
    }

    #[test]
    fn abort_stops_iteration_immediately() {
        let mut section = EntitySection::new(Visibility::Tracked);
        for id in 0..10 {
            section.add(TestEntity::new(id, Kind::Zombie, Vec3::new(1.0, 1.0, 1.0)));
        }

        let mut visited = 0;
        let flow = section.get_entities(&everywhere(), &mut |_| {
            visited += 1;
            if visited == 3 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
        });
        assert_eq!(flow, ControlFlow::Break(()));
        assert_eq!(visited, 3);
    }

    #[test]
    fn type_test_skips_other_kinds() {
        let mut section = EntitySection::new(Visibility::Tracked);
        section.add(TestEntity::new(1, Kind::Zombie, Vec3::new(1.0, 1.0, 1.0)));
        section.add(TestEntity::new(2, Kind::Item, Vec3::new(1.0, 1.0, 1.0)));
        section.add(TestEntity::new(3, Kind::Zombie, Vec3::new(2.0, 1.0, 1.0)));

        // The cast records every handle it is asked about.
        fn cast(entity: &TestEntity) -> Option<u32> {
            assert_eq!(entity.kind(), Kind::Zombie, "item bucket should be skipped");
            Some(entity.id())
        }
        let test = EntityTypeTest::of_kinds([Kind::Zombie], cast);

        let mut ids = Vec::new();
        let _ = section.get_entities_of(&test, &everywhere(), &mut |id| {
            ids.push(id);
            ControlFlow::Continue(())
        });
        assert_eq!(ids, vec![1, 3]);
    }
}
