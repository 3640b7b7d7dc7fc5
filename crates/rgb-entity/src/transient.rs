//! Section manager for entities that are never persisted, such as a
//! client's view of the world.
//!
//! Every entity is tracked while present; only ticking follows the column.

use std::fmt;

use hashbrown::HashSet;
use rgb_spatial::{ChunkPos, EntityAccess, EntitySectionStorage, RemovalReason, Visibility};
use tracing::warn;

use crate::callback::fire_transitions;
use crate::index::EntityIndex;
use crate::{EntityGetter, LevelCallback};

/// Counters for diagnostics. Displays as one CSV row in field order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransientStats {
    pub entities: usize,
    pub sections: usize,
    pub ticking_columns: usize,
}

impl fmt::Display for TransientStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{}",
            self.entities, self.sections, self.ticking_columns
        )
    }
}

/// Entity manager for levels that never persist entities.
///
/// Entities are tracked as soon as they are added. Ticking follows the
/// columns passed to [`start_ticking`](Self::start_ticking) and
/// [`stop_ticking`](Self::stop_ticking); always-ticking entities tick
/// everywhere.
pub struct TransientEntitySectionManager<T: EntityAccess, C> {
    callbacks: C,
    index: EntityIndex<T>,
    ticking_columns: HashSet<ChunkPos>,
}

impl<T: EntityAccess, C: LevelCallback<T>> TransientEntitySectionManager<T, C> {
    /// An empty manager reporting lifecycle events to `callbacks`.
    pub fn new(callbacks: C) -> Self {
        Self {
            callbacks,
            index: EntityIndex::new(),
            ticking_columns: HashSet::new(),
        }
    }

    fn visibility_for(ticking_columns: &HashSet<ChunkPos>, column: ChunkPos) -> Visibility {
        if ticking_columns.contains(&column) {
            Visibility::Ticking
        } else {
            Visibility::Tracked
        }
    }

    /// Add an entity. Fires `on_created` and `on_tracking_start`, plus
    /// `on_ticking_start` if its column ticks.
    ///
    /// Returns `false` if its UUID or id is already present.
    pub fn add_entity(&mut self, entity: T) -> bool {
        let ticking_columns = &self.ticking_columns;
        let Some(visibility) = self.index.insert(entity.clone(), |column| {
            Self::visibility_for(ticking_columns, column)
        }) else {
            return false;
        };

        self.callbacks.on_created(&entity);
        self.callbacks.on_tracking_start(&entity);
        if visibility.is_ticking() {
            self.callbacks.on_ticking_start(&entity);
        }
        true
    }

    /// Mark a column as ticking. Its existing entities start ticking.
    pub fn start_ticking(&mut self, column: ChunkPos) {
        if !self.ticking_columns.insert(column) {
            return;
        }
        self.set_column(column, Visibility::Ticking);
    }

    /// Mark a column as no longer ticking. Its entities stay tracked.
    pub fn stop_ticking(&mut self, column: ChunkPos) {
        if !self.ticking_columns.remove(&column) {
            return;
        }
        self.set_column(column, Visibility::Tracked);
    }

    fn set_column(&mut self, column: ChunkPos, visibility: Visibility) {
        for (old, entities) in self.index.update_column_visibility(column, visibility) {
            fire_transitions(&mut self.callbacks, &entities, old, visibility);
        }
    }

    /// Re-file an entity after its position changed.
    pub fn on_move(&mut self, entity: &T) {
        let ticking_columns = &self.ticking_columns;
        let Some(relocation) = self.index.relocate(entity, |column| {
            Self::visibility_for(ticking_columns, column)
        }) else {
            warn!("Moved entity {entity:?} is not managed");
            return;
        };

        fire_transitions(
            &mut self.callbacks,
            std::slice::from_ref(entity),
            relocation.old,
            relocation.new,
        );
        self.callbacks.on_section_change(entity);
    }

    /// Remove an entity. Fires `on_ticking_end` if it ticked, then
    /// `on_tracking_end`, then `on_destroyed` if the reason destroys it.
    pub fn remove_entity(&mut self, entity: &T, reason: RemovalReason) -> bool {
        entity.set_removed(reason);
        let Some(visibility) = self.index.detach(entity) else {
            return false;
        };

        if visibility.is_ticking() {
            self.callbacks.on_ticking_end(entity);
        }
        self.callbacks.on_tracking_end(entity);
        if reason.should_destroy() {
            self.callbacks.on_destroyed(entity);
        }
        true
    }

    #[must_use]
    pub fn entity_getter(&self) -> EntityGetter<'_, T> {
        EntityGetter::new(&self.index)
    }

    /// Whether `column` was started and not stopped since.
    #[must_use]
    pub fn is_ticking(&self, column: ChunkPos) -> bool {
        self.ticking_columns.contains(&column)
    }

    /// Number of managed entities.
    #[must_use]
    pub fn count(&self) -> usize {
        self.index.lookup().count()
    }

    #[must_use]
    pub fn section_storage(&self) -> &EntitySectionStorage<T> {
        self.index.sections()
    }

    #[must_use]
    pub const fn callbacks(&self) -> &C {
        &self.callbacks
    }

    pub fn callbacks_mut(&mut self) -> &mut C {
        &mut self.callbacks
    }

    #[must_use]
    pub fn stats(&self) -> TransientStats {
        TransientStats {
            entities: self.count(),
            sections: self.index.sections().count(),
            ticking_columns: self.ticking_columns.len(),
        }
    }
}
