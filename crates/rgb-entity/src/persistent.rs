//! Section manager for entities that live in durable storage.
//!
//! Columns move through [`ChunkLoadStatus`] as their entities are requested,
//! delivered and written back:
//!
//! ```text
//!           request load              result applied
//!  Fresh ───────────────▶ Pending ────────────────────▶ Loaded
//!    ▲                       │                            │
//!    └──── load failed ──────┘                            │
//!    └──────────────────── unloaded ──────────────────────┘
//! ```
//!
//! Storage answers loads on whatever thread it likes; results are queued in
//! an inbox and applied in [`PersistentEntitySectionManager::tick`].

use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use hashbrown::{HashMap, HashSet};
use rgb_spatial::{
    ChunkLoadLevel, ChunkPos, EntityAccess, EntitySectionStorage, RemovalReason, SectionPos, Vec3,
    Visibility,
};
use rgb_storage::{ChunkEntities, EntityPersistentStorage, LoadTicket, LoadedChunk, StorageResult};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::callback::fire_transitions;
use crate::index::EntityIndex;
use crate::{ChunkLoadStatus, EntityGetter, EntityLookup, LevelCallback};

/// How long `save_all` blocks on the inbox when no column could make progress.
const SAVE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Counters for diagnostics. Displays as one CSV row, see
/// [`ManagerStats::CSV_HEADER`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ManagerStats {
    pub entities: usize,
    pub accessible: usize,
    pub sections: usize,
    pub load_statuses: usize,
    pub visible_columns: usize,
    pub pending_loads: usize,
    pub queued_unloads: usize,
}

impl ManagerStats {
    pub const CSV_HEADER: &'static str =
        "entities,accessible,sections,load_statuses,visible_columns,pending_loads,queued_unloads";
}

impl fmt::Display for ManagerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{}",
            self.entities,
            self.accessible,
            self.sections,
            self.load_statuses,
            self.visible_columns,
            self.pending_loads,
            self.queued_unloads
        )
    }
}

/// Owns every loaded entity of a level and keeps the section grid, the
/// lookup and storage consistent.
///
/// Invariants:
/// - an entity is in the lookup iff it is in exactly one section
/// - a column is written back only when `Loaded`, or when it holds no
///   persistable entities
/// - an absent visibility entry means [`Visibility::Hidden`], an absent
///   status entry means [`ChunkLoadStatus::Fresh`]
pub struct PersistentEntitySectionManager<T: EntityAccess, S, C> {
    callbacks: C,
    storage: S,
    index: EntityIndex<T>,
    column_visibility: HashMap<ChunkPos, Visibility>,
    load_statuses: HashMap<ChunkPos, ChunkLoadStatus>,
    columns_to_unload: HashSet<ChunkPos>,
    failed_loads: HashSet<ChunkPos>,
    inbox_tx: Sender<LoadedChunk<T>>,
    inbox: Receiver<LoadedChunk<T>>,
}

impl<T, S, C> PersistentEntitySectionManager<T, S, C>
where
    T: EntityAccess,
    S: EntityPersistentStorage<T>,
    C: LevelCallback<T>,
{
    pub fn new(storage: S, callbacks: C) -> Self {
        let (inbox_tx, inbox) = crossbeam_channel::unbounded();
        Self {
            callbacks,
            storage,
            index: EntityIndex::new(),
            column_visibility: HashMap::new(),
            load_statuses: HashMap::new(),
            columns_to_unload: HashSet::new(),
            failed_loads: HashSet::new(),
            inbox_tx,
            inbox,
        }
    }

    // --- Entity lifecycle ---

    /// Add an entity created at runtime. Fires `on_created`, then tracking
    /// and ticking callbacks according to its section.
    ///
    /// Returns `false` if its UUID or id is already loaded.
    pub fn add_new_entity(&mut self, entity: T) -> bool {
        self.add_entity(entity, false)
    }

    /// Add entities that already existed, read from an older storage
    /// format. `on_created` is not fired.
    pub fn add_legacy_chunk_entities(&mut self, entities: impl IntoIterator<Item = T>) {
        for entity in entities {
            self.add_entity(entity, true);
        }
    }

    /// Add entities spawned by world generation. `on_created` is not fired.
    pub fn add_world_gen_chunk_entities(&mut self, entities: impl IntoIterator<Item = T>) {
        for entity in entities {
            self.add_entity(entity, true);
        }
    }

    fn add_entity(&mut self, entity: T, existing: bool) -> bool {
        let column_visibility = &self.column_visibility;
        let Some(visibility) = self.index.insert(entity.clone(), |column| {
            column_visibility.get(&column).copied().unwrap_or_default()
        }) else {
            return false;
        };

        if !existing {
            self.callbacks.on_created(&entity);
        }
        if visibility.is_accessible() {
            self.callbacks.on_tracking_start(&entity);
        }
        if visibility.is_ticking() {
            self.callbacks.on_ticking_start(&entity);
        }
        true
    }

    /// Re-file an entity after its position changed.
    ///
    /// Fires visibility transitions if it crossed into a section of
    /// different visibility, and `on_section_change` whenever it ends up
    /// accessible.
    pub fn on_move(&mut self, entity: &T) {
        let column_visibility = &self.column_visibility;
        let Some(relocation) = self.index.relocate(entity, |column| {
            column_visibility.get(&column).copied().unwrap_or_default()
        }) else {
            warn!("Moved entity {entity:?} is not managed");
            return;
        };

        if relocation.changed_section() {
            trace!(
                "entity {} moved {:?} -> {:?}",
                entity.id(),
                relocation.from,
                relocation.to
            );
        }

        fire_transitions(
            &mut self.callbacks,
            std::slice::from_ref(entity),
            relocation.old,
            relocation.new,
        );
        if relocation.new.is_accessible() {
            self.callbacks.on_section_change(entity);
        }
    }

    /// Remove an entity from the level. Marks it removed with `reason`,
    /// ends ticking and tracking, and fires `on_destroyed` if the reason
    /// destroys it.
    pub fn remove_entity(&mut self, entity: &T, reason: RemovalReason) -> bool {
        entity.set_removed(reason);
        self.detach(entity, reason)
    }

    fn detach(&mut self, entity: &T, reason: RemovalReason) -> bool {
        let Some(visibility) = self.index.detach(entity) else {
            return false;
        };

        if visibility.is_ticking() {
            self.callbacks.on_ticking_end(entity);
        }
        if visibility.is_accessible() {
            self.callbacks.on_tracking_end(entity);
        }
        if reason.should_destroy() {
            self.callbacks.on_destroyed(entity);
        }
        true
    }

    // --- Column visibility ---

    /// Apply a chunk's new load level.
    pub fn update_chunk_status(&mut self, column: ChunkPos, level: ChunkLoadLevel) {
        self.update_column_visibility(column, Visibility::from_load_level(level));
    }

    /// Set the visibility of a whole column.
    ///
    /// Hiding queues the column for unload; revealing cancels a queued
    /// unload and requests a load if the column is fresh. Every section of
    /// the column adopts `visibility` and its entities (except
    /// always-ticking ones) get the matching callbacks.
    pub fn update_column_visibility(&mut self, column: ChunkPos, visibility: Visibility) {
        if visibility == Visibility::Hidden {
            self.column_visibility.remove(&column);
            self.columns_to_unload.insert(column);
        } else {
            self.column_visibility.insert(column, visibility);
            self.columns_to_unload.remove(&column);
            self.ensure_column_queued_for_load(column);
        }

        for (old, entities) in self.index.update_column_visibility(column, visibility) {
            fire_transitions(&mut self.callbacks, &entities, old, visibility);
        }
    }

    fn ensure_column_queued_for_load(&mut self, column: ChunkPos) {
        if self.chunk_load_status(column) == ChunkLoadStatus::Fresh {
            self.request_column_load(column);
        }
    }

    fn request_column_load(&mut self, column: ChunkPos) {
        self.load_statuses.insert(column, ChunkLoadStatus::Pending);
        debug!("requesting entities of column {column}");
        self.storage
            .load_entities(LoadTicket::new(column, self.inbox_tx.clone()));
    }

    // --- Tick ---

    /// Re-request loads that failed last tick for columns still visible,
    /// apply completed loads, then unload hidden columns whose entities
    /// could be written back.
    pub fn tick(&mut self) {
        self.retry_failed_loads();
        self.process_pending_loads();
        self.process_unloads();
    }

    /// Apply every load result waiting in the inbox. Returns how many were
    /// applied, failures included.
    pub fn process_pending_loads(&mut self) -> usize {
        let mut failed = Vec::new();
        let applied = self.drain_inbox(&mut failed);
        self.failed_loads.extend(failed);
        applied
    }

    /// Hidden columns are not retried here; unloading them requests a load
    /// when they hold entities.
    fn retry_failed_loads(&mut self) {
        for column in std::mem::take(&mut self.failed_loads) {
            if self.column_visibility(column) != Visibility::Hidden {
                self.ensure_column_queued_for_load(column);
            }
        }
    }

    fn drain_inbox(&mut self, failed: &mut Vec<ChunkPos>) -> usize {
        let mut applied = 0;
        while let Ok(loaded) = self.inbox.try_recv() {
            self.apply_load(loaded, failed);
            applied += 1;
        }
        applied
    }

    fn apply_load(&mut self, loaded: LoadedChunk<T>, failed: &mut Vec<ChunkPos>) {
        let pos = loaded.pos;
        match loaded.result {
            Ok(chunk) => {
                let entities = chunk.into_entities();
                trace!("column {pos} loaded with {} entities", entities.len());
                self.add_legacy_chunk_entities(entities);
                self.load_statuses.insert(pos, ChunkLoadStatus::Loaded);
            }
            Err(e) => {
                error!("Failed to read entities of column {pos}: {e}");
                if self.load_statuses.get(&pos) == Some(&ChunkLoadStatus::Pending) {
                    self.load_statuses.remove(&pos);
                }
                failed.push(pos);
            }
        }
    }

    fn process_unloads(&mut self) {
        let mut queued = std::mem::take(&mut self.columns_to_unload);
        queued.retain(|&column| {
            self.column_visibility(column) == Visibility::Hidden
                && !self.process_column_unload(column)
        });
        self.columns_to_unload.extend(queued);
    }

    // --- Persistence ---

    /// Write a column's persistable entities to storage and visit each of
    /// them.
    ///
    /// Returns `false` without writing if the column's stored contents are
    /// not known yet: a load is outstanding, or the column is fresh and
    /// holds entities (a load is requested so a later call can succeed).
    pub fn store_column_sections(&mut self, column: ChunkPos, mut visitor: impl FnMut(&T)) -> bool {
        let Some(stored) = self.store_column(column) else {
            return false;
        };
        for entity in &stored {
            visitor(entity);
        }
        true
    }

    fn store_column(&mut self, column: ChunkPos) -> Option<Vec<T>> {
        let status = self.chunk_load_status(column);
        if status == ChunkLoadStatus::Pending {
            return None;
        }

        let entities: Vec<T> = self
            .index
            .sections()
            .existing_sections_in_column(column)
            .flat_map(|section| section.entities())
            .filter(|entity| entity.should_be_saved())
            .cloned()
            .collect();

        if entities.is_empty() {
            if status == ChunkLoadStatus::Loaded {
                self.storage.store_entities(ChunkEntities::empty(column));
            }
            return Some(entities);
        }

        if status == ChunkLoadStatus::Fresh {
            self.request_column_load(column);
            return None;
        }

        trace!("storing {} entities of column {column}", entities.len());
        self.storage
            .store_entities(ChunkEntities::new(column, entities.clone()));
        Some(entities)
    }

    /// Store a hidden column and drop its persistable entities from memory.
    /// On success the column returns to fresh.
    pub fn process_column_unload(&mut self, column: ChunkPos) -> bool {
        let Some(stored) = self.store_column(column) else {
            return false;
        };
        for entity in &stored {
            entity.set_removed(RemovalReason::UnloadedToChunk);
            self.detach(entity, RemovalReason::UnloadedToChunk);
        }
        self.load_statuses.remove(&column);
        trace!("unloaded column {column} ({} entities)", stored.len());
        true
    }

    /// Columns that may hold something worth writing: every loaded column
    /// plus every column with sections.
    fn columns_to_save(&self) -> BTreeSet<ChunkPos> {
        let mut columns: BTreeSet<ChunkPos> = self
            .load_statuses
            .iter()
            .filter(|(_, status)| **status == ChunkLoadStatus::Loaded)
            .map(|(column, _)| *column)
            .collect();
        columns.extend(self.index.sections().columns_with_sections());
        columns
    }

    fn save_column(&mut self, column: ChunkPos) -> bool {
        if self.column_visibility(column) == Visibility::Hidden {
            self.process_column_unload(column)
        } else {
            self.store_column(column).is_some()
        }
    }

    /// Write back every column that can be written now. Hidden columns are
    /// unloaded; columns whose load is still outstanding are skipped.
    pub fn auto_save(&mut self) {
        let columns = self.columns_to_save();
        debug!("autosaving {} columns", columns.len());
        for column in columns {
            self.save_column(column);
        }
    }

    /// Write back every column, waiting for outstanding loads. Columns whose
    /// load fails are given up on and logged.
    pub fn save_all(&mut self) {
        let mut columns = self.columns_to_save();
        let mut failed = Vec::new();
        info!("saving entities of {} columns", columns.len());

        while !columns.is_empty() {
            self.storage.flush(false);
            self.drain_inbox(&mut failed);
            self.give_up_on(&mut columns, &mut failed);

            let before = columns.len();
            columns.retain(|&column| !self.save_column(column));

            if !columns.is_empty() && columns.len() == before {
                if let Ok(loaded) = self.inbox.recv_timeout(SAVE_POLL_INTERVAL) {
                    self.apply_load(loaded, &mut failed);
                }
            }
        }

        self.storage.flush(true);
    }

    fn give_up_on(&self, columns: &mut BTreeSet<ChunkPos>, failed: &mut Vec<ChunkPos>) {
        for column in failed.drain(..) {
            if columns.remove(&column) {
                error!(
                    "Not saving column {column}: its stored entities could not be read, {} entities are not saved",
                    self.index
                        .sections()
                        .existing_sections_in_column(column)
                        .map(rgb_spatial::EntitySection::len)
                        .sum::<usize>()
                );
            }
        }
    }

    /// Save everything, then close storage.
    pub fn close(mut self) -> StorageResult<()> {
        self.save_all();
        self.storage.close()
    }

    // --- Queries ---

    #[must_use]
    pub fn entity_getter(&self) -> EntityGetter<'_, T> {
        EntityGetter::new(&self.index)
    }

    #[must_use]
    pub fn column_visibility(&self, column: ChunkPos) -> Visibility {
        self.column_visibility
            .get(&column)
            .copied()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn chunk_load_status(&self, column: ChunkPos) -> ChunkLoadStatus {
        self.load_statuses
            .get(&column)
            .copied()
            .unwrap_or_default()
    }

    /// The column's stored entities have been applied.
    #[must_use]
    pub fn are_entities_loaded(&self, column: ChunkPos) -> bool {
        self.chunk_load_status(column) == ChunkLoadStatus::Loaded
    }

    #[must_use]
    pub fn is_ticking(&self, column: ChunkPos) -> bool {
        self.column_visibility(column).is_ticking()
    }

    #[must_use]
    pub fn is_position_ticking(&self, pos: Vec3) -> bool {
        self.is_ticking(ChunkPos::of(pos))
    }

    /// Whether an entity with this UUID is loaded, accessible or not.
    #[must_use]
    pub fn is_loaded(&self, uuid: Uuid) -> bool {
        self.index.lookup().contains_uuid(uuid)
    }

    #[must_use]
    pub fn is_queued_for_unload(&self, column: ChunkPos) -> bool {
        self.columns_to_unload.contains(&column)
    }

    /// Number of loaded entities, accessible or not.
    #[must_use]
    pub fn count(&self) -> usize {
        self.index.lookup().count()
    }

    #[must_use]
    pub fn section_of(&self, entity: &T) -> Option<SectionPos> {
        self.index.section_of(entity.id())
    }

    #[must_use]
    pub fn lookup(&self) -> &EntityLookup<T> {
        self.index.lookup()
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
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    #[must_use]
    pub fn stats(&self) -> ManagerStats {
        let getter = self.entity_getter();
        ManagerStats {
            entities: self.count(),
            accessible: getter.all().count(),
            sections: self.index.sections().count(),
            load_statuses: self.load_statuses.len(),
            visible_columns: self.column_visibility.len(),
            pending_loads: self
                .load_statuses
                .values()
                .filter(|status| **status == ChunkLoadStatus::Pending)
                .count(),
            queued_unloads: self.columns_to_unload.len(),
        }
    }

    /// Write one CSV row per section:
    /// `x,y,z,visibility,load_status,entities`.
    pub fn dump_sections(&self, out: &mut impl io::Write) -> io::Result<()> {
        writeln!(out, "x,y,z,visibility,load_status,entities")?;
        for (pos, section) in self.index.sections().iter() {
            writeln!(
                out,
                "{},{},{},{},{},{}",
                pos.x,
                pos.y,
                pos.z,
                section.visibility().as_str(),
                self.chunk_load_status(pos.chunk()).as_str(),
                section.len()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rgb_storage::InMemoryEntityStorage;

    use super::*;
    use crate::mob::{Mob, MobKind};
    use crate::{EventLog, LifecycleEvent};

    type Manager =
        PersistentEntitySectionManager<Mob, Arc<InMemoryEntityStorage<Mob>>, EventLog>;

    fn manager() -> (Manager, Arc<InMemoryEntityStorage<Mob>>) {
        let storage = Arc::new(InMemoryEntityStorage::new());
        (
            PersistentEntitySectionManager::new(Arc::clone(&storage), EventLog::new()),
            storage,
        )
    }

    fn sheep(id: u32, x: f64, z: f64) -> Mob {
        Mob::new(id, MobKind::Sheep, Vec3::new(x, 64.0, z))
    }

    #[test]
    fn missing_entries_mean_hidden_and_fresh() {
        let (manager, _) = manager();
        let column = ChunkPos::new(3, -3);
        assert_eq!(manager.column_visibility(column), Visibility::Hidden);
        assert_eq!(manager.chunk_load_status(column), ChunkLoadStatus::Fresh);
        assert!(!manager.is_queued_for_unload(column));
    }

    #[test]
    fn revealing_requests_one_load() {
        let (mut manager, storage) = manager();
        let column = ChunkPos::new(0, 0);

        manager.update_column_visibility(column, Visibility::Tracked);
        manager.update_column_visibility(column, Visibility::Ticking);
        assert_eq!(storage.load_count(), 1);
        assert_eq!(manager.chunk_load_status(column), ChunkLoadStatus::Pending);

        manager.tick();
        assert!(manager.are_entities_loaded(column));
    }

    #[test]
    fn hiding_queues_and_revealing_cancels_unload() {
        let (mut manager, _) = manager();
        let column = ChunkPos::new(1, 1);

        manager.update_column_visibility(column, Visibility::Hidden);
        assert!(manager.is_queued_for_unload(column));

        manager.update_chunk_status(column, ChunkLoadLevel::Full);
        assert!(!manager.is_queued_for_unload(column));
        assert_eq!(manager.column_visibility(column), Visibility::Tracked);
    }

    #[test]
    fn add_into_ticking_column_fires_in_order() {
        let (mut manager, _) = manager();
        manager.update_column_visibility(ChunkPos::new(0, 0), Visibility::Ticking);
        manager.tick();

        assert!(manager.add_new_entity(sheep(1, 1.0, 1.0)));
        let events: Vec<_> = manager.callbacks().for_entity(1).collect();
        assert_eq!(
            events,
            [
                LifecycleEvent::Created,
                LifecycleEvent::TrackingStart,
                LifecycleEvent::TickingStart
            ]
        );
    }

    #[test]
    fn legacy_entities_are_not_created() {
        let (mut manager, _) = manager();
        manager.add_legacy_chunk_entities([sheep(1, 1.0, 1.0)]);
        manager.add_world_gen_chunk_entities([sheep(2, 1.0, 1.0)]);
        assert_eq!(manager.callbacks().count(LifecycleEvent::Created), 0);
        assert_eq!(manager.count(), 2);
    }

    #[test]
    fn killed_entity_is_destroyed_and_marked() {
        let (mut manager, _) = manager();
        manager.update_column_visibility(ChunkPos::new(0, 0), Visibility::Ticking);
        let entity = sheep(1, 1.0, 1.0);
        manager.add_new_entity(entity.clone());
        manager.callbacks_mut().clear();

        assert!(manager.remove_entity(&entity, RemovalReason::Killed));
        assert_eq!(entity.removal(), Some(RemovalReason::Killed));
        let events: Vec<_> = manager.callbacks().for_entity(1).collect();
        assert_eq!(
            events,
            [
                LifecycleEvent::TickingEnd,
                LifecycleEvent::TrackingEnd,
                LifecycleEvent::Destroyed
            ]
        );
        assert_eq!(manager.section_storage().count(), 0);
        assert!(!manager.remove_entity(&entity, RemovalReason::Killed));
    }

    #[test]
    fn stats_render_as_csv() {
        let (mut manager, _) = manager();
        manager.update_column_visibility(ChunkPos::new(0, 0), Visibility::Tracked);
        manager.add_new_entity(sheep(1, 1.0, 1.0));
        manager.add_new_entity(sheep(2, 100.0, 1.0));

        let stats = manager.stats();
        assert_eq!(stats.entities, 2);
        assert_eq!(stats.accessible, 1);
        assert_eq!(stats.pending_loads, 1);
        assert_eq!(stats.to_string(), "2,1,2,1,1,1,0");
        assert_eq!(ManagerStats::CSV_HEADER.split(',').count(), 7);
    }

    #[test]
    fn dump_lists_every_section() {
        let (mut manager, _) = manager();
        manager.update_column_visibility(ChunkPos::new(0, 0), Visibility::Ticking);
        manager.tick();
        manager.add_new_entity(sheep(1, 1.0, 1.0));

        let mut out = Vec::new();
        manager.dump_sections(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "x,y,z,visibility,load_status,entities\n0,4,0,ticking,loaded,1\n"
        );
    }
}
