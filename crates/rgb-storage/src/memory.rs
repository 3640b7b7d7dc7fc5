//! In-memory storage, mostly for tests and tooling.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use rgb_spatial::ChunkPos;

use crate::{ChunkEntities, EntityPersistentStorage, LoadTicket, StorageError, StorageResult};

struct Inner<T> {
    columns: HashMap<ChunkPos, Vec<T>>,
    deferred: bool,
    pending: Vec<LoadTicket<T>>,
    failing: HashSet<ChunkPos>,
    loads: usize,
    writes: Vec<ChunkPos>,
    flushes: usize,
    closed: bool,
}

/// Keeps column batches as cloned handles.
///
/// In immediate mode a load completes inside `load_entities`. In deferred
/// mode loads queue up until `flush` or [`InMemoryEntityStorage::complete_pending_loads`],
/// which lets callers observe columns in the pending state.
pub struct InMemoryEntityStorage<T> {
    inner: Mutex<Inner<T>>,
}

impl<T: Clone> Default for InMemoryEntityStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> InMemoryEntityStorage<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                columns: HashMap::new(),
                deferred: false,
                pending: Vec::new(),
                failing: HashSet::new(),
                loads: 0,
                writes: Vec::new(),
                flushes: 0,
                closed: false,
            }),
        }
    }

    /// Storage whose loads wait for an explicit completion.
    #[must_use]
    pub fn deferred() -> Self {
        let storage = Self::new();
        storage.inner.lock().deferred = true;
        storage
    }

    /// Seed a column as if it had been saved earlier.
    pub fn insert_column(&self, pos: ChunkPos, entities: Vec<T>) {
        self.inner.lock().columns.insert(pos, entities);
    }

    /// Current stored contents of a column.
    #[must_use]
    pub fn column(&self, pos: ChunkPos) -> Option<Vec<T>> {
        self.inner.lock().columns.get(&pos).cloned()
    }

    /// Make the next load of `pos` fail.
    pub fn fail_next_load(&self, pos: ChunkPos) {
        self.inner.lock().failing.insert(pos);
    }

    /// Complete every deferred load. Returns how many were completed.
    pub fn complete_pending_loads(&self) -> usize {
        let mut inner = self.inner.lock();
        let pending = std::mem::take(&mut inner.pending);
        let count = pending.len();
        for ticket in pending {
            let entities = inner.columns.get(&ticket.pos()).cloned().unwrap_or_default();
            ticket.complete(Ok(entities));
        }
        count
    }

    #[must_use]
    pub fn pending_loads(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Number of loads requested so far.
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.inner.lock().loads
    }

    /// Columns written so far, in write order.
    #[must_use]
    pub fn writes(&self) -> Vec<ChunkPos> {
        self.inner.lock().writes.clone()
    }

    #[must_use]
    pub fn writes_to(&self, pos: ChunkPos) -> usize {
        self.inner.lock().writes.iter().filter(|p| **p == pos).count()
    }

    #[must_use]
    pub fn flush_count(&self) -> usize {
        self.inner.lock().flushes
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl<T: Clone> EntityPersistentStorage<T> for InMemoryEntityStorage<T> {
    fn load_entities(&self, ticket: LoadTicket<T>) {
        let mut inner = self.inner.lock();
        inner.loads += 1;
        let pos = ticket.pos();

        if inner.failing.remove(&pos) {
            ticket.complete(Err(StorageError::Read {
                pos,
                reason: "injected failure".to_owned(),
            }));
        } else if inner.deferred {
            inner.pending.push(ticket);
        } else {
            let entities = inner.columns.get(&pos).cloned().unwrap_or_default();
            ticket.complete(Ok(entities));
        }
    }

    fn store_entities(&self, entities: ChunkEntities<T>) {
        let mut inner = self.inner.lock();
        let pos = entities.pos();
        inner.writes.push(pos);
        if entities.is_empty() {
            inner.columns.remove(&pos);
        } else {
            inner.columns.insert(pos, entities.into_entities());
        }
    }

    fn flush(&self, _sync: bool) {
        self.inner.lock().flushes += 1;
        self.complete_pending_loads();
    }

    fn close(&self) -> StorageResult<()> {
        self.complete_pending_loads();
        self.inner.lock().closed = true;
        Ok(())
    }
}
