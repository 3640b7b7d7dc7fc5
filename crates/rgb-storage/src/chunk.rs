//! Column batches and the load hand-off.

use crossbeam_channel::Sender;
use rgb_spatial::ChunkPos;

use crate::{StorageError, StorageResult};

/// All persistable entities of one column.
#[derive(Debug, Clone)]
pub struct ChunkEntities<T> {
    pos: ChunkPos,
    entities: Vec<T>,
}

impl<T> ChunkEntities<T> {
    #[must_use]
    pub fn new(pos: ChunkPos, entities: Vec<T>) -> Self {
        Self { pos, entities }
    }

    /// Empty batch; storing it erases the column.
    #[must_use]
    pub fn empty(pos: ChunkPos) -> Self {
        Self::new(pos, Vec::new())
    }

    #[must_use]
    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    #[must_use]
    pub fn entities(&self) -> &[T] {
        &self.entities
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[must_use]
    pub fn into_entities(self) -> Vec<T> {
        self.entities
    }
}

/// A finished load, as received by the simulation thread.
#[derive(Debug)]
pub struct LoadedChunk<T> {
    pub pos: ChunkPos,
    pub result: StorageResult<ChunkEntities<T>>,
}

/// One outstanding load request.
///
/// Completed exactly once, from any thread. Dropping an uncompleted ticket
/// reports [`StorageError::LoadAbandoned`], so every requested load ends in
/// either a result or an error.
#[derive(Debug)]
pub struct LoadTicket<T> {
    pos: ChunkPos,
    inbox: Option<Sender<LoadedChunk<T>>>,
}

impl<T> LoadTicket<T> {
    #[must_use]
    pub fn new(pos: ChunkPos, inbox: Sender<LoadedChunk<T>>) -> Self {
        Self {
            pos,
            inbox: Some(inbox),
        }
    }

    #[must_use]
    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    pub fn complete(mut self, result: StorageResult<Vec<T>>) {
        self.send(result);
    }

    fn send(&mut self, result: StorageResult<Vec<T>>) {
        let Some(inbox) = self.inbox.take() else {
            return;
        };
        let pos = self.pos;
        let result = result.map(|entities| ChunkEntities::new(pos, entities));
        if inbox.send(LoadedChunk { pos, result }).is_err() {
            tracing::debug!("Inbox for column {pos} closed before load completed");
        }
    }
}

impl<T> Drop for LoadTicket<T> {
    fn drop(&mut self) {
        if self.inbox.is_some() {
            let pos = self.pos;
            self.send(Err(StorageError::LoadAbandoned(pos)));
        }
    }
}
