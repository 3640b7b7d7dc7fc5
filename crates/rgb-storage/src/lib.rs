//! Durable entity storage, one batch per column.
//!
//! The entity section manager treats storage as an opaque asynchronous
//! key → batch store:
//!
//! - **load**: handed a [`LoadTicket`], completed later from any thread
//! - **store**: called on the simulation thread with the column's batch
//! - **flush / close**: synchronous checkpoints
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────┐   LoadTicket    ┌────────────────────────┐
//! │ PersistentEntitySection-  │ ──────────────▶ │ EntityPersistentStorage│
//! │ Manager (tick thread)     │                 │  (any thread)          │
//! │                           │ ◀────────────── │                        │
//! │   inbox: Receiver         │   LoadedChunk   └────────────────────────┘
//! └───────────────────────────┘
//! ```
//!
//! Loads never mutate manager state directly; their results travel through
//! the inbox and are applied once per tick.

use std::sync::Arc;

mod chunk;
mod codec;
mod error;
mod lmdb;
mod memory;

pub use chunk::{ChunkEntities, LoadTicket, LoadedChunk};
pub use codec::EntityCodec;
pub use error::{StorageError, StorageResult};
pub use lmdb::{LmdbConfig, LmdbEntityStorage};
pub use memory::InMemoryEntityStorage;

/// Asynchronous per-column entity store.
pub trait EntityPersistentStorage<T> {
    /// Begin loading a column. The ticket must eventually be completed or
    /// dropped; either may happen on any thread.
    fn load_entities(&self, ticket: LoadTicket<T>);

    /// Replace a column's stored contents. An empty batch erases it.
    fn store_entities(&self, entities: ChunkEntities<T>);

    /// Push buffered work out. With `sync`, wait until it is durable.
    fn flush(&self, sync: bool);

    fn close(&self) -> StorageResult<()>;
}

impl<T, S: EntityPersistentStorage<T> + ?Sized> EntityPersistentStorage<T> for Arc<S> {
    fn load_entities(&self, ticket: LoadTicket<T>) {
        (**self).load_entities(ticket);
    }

    fn store_entities(&self, entities: ChunkEntities<T>) {
        (**self).store_entities(entities);
    }

    fn flush(&self, sync: bool) {
        (**self).flush(sync);
    }

    fn close(&self) -> StorageResult<()> {
        (**self).close()
    }
}
