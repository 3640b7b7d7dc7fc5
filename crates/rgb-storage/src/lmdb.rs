//! LMDB-backed column storage with a dedicated I/O worker.
//!
//! ```text
//!  simulation thread                 io worker thread
//!  ─────────────────                 ────────────────
//!  load_entities(ticket) ──Load──▶   read + decode ──▶ ticket.complete()
//!  store_entities(batch) ──Store──▶  encode'd records → put / delete
//!  flush(sync)           ──Flush──▶  (fsync) ──▶ ack
//!  close()               ──Shutdown▶ exit, env dropped
//! ```
//!
//! Requests are handled strictly in order, so a load issued after a store
//! of the same column observes that store.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use parking_lot::Mutex;
use rgb_spatial::ChunkPos;
use tracing::{debug, error, trace, warn};

use crate::{
    ChunkEntities, EntityCodec, EntityPersistentStorage, LoadTicket, StorageError, StorageResult,
};

/// Where and how to open the database.
#[derive(Debug, Clone)]
pub struct LmdbConfig {
    pub path: PathBuf,
    /// Maximum size of the memory map in bytes.
    pub map_size: usize,
    pub db_name: String,
}

impl Default for LmdbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("world/entities"),
            map_size: 1024 * 1024 * 1024,
            db_name: "entities".to_owned(),
        }
    }
}

impl LmdbConfig {
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

enum Request<C: EntityCodec> {
    Load(LoadTicket<C::Entity>),
    Store {
        pos: ChunkPos,
        records: Vec<C::Record>,
    },
    Flush {
        sync: bool,
        done: Sender<StorageResult<()>>,
    },
    Shutdown,
}

/// Column storage in an LMDB database.
///
/// Keys are the big-endian packed [`ChunkPos`]; values are bincode-encoded
/// lists of [`EntityCodec::Record`]. An empty column has no key.
pub struct LmdbEntityStorage<C: EntityCodec> {
    codec: Arc<C>,
    requests: Sender<Request<C>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<C: EntityCodec> LmdbEntityStorage<C> {
    /// Open or create the database and start the I/O worker.
    ///
    /// # Safety
    /// Uses unsafe to call heed's open method which requires that the same
    /// environment is not opened twice with different options. The worker
    /// owns the only `Env` handle and drops it on close.
    #[allow(unsafe_code)]
    pub fn open(config: &LmdbConfig, codec: C) -> StorageResult<Self> {
        std::fs::create_dir_all(&config.path)?;

        // SAFETY: the environment is opened once per storage instance and
        // closed when the worker exits.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(config.map_size)
                .max_dbs(1)
                .open(&config.path)?
        };

        let mut wtxn = env.write_txn()?;
        let db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, Some(config.db_name.as_str()))?;
        wtxn.commit()?;

        let codec = Arc::new(codec);
        let (requests, rx) = crossbeam_channel::unbounded();
        let worker_codec = Arc::clone(&codec);
        let worker = std::thread::Builder::new()
            .name("entity-io".to_owned())
            .spawn(move || run_worker(&env, db, &*worker_codec, &rx))?;

        debug!("Opened entity storage at {}", config.path.display());

        Ok(Self {
            codec,
            requests,
            worker: Mutex::new(Some(worker)),
        })
    }

    fn shutdown(&self) -> StorageResult<()> {
        let Some(worker) = self.worker.lock().take() else {
            return Ok(());
        };
        // The worker may already be gone; joining still reaps it.
        let _ = self.requests.send(Request::Shutdown);
        worker.join().map_err(|_| StorageError::Closed)
    }
}

impl<C: EntityCodec> EntityPersistentStorage<C::Entity> for LmdbEntityStorage<C> {
    fn load_entities(&self, ticket: LoadTicket<C::Entity>) {
        // On a closed storage the ticket comes back in the error and is
        // dropped, reporting the load as abandoned.
        if self.requests.send(Request::Load(ticket)).is_err() {
            warn!("Entity storage is closed; load abandoned");
        }
    }

    fn store_entities(&self, entities: ChunkEntities<C::Entity>) {
        let pos = entities.pos();
        let records: Vec<C::Record> = entities
            .entities()
            .iter()
            .filter_map(|entity| self.codec.encode(entity))
            .collect();
        if records.len() != entities.entities().len() {
            debug!(
                "Column {pos}: {} of {} entities were not encodable",
                entities.entities().len() - records.len(),
                entities.entities().len()
            );
        }
        if self.requests.send(Request::Store { pos, records }).is_err() {
            error!("Entity storage is closed; dropped save of column {pos}");
        }
    }

    fn flush(&self, sync: bool) {
        let (done, ack) = crossbeam_channel::bounded(1);
        if self.requests.send(Request::Flush { sync, done }).is_err() {
            warn!("Entity storage is closed; flush skipped");
            return;
        }
        match ack.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Failed to flush entity storage: {e}"),
            Err(_) => warn!("Entity storage worker exited during flush"),
        }
    }

    fn close(&self) -> StorageResult<()> {
        self.shutdown()
    }
}

impl<C: EntityCodec> Drop for LmdbEntityStorage<C> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Entity storage worker failed: {e}");
        }
    }
}

fn run_worker<C: EntityCodec>(
    env: &Env,
    db: Database<Bytes, Bytes>,
    codec: &C,
    requests: &Receiver<Request<C>>,
) {
    for request in requests {
        match request {
            Request::Load(ticket) => {
                let pos = ticket.pos();
                let result = read_column(env, db, codec, pos);
                if let Err(e) = &result {
                    error!("Failed to read column {pos}: {e}");
                }
                ticket.complete(result);
            }
            Request::Store { pos, records } => {
                if let Err(e) = write_column(env, db, pos, &records) {
                    error!("Failed to store column {pos}: {e}");
                }
            }
            Request::Flush { sync, done } => {
                let result = if sync {
                    env.force_sync().map_err(StorageError::from)
                } else {
                    Ok(())
                };
                let _ = done.send(result);
            }
            Request::Shutdown => break,
        }
    }
    trace!("Entity io worker exiting");
}

fn column_key(pos: ChunkPos) -> [u8; 8] {
    pos.as_long().to_be_bytes()
}

fn read_column<C: EntityCodec>(
    env: &Env,
    db: Database<Bytes, Bytes>,
    codec: &C,
    pos: ChunkPos,
) -> StorageResult<Vec<C::Entity>> {
    let rtxn = env.read_txn()?;
    let Some(bytes) = db.get(&rtxn, &column_key(pos))? else {
        return Ok(Vec::new());
    };
    let records: Vec<C::Record> = bincode::deserialize(bytes)?;
    drop(rtxn);

    let total = records.len();
    let entities: Vec<C::Entity> = records
        .into_iter()
        .filter_map(|record| codec.decode(record))
        .collect();
    if entities.len() != total {
        warn!(
            "Column {pos}: skipped {} undecodable entities",
            total - entities.len()
        );
    }
    trace!("Loaded {} entities for column {pos}", entities.len());
    Ok(entities)
}

fn write_column<R: serde::Serialize>(
    env: &Env,
    db: Database<Bytes, Bytes>,
    pos: ChunkPos,
    records: &[R],
) -> StorageResult<()> {
    let key = column_key(pos);
    let mut wtxn = env.write_txn()?;
    if records.is_empty() {
        db.delete(&mut wtxn, &key)?;
    } else {
        let bytes = bincode::serialize(records)?;
        db.put(&mut wtxn, &key, &bytes)?;
    }
    wtxn.commit()?;
    trace!("Stored {} entities for column {pos}", records.len());
    Ok(())
}
