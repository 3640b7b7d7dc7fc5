//! Conversion between live entity handles and stored records.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Turns handles into serializable records and back.
///
/// `encode` runs on the thread that saves a column; `decode` runs on the
/// storage worker, so decoded handles must be `Send`.
pub trait EntityCodec: Send + Sync + 'static {
    type Entity: Send + 'static;
    type Record: Serialize + DeserializeOwned + Send + 'static;

    /// `None` skips the entity.
    fn encode(&self, entity: &Self::Entity) -> Option<Self::Record>;

    /// `None` drops a record that can no longer be restored.
    fn decode(&self, record: Self::Record) -> Option<Self::Entity>;
}
