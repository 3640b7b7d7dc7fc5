//! Entity lifecycle over the section grid.
//!
//! Two managers share one index (flat lookup, section grid, and the table
//! of which section each entity is filed under):
//!
//! - [`PersistentEntitySectionManager`]: entities backed by
//!   [`rgb_storage::EntityPersistentStorage`], loaded and unloaded per
//!   column as visibility changes
//! - [`TransientEntitySectionManager`]: entities that only exist in memory
//!
//! Managers are single-threaded. Storage may answer loads from other
//! threads; results are applied on the next [`PersistentEntitySectionManager::tick`].

mod callback;
mod getter;
mod index;
mod lookup;
mod persistent;
mod status;
mod transient;

#[cfg(test)]
#[path = "../tests/common/mob.rs"]
mod mob;

pub use callback::{EventLog, LevelCallback, LifecycleEvent};
pub use getter::EntityGetter;
pub use lookup::EntityLookup;
pub use persistent::{ManagerStats, PersistentEntitySectionManager};
pub use status::ChunkLoadStatus;
pub use transient::{TransientEntitySectionManager, TransientStats};
