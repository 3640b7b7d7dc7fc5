//! Spatial entity sections
//!
//! Indexes live entity handles by the 16x16x16 section their feet are in.
//!
//! # Layout
//!
//! ```text
//! EntitySectionStorage
//!   ├─ HashMap<u64, EntitySection>   packed SectionPos → section
//!   └─ BTreeSet<u64>                 sorted keys; a column is one range
//!
//! EntitySection
//!   ├─ visibility: Hidden | Tracked | Ticking
//!   └─ buckets: [(Kind, Vec<handle>)]   type-filtered scans skip whole buckets
//! ```
//!
//! Sections carry the [`Visibility`] of their column. Only accessible
//! (tracked or ticking) sections answer spatial queries. Queries use
//! [`std::ops::ControlFlow`] as the visitor's continue/abort signal and stop
//! as soon as a visitor breaks.

mod aabb;
mod entity;
mod pos;
mod section;
mod storage;
mod type_test;
mod visibility;

#[cfg(test)]
mod test_entity;

pub use aabb::Aabb;
pub use entity::{EntityAccess, EntityId, RemovalReason};
pub use pos::{ChunkPos, SECTION_BITS, SECTION_SIZE, SectionPos, Vec3, section_coord};
pub use section::EntitySection;
pub use storage::{
    ABOVE_QUERY_MARGIN, BELOW_QUERY_MARGIN, EntitySectionStorage, HORIZONTAL_QUERY_MARGIN,
};
pub use type_test::{EntityTypeTest, KindFilter};
pub use visibility::{ChunkLoadLevel, Visibility};
