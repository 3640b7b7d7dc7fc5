//! Per-column persistence state.

/// Where a column is in the load pipeline.
///
/// A column's entities may be written back only when it is `Loaded`, or
/// when it has no persistable entities at all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChunkLoadStatus {
    /// Never requested from storage.
    #[default]
    Fresh,
    /// Load issued, result not applied yet.
    Pending,
    /// Result applied; sections reflect storage.
    Loaded,
}

impl ChunkLoadStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Pending => "pending",
            Self::Loaded => "loaded",
        }
    }
}
