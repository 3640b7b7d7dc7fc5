//! Visibility of a section and the load level it is derived from.

/// How far a column has been brought up by the chunk paging system.
///
/// Ordered: each level implies everything before it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChunkLoadLevel {
    Inaccessible,
    Full,
    BlockTicking,
    EntityTicking,
}

impl ChunkLoadLevel {
    /// Ticket level at or below which entities in a column are simulated.
    pub const ENTITY_TICKING_LEVEL: u32 = 31;
    /// Ticket level at or below which blocks in a column are simulated.
    pub const BLOCK_TICKING_LEVEL: u32 = 32;
    /// Ticket level at or below which a column is fully loaded.
    pub const FULL_LEVEL: u32 = 33;

    /// Map a numeric ticket level (lower is stronger) to a load level.
    #[must_use]
    pub const fn from_ticket_level(level: u32) -> Self {
        if level <= Self::ENTITY_TICKING_LEVEL {
            Self::EntityTicking
        } else if level <= Self::BLOCK_TICKING_LEVEL {
            Self::BlockTicking
        } else if level <= Self::FULL_LEVEL {
            Self::Full
        } else {
            Self::Inaccessible
        }
    }

    #[must_use]
    pub fn is_or_after(self, other: Self) -> bool {
        self >= other
    }
}

/// Whether entities in a section are network-tracked and/or simulated.
///
/// `Ticking` implies `Tracked` operationally; the managers never start
/// ticking an entity that is not also tracked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
    #[default]
    Hidden,
    Tracked,
    Ticking,
}

impl Visibility {
    /// Tracked or ticking; eligible for spatial queries.
    #[must_use]
    pub const fn is_accessible(self) -> bool {
        !matches!(self, Self::Hidden)
    }

    #[must_use]
    pub const fn is_ticking(self) -> bool {
        matches!(self, Self::Ticking)
    }

    #[must_use]
    pub fn from_load_level(level: ChunkLoadLevel) -> Self {
        if level.is_or_after(ChunkLoadLevel::EntityTicking) {
            Self::Ticking
        } else if level.is_or_after(ChunkLoadLevel::Full) {
            Self::Tracked
        } else {
            Self::Hidden
        }
    }

    /// Visibility after the always-ticking override for one entity.
    #[must_use]
    pub const fn effective(self, always_ticking: bool) -> Self {
        if always_ticking { Self::Ticking } else { self }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hidden => "hidden",
            Self::Tracked => "tracked",
            Self::Ticking => "ticking",
        }
    }
}
