//! Cell (section) and column (chunk) coordinates.
//!
//! Sections are 16x16x16 cubes of world space. A column is the vertical
//! stack of sections sharing the same horizontal coordinate and is the unit
//! of persistence and load/unload.
//!
//! # Key Format
//!
//! ```text
//! SectionPos (u64):
//! ┌──────────────────────┬──────────────────────┬────────────────────┐
//! │ x: 22 bits (63..42)  │ z: 22 bits (41..20)  │ y: 20 bits (19..0) │
//! └──────────────────────┴──────────────────────┴────────────────────┘
//!
//! ChunkPos (u64):
//! ┌──────────────────────────────┬──────────────────────────────┐
//! │ z: 32 bits (63..32)          │ x: 32 bits (31..0)           │
//! └──────────────────────────────┴──────────────────────────────┘
//! ```
//!
//! With `y` in the low bits, all sections of one column occupy a contiguous
//! key range, and all sections sharing an `x` occupy a contiguous range too.

use std::fmt;

/// log2 of the section edge length.
pub const SECTION_BITS: u32 = 4;

/// Section edge length in world units.
pub const SECTION_SIZE: i32 = 1 << SECTION_BITS;

const PACKED_X_BITS: u32 = 22;
const PACKED_Z_BITS: u32 = 22;
const PACKED_Y_BITS: u32 = 20;
const PACKED_X_MASK: u64 = (1 << PACKED_X_BITS) - 1;
const PACKED_Z_MASK: u64 = (1 << PACKED_Z_BITS) - 1;
const PACKED_Y_MASK: u64 = (1 << PACKED_Y_BITS) - 1;
const Z_OFFSET: u32 = PACKED_Y_BITS;
const X_OFFSET: u32 = PACKED_Y_BITS + PACKED_Z_BITS;

/// Convert a world coordinate to the coordinate of the section containing it.
#[inline]
#[must_use]
pub fn section_coord(value: f64) -> i32 {
    (value.floor() as i32) >> SECTION_BITS
}

/// A point in world space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Create a point from world coordinates.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Translate by the given deltas.
    #[must_use]
    pub fn offset(self, dx: f64, dy: f64, dz: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

/// Coordinate of a 16x16x16 section.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SectionPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl SectionPos {
    /// Create from section coordinates (world coordinates shifted right by 4).
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Section containing a world position.
    #[must_use]
    pub fn of(pos: Vec3) -> Self {
        Self::new(section_coord(pos.x), section_coord(pos.y), section_coord(pos.z))
    }

    /// Pack into a single sortable key.
    #[inline]
    #[must_use]
    pub const fn as_long(self) -> u64 {
        ((self.x as u64 & PACKED_X_MASK) << X_OFFSET)
            | ((self.z as u64 & PACKED_Z_MASK) << Z_OFFSET)
            | (self.y as u64 & PACKED_Y_MASK)
    }

    /// Unpack a key produced by [`SectionPos::as_long`].
    #[inline]
    #[must_use]
    pub const fn from_long(key: u64) -> Self {
        let key = key as i64;
        Self {
            x: (key >> X_OFFSET) as i32,
            y: ((key << (64 - PACKED_Y_BITS)) >> (64 - PACKED_Y_BITS)) as i32,
            z: ((key << PACKED_X_BITS) >> (64 - PACKED_Z_BITS)) as i32,
        }
    }

    /// Column this section belongs to.
    #[inline]
    #[must_use]
    pub const fn chunk(self) -> ChunkPos {
        ChunkPos::new(self.x, self.z)
    }

    /// Lowest world coordinate covered by this section, per axis.
    #[must_use]
    pub const fn origin(self) -> (i32, i32, i32) {
        (
            self.x << SECTION_BITS,
            self.y << SECTION_BITS,
            self.z << SECTION_BITS,
        )
    }
}

impl fmt::Debug for SectionPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SectionPos[{}, {}, {}]", self.x, self.y, self.z)
    }
}

/// Coordinate of a column of sections.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    /// Create from column coordinates.
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Column containing a world position.
    #[must_use]
    pub fn of(pos: Vec3) -> Self {
        Self::new(section_coord(pos.x), section_coord(pos.z))
    }

    /// Pack into a single key: `x` in the low half, `z` in the high half.
    #[inline]
    #[must_use]
    pub const fn as_long(self) -> u64 {
        (self.x as u32 as u64) | ((self.z as u32 as u64) << 32)
    }

    /// Unpack a key produced by [`ChunkPos::as_long`].
    #[inline]
    #[must_use]
    pub const fn from_long(key: u64) -> Self {
        Self {
            x: key as u32 as i32,
            z: (key >> 32) as u32 as i32,
        }
    }

    /// Chebyshev distance in columns.
    #[must_use]
    pub fn chessboard_distance(self, other: Self) -> u32 {
        self.x.abs_diff(other.x).max(self.z.abs_diff(other.z))
    }

    /// Key range covering every section of this column.
    #[must_use]
    pub const fn section_key_range(self) -> std::ops::RangeInclusive<u64> {
        SectionPos::new(self.x, 0, self.z).as_long()..=SectionPos::new(self.x, -1, self.z).as_long()
    }
}

impl fmt::Debug for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}
