//! Identifiers and world-coordinate types.

use std::fmt;

/// Edge length of one chunk, in world cells.
pub const CHUNK_EDGE: i64 = 16;

// ── EntityId ─────────────────────────────────────────────────────

/// Globally unique 128-bit entity identifier.
///
/// Opaque to the engine: ids are minted by the simulation core and
/// used only as map keys. The wire ABI carries an id as four 32-bit
/// words (lowest word first), matching the core's
/// `set_command(id0, id1, id2, id3)` signature.
///
/// ```
/// use lode_core::EntityId;
///
/// let id = EntityId::from_words([1, 2, 3, 4]);
/// assert_eq!(id.to_words(), [1, 2, 3, 4]);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u128);

impl EntityId {
    /// Construct an id from its raw 128-bit value.
    pub const fn from_u128(raw: u128) -> Self {
        Self(raw)
    }

    /// The raw 128-bit value.
    pub const fn as_u128(self) -> u128 {
        self.0
    }

    /// Assemble an id from four 32-bit ABI words, lowest word first.
    pub const fn from_words(words: [u32; 4]) -> Self {
        Self(
            (words[0] as u128)
                | ((words[1] as u128) << 32)
                | ((words[2] as u128) << 64)
                | ((words[3] as u128) << 96),
        )
    }

    /// Decompose an id into four 32-bit ABI words, lowest word first.
    pub const fn to_words(self) -> [u32; 4] {
        [
            self.0 as u32,
            (self.0 >> 32) as u32,
            (self.0 >> 64) as u32,
            (self.0 >> 96) as u32,
        ]
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

// ── GridPos ──────────────────────────────────────────────────────

/// Integer world-cell coordinate of an entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridPos {
    /// World-cell x coordinate.
    pub x: i64,
    /// World-cell y coordinate.
    pub y: i64,
    /// World-cell z coordinate.
    pub z: i64,
}

impl GridPos {
    /// Construct a position from its components.
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// The chunk cell this position falls in.
    ///
    /// Uses flooring division so negative coordinates map to the
    /// adjacent negative cell rather than cell zero.
    ///
    /// ```
    /// use lode_core::{CellCoord, GridPos};
    ///
    /// assert_eq!(GridPos::new(17, 0, 31).cell(), CellCoord::new(1, 0, 1));
    /// assert_eq!(GridPos::new(-1, 0, 0).cell(), CellCoord::new(-1, 0, 0));
    /// ```
    pub const fn cell(self) -> CellCoord {
        CellCoord {
            x: self.x.div_euclid(CHUNK_EDGE),
            y: self.y.div_euclid(CHUNK_EDGE),
            z: self.z.div_euclid(CHUNK_EDGE),
        }
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// ── CellCoord ────────────────────────────────────────────────────

/// Integer chunk-cell coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    /// Chunk x coordinate.
    pub x: i64,
    /// Chunk y coordinate.
    pub y: i64,
    /// Chunk z coordinate.
    pub z: i64,
}

impl CellCoord {
    /// Construct a cell coordinate from its components.
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.x, self.y, self.z)
    }
}

// ── Dims ─────────────────────────────────────────────────────────

/// World dimensions, measured in chunks per axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Dims {
    /// Chunk count along x.
    pub x: u32,
    /// Chunk count along y.
    pub y: u32,
    /// Chunk count along z.
    pub z: u32,
}

impl Dims {
    /// Construct dimensions from chunk counts.
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Total number of chunk cells.
    pub const fn cell_count(self) -> usize {
        self.x as usize * self.y as usize * self.z as usize
    }

    /// Whether `cell` lies inside the world.
    pub const fn contains(self, cell: CellCoord) -> bool {
        cell.x >= 0
            && cell.y >= 0
            && cell.z >= 0
            && cell.x < self.x as i64
            && cell.y < self.y as i64
            && cell.z < self.z as i64
    }

    /// Iterate all in-range cell coordinates, x-major.
    pub fn cells(self) -> impl Iterator<Item = CellCoord> {
        (0..self.x as i64).flat_map(move |x| {
            (0..self.y as i64)
                .flat_map(move |y| (0..self.z as i64).map(move |z| CellCoord::new(x, y, z)))
        })
    }
}

impl fmt::Display for Dims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn id_word_layout_is_little_endian() {
        let id = EntityId::from_words([0xdead_beef, 0, 0, 1]);
        assert_eq!(id.as_u128(), 0xdead_beef | (1u128 << 96));
    }

    #[test]
    fn cell_floors_toward_negative_infinity() {
        assert_eq!(GridPos::new(0, 0, 0).cell(), CellCoord::new(0, 0, 0));
        assert_eq!(GridPos::new(15, 15, 15).cell(), CellCoord::new(0, 0, 0));
        assert_eq!(GridPos::new(16, 0, 0).cell(), CellCoord::new(1, 0, 0));
        assert_eq!(GridPos::new(-16, -1, 0).cell(), CellCoord::new(-1, -1, 0));
    }

    #[test]
    fn dims_contains_and_count() {
        let dims = Dims::new(4, 4, 4);
        assert_eq!(dims.cell_count(), 64);
        assert_eq!(dims.cells().count(), 64);
        assert!(dims.contains(CellCoord::new(3, 3, 3)));
        assert!(!dims.contains(CellCoord::new(4, 0, 0)));
        assert!(!dims.contains(CellCoord::new(-1, 0, 0)));
    }

    proptest! {
        #[test]
        fn id_words_round_trip(words in prop::array::uniform4(any::<u32>())) {
            prop_assert_eq!(EntityId::from_words(words).to_words(), words);
        }

        #[test]
        fn cell_is_consistent_with_chunk_edge(x in -1000i64..1000, y in -1000i64..1000, z in -1000i64..1000) {
            let cell = GridPos::new(x, y, z).cell();
            prop_assert!(x - cell.x * CHUNK_EDGE >= 0);
            prop_assert!(x - cell.x * CHUNK_EDGE < CHUNK_EDGE);
            prop_assert!(y - cell.y * CHUNK_EDGE >= 0);
            prop_assert!(z - cell.z * CHUNK_EDGE < CHUNK_EDGE);
        }
    }
}
