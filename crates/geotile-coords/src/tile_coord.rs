//! Unique tile identifier within the quadtree pyramid.

use serde::{Deserialize, Serialize};

/// Which quarter of its parent a tile occupies.
///
/// The discriminant is the index of the tile in [`TileCoordinate::children`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Quadrant {
    /// `(2x, 2y)`
    TopLeft = 0,
    /// `(2x + 1, 2y)`
    TopRight = 1,
    /// `(2x, 2y + 1)`
    BottomLeft = 2,
    /// `(2x + 1, 2y + 1)`
    BottomRight = 3,
}

impl Quadrant {
    /// All quadrants in child order.
    pub const ALL: [Quadrant; 4] = [
        Quadrant::TopLeft,
        Quadrant::TopRight,
        Quadrant::BottomLeft,
        Quadrant::BottomRight,
    ];

    /// Offset of this quadrant in child-grid units: `(dx, dy)` with each in `{0, 1}`.
    #[must_use]
    pub fn offset(self) -> (u32, u32) {
        match self {
            Quadrant::TopLeft => (0, 0),
            Quadrant::TopRight => (1, 0),
            Quadrant::BottomLeft => (0, 1),
            Quadrant::BottomRight => (1, 1),
        }
    }
}

/// Identifies one tile of the pyramid.
///
/// - `level`: zoom level. Level 0 is a single tile covering the whole map;
///   each level doubles the resolution along both axes.
/// - `x`, `y`: column and row at this level, both in `[0, 2^level)`.
///   `y` grows southwards, matching slippy-map tile services.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TileCoordinate {
    /// Zoom level (0 = whole map).
    pub level: u8,
    /// Column at this level.
    pub x: u32,
    /// Row at this level.
    pub y: u32,
}

impl TileCoordinate {
    /// Deepest level representable with `u32` columns and rows.
    pub const MAX_LEVEL: u8 = 30;

    /// Number of tiles along one axis at `level`.
    ///
    /// # Panics
    ///
    /// Panics if `level` exceeds [`Self::MAX_LEVEL`].
    #[must_use]
    pub fn grid_size(level: u8) -> u32 {
        assert!(
            level <= Self::MAX_LEVEL,
            "level {level} exceeds MAX_LEVEL {}",
            Self::MAX_LEVEL
        );
        1 << level
    }

    /// Construct a `TileCoordinate`, validating that `x` and `y` fit the grid
    /// at `level`.
    ///
    /// # Panics
    ///
    /// Panics if `level` exceeds [`Self::MAX_LEVEL`] or if `x`/`y` are out of range.
    #[must_use]
    pub fn new(level: u8, x: u32, y: u32) -> Self {
        let size = Self::grid_size(level);
        assert!(x < size, "x={x} out of range for level {level} (max {size})");
        assert!(y < size, "y={y} out of range for level {level} (max {size})");
        Self { level, x, y }
    }

    /// Fallible variant of [`Self::new`].
    #[must_use]
    pub fn try_new(level: u8, x: u32, y: u32) -> Option<Self> {
        if level > Self::MAX_LEVEL {
            return None;
        }
        let size = Self::grid_size(level);
        (x < size && y < size).then_some(Self { level, x, y })
    }

    /// The single level-0 tile.
    #[must_use]
    pub const fn root() -> Self {
        Self { level: 0, x: 0, y: 0 }
    }

    /// The parent tile one level up. `None` at level 0.
    #[must_use]
    pub fn parent(&self) -> Option<TileCoordinate> {
        if self.level == 0 {
            return None;
        }
        Some(TileCoordinate {
            level: self.level - 1,
            x: self.x / 2,
            y: self.y / 2,
        })
    }

    /// The four children one level down, in [`Quadrant`] order.
    ///
    /// Returns `None` at [`Self::MAX_LEVEL`].
    #[must_use]
    pub fn children(&self) -> Option<[TileCoordinate; 4]> {
        if self.level >= Self::MAX_LEVEL {
            return None;
        }
        let level = self.level + 1;
        let cx = self.x * 2;
        let cy = self.y * 2;
        Some(Quadrant::ALL.map(|q| {
            let (dx, dy) = q.offset();
            TileCoordinate {
                level,
                x: cx + dx,
                y: cy + dy,
            }
        }))
    }

    /// Which quarter of its parent this tile is. `None` at level 0.
    #[must_use]
    pub fn quadrant(&self) -> Option<Quadrant> {
        if self.level == 0 {
            return None;
        }
        Some(match (self.x & 1, self.y & 1) {
            (0, 0) => Quadrant::TopLeft,
            (1, 0) => Quadrant::TopRight,
            (0, _) => Quadrant::BottomLeft,
            _ => Quadrant::BottomRight,
        })
    }

    /// Whether `other` lies inside this tile (or is this tile).
    #[must_use]
    pub fn contains(&self, other: &TileCoordinate) -> bool {
        if other.level < self.level {
            return false;
        }
        let shift = other.level - self.level;
        other.x >> shift == self.x && other.y >> shift == self.y
    }

    /// Bing Maps quadkey for this tile. Empty at level 0.
    #[must_use]
    pub fn quadkey(&self) -> String {
        (1..=self.level)
            .rev()
            .map(|i| {
                let mask = 1u32 << (i - 1);
                let mut digit = b'0';
                if self.x & mask != 0 {
                    digit += 1;
                }
                if self.y & mask != 0 {
                    digit += 2;
                }
                digit as char
            })
            .collect()
    }
}

impl std::fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.level, self.x, self.y)
    }
}
