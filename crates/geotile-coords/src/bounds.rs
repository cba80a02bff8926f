//! Axis-aligned tile footprints on the world XZ plane.

use glam::{DVec2, DVec3};

use crate::{Quadrant, TileCoordinate};

/// Rectangular footprint of a tile on the world XZ plane.
///
/// `min`/`max` are `(x, z)` pairs. Tile columns grow along +X and tile rows
/// along +Z, so a child's quadrant maps directly onto a quarter of this box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileBounds {
    /// Minimum `(x, z)` corner.
    pub min: DVec2,
    /// Maximum `(x, z)` corner.
    pub max: DVec2,
}

impl TileBounds {
    /// Build bounds from two corners, normalising their order.
    #[must_use]
    pub fn new(a: DVec2, b: DVec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Square bounds of side `size` centred on `center`.
    #[must_use]
    pub fn from_center(center: DVec2, size: f64) -> Self {
        let half = DVec2::splat(size * 0.5);
        Self::new(center - half, center + half)
    }

    /// Extent along X and Z.
    #[must_use]
    pub fn size(&self) -> DVec2 {
        self.max - self.min
    }

    /// Centre on the XZ plane.
    #[must_use]
    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }

    /// Centre lifted to 3D at height `y`.
    #[must_use]
    pub fn center_3d(&self, y: f64) -> DVec3 {
        let c = self.center();
        DVec3::new(c.x, y, c.y)
    }

    /// The quarter of this footprint covered by the child in `quadrant`.
    #[must_use]
    pub fn quadrant(&self, quadrant: Quadrant) -> Self {
        let half = self.size() * 0.5;
        let (dx, dz) = quadrant.offset();
        let min = self.min + DVec2::new(f64::from(dx) * half.x, f64::from(dz) * half.y);
        Self {
            min,
            max: min + half,
        }
    }

    /// Footprint of `target` given that `root` occupies `root_bounds`.
    ///
    /// # Panics
    ///
    /// Panics if `target` does not lie inside `root`.
    #[must_use]
    pub fn subdivide_to(root_bounds: &TileBounds, root: &TileCoordinate, target: &TileCoordinate) -> Self {
        assert!(
            root.contains(target),
            "tile {target} is not inside root {root}"
        );
        let depth = target.level - root.level;
        let scale = f64::from(TileCoordinate::grid_size(depth));
        let rel_x = f64::from(target.x - (root.x << depth));
        let rel_y = f64::from(target.y - (root.y << depth));
        let cell = root_bounds.size() / scale;
        let min = root_bounds.min + DVec2::new(rel_x * cell.x, rel_y * cell.y);
        Self {
            min,
            max: min + cell,
        }
    }

    /// Whether the `(x, z)` point lies inside (edges inclusive).
    #[must_use]
    pub fn contains(&self, point: DVec2) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}
