//! Tile surface meshes in world space.

use geotile_coords::TileBounds;
use geotile_provider::HeightRaster;
use glam::{DVec2, DVec3};

/// A regular grid mesh covering one tile footprint.
///
/// Vertices are row-major, row 0 on the tile's minimum-Z (northern) edge.
/// Triangles wind counter-clockwise seen from +Y, so face normals point up.
#[derive(Clone, Debug, PartialEq)]
pub struct TileGeometry {
    segments: u32,
    positions: Vec<DVec3>,
    normals: Vec<DVec3>,
    uvs: Vec<DVec2>,
    indices: Vec<u32>,
    min: DVec3,
    max: DVec3,
}

impl TileGeometry {
    /// A single flat quad at elevation zero.
    #[must_use]
    pub fn flat(bounds: &TileBounds) -> Self {
        Self::grid(bounds, 1, |_, _| 0.0)
    }

    /// A grid displaced by `raster`, one vertex per sample.
    #[must_use]
    pub fn from_heights(bounds: &TileBounds, raster: &HeightRaster) -> Self {
        let segments = (raster.resolution() - 1) as u32;
        Self::grid(bounds, segments, |col, row| raster.get(col as usize, row as usize))
    }

    fn grid(bounds: &TileBounds, segments: u32, height: impl Fn(u32, u32) -> f64) -> Self {
        let side = segments + 1;
        let size = bounds.size();
        let step = 1.0 / f64::from(segments);

        let mut positions = Vec::with_capacity((side * side) as usize);
        let mut uvs = Vec::with_capacity(positions.capacity());
        for row in 0..side {
            let t = f64::from(row) * step;
            for col in 0..side {
                let s = f64::from(col) * step;
                positions.push(DVec3::new(
                    bounds.min.x + s * size.x,
                    height(col, row),
                    bounds.min.y + t * size.y,
                ));
                uvs.push(DVec2::new(s, 1.0 - t));
            }
        }

        let mut indices = Vec::with_capacity((segments * segments * 6) as usize);
        for row in 0..segments {
            for col in 0..segments {
                let a = row * side + col;
                let b = a + side;
                let c = a + 1;
                let d = b + 1;
                indices.extend_from_slice(&[a, b, c, b, d, c]);
            }
        }

        let normals = vertex_normals(&positions, &indices);
        let (min, max) = positions.iter().fold(
            (DVec3::splat(f64::INFINITY), DVec3::splat(f64::NEG_INFINITY)),
            |(lo, hi), p| (lo.min(*p), hi.max(*p)),
        );

        Self {
            segments,
            positions,
            normals,
            uvs,
            indices,
            min,
            max,
        }
    }

    /// Grid segments per side.
    #[must_use]
    pub fn segments(&self) -> u32 {
        self.segments
    }

    /// World-space vertex positions.
    #[must_use]
    pub fn positions(&self) -> &[DVec3] {
        &self.positions
    }

    /// Unit vertex normals.
    #[must_use]
    pub fn normals(&self) -> &[DVec3] {
        &self.normals
    }

    /// Texture coordinates, `v = 1` on the northern edge.
    #[must_use]
    pub fn uvs(&self) -> &[DVec2] {
        &self.uvs
    }

    /// Triangle list indices.
    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Number of triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Axis-aligned bounding box `(min, max)`.
    #[must_use]
    pub fn aabb(&self) -> (DVec3, DVec3) {
        (self.min, self.max)
    }

    /// Iterate triangles as vertex triples.
    pub fn triangles(&self) -> impl Iterator<Item = [DVec3; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| {
            [
                self.positions[t[0] as usize],
                self.positions[t[1] as usize],
                self.positions[t[2] as usize],
            ]
        })
    }
}

/// Area-weighted vertex normals.
fn vertex_normals(positions: &[DVec3], indices: &[u32]) -> Vec<DVec3> {
    let mut normals = vec![DVec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let face = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }
    normals
        .into_iter()
        .map(|n| n.try_normalize().unwrap_or(DVec3::Y))
        .collect()
}
