//! Hit-testing rays against the surfaces a tree currently draws.

use geotile_coords::TileCoordinate;
use geotile_tree::{TileNode, TileQuadtree};
use glam::DVec3;

use crate::Ray;

/// A ray's nearest intersection with one drawn tile surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceHit {
    /// Tile that was hit.
    pub coordinate: TileCoordinate,
    /// Its parent, `None` for the tree root.
    pub parent: Option<TileCoordinate>,
    /// Distance from the ray origin.
    pub distance: f64,
    /// World-space intersection point.
    pub point: DVec3,
    /// World-space scale magnitude of the tile (its footprint width).
    pub scale: f64,
}

impl SurfaceHit {
    /// Zoom level of the hit tile.
    #[must_use]
    pub fn level(&self) -> u8 {
        self.coordinate.level
    }

    fn new(node: &TileNode, ray: &Ray, distance: f64) -> Self {
        Self {
            coordinate: node.coordinate(),
            parent: node.parent(),
            distance,
            point: ray.at(distance),
            scale: node.world_scale().x,
        }
    }
}

/// Intersect `ray` with every surface `tree` draws, nearest first. Each
/// surface contributes at most one hit.
#[must_use]
pub fn raycast_surfaces(tree: &TileQuadtree, ray: &Ray) -> Vec<SurfaceHit> {
    let mut hits: Vec<SurfaceHit> = tree
        .visible_surfaces()
        .into_iter()
        .filter_map(|node| {
            let (min, max) = node.geometry().aabb();
            ray.intersect_bounds(min, max)?;
            node.geometry()
                .triangles()
                .filter_map(|tri| ray.intersect_triangle(tri))
                .min_by(f64::total_cmp)
                .map(|distance| SurfaceHit::new(node, ray, distance))
        })
        .collect();
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use geotile_coords::TileBounds;
    use geotile_provider::DebugProvider;
    use geotile_tree::SurfaceKind;
    use glam::DVec2;

    use super::*;
    use crate::testing::fulfil;

    fn tree() -> TileQuadtree {
        let mut tree = TileQuadtree::new(
            TileCoordinate::root(),
            TileBounds::new(DVec2::splat(-100.0), DVec2::splat(100.0)),
            Arc::new(DebugProvider::checker().with_tile_size(2)),
            SurfaceKind::Planar,
        );
        fulfil(&mut tree);
        tree
    }

    #[test]
    fn test_hit_on_root_surface() {
        let tree = tree();
        let ray = Ray::new(DVec3::new(10.0, 50.0, 20.0), DVec3::NEG_Y).unwrap();
        let hits = raycast_surfaces(&tree, &ray);
        assert_eq!(hits.len(), 1);
        let hit = hits[0];
        assert_eq!(hit.coordinate, TileCoordinate::root());
        assert_eq!(hit.parent, None);
        assert!((hit.distance - 50.0).abs() < 1e-9);
        assert!((hit.point - DVec3::new(10.0, 0.0, 20.0)).length() < 1e-9);
        assert_eq!(hit.scale, 200.0);
    }

    #[test]
    fn test_miss_outside_footprint() {
        let tree = tree();
        let ray = Ray::new(DVec3::new(150.0, 50.0, 0.0), DVec3::NEG_Y).unwrap();
        assert!(raycast_surfaces(&tree, &ray).is_empty());
    }

    #[test]
    fn test_hidden_surfaces_are_not_hit() {
        let mut tree = tree();
        tree.subdivide(TileCoordinate::root());
        // Children still loading: only the root is drawn.
        let ray = Ray::new(DVec3::new(-50.0, 50.0, -50.0), DVec3::NEG_Y).unwrap();
        let hits = raycast_surfaces(&tree, &ray);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].coordinate, TileCoordinate::root());

        fulfil(&mut tree);
        let hits = raycast_surfaces(&tree, &ray);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].coordinate, TileCoordinate::new(1, 0, 0));
        assert_eq!(hits[0].parent, Some(TileCoordinate::root()));
        assert_eq!(hits[0].scale, 100.0);
    }
}
