use std::fmt;

use geotile_coords::TileCoordinate;
use geotile_tree::TileQuadtree;

use crate::Camera;

/// A structural change a strategy asks of the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LodAction {
    /// Split this tile into four children.
    Subdivide(TileCoordinate),
    /// Collapse this tile's children back into it.
    Simplify(TileCoordinate),
}

impl LodAction {
    /// Perform the action. Returns whether the tree changed.
    pub fn apply(self, tree: &mut TileQuadtree) -> bool {
        match self {
            LodAction::Subdivide(coordinate) => tree.subdivide(coordinate),
            LodAction::Simplify(coordinate) => tree.simplify(coordinate),
        }
    }
}

impl fmt::Display for LodAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LodAction::Subdivide(c) => write!(f, "subdivide {c}"),
            LodAction::Simplify(c) => write!(f, "simplify {c}"),
        }
    }
}

/// Decides, once per tick, how the tree should change for a camera.
pub trait LodStrategy {
    /// Inspect the tree from `camera`, apply changes, and return the actions
    /// that changed it.
    fn update(&mut self, tree: &mut TileQuadtree, camera: &Camera) -> Vec<LodAction>;
}
