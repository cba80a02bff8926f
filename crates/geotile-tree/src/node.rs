//! A single quadrant of the map and its loading state.

use std::sync::Arc;

use geotile_coords::{TileBounds, TileCoordinate};
use geotile_provider::RgbaImage;
use glam::DVec3;

use crate::{LoadKind, TileGeometry};

/// Progress of one asynchronous load (texture or elevation).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    /// Requested, no result yet.
    Pending,
    /// Result applied.
    Loaded,
    /// Every attempt failed; a fallback is shown.
    Failed,
    /// This node has nothing to load of this kind.
    NotRequired,
}

impl LoadState {
    /// Whether the load has finished one way or another.
    #[must_use]
    pub fn is_resolved(self) -> bool {
        !matches!(self, LoadState::Pending)
    }
}

/// Image drawn on a node's surface.
#[derive(Clone, Debug, Default)]
pub enum TileTexture {
    /// Nothing received yet.
    #[default]
    Empty,
    /// Imagery from the provider.
    Image(Arc<RgbaImage>),
    /// Error tile shown after the imagery fetch failed.
    Placeholder,
}

impl TileTexture {
    /// Whether provider imagery is attached.
    #[must_use]
    pub fn is_image(&self) -> bool {
        matches!(self, TileTexture::Image(_))
    }
}

/// One quadrant of the map.
///
/// A node is either a leaf drawing its own surface, or subdivided with exactly
/// four live children. Links are coordinates into the owning
/// [`TileQuadtree`](crate::TileQuadtree) arena.
#[derive(Clone, Debug)]
pub struct TileNode {
    pub(crate) coordinate: TileCoordinate,
    pub(crate) parent: Option<TileCoordinate>,
    pub(crate) children: Option<[TileCoordinate; 4]>,
    pub(crate) has_cached_children: bool,
    pub(crate) loaded_child_count: u8,
    pub(crate) subdivided: bool,
    pub(crate) visible: bool,
    pub(crate) surface_shown: bool,
    pub(crate) ready: bool,
    pub(crate) bounds: TileBounds,
    pub(crate) geometry: TileGeometry,
    pub(crate) texture: TileTexture,
    pub(crate) texture_state: LoadState,
    pub(crate) height_state: LoadState,
    pub(crate) texture_token: u64,
    pub(crate) height_token: u64,
}

impl TileNode {
    pub(crate) fn new(
        coordinate: TileCoordinate,
        parent: Option<TileCoordinate>,
        bounds: TileBounds,
    ) -> Self {
        Self {
            coordinate,
            parent,
            children: None,
            has_cached_children: false,
            loaded_child_count: 0,
            subdivided: false,
            visible: false,
            surface_shown: true,
            ready: false,
            bounds,
            geometry: TileGeometry::flat(&bounds),
            texture: TileTexture::Empty,
            texture_state: LoadState::Pending,
            height_state: LoadState::NotRequired,
            texture_token: 0,
            height_token: 0,
        }
    }

    /// Tile address.
    #[must_use]
    pub fn coordinate(&self) -> TileCoordinate {
        self.coordinate
    }

    /// Zoom level.
    #[must_use]
    pub fn level(&self) -> u8 {
        self.coordinate.level
    }

    /// Parent coordinate; `None` only for the tree root.
    #[must_use]
    pub fn parent(&self) -> Option<TileCoordinate> {
        self.parent
    }

    /// Live children, in quadrant order.
    #[must_use]
    pub fn children(&self) -> Option<[TileCoordinate; 4]> {
        self.children
    }

    /// Whether a previous simplify left children available for reuse.
    #[must_use]
    pub fn has_cached_children(&self) -> bool {
        self.has_cached_children
    }

    /// Number of live children that finished loading since the last simplify.
    #[must_use]
    pub fn loaded_child_count(&self) -> u8 {
        self.loaded_child_count
    }

    /// Whether the node has been subdivided (and not simplified since).
    #[must_use]
    pub fn is_subdivided(&self) -> bool {
        self.subdivided
    }

    /// Whether the node takes part in drawing.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether the node draws its own surface (false once its children took over).
    #[must_use]
    pub fn is_surface_shown(&self) -> bool {
        self.surface_shown
    }

    /// Whether the node's own surface is currently on screen.
    #[must_use]
    pub fn draws_surface(&self) -> bool {
        self.visible && self.surface_shown
    }

    /// Whether every required load has resolved at least once.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Footprint on the world XZ plane.
    #[must_use]
    pub fn bounds(&self) -> &TileBounds {
        &self.bounds
    }

    /// Surface mesh in world space.
    #[must_use]
    pub fn geometry(&self) -> &TileGeometry {
        &self.geometry
    }

    /// Surface texture.
    #[must_use]
    pub fn texture(&self) -> &TileTexture {
        &self.texture
    }

    /// State of the load of the given kind.
    #[must_use]
    pub fn load_state(&self, kind: LoadKind) -> LoadState {
        match kind {
            LoadKind::Texture => self.texture_state,
            LoadKind::Height => self.height_state,
        }
    }

    /// World-space scale of the node: footprint size on X/Z, unit height.
    #[must_use]
    pub fn world_scale(&self) -> DVec3 {
        let size = self.bounds.size();
        DVec3::new(size.x, 1.0, size.y)
    }

    /// Centre of the footprint at mid elevation of the surface.
    #[must_use]
    pub fn world_center(&self) -> DVec3 {
        let (min, max) = self.geometry.aabb();
        self.bounds.center_3d((min.y + max.y) * 0.5)
    }

    pub(crate) fn token(&self, kind: LoadKind) -> u64 {
        match kind {
            LoadKind::Texture => self.texture_token,
            LoadKind::Height => self.height_token,
        }
    }

    pub(crate) fn loads_resolved(&self) -> bool {
        self.texture_state.is_resolved() && self.height_state.is_resolved()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;

    fn node() -> TileNode {
        TileNode::new(
            TileCoordinate::new(2, 1, 1),
            Some(TileCoordinate::new(1, 0, 0)),
            TileBounds::new(DVec2::ZERO, DVec2::new(100.0, 50.0)),
        )
    }

    #[test]
    fn test_new_node_is_hidden_pending_leaf() {
        let n = node();
        assert!(n.children().is_none());
        assert!(!n.is_visible());
        assert!(n.is_surface_shown());
        assert!(!n.draws_surface());
        assert!(!n.is_ready());
        assert_eq!(n.load_state(LoadKind::Texture), LoadState::Pending);
        assert_eq!(n.load_state(LoadKind::Height), LoadState::NotRequired);
        assert!(!n.loads_resolved());
    }

    #[test]
    fn test_world_scale_and_center() {
        let n = node();
        assert_eq!(n.world_scale(), DVec3::new(100.0, 1.0, 50.0));
        assert_eq!(n.world_center(), DVec3::new(50.0, 0.0, 25.0));
    }

    #[test]
    fn test_load_state_resolution() {
        assert!(!LoadState::Pending.is_resolved());
        assert!(LoadState::Loaded.is_resolved());
        assert!(LoadState::Failed.is_resolved());
        assert!(LoadState::NotRequired.is_resolved());
    }
}
