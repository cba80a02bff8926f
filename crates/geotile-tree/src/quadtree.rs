//! The tile quadtree: node arena, subdivision with child caching, and
//! all-or-nothing reveal of loaded children.
//!
//! The tree never blocks on I/O. Every operation that needs a tile pushes a
//! [`LoadRequest`] into an outbox drained with [`TileQuadtree::take_requests`];
//! finished work comes back through [`TileQuadtree::apply`]. Each request
//! carries the node's current load token, so results for nodes that were
//! evicted or reloaded in the meantime are recognised and dropped.

use std::sync::Arc;

use geotile_coords::{Quadrant, TileBounds, TileCoordinate};
use geotile_provider::{ProviderError, TileMetadata, TileProvider};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    CancelToken, HeightSettings, LoadKind, LoadOutcome, LoadPayload, LoadRequest, LoadState,
    TileGeometry, TileNode, TileTexture,
};

/// What the tree's surfaces are made of.
#[derive(Clone, Debug)]
pub enum SurfaceKind {
    /// Flat quads draped with imagery.
    Planar,
    /// Quads displaced by elevation tiles from `provider`.
    Height {
        /// Elevation source.
        provider: Arc<dyn TileProvider>,
        /// Decoding parameters.
        settings: HeightSettings,
    },
}

/// Counters describing the tree at one instant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Nodes in the arena, cached ones included.
    pub nodes: usize,
    /// Nodes reachable from the root through live children.
    pub live: usize,
    /// Surfaces currently drawn.
    pub visible_surfaces: usize,
    /// Loads issued and not yet applied.
    pub pending_loads: usize,
    /// Loads issued since construction.
    pub requests_issued: u64,
}

/// Quadtree of map tiles rooted at a single coordinate.
pub struct TileQuadtree {
    nodes: FxHashMap<TileCoordinate, TileNode>,
    root: TileCoordinate,
    image_provider: Arc<dyn TileProvider>,
    height_provider: Option<Arc<dyn TileProvider>>,
    height_settings: HeightSettings,
    outbox: Vec<LoadRequest>,
    pending: FxHashMap<(TileCoordinate, LoadKind), CancelToken>,
    next_token: u64,
    requests_issued: u64,
}

impl TileQuadtree {
    /// Create a tree whose root tile covers `root_bounds`, and issue the
    /// root's loads.
    #[must_use]
    pub fn new(
        root: TileCoordinate,
        root_bounds: TileBounds,
        image_provider: Arc<dyn TileProvider>,
        kind: SurfaceKind,
    ) -> Self {
        let (height_provider, height_settings) = match kind {
            SurfaceKind::Planar => (None, HeightSettings::default()),
            SurfaceKind::Height { provider, settings } => match settings.validate() {
                Ok(()) => (Some(provider), settings),
                Err(e) => {
                    log::warn!("{e}, using default height settings");
                    (Some(provider), HeightSettings::default())
                }
            },
        };

        let mut nodes = FxHashMap::default();
        nodes.insert(root, TileNode::new(root, None, root_bounds));

        let mut tree = Self {
            nodes,
            root,
            image_provider,
            height_provider,
            height_settings,
            outbox: Vec::new(),
            pending: FxHashMap::default(),
            next_token: 0,
            requests_issued: 0,
        };
        tree.load_texture(root);
        tree.load_height_geometry(root);
        log::debug!(
            "tile quadtree rooted at {root} (imagery: {}, max zoom {})",
            tree.image_provider.name(),
            tree.max_zoom()
        );
        tree
    }

    /// Root coordinate.
    #[must_use]
    pub fn root(&self) -> TileCoordinate {
        self.root
    }

    /// Node at `coordinate`, live or cached.
    #[must_use]
    pub fn node(&self, coordinate: &TileCoordinate) -> Option<&TileNode> {
        self.nodes.get(coordinate)
    }

    /// Deepest level the tree may reach: the lowest maximum zoom among the
    /// active providers.
    #[must_use]
    pub fn max_zoom(&self) -> u8 {
        let image = self.image_provider.max_zoom();
        self.height_provider
            .as_ref()
            .map_or(image, |height| image.min(height.max_zoom()))
    }

    /// Imagery provider.
    #[must_use]
    pub fn image_provider(&self) -> &Arc<dyn TileProvider> {
        &self.image_provider
    }

    /// Elevation provider, if the tree renders terrain.
    #[must_use]
    pub fn height_provider(&self) -> Option<&Arc<dyn TileProvider>> {
        self.height_provider.as_ref()
    }

    /// Elevation decoding parameters.
    #[must_use]
    pub fn height_settings(&self) -> HeightSettings {
        self.height_settings
    }

    /// Metadata of the imagery provider.
    ///
    /// # Errors
    ///
    /// Propagates the provider's metadata error.
    pub fn metadata(&self) -> Result<TileMetadata, ProviderError> {
        self.image_provider.metadata()
    }

    /// Whether `coordinate` is reachable from the root through live children.
    #[must_use]
    pub fn is_live(&self, coordinate: &TileCoordinate) -> bool {
        let mut current = *coordinate;
        loop {
            let Some(node) = self.nodes.get(&current) else {
                return false;
            };
            match node.parent {
                None => return current == self.root,
                Some(parent) => {
                    let linked = self
                        .nodes
                        .get(&parent)
                        .and_then(|p| p.children)
                        .is_some_and(|children| children.contains(&current));
                    if !linked {
                        return false;
                    }
                    current = parent;
                }
            }
        }
    }

    /// Coordinates of all live nodes, parents before children.
    #[must_use]
    pub fn live_coordinates(&self) -> Vec<TileCoordinate> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(coordinate) = stack.pop() {
            let Some(node) = self.nodes.get(&coordinate) else {
                continue;
            };
            out.push(coordinate);
            if let Some(children) = node.children {
                stack.extend(children.iter().rev());
            }
        }
        out
    }

    /// Live nodes whose own surface is on screen, in depth-first quadrant order.
    #[must_use]
    pub fn visible_surfaces(&self) -> Vec<&TileNode> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(coordinate) = stack.pop() {
            let Some(node) = self.nodes.get(&coordinate) else {
                continue;
            };
            if !node.visible {
                continue;
            }
            if node.surface_shown {
                out.push(node);
            }
            if let Some(children) = node.children {
                stack.extend(children.iter().rev());
            }
        }
        out
    }

    /// Split a leaf into four children.
    ///
    /// Refused when the node already has live children, sits at
    /// [`max_zoom`](Self::max_zoom), or its parent has not revealed all of its
    /// children yet. Children cached by an earlier [`simplify`](Self::simplify)
    /// are restored without new fetches. Returns whether the tree changed.
    pub fn subdivide(&mut self, coordinate: TileCoordinate) -> bool {
        let max_zoom = self.max_zoom();
        let Some(node) = self.nodes.get(&coordinate) else {
            return false;
        };
        if node.children.is_some() || coordinate.level >= max_zoom {
            return false;
        }
        if let Some(parent) = node.parent {
            let gated = self
                .nodes
                .get(&parent)
                .is_none_or(|p| p.loaded_child_count < 4);
            if gated {
                return false;
            }
        }
        let Some(children) = coordinate.children() else {
            return false;
        };

        let cached = node.has_cached_children && children.iter().all(|c| self.nodes.contains_key(c));
        if cached {
            self.restore_children(coordinate, children);
        } else {
            self.create_children(coordinate, children);
        }
        true
    }

    fn create_children(&mut self, coordinate: TileCoordinate, children: [TileCoordinate; 4]) {
        let Some(node) = self.nodes.get_mut(&coordinate) else {
            return;
        };
        node.children = Some(children);
        node.has_cached_children = false;
        node.subdivided = true;
        node.loaded_child_count = 0;
        let bounds = node.bounds;

        for (quadrant, child) in Quadrant::ALL.into_iter().zip(children) {
            self.nodes
                .insert(child, TileNode::new(child, Some(coordinate), bounds.quadrant(quadrant)));
            self.load_texture(child);
            self.load_height_geometry(child);
        }
        log::trace!("subdivided {coordinate}");
    }

    fn restore_children(&mut self, coordinate: TileCoordinate, children: [TileCoordinate; 4]) {
        let ready = children
            .iter()
            .filter(|c| self.nodes.get(c).is_some_and(|n| n.ready))
            .count() as u8;
        let revealed = ready == 4;
        for child in &children {
            if let Some(node) = self.nodes.get_mut(child) {
                node.visible = revealed;
            }
        }

        let Some(node) = self.nodes.get_mut(&coordinate) else {
            return;
        };
        node.children = Some(children);
        node.has_cached_children = false;
        node.subdivided = true;
        node.loaded_child_count = ready;
        if revealed {
            node.surface_shown = false;
        }
        log::trace!("restored cached children of {coordinate} ({ready}/4 ready)");
    }

    /// Collapse a node's children back into it. The children stay in the
    /// arena as a cache for the next [`subdivide`](Self::subdivide).
    /// Returns whether the tree changed.
    pub fn simplify(&mut self, coordinate: TileCoordinate) -> bool {
        let Some(node) = self.nodes.get_mut(&coordinate) else {
            return false;
        };
        if node.children.take().is_none() {
            return false;
        }
        node.has_cached_children = true;
        node.loaded_child_count = 0;
        node.subdivided = false;
        node.surface_shown = true;
        log::trace!("simplified {coordinate}");
        true
    }

    /// Record that `coordinate` finished loading.
    ///
    /// The root becomes visible at once. A live child bumps its parent's
    /// loaded-child count; the fourth reveals all siblings together and hides
    /// the parent's own surface. Cached children only record readiness.
    /// Returns `false` if the node is unknown or was already ready.
    pub fn mark_ready(&mut self, coordinate: TileCoordinate) -> bool {
        let Some(node) = self.nodes.get_mut(&coordinate) else {
            return false;
        };
        if node.ready {
            return false;
        }
        node.ready = true;

        let Some(parent) = node.parent else {
            node.visible = true;
            return true;
        };

        let Some(parent_node) = self.nodes.get_mut(&parent) else {
            return true;
        };
        let Some(siblings) = parent_node.children.filter(|c| c.contains(&coordinate)) else {
            return true;
        };
        parent_node.loaded_child_count = (parent_node.loaded_child_count + 1).min(4);
        if parent_node.loaded_child_count < 4 {
            return true;
        }
        if parent_node.subdivided {
            parent_node.surface_shown = false;
        }
        for sibling in &siblings {
            if let Some(node) = self.nodes.get_mut(sibling) {
                node.visible = true;
            }
        }
        true
    }

    /// Issue an imagery load for `coordinate`, superseding any earlier one.
    pub fn load_texture(&mut self, coordinate: TileCoordinate) {
        let provider = Arc::clone(&self.image_provider);
        self.issue(coordinate, LoadKind::Texture, provider);
    }

    /// Issue an elevation load for `coordinate`. No-op on planar trees.
    pub fn load_height_geometry(&mut self, coordinate: TileCoordinate) {
        if let Some(provider) = self.height_provider.clone() {
            self.issue(coordinate, LoadKind::Height, provider);
        }
    }

    fn issue(&mut self, coordinate: TileCoordinate, kind: LoadKind, provider: Arc<dyn TileProvider>) {
        let Some(node) = self.nodes.get_mut(&coordinate) else {
            return;
        };
        self.next_token += 1;
        let token = self.next_token;
        match kind {
            LoadKind::Texture => {
                node.texture_token = token;
                node.texture_state = LoadState::Pending;
            }
            LoadKind::Height => {
                node.height_token = token;
                node.height_state = LoadState::Pending;
            }
        }

        let cancel = CancelToken::new();
        if let Some(previous) = self.pending.insert((coordinate, kind), cancel.clone()) {
            previous.cancel();
        }
        self.outbox.push(LoadRequest {
            coordinate,
            kind,
            token,
            provider,
            height: self.height_settings,
            cancel,
        });
        self.requests_issued += 1;
    }

    /// Hand over every outstanding request. Superseded requests are dropped.
    pub fn take_requests(&mut self) -> Vec<LoadRequest> {
        let mut requests = std::mem::take(&mut self.outbox);
        requests.retain(|r| !r.cancel.is_cancelled());
        requests
    }

    /// Return requests that could not be submitted, ahead of newer ones.
    pub fn requeue(&mut self, mut requests: Vec<LoadRequest>) {
        requests.retain(|r| !r.cancel.is_cancelled());
        requests.append(&mut self.outbox);
        self.outbox = requests;
    }

    /// Apply a finished load. Returns `false` if the result was stale.
    ///
    /// A failed texture load shows [`TileTexture::Placeholder`]; a failed
    /// elevation load leaves the current geometry. Either way the load counts
    /// as resolved, so a broken tile never holds back its siblings.
    pub fn apply(&mut self, outcome: LoadOutcome) -> bool {
        let LoadOutcome {
            coordinate,
            kind,
            token,
            result,
        } = outcome;

        let Some(node) = self.nodes.get_mut(&coordinate) else {
            log::trace!("dropping {kind} result for evicted tile {coordinate}");
            return false;
        };
        if node.token(kind) != token {
            log::trace!("dropping superseded {kind} result for tile {coordinate}");
            return false;
        }
        self.pending.remove(&(coordinate, kind));

        match result {
            Ok(LoadPayload::Texture(image)) => {
                node.texture = TileTexture::Image(image);
                node.texture_state = LoadState::Loaded;
            }
            Ok(LoadPayload::Height(raster)) => {
                node.geometry = TileGeometry::from_heights(&node.bounds, &raster);
                node.height_state = LoadState::Loaded;
            }
            Err(err) => {
                log::warn!("{err}");
                match kind {
                    LoadKind::Texture => {
                        node.texture = TileTexture::Placeholder;
                        node.texture_state = LoadState::Failed;
                    }
                    LoadKind::Height => node.height_state = LoadState::Failed,
                }
            }
        }

        self.settle(coordinate);
        true
    }

    fn settle(&mut self, coordinate: TileCoordinate) {
        let resolved = self
            .nodes
            .get(&coordinate)
            .is_some_and(|n| !n.ready && n.loads_resolved());
        if resolved {
            self.mark_ready(coordinate);
        }
    }

    /// Replace the imagery provider. Drops cached subtrees and reloads the
    /// texture of every live node; nodes keep their current texture until the
    /// new one arrives. Returns `false` if `provider` is already in use.
    pub fn set_image_provider(&mut self, provider: Arc<dyn TileProvider>) -> bool {
        if Arc::ptr_eq(&self.image_provider, &provider) {
            return false;
        }
        log::info!("imagery provider changed to {}", provider.name());
        self.image_provider = provider;
        self.evict_cached();
        for coordinate in self.live_coordinates() {
            self.load_texture(coordinate);
        }
        true
    }

    /// Replace or remove the elevation provider. Drops cached subtrees and
    /// reloads (or flattens) the geometry of every live node. Returns `false`
    /// if nothing changed.
    pub fn set_height_provider(&mut self, provider: Option<Arc<dyn TileProvider>>) -> bool {
        let unchanged = match (&self.height_provider, &provider) {
            (None, None) => true,
            (Some(current), Some(new)) => Arc::ptr_eq(current, new),
            _ => false,
        };
        if unchanged {
            return false;
        }
        match &provider {
            Some(p) => log::info!("elevation provider changed to {}", p.name()),
            None => log::info!("elevation disabled"),
        }
        self.height_provider = provider;
        self.reload_heights();
        true
    }

    /// Change elevation decoding. Reloads geometry if it differs.
    ///
    /// Settings that fail [`HeightSettings::validate`] are ignored.
    pub fn set_height_settings(&mut self, settings: HeightSettings) -> bool {
        if settings == self.height_settings {
            return false;
        }
        if let Err(e) = settings.validate() {
            log::warn!("keeping height settings: {e}");
            return false;
        }
        self.height_settings = settings;
        self.reload_heights();
        true
    }

    fn reload_heights(&mut self) {
        self.evict_cached();
        let live = self.live_coordinates();
        if self.height_provider.is_some() {
            for coordinate in live {
                self.load_height_geometry(coordinate);
            }
            return;
        }

        for coordinate in live {
            if let Some(cancel) = self.pending.remove(&(coordinate, LoadKind::Height)) {
                cancel.cancel();
            }
            if let Some(node) = self.nodes.get_mut(&coordinate) {
                node.height_state = LoadState::NotRequired;
                node.geometry = TileGeometry::flat(&node.bounds);
            }
            self.settle(coordinate);
        }
        self.outbox.retain(|r| !r.cancel.is_cancelled());
    }

    /// Remove every cached (non-live) node from the arena and cancel its
    /// loads. Returns the number of nodes removed.
    pub fn evict_cached(&mut self) -> usize {
        let live: FxHashSet<TileCoordinate> = self.live_coordinates().into_iter().collect();
        let evicted: Vec<TileCoordinate> = self
            .nodes
            .keys()
            .filter(|c| !live.contains(c))
            .copied()
            .collect();

        for coordinate in &evicted {
            self.nodes.remove(coordinate);
            for kind in [LoadKind::Texture, LoadKind::Height] {
                if let Some(cancel) = self.pending.remove(&(*coordinate, kind)) {
                    cancel.cancel();
                }
            }
        }
        for coordinate in &live {
            if let Some(node) = self.nodes.get_mut(coordinate) {
                node.has_cached_children = false;
            }
        }
        self.outbox.retain(|r| !r.cancel.is_cancelled());

        if !evicted.is_empty() {
            log::debug!("evicted {} cached tiles", evicted.len());
        }
        evicted.len()
    }

    /// Loads issued and not yet applied.
    #[must_use]
    pub fn pending_loads(&self) -> usize {
        self.pending.len()
    }

    /// Loads issued since construction.
    #[must_use]
    pub fn requests_issued(&self) -> u64 {
        self.requests_issued
    }

    /// Snapshot of the tree's counters.
    #[must_use]
    pub fn stats(&self) -> TreeStats {
        TreeStats {
            nodes: self.nodes.len(),
            live: self.live_coordinates().len(),
            visible_surfaces: self.visible_surfaces().len(),
            pending_loads: self.pending.len(),
            requests_issued: self.requests_issued,
        }
    }
}

impl std::fmt::Debug for TileQuadtree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileQuadtree")
            .field("root", &self.root)
            .field("nodes", &self.nodes.len())
            .field("image_provider", &self.image_provider.name())
            .field("height_provider", &self.height_provider.as_ref().map(|p| p.name().to_string()))
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use geotile_provider::{DebugProvider, HeightRaster, RgbaImage};
    use glam::DVec2;

    use super::*;
    use crate::TileLoadError;

    fn imagery(max_zoom: u8) -> Arc<dyn TileProvider> {
        Arc::new(DebugProvider::checker().with_zoom_range(0, max_zoom).with_tile_size(4))
    }

    fn world() -> TileBounds {
        TileBounds::new(DVec2::new(-100.0, -100.0), DVec2::new(100.0, 100.0))
    }

    fn planar(max_zoom: u8) -> TileQuadtree {
        TileQuadtree::new(TileCoordinate::root(), world(), imagery(max_zoom), SurfaceKind::Planar)
    }

    fn success(request: &LoadRequest) -> LoadOutcome {
        let payload = match request.kind {
            LoadKind::Texture => LoadPayload::Texture(Arc::new(RgbaImage::new(1, 1))),
            LoadKind::Height => LoadPayload::Height(HeightRaster::flat(request.height.resolution)),
        };
        LoadOutcome {
            coordinate: request.coordinate,
            kind: request.kind,
            token: request.token,
            result: Ok(payload),
        }
    }

    fn failure(request: &LoadRequest) -> LoadOutcome {
        LoadOutcome {
            coordinate: request.coordinate,
            kind: request.kind,
            token: request.token,
            result: Err(TileLoadError::EmptyTile {
                coordinate: request.coordinate,
                kind: request.kind,
            }),
        }
    }

    /// Complete every outstanding request successfully; returns how many.
    fn fulfil(tree: &mut TileQuadtree) -> usize {
        let requests = tree.take_requests();
        for request in &requests {
            assert!(tree.apply(success(request)));
        }
        requests.len()
    }

    fn coords(tree: &TileQuadtree) -> Vec<TileCoordinate> {
        tree.visible_surfaces().iter().map(|n| n.coordinate()).collect()
    }

    #[test]
    fn test_root_loads_then_becomes_visible() {
        let mut tree = planar(5);
        assert!(tree.visible_surfaces().is_empty());
        assert_eq!(tree.pending_loads(), 1);
        assert_eq!(fulfil(&mut tree), 1);
        assert_eq!(coords(&tree), vec![TileCoordinate::root()]);
        let root = tree.node(&TileCoordinate::root()).unwrap();
        assert!(root.is_ready());
        assert!(root.texture().is_image());
    }

    #[test]
    fn test_subdivide_creates_quarter_children() {
        let mut tree = planar(5);
        fulfil(&mut tree);
        assert!(tree.subdivide(TileCoordinate::root()));

        let root = tree.node(&TileCoordinate::root()).unwrap();
        assert!(root.is_subdivided());
        let children = root.children().unwrap();
        let expected = [
            TileBounds::new(DVec2::new(-100.0, -100.0), DVec2::new(0.0, 0.0)),
            TileBounds::new(DVec2::new(0.0, -100.0), DVec2::new(100.0, 0.0)),
            TileBounds::new(DVec2::new(-100.0, 0.0), DVec2::new(0.0, 100.0)),
            TileBounds::new(DVec2::new(0.0, 0.0), DVec2::new(100.0, 100.0)),
        ];
        for (child, bounds) in children.iter().zip(expected) {
            let node = tree.node(child).unwrap();
            assert_eq!(*node.bounds(), bounds);
            assert_eq!(node.parent(), Some(TileCoordinate::root()));
            assert!(!node.is_visible());
        }
        // Root keeps drawing until its children arrive.
        assert_eq!(coords(&tree), vec![TileCoordinate::root()]);
        assert_eq!(tree.take_requests().len(), 4);
    }

    #[test]
    fn test_web_mercator_subdivision_scenario() {
        let root = TileCoordinate::new(7, 20, 49);
        let mut tree = TileQuadtree::new(root, TileBounds::web_mercator(&root), imagery(19), SurfaceKind::Planar);
        fulfil(&mut tree);
        assert!(tree.subdivide(root));

        let children = tree.node(&root).unwrap().children().unwrap();
        assert_eq!(
            children,
            [
                TileCoordinate::new(8, 40, 98),
                TileCoordinate::new(8, 41, 98),
                TileCoordinate::new(8, 40, 99),
                TileCoordinate::new(8, 41, 99),
            ]
        );
        for child in children {
            let actual = tree.node(&child).unwrap().bounds();
            let expected = TileBounds::web_mercator(&child);
            assert!((actual.min - expected.min).abs().max_element() < 1e-6);
            assert!((actual.max - expected.max).abs().max_element() < 1e-6);
        }
    }

    #[test]
    fn test_three_of_four_children_stay_hidden() {
        let mut tree = planar(5);
        fulfil(&mut tree);
        tree.subdivide(TileCoordinate::root());
        let requests = tree.take_requests();

        for request in &requests[..3] {
            tree.apply(success(request));
        }
        let root = tree.node(&TileCoordinate::root()).unwrap();
        assert_eq!(root.loaded_child_count(), 3);
        assert!(root.draws_surface());
        assert_eq!(coords(&tree), vec![TileCoordinate::root()]);

        tree.apply(success(&requests[3]));
        let root = tree.node(&TileCoordinate::root()).unwrap();
        assert_eq!(root.loaded_child_count(), 4);
        assert!(!root.is_surface_shown());
        assert_eq!(coords(&tree), root.children().unwrap().to_vec());
    }

    #[test]
    fn test_failed_load_shows_placeholder_and_still_reveals() {
        let mut tree = planar(5);
        fulfil(&mut tree);
        tree.subdivide(TileCoordinate::root());
        let requests = tree.take_requests();
        tree.apply(failure(&requests[0]));
        for request in &requests[1..] {
            tree.apply(success(request));
        }

        let broken = tree.node(&requests[0].coordinate).unwrap();
        assert!(matches!(broken.texture(), TileTexture::Placeholder));
        assert_eq!(broken.load_state(LoadKind::Texture), LoadState::Failed);
        assert_eq!(tree.visible_surfaces().len(), 4);
    }

    #[test]
    fn test_child_subdivision_waits_for_siblings() {
        let mut tree = planar(5);
        fulfil(&mut tree);
        tree.subdivide(TileCoordinate::root());
        let requests = tree.take_requests();
        tree.apply(success(&requests[0]));

        let first = requests[0].coordinate;
        assert!(!tree.subdivide(first));

        for request in &requests[1..] {
            tree.apply(success(request));
        }
        assert!(tree.subdivide(first));
    }

    #[test]
    fn test_max_zoom_stops_subdivision() {
        let mut tree = planar(1);
        fulfil(&mut tree);
        assert!(tree.subdivide(TileCoordinate::root()));
        fulfil(&mut tree);
        let child = TileCoordinate::new(1, 0, 0);
        assert!(!tree.subdivide(child));
        assert!(tree.node(&child).unwrap().children().is_none());
        assert!(tree.take_requests().is_empty());
    }

    #[test]
    fn test_height_provider_lowers_max_zoom() {
        let tree = TileQuadtree::new(
            TileCoordinate::root(),
            world(),
            imagery(18),
            SurfaceKind::Height {
                provider: Arc::new(DebugProvider::terrain().with_zoom_range(0, 12)),
                settings: HeightSettings::default(),
            },
        );
        assert_eq!(tree.max_zoom(), 12);
    }

    #[test]
    fn test_simplify_caches_and_restore_issues_no_requests() {
        let mut tree = planar(5);
        fulfil(&mut tree);
        tree.subdivide(TileCoordinate::root());
        fulfil(&mut tree);
        let issued = tree.requests_issued();

        assert!(tree.simplify(TileCoordinate::root()));
        let root = tree.node(&TileCoordinate::root()).unwrap();
        assert!(root.has_cached_children());
        assert_eq!(root.loaded_child_count(), 0);
        assert!(!root.is_subdivided());
        assert_eq!(coords(&tree), vec![TileCoordinate::root()]);
        assert_eq!(tree.stats().nodes, 5);
        assert_eq!(tree.stats().live, 1);

        assert!(tree.subdivide(TileCoordinate::root()));
        assert!(tree.take_requests().is_empty());
        assert_eq!(tree.requests_issued(), issued);
        let root = tree.node(&TileCoordinate::root()).unwrap();
        assert_eq!(root.loaded_child_count(), 4);
        assert!(!root.is_surface_shown());
        assert_eq!(tree.visible_surfaces().len(), 4);
    }

    #[test]
    fn test_children_loaded_while_cached_are_counted_on_restore() {
        let mut tree = planar(5);
        fulfil(&mut tree);
        tree.subdivide(TileCoordinate::root());
        let requests = tree.take_requests();
        tree.apply(success(&requests[0]));
        tree.simplify(TileCoordinate::root());

        // Remaining children finish while cached; nothing is revealed.
        for request in &requests[1..] {
            assert!(tree.apply(success(request)));
        }
        assert_eq!(coords(&tree), vec![TileCoordinate::root()]);

        tree.subdivide(TileCoordinate::root());
        assert_eq!(tree.node(&TileCoordinate::root()).unwrap().loaded_child_count(), 4);
        assert_eq!(tree.visible_surfaces().len(), 4);
    }

    #[test]
    fn test_partially_loaded_cache_keeps_parent_drawn() {
        let mut tree = planar(5);
        fulfil(&mut tree);
        tree.subdivide(TileCoordinate::root());
        let requests = tree.take_requests();
        tree.simplify(TileCoordinate::root());
        tree.apply(success(&requests[0]));
        tree.subdivide(TileCoordinate::root());

        let root = tree.node(&TileCoordinate::root()).unwrap();
        assert_eq!(root.loaded_child_count(), 1);
        assert!(root.draws_surface());

        for request in &requests[1..] {
            tree.apply(success(request));
        }
        assert_eq!(tree.visible_surfaces().len(), 4);
    }

    #[test]
    fn test_operations_are_idempotent() {
        let mut tree = planar(5);
        assert!(!tree.simplify(TileCoordinate::root()));
        fulfil(&mut tree);
        assert!(!tree.mark_ready(TileCoordinate::root()));
        assert!(tree.subdivide(TileCoordinate::root()));
        assert!(!tree.subdivide(TileCoordinate::root()));
        assert_eq!(tree.take_requests().len(), 4);
        assert!(tree.simplify(TileCoordinate::root()));
        assert!(!tree.simplify(TileCoordinate::root()));
    }

    #[test]
    fn test_unknown_coordinates_are_ignored() {
        let mut tree = planar(5);
        let stranger = TileCoordinate::new(3, 1, 1);
        assert!(!tree.subdivide(stranger));
        assert!(!tree.simplify(stranger));
        assert!(!tree.mark_ready(stranger));
        assert!(!tree.is_live(&stranger));
    }

    #[test]
    fn test_set_same_provider_is_noop() {
        let provider = imagery(5);
        let mut tree = TileQuadtree::new(TileCoordinate::root(), world(), provider.clone(), SurfaceKind::Planar);
        fulfil(&mut tree);
        assert!(!tree.set_image_provider(provider));
        assert!(tree.take_requests().is_empty());
    }

    #[test]
    fn test_provider_swap_evicts_cache_and_reloads_live_nodes() {
        let mut tree = planar(5);
        fulfil(&mut tree);
        tree.subdivide(TileCoordinate::root());
        fulfil(&mut tree);
        tree.simplify(TileCoordinate::root());
        assert_eq!(tree.stats().nodes, 5);

        assert!(tree.set_image_provider(imagery(6)));
        assert_eq!(tree.stats().nodes, 1);
        let root = tree.node(&TileCoordinate::root()).unwrap();
        assert!(!root.has_cached_children());
        // Still drawn with the old texture while the new one loads.
        assert!(root.is_ready());
        assert!(root.texture().is_image());
        assert_eq!(root.load_state(LoadKind::Texture), LoadState::Pending);

        let requests = tree.take_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].provider.max_zoom(), 6);
        assert!(tree.subdivide(TileCoordinate::root()));
        assert_eq!(tree.take_requests().len(), 4);
    }

    #[test]
    fn test_stale_results_are_dropped() {
        let mut tree = planar(5);
        let old = tree.take_requests();
        tree.set_image_provider(imagery(5));
        let new = tree.take_requests();

        assert!(old[0].cancel.is_cancelled());
        assert!(!tree.apply(success(&old[0])));
        assert!(!tree.node(&TileCoordinate::root()).unwrap().is_ready());
        assert!(tree.apply(success(&new[0])));
        assert!(tree.node(&TileCoordinate::root()).unwrap().is_ready());
    }

    #[test]
    fn test_results_for_evicted_nodes_are_dropped() {
        let mut tree = planar(5);
        fulfil(&mut tree);
        tree.subdivide(TileCoordinate::root());
        let requests = tree.take_requests();
        tree.simplify(TileCoordinate::root());
        tree.evict_cached();

        assert!(requests.iter().all(|r| r.cancel.is_cancelled()));
        assert!(!tree.apply(success(&requests[0])));
        assert_eq!(tree.pending_loads(), 0);
    }

    #[test]
    fn test_requeue_keeps_order_and_drops_superseded() {
        let mut tree = planar(5);
        fulfil(&mut tree);
        tree.subdivide(TileCoordinate::root());
        let mut requests = tree.take_requests();
        let last = requests.pop().unwrap();
        tree.load_texture(last.coordinate);
        tree.requeue(requests.clone());

        let again = tree.take_requests();
        let order: Vec<_> = again.iter().map(|r| r.coordinate).collect();
        let mut expected: Vec<_> = requests.iter().map(|r| r.coordinate).collect();
        expected.push(last.coordinate);
        assert_eq!(order, expected);
    }

    #[test]
    fn test_height_tree_needs_both_loads() {
        let mut tree = TileQuadtree::new(
            TileCoordinate::root(),
            world(),
            imagery(5),
            SurfaceKind::Height {
                provider: Arc::new(DebugProvider::terrain()),
                settings: HeightSettings {
                    resolution: 5,
                    ..Default::default()
                },
            },
        );
        let requests = tree.take_requests();
        assert_eq!(requests.len(), 2);

        let texture = requests.iter().find(|r| r.kind == LoadKind::Texture).unwrap();
        let height = requests.iter().find(|r| r.kind == LoadKind::Height).unwrap();
        tree.apply(success(texture));
        assert!(!tree.node(&TileCoordinate::root()).unwrap().is_ready());

        tree.apply(success(height));
        let root = tree.node(&TileCoordinate::root()).unwrap();
        assert!(root.is_ready());
        assert_eq!(root.geometry().segments(), 4);
        assert_eq!(coords(&tree), vec![TileCoordinate::root()]);
    }

    #[test]
    fn test_removing_height_provider_settles_waiting_nodes() {
        let mut tree = TileQuadtree::new(
            TileCoordinate::root(),
            world(),
            imagery(5),
            SurfaceKind::Height {
                provider: Arc::new(DebugProvider::terrain()),
                settings: HeightSettings::default(),
            },
        );
        let requests = tree.take_requests();
        let texture = requests.iter().find(|r| r.kind == LoadKind::Texture).unwrap();
        tree.apply(success(texture));
        assert!(!tree.node(&TileCoordinate::root()).unwrap().is_ready());

        assert!(tree.set_height_provider(None));
        let root = tree.node(&TileCoordinate::root()).unwrap();
        assert!(root.is_ready());
        assert_eq!(root.load_state(LoadKind::Height), LoadState::NotRequired);
        assert!(tree.take_requests().is_empty());
        assert!(!tree.set_height_provider(None));
    }

    #[test]
    fn test_live_coordinates_follow_live_links_only() {
        let mut tree = planar(5);
        fulfil(&mut tree);
        tree.subdivide(TileCoordinate::root());
        fulfil(&mut tree);
        let child = TileCoordinate::new(1, 1, 1);
        assert!(tree.subdivide(child));
        fulfil(&mut tree);
        assert_eq!(tree.live_coordinates().len(), 9);
        assert!(tree.is_live(&TileCoordinate::new(2, 3, 3)));

        tree.simplify(TileCoordinate::root());
        assert_eq!(tree.live_coordinates(), vec![TileCoordinate::root()]);
        assert!(!tree.is_live(&TileCoordinate::new(2, 3, 3)));
        assert_eq!(tree.stats().nodes, 9);
    }

    #[test]
    fn test_undecodable_height_settings_never_reach_requests() {
        let single = HeightSettings {
            resolution: 1,
            ..Default::default()
        };
        let mut tree = TileQuadtree::new(
            TileCoordinate::root(),
            world(),
            imagery(5),
            SurfaceKind::Height {
                provider: Arc::new(DebugProvider::terrain()),
                settings: single,
            },
        );
        assert_eq!(tree.height_settings(), HeightSettings::default());
        let requests = tree.take_requests();
        let height = requests.iter().find(|r| r.kind == LoadKind::Height).unwrap();
        assert_eq!(height.height, HeightSettings::default());

        assert!(!tree.set_height_settings(single));
        assert_eq!(tree.height_settings(), HeightSettings::default());
        assert!(tree.take_requests().is_empty());
    }
}
