//! Glue between a [`TileQuadtree`] and a [`TileLoader`].

use crate::{TileLoader, TileQuadtree};

/// What one [`TileStreamer::pump`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Requests handed to the loader.
    pub submitted: usize,
    /// Requests put back because the loader queue was full.
    pub deferred: usize,
    /// Results applied to the tree.
    pub applied: usize,
    /// Results dropped as stale.
    pub stale: usize,
}

/// Owns a tree and the loader that feeds it.
pub struct TileStreamer {
    tree: TileQuadtree,
    loader: TileLoader,
}

impl TileStreamer {
    pub fn new(tree: TileQuadtree, loader: TileLoader) -> Self {
        Self { tree, loader }
    }

    pub fn tree(&self) -> &TileQuadtree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut TileQuadtree {
        &mut self.tree
    }

    pub fn loader(&self) -> &TileLoader {
        &self.loader
    }

    /// Submit the tree's outstanding requests and apply finished results.
    /// Call once per tick.
    pub fn pump(&mut self) -> PumpStats {
        let mut stats = PumpStats::default();

        let mut deferred = Vec::new();
        for request in self.tree.take_requests() {
            match self.loader.submit(request) {
                Ok(()) => stats.submitted += 1,
                Err(request) => deferred.push(request),
            }
        }
        stats.deferred = deferred.len();
        if !deferred.is_empty() {
            log::debug!("loader queue full, deferring {} requests", deferred.len());
            self.tree.requeue(deferred);
        }

        for outcome in self.loader.drain_results() {
            if self.tree.apply(outcome) {
                stats.applied += 1;
            } else {
                stats.stale += 1;
            }
        }
        stats
    }

    /// Whether requests are still queued, in flight, or unapplied.
    pub fn is_busy(&self) -> bool {
        self.loader.in_flight_count() > 0 || self.tree.pending_loads() > 0
    }

    /// Split into the tree and the loader.
    pub fn into_parts(self) -> (TileQuadtree, TileLoader) {
        (self.tree, self.loader)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use geotile_coords::{TileBounds, TileCoordinate};
    use geotile_provider::{DebugProvider, ProviderError, RetryPolicy, RgbaImage, TileProvider};

    use super::*;
    use crate::{LoaderSettings, SurfaceKind};

    /// Checker tiles, counting every fetch.
    struct Counting {
        inner: DebugProvider,
        fetches: AtomicUsize,
    }

    impl TileProvider for Counting {
        fn name(&self) -> &str {
            "counting"
        }
        fn min_zoom(&self) -> u8 {
            self.inner.min_zoom()
        }
        fn max_zoom(&self) -> u8 {
            self.inner.max_zoom()
        }
        fn fetch_tile(&self, coordinate: &TileCoordinate) -> Result<RgbaImage, ProviderError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_tile(coordinate)
        }
    }

    fn streamer(queue_capacity: usize) -> TileStreamer {
        streamer_with(Arc::new(DebugProvider::checker().with_tile_size(4)), queue_capacity)
    }

    fn streamer_with(provider: Arc<dyn TileProvider>, queue_capacity: usize) -> TileStreamer {
        let tree = TileQuadtree::new(TileCoordinate::root(), TileBounds::world(), provider, SurfaceKind::Planar);
        let loader = TileLoader::new(LoaderSettings {
            worker_threads: 2,
            queue_capacity,
            result_capacity: 16,
            retry: RetryPolicy::none(),
        })
        .unwrap();
        TileStreamer::new(tree, loader)
    }

    fn pump_until_idle(streamer: &mut TileStreamer) {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            streamer.pump();
            if !streamer.is_busy() || Instant::now() > deadline {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_pump_loads_root_and_children() {
        let mut streamer = streamer(16);
        pump_until_idle(&mut streamer);
        assert_eq!(streamer.tree().visible_surfaces().len(), 1);

        assert!(streamer.tree_mut().subdivide(TileCoordinate::root()));
        pump_until_idle(&mut streamer);
        assert_eq!(streamer.tree().visible_surfaces().len(), 4);
        assert_eq!(streamer.tree().pending_loads(), 0);
    }

    #[test]
    fn test_full_queue_defers_requests() {
        let mut streamer = streamer(1);
        pump_until_idle(&mut streamer);
        streamer.tree_mut().subdivide(TileCoordinate::root());

        let first = streamer.pump();
        assert!(first.submitted >= 1);
        assert_eq!(first.submitted + first.deferred, 4);

        pump_until_idle(&mut streamer);
        assert_eq!(streamer.tree().visible_surfaces().len(), 4);
    }

    #[test]
    fn test_restoring_cached_children_fetches_nothing() {
        let provider = Arc::new(Counting {
            inner: DebugProvider::checker().with_tile_size(4),
            fetches: AtomicUsize::new(0),
        });
        let mut streamer = streamer_with(provider.clone(), 16);
        pump_until_idle(&mut streamer);
        assert!(streamer.tree_mut().subdivide(TileCoordinate::root()));
        pump_until_idle(&mut streamer);
        assert_eq!(streamer.tree().visible_surfaces().len(), 4);
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 5);

        assert!(streamer.tree_mut().simplify(TileCoordinate::root()));
        pump_until_idle(&mut streamer);
        assert_eq!(streamer.tree().visible_surfaces().len(), 1);

        assert!(streamer.tree_mut().subdivide(TileCoordinate::root()));
        let restored = streamer.pump();
        assert_eq!(restored.submitted, 0);
        pump_until_idle(&mut streamer);
        assert_eq!(streamer.tree().visible_surfaces().len(), 4);
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 5);
    }
}
