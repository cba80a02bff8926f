//! Messages exchanged between the quadtree and the loader pool.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use geotile_coords::TileCoordinate;
use geotile_provider::{HeightDecoder, HeightRaster, ProviderError, RgbaImage, TileProvider};

/// Which of a node's two loads a message refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadKind {
    /// Surface imagery.
    Texture,
    /// Elevation for the surface mesh.
    Height,
}

impl fmt::Display for LoadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoadKind::Texture => "texture",
            LoadKind::Height => "height",
        })
    }
}

/// How elevation tiles become mesh heights.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeightSettings {
    /// RGB packing of the height tiles.
    pub decoder: HeightDecoder,
    /// Samples per side of the decoded raster.
    pub resolution: usize,
    /// Multiplier applied to decoded elevations.
    pub exaggeration: f64,
}

impl Default for HeightSettings {
    fn default() -> Self {
        Self {
            decoder: HeightDecoder::default(),
            resolution: HeightRaster::DEFAULT_RESOLUTION,
            exaggeration: 1.0,
        }
    }
}

impl HeightSettings {
    /// Fewest samples per side a decoded raster can have.
    pub const MIN_RESOLUTION: usize = 2;

    /// Check that height tiles can be decoded with these settings.
    ///
    /// # Errors
    ///
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), InvalidHeightSettings> {
        if self.resolution < Self::MIN_RESOLUTION {
            return Err(InvalidHeightSettings::Resolution(self.resolution));
        }
        if !self.exaggeration.is_finite() {
            return Err(InvalidHeightSettings::Exaggeration(self.exaggeration));
        }
        Ok(())
    }
}

/// Rejected [`HeightSettings`].
#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
pub enum InvalidHeightSettings {
    #[error("height resolution {0} is below the minimum of {min}", min = HeightSettings::MIN_RESOLUTION)]
    Resolution(usize),

    #[error("height exaggeration {0} is not finite")]
    Exaggeration(f64),
}

/// Shared flag that tells a worker its result is no longer wanted.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every clone of this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether [`cancel`](Self::cancel) has been called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One fetch the quadtree wants performed.
#[derive(Clone, Debug)]
pub struct LoadRequest {
    /// Tile to fetch.
    pub coordinate: TileCoordinate,
    /// Texture or elevation.
    pub kind: LoadKind,
    /// Per-node sequence number; results with an older token are stale.
    pub token: u64,
    /// Provider to fetch from, captured when the request was issued.
    pub provider: Arc<dyn TileProvider>,
    /// Decoding parameters for [`LoadKind::Height`].
    pub height: HeightSettings,
    /// Set when the owning node is evicted or reloaded.
    pub cancel: CancelToken,
}

/// Decoded result of a successful load.
#[derive(Clone, Debug)]
pub enum LoadPayload {
    /// Imagery for the node's surface.
    Texture(Arc<RgbaImage>),
    /// Elevation samples for the node's mesh.
    Height(HeightRaster),
}

/// Completed load, successful or not, travelling back to the quadtree.
#[derive(Debug)]
pub struct LoadOutcome {
    /// Tile the request was for.
    pub coordinate: TileCoordinate,
    /// Texture or elevation.
    pub kind: LoadKind,
    /// Token copied from the request.
    pub token: u64,
    /// Decoded payload or the reason the load gave up.
    pub result: Result<LoadPayload, TileLoadError>,
}

/// Why a tile load produced no payload.
#[derive(Debug, thiserror::Error)]
pub enum TileLoadError {
    /// The provider failed on every attempt.
    #[error("{kind} load for tile {coordinate} failed after {attempts} attempt(s): {source}")]
    Provider {
        coordinate: TileCoordinate,
        kind: LoadKind,
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    /// The provider returned a zero-sized image.
    #[error("{kind} tile {coordinate} is empty")]
    EmptyTile {
        coordinate: TileCoordinate,
        kind: LoadKind,
    },

    /// The request carried height settings no raster can be decoded with.
    #[error("height tile {coordinate} cannot be decoded: {source}")]
    InvalidSettings {
        coordinate: TileCoordinate,
        #[source]
        source: InvalidHeightSettings,
    },

    /// Fetching or decoding panicked on the worker thread.
    #[error("{kind} load for tile {coordinate} panicked: {message}")]
    Panicked {
        coordinate: TileCoordinate,
        kind: LoadKind,
        message: String,
    },
}

impl TileLoadError {
    /// Tile the failed load was for.
    #[must_use]
    pub fn coordinate(&self) -> TileCoordinate {
        match self {
            TileLoadError::Provider { coordinate, .. }
            | TileLoadError::EmptyTile { coordinate, .. }
            | TileLoadError::InvalidSettings { coordinate, .. }
            | TileLoadError::Panicked { coordinate, .. } => *coordinate,
        }
    }
}
