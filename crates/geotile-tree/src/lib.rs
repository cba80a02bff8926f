//! Streaming tile quadtree: an arena of [`TileNode`]s keyed by coordinate,
//! asynchronous texture/elevation loading on a worker pool, and all-or-nothing
//! reveal of subdivided children.

mod geometry;
mod load;
mod loader;
mod node;
mod quadtree;
mod streamer;

pub use geometry::TileGeometry;
pub use load::{
    CancelToken, HeightSettings, InvalidHeightSettings, LoadKind, LoadOutcome, LoadPayload, LoadRequest,
    TileLoadError,
};
pub use loader::{LoaderSettings, TileLoader};
pub use node::{LoadState, TileNode, TileTexture};
pub use quadtree::{SurfaceKind, TileQuadtree, TreeStats};
pub use streamer::{PumpStats, TileStreamer};
