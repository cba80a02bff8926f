//! Tile addressing for a recursively subdivided map: `(level, x, y)` coordinates,
//! web-mercator units, and tile footprints in world space.

mod bounds;
pub mod mercator;
mod tile_coord;

pub use bounds::TileBounds;
pub use tile_coord::{Quadrant, TileCoordinate};
