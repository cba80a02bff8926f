//! Level-of-detail control for a [`TileQuadtree`](geotile_tree::TileQuadtree):
//! camera rays, surface hit-testing, and the strategies that turn hits or
//! distances into subdivide/simplify decisions.

mod camera;
mod controller;
mod error;
mod radial;
mod ray;
mod raycast;
mod settings;
mod strategy;

pub use camera::{Camera, Projection};
pub use controller::LodRaycast;
pub use error::LodError;
pub use radial::LodRadial;
pub use ray::Ray;
pub use raycast::{SurfaceHit, raycast_surfaces};
pub use settings::{LodSettings, RadialSettings};
pub use strategy::{LodAction, LodStrategy};
