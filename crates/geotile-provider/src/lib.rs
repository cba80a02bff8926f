//! Tile sources: the [`TileProvider`] capability trait, concrete imagery and
//! elevation providers, elevation decoding, and retry policy for fetches.

mod debug;
mod error;
mod height;
mod provider;
mod retry;
mod url_template;

pub use debug::{DebugPattern, DebugProvider};
pub use error::ProviderError;
pub use height::{HeightDecoder, HeightRaster, encode_terrain_rgb};
pub use image::{Rgba, RgbaImage};
pub use provider::{TileMetadata, TileProvider, ensure_in_range};
pub use retry::{Attempted, RetryPolicy, RetryState, retry_with_backoff};
pub use url_template::UrlTemplateProvider;
