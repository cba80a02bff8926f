//! The tile provider capability interface and TileJSON-style metadata.

use geotile_coords::TileCoordinate;
use image::RgbaImage;
use serde::Deserialize;

use crate::ProviderError;

/// Descriptive metadata for a tile source.
///
/// Field names follow TileJSON so provider metadata endpoints can be
/// deserialised directly. Only used for display and configuration, never for
/// LOD decisions.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct TileMetadata {
    /// Human-readable source name.
    pub name: String,
    /// Lowest zoom level served.
    #[serde(rename = "minzoom")]
    pub min_zoom: u8,
    /// Highest zoom level served.
    #[serde(rename = "maxzoom")]
    pub max_zoom: u8,
    /// `[west, south, east, north]` in degrees.
    pub bounds: [f64; 4],
    /// `[longitude, latitude, zoom]` of the suggested initial view.
    pub center: [f64; 3],
}

impl Default for TileMetadata {
    fn default() -> Self {
        Self {
            name: String::new(),
            min_zoom: 0,
            max_zoom: 22,
            bounds: [-180.0, -85.051_128_779_806_59, 180.0, 85.051_128_779_806_59],
            center: [0.0, 0.0, 0.0],
        }
    }
}

impl TileMetadata {
    /// Whole-world metadata for a provider with the given zoom range.
    #[must_use]
    pub fn from_zoom_range(name: &str, min_zoom: u8, max_zoom: u8) -> Self {
        Self {
            name: name.to_string(),
            min_zoom,
            max_zoom,
            center: [0.0, 0.0, f64::from(min_zoom)],
            ..Default::default()
        }
    }
}

/// A source of map tiles addressed by `(level, x, y)`.
///
/// Implementations are shared between the main thread and loader workers as
/// `Arc<dyn TileProvider>`; [`fetch_tile`](Self::fetch_tile) blocks and is
/// only ever called from worker threads. Providers carry no retry or cache
/// layer of their own.
pub trait TileProvider: Send + Sync {
    /// Name for logs and metadata.
    fn name(&self) -> &str;

    /// Lowest zoom level this provider serves.
    fn min_zoom(&self) -> u8;

    /// Highest zoom level this provider serves. Bounds quadtree depth.
    fn max_zoom(&self) -> u8;

    /// Fetch and decode the tile at `coordinate`.
    fn fetch_tile(&self, coordinate: &TileCoordinate) -> Result<RgbaImage, ProviderError>;

    /// Source metadata. Defaults to whole-world bounds over the zoom range.
    fn metadata(&self) -> Result<TileMetadata, ProviderError> {
        Ok(TileMetadata::from_zoom_range(
            self.name(),
            self.min_zoom(),
            self.max_zoom(),
        ))
    }
}

impl std::fmt::Debug for dyn TileProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileProvider")
            .field("name", &self.name())
            .field("min_zoom", &self.min_zoom())
            .field("max_zoom", &self.max_zoom())
            .finish()
    }
}

/// Reject coordinates outside `provider`'s zoom range.
pub fn ensure_in_range(
    provider: &dyn TileProvider,
    coordinate: &TileCoordinate,
) -> Result<(), ProviderError> {
    let (min_zoom, max_zoom) = (provider.min_zoom(), provider.max_zoom());
    if (min_zoom..=max_zoom).contains(&coordinate.level) {
        Ok(())
    } else {
        Err(ProviderError::OutOfRange {
            coordinate: *coordinate,
            min_zoom,
            max_zoom,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl TileProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        fn min_zoom(&self) -> u8 {
            2
        }
        fn max_zoom(&self) -> u8 {
            9
        }
        fn fetch_tile(&self, coordinate: &TileCoordinate) -> Result<RgbaImage, ProviderError> {
            ensure_in_range(self, coordinate)?;
            Ok(RgbaImage::new(1, 1))
        }
    }

    #[test]
    fn test_default_metadata_uses_zoom_range() {
        let meta = Fixed.metadata().unwrap();
        assert_eq!(meta.name, "fixed");
        assert_eq!(meta.min_zoom, 2);
        assert_eq!(meta.max_zoom, 9);
        assert_eq!(meta.bounds[0], -180.0);
    }

    #[test]
    fn test_ensure_in_range() {
        assert!(Fixed.fetch_tile(&TileCoordinate::new(2, 0, 0)).is_ok());
        assert!(matches!(
            Fixed.fetch_tile(&TileCoordinate::new(1, 0, 0)),
            Err(ProviderError::OutOfRange { .. })
        ));
        assert!(Fixed.fetch_tile(&TileCoordinate::new(10, 0, 0)).is_err());
    }

    /// TileJSON documents deserialize with missing fields defaulted.
    #[test]
    fn test_tilejson_deserialization() {
        let json = r#"{
            "tilejson": "2.2.0",
            "name": "Satellite",
            "minzoom": 0,
            "maxzoom": 18,
            "bounds": [-10.0, 35.0, 5.0, 45.0]
        }"#;
        let meta: TileMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.name, "Satellite");
        assert_eq!(meta.max_zoom, 18);
        assert_eq!(meta.bounds, [-10.0, 35.0, 5.0, 45.0]);
        assert_eq!(meta.center, [0.0, 0.0, 0.0]);
    }
}
