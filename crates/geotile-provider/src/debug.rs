//! Locally synthesised tiles for offline runs and tests.

use geotile_coords::TileCoordinate;
use image::{Rgba, RgbaImage};

use crate::{ProviderError, TileProvider, encode_terrain_rgb, ensure_in_range};

/// What a [`DebugProvider`] draws.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebugPattern {
    /// Flat colour keyed by coordinate, alternating brightness, dark border.
    Checker,
    /// Terrain-RGB encoded rolling hills, continuous across tile edges.
    Terrain,
}

/// Provider that renders tiles in memory instead of fetching them.
#[derive(Clone, Debug)]
pub struct DebugProvider {
    pattern: DebugPattern,
    tile_size: u32,
    min_zoom: u8,
    max_zoom: u8,
}

impl DebugProvider {
    /// Border thickness of checker tiles, in pixels.
    const BORDER: u32 = 2;

    /// Peak amplitude of the synthetic terrain, in metres.
    const TERRAIN_AMPLITUDE: f64 = 1500.0;

    /// Checker imagery, 256 px tiles, zoom 0..=20.
    #[must_use]
    pub fn checker() -> Self {
        Self {
            pattern: DebugPattern::Checker,
            tile_size: 256,
            min_zoom: 0,
            max_zoom: 20,
        }
    }

    /// Synthetic elevation, 65 px tiles, zoom 0..=15.
    #[must_use]
    pub fn terrain() -> Self {
        Self {
            pattern: DebugPattern::Terrain,
            tile_size: 65,
            min_zoom: 0,
            max_zoom: 15,
        }
    }

    /// Override the served zoom range.
    #[must_use]
    pub fn with_zoom_range(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    /// Override the tile edge length in pixels.
    #[must_use]
    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size.max(1);
        self
    }

    /// The pattern this provider draws.
    #[must_use]
    pub fn pattern(&self) -> DebugPattern {
        self.pattern
    }

    fn render_checker(&self, coordinate: &TileCoordinate) -> RgbaImage {
        let size = self.tile_size;
        let hue = (u64::from(coordinate.level) * 47
            + u64::from(coordinate.x) * 13
            + u64::from(coordinate.y) * 29)
            % 360;
        let mut fill = hue_to_rgb(hue as f64);
        if (coordinate.x + coordinate.y) % 2 == 1 {
            fill = fill.map(|c| c / 2 + 64);
        }
        let fill = Rgba([fill[0], fill[1], fill[2], 255]);
        let border = Rgba([24, 24, 24, 255]);

        RgbaImage::from_fn(size, size, |px, py| {
            let edge = px < Self::BORDER
                || py < Self::BORDER
                || px + Self::BORDER >= size
                || py + Self::BORDER >= size;
            if edge { border } else { fill }
        })
    }

    fn render_terrain(&self, coordinate: &TileCoordinate) -> RgbaImage {
        let size = self.tile_size;
        let grid = f64::from(TileCoordinate::grid_size(coordinate.level));
        let span = f64::from(size.saturating_sub(1).max(1));

        RgbaImage::from_fn(size, size, |px, py| {
            // Normalised map position in [0, 1]; shared edges sample the same point.
            let u = (f64::from(coordinate.x) + f64::from(px) / span) / grid;
            let v = (f64::from(coordinate.y) + f64::from(py) / span) / grid;
            let tau = std::f64::consts::TAU;
            let h = Self::TERRAIN_AMPLITUDE
                * (0.5 + 0.5 * (u * tau * 6.0).sin() * (v * tau * 4.0).cos());
            let [r, g, b] = encode_terrain_rgb(h);
            Rgba([r, g, b, 255])
        })
    }
}

/// Fully saturated colour for a hue in degrees.
fn hue_to_rgb(hue: f64) -> [u8; 3] {
    let h = (hue % 360.0) / 60.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    let (r, g, b) = match h as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    [(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8]
}

impl TileProvider for DebugProvider {
    fn name(&self) -> &str {
        match self.pattern {
            DebugPattern::Checker => "debug-checker",
            DebugPattern::Terrain => "debug-terrain",
        }
    }

    fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    fn fetch_tile(&self, coordinate: &TileCoordinate) -> Result<RgbaImage, ProviderError> {
        ensure_in_range(self, coordinate)?;
        Ok(match self.pattern {
            DebugPattern::Checker => self.render_checker(coordinate),
            DebugPattern::Terrain => self.render_terrain(coordinate),
        })
    }
}
