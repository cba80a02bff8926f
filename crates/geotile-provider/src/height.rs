//! Elevation decoding from RGB-encoded height tiles.

use image::RgbaImage;

/// How elevation is packed into the RGB channels of a height tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HeightDecoder {
    /// `(R * 65536 + G * 256 + B) * scale + offset` (Mapbox terrain-RGB).
    TerrainRgb {
        /// Metres per encoded unit.
        scale: f64,
        /// Elevation of encoded value zero, in metres.
        offset: f64,
    },
    /// `(R * 256 + G + B / 256) - 32768` (Mapzen/AWS terrarium).
    Terrarium,
}

impl Default for HeightDecoder {
    fn default() -> Self {
        HeightDecoder::TerrainRgb {
            scale: 0.1,
            offset: -10_000.0,
        }
    }
}

impl HeightDecoder {
    /// Elevation in metres for one pixel.
    #[must_use]
    pub fn decode(&self, [r, g, b]: [u8; 3]) -> f64 {
        let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));
        match *self {
            HeightDecoder::TerrainRgb { scale, offset } => (r * 65_536.0 + g * 256.0 + b) * scale + offset,
            HeightDecoder::Terrarium => r * 256.0 + g + b / 256.0 - 32_768.0,
        }
    }
}

/// Encode an elevation with the default terrain-RGB packing.
///
/// Values outside the representable range saturate.
#[must_use]
pub fn encode_terrain_rgb(height: f64) -> [u8; 3] {
    let value = ((height + 10_000.0) / 0.1).round().clamp(0.0, 16_777_215.0) as u32;
    [(value >> 16) as u8, (value >> 8) as u8, value as u8]
}

/// A square grid of elevations sampled from a height tile.
///
/// Row 0 is the northern edge of the tile, column 0 the western edge.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightRaster {
    resolution: usize,
    heights: Vec<f64>,
}

impl HeightRaster {
    /// Default samples per side: 32 segments plus the closing edge.
    pub const DEFAULT_RESOLUTION: usize = 33;

    /// A raster of zero elevation.
    ///
    /// # Panics
    ///
    /// Panics if `resolution < 2`.
    #[must_use]
    pub fn flat(resolution: usize) -> Self {
        assert!(resolution >= 2, "height raster needs at least 2 samples per side");
        Self {
            resolution,
            heights: vec![0.0; resolution * resolution],
        }
    }

    /// Sample `image` on a `resolution × resolution` grid (nearest pixel),
    /// decode each sample and scale it by `exaggeration`.
    ///
    /// # Panics
    ///
    /// Panics if `resolution < 2` or the image is empty.
    #[must_use]
    pub fn decode(image: &RgbaImage, decoder: HeightDecoder, resolution: usize, exaggeration: f64) -> Self {
        assert!(resolution >= 2, "height raster needs at least 2 samples per side");
        let (width, height) = image.dimensions();
        assert!(width > 0 && height > 0, "cannot decode an empty height tile");

        let span = (resolution - 1) as f64;
        let pick = |i: usize, extent: u32| -> u32 {
            ((i as f64 / span) * f64::from(extent - 1)).round() as u32
        };

        let mut heights = Vec::with_capacity(resolution * resolution);
        for row in 0..resolution {
            let py = pick(row, height);
            for col in 0..resolution {
                let px = pick(col, width);
                let [r, g, b, _] = image.get_pixel(px, py).0;
                heights.push(decoder.decode([r, g, b]) * exaggeration);
            }
        }
        Self { resolution, heights }
    }

    /// Samples per side.
    #[must_use]
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Elevation at `(col, row)`.
    #[must_use]
    pub fn get(&self, col: usize, row: usize) -> f64 {
        self.heights[row * self.resolution + col]
    }

    /// All samples in row-major order.
    #[must_use]
    pub fn heights(&self) -> &[f64] {
        &self.heights
    }

    /// `(min, max)` elevation.
    #[must_use]
    pub fn min_max(&self) -> (f64, f64) {
        self.heights
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &h| (lo.min(h), hi.max(h)))
    }
}
