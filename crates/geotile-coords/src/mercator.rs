//! Spherical web-mercator (EPSG:3857) conversions.
//!
//! World space uses mercator metres on the XZ plane: X is easting, Z is
//! southing (so tile rows grow along +Z), Y is up.

use crate::{TileBounds, TileCoordinate};

/// Equatorial radius used by web mercator, in metres.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Circumference at the equator, in metres.
pub const EARTH_PERIMETER: f64 = 2.0 * std::f64::consts::PI * EARTH_RADIUS;

/// Half the projected extent: the map spans `[-ORIGIN_SHIFT, ORIGIN_SHIFT]` on both axes.
pub const ORIGIN_SHIFT: f64 = EARTH_PERIMETER / 2.0;

/// Latitude limit of the square web-mercator map, in degrees.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Convert WGS84 latitude/longitude (degrees) to mercator `(easting, northing)` in metres.
///
/// Latitude is clamped to [`MAX_LATITUDE`].
#[must_use]
pub fn lat_lon_to_meters(latitude: f64, longitude: f64) -> (f64, f64) {
    let lat = latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x = EARTH_RADIUS * longitude.to_radians();
    let y = EARTH_RADIUS * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}

/// Convert mercator `(easting, northing)` in metres back to latitude/longitude in degrees.
#[must_use]
pub fn meters_to_lat_lon(x: f64, y: f64) -> (f64, f64) {
    let longitude = (x / EARTH_RADIUS).to_degrees();
    let latitude = (2.0 * (y / EARTH_RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    (latitude, longitude)
}

/// The tile at `level` containing the given latitude/longitude.
#[must_use]
pub fn tile_for_lat_lon(latitude: f64, longitude: f64, level: u8) -> TileCoordinate {
    let (mx, my) = lat_lon_to_meters(latitude, longitude);
    let size = TileCoordinate::grid_size(level);
    let n = f64::from(size);
    let col = ((mx + ORIGIN_SHIFT) / EARTH_PERIMETER * n).floor();
    let row = ((ORIGIN_SHIFT - my) / EARTH_PERIMETER * n).floor();
    let clamp = |v: f64| (v.max(0.0) as u32).min(size - 1);
    TileCoordinate::new(level, clamp(col), clamp(row))
}

impl TileBounds {
    /// World-space footprint of a tile in web-mercator metres.
    #[must_use]
    pub fn web_mercator(coord: &TileCoordinate) -> Self {
        TileBounds::subdivide_to(
            &TileBounds::world(),
            &TileCoordinate::root(),
            coord,
        )
    }

    /// Footprint of the level-0 tile.
    #[must_use]
    pub fn world() -> Self {
        TileBounds::new(
            glam::DVec2::splat(-ORIGIN_SHIFT),
            glam::DVec2::splat(ORIGIN_SHIFT),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_maps_to_zero() {
        let (x, y) = lat_lon_to_meters(0.0, 0.0);
        assert!(x.abs() < 1e-6);
        assert!(y.abs() < 1e-6);
    }

    #[test]
    fn test_lat_lon_roundtrip() {
        let (x, y) = lat_lon_to_meters(38.72, -9.14);
        let (lat, lon) = meters_to_lat_lon(x, y);
        assert!((lat - 38.72).abs() < 1e-9);
        assert!((lon + 9.14).abs() < 1e-9);
    }

    #[test]
    fn test_max_latitude_reaches_map_edge() {
        let (_, y) = lat_lon_to_meters(90.0, 180.0);
        assert!((y - ORIGIN_SHIFT).abs() < 1e-3);
    }

    #[test]
    fn test_tile_for_lat_lon() {
        assert_eq!(tile_for_lat_lon(45.0, 90.0, 2), TileCoordinate::new(2, 3, 1));
        assert_eq!(tile_for_lat_lon(-45.0, -90.0, 2), TileCoordinate::new(2, 1, 2));
        assert_eq!(tile_for_lat_lon(0.0, 0.0, 0), TileCoordinate::root());
    }

    #[test]
    fn test_world_bounds_cover_perimeter() {
        let world = TileBounds::web_mercator(&TileCoordinate::root());
        assert!((world.size().x - EARTH_PERIMETER).abs() < 1e-6);
        assert!((world.size().y - EARTH_PERIMETER).abs() < 1e-6);
    }

    /// Row 0 is the northernmost row, which is the most negative Z.
    #[test]
    fn test_rows_grow_southwards_along_z() {
        let north = TileBounds::web_mercator(&TileCoordinate::new(1, 0, 0));
        let south = TileBounds::web_mercator(&TileCoordinate::new(1, 0, 1));
        assert!(north.center().y < south.center().y);
        assert!((north.min.y + ORIGIN_SHIFT).abs() < 1e-6);
    }
}
