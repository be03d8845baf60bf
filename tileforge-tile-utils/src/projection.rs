//! Web-mercator projection on the WGS84 sphere approximation.

use std::f64::consts::PI;

use crate::tile_id::TileId;

pub const EARTH_RADIUS: f64 = 6_378_137.0;
pub const EARTH_HALF_CIRCUMFERENCE: f64 = PI * EARTH_RADIUS;
pub const EARTH_CIRCUMFERENCE: f64 = 2.0 * PI * EARTH_RADIUS;

/// A position in projected (web-mercator) meters, origin at lng/lat 0/0.
pub type ProjectedMeters = (f64, f64);

/// A longitude/latitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    #[must_use]
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

#[must_use]
pub fn meters_per_tile(zoom: u8) -> f64 {
    EARTH_CIRCUMFERENCE / f64::from(1_u32 << zoom)
}

/// Inverse Gudermannian on `y`.
#[must_use]
pub fn projected_meters_to_lng_lat(meters: ProjectedMeters) -> LngLat {
    LngLat {
        lng: meters.0 * 180.0 / EARTH_HALF_CIRCUMFERENCE,
        lat: (2.0 * (meters.1 / EARTH_RADIUS).exp().atan() - PI * 0.5) * 180.0 / PI,
    }
}

#[must_use]
pub fn lng_lat_to_meters(pos: LngLat) -> ProjectedMeters {
    let x = pos.lng * EARTH_HALF_CIRCUMFERENCE / 180.0;
    let lat = pos.lat.to_radians();
    let y = EARTH_RADIUS * (PI * 0.25 + lat * 0.5).tan().ln();
    (x, y)
}

/// Projected meters of fractional tile coordinates `(x, y)` at zoom `z`,
/// with `y` counted from the top edge as in WMTS.
#[must_use]
pub fn tile_coords_to_meters(x: f64, y: f64, z: u8) -> ProjectedMeters {
    let meters_per_tile = meters_per_tile(z);
    (
        x * meters_per_tile - EARTH_HALF_CIRCUMFERENCE,
        EARTH_HALF_CIRCUMFERENCE - y * meters_per_tile,
    )
}

#[must_use]
pub fn tile_south_west(tile: TileId) -> ProjectedMeters {
    tile_coords_to_meters(f64::from(tile.x), f64::from(tile.y) + 1.0, tile.z)
}

#[must_use]
pub fn tile_center(tile: TileId) -> ProjectedMeters {
    tile_coords_to_meters(f64::from(tile.x) + 0.5, f64::from(tile.y) + 0.5, tile.z)
}

/// Geographic bounds `(west, south, east, north)` of a tile.
#[must_use]
pub fn tile_lng_lat_bounds(tile: TileId) -> (f64, f64, f64, f64) {
    let sw = projected_meters_to_lng_lat(tile_south_west(tile));
    let ne = projected_meters_to_lng_lat(tile_coords_to_meters(
        f64::from(tile.x) + 1.0,
        f64::from(tile.y),
        tile.z,
    ));
    (sw.lng, sw.lat, ne.lng, ne.lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_tile_bounds() {
        let (w, s, e, n) = tile_lng_lat_bounds(TileId::new(0, 0, 0));
        assert!((w - -180.0).abs() < 1e-9);
        assert!((e - 180.0).abs() < 1e-9);
        // the square mercator world ends at ~85.05 degrees
        assert!((n - 85.051_128_779_806_6).abs() < 1e-6);
        assert!((s + 85.051_128_779_806_6).abs() < 1e-6);
    }

    #[test]
    fn test_projection_roundtrip() {
        for &(lng, lat) in &[(0.0, 0.0), (-122.43, 37.77), (151.2, -33.86)] {
            let m = lng_lat_to_meters(LngLat::new(lng, lat));
            let back = projected_meters_to_lng_lat(m);
            assert!((back.lng - lng).abs() < 1e-9);
            assert!((back.lat - lat).abs() < 1e-9);
        }
    }

    #[test]
    fn test_meters_per_tile_halves() {
        assert!((meters_per_tile(0) - EARTH_CIRCUMFERENCE).abs() < 1e-6);
        assert!((meters_per_tile(5) * 32.0 - EARTH_CIRCUMFERENCE).abs() < 1e-6);
    }

    #[test]
    fn test_tile_center_of_world() {
        let (x, y) = tile_center(TileId::new(0, 0, 0));
        assert!(x.abs() < 1e-9 && y.abs() < 1e-9);
    }
}
