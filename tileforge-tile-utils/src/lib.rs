//! Shared tile plumbing: WMTS tile ids, web-mercator projection and the gzip
//! encoding used for stored tiles.

mod projection;
mod tile_id;

use std::io::{Read as _, Write as _};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

pub use crate::projection::{
    lng_lat_to_meters, meters_per_tile, projected_meters_to_lng_lat, tile_center,
    tile_coords_to_meters, tile_lng_lat_bounds, tile_south_west, LngLat, ProjectedMeters,
    EARTH_CIRCUMFERENCE, EARTH_HALF_CIRCUMFERENCE, EARTH_RADIUS,
};
pub use crate::tile_id::TileId;

/// Highest data zoom served by default; z14 tiles are over-zoomed client-side.
pub const MAX_ZOOM: u8 = 14;

/// Gzip level used for tile blobs. Level 5 is nearly as small as 6 but
/// measurably faster on tile-sized payloads.
pub const TILE_GZIP_LEVEL: u32 = 5;

pub fn encode_gzip(data: &[u8]) -> Result<Vec<u8>, std::io::Error> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::new(TILE_GZIP_LEVEL));
    encoder.write_all(data)?;
    encoder.finish()
}

pub fn decode_gzip(data: &[u8]) -> Result<Vec<u8>, std::io::Error> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gzip_roundtrip() {
        let data = b"not actually a vector tile".to_vec();
        let compressed = encode_gzip(&data).unwrap();
        assert_eq!(&compressed[0..2], b"\x1f\x8b");
        assert_eq!(decode_gzip(&compressed).unwrap(), data);
    }
}
