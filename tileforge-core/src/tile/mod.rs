//! Tile building: classifier-driven feature emission into MVT layers.

mod builder;
mod coastline;
mod schema;
mod tables;

pub use crate::tile::builder::{build_tile, TileBuilder, OCEAN_ID};

/// Tag keys the POI table considers, in priority order.
pub fn poi_tag_keys() -> impl Iterator<Item = &'static str> {
    tables::POI_TAGS.iter().map(tables::ZMap::key)
}
