//! Core tile building machinery: geometry primitives, the MVT encoder, the
//! OSM feature model and the zoom-dependent feature classifier.

pub mod geom;
pub mod mvt;
pub mod osm;
pub mod tile;

pub use crate::osm::{Feature, FeatureKind, FeatureStore, StoreError, TagValue};
pub use crate::tile::{build_tile, OCEAN_ID};
