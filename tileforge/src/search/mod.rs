//! Full-text search over named features: the tile-sharded index builder,
//! the FTS5 store, query rewriting and the ranking pipeline.

pub mod builder;
pub mod fts;
pub mod query;
pub mod rank;

pub use crate::search::builder::build_search_index;
pub use crate::search::fts::{FtsStore, PoiRow};
