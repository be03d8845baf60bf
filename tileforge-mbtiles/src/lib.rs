//! Persistent tile store keyed by `(zoom_level, tile_column, tile_row)` with
//! gzip-compressed MVT blobs, laid out so the file doubles as an `mbtiles`
//! archive. Row numbering follows TMS (`tile_row` counted from the south).

mod errors;
mod mbtiles;
mod pool;

pub use crate::errors::{MbtError, MbtResult};
pub use crate::mbtiles::Mbtiles;
pub use crate::pool::MbtilesPool;
