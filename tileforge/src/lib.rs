//! Tile server: on-demand MVT tile building with persistent caching, plus a
//! full-text search index over named features.

pub mod args;
pub mod scheduler;
pub mod search;
pub mod srv;

use std::io;
use std::path::PathBuf;

/// A convenience [`Result`] for the server crate.
pub type ServeResult<T> = Result<T, ServeError>;

#[derive(thiserror::Error, Debug)]
pub enum ServeError {
    #[error("Unable to bind to {1}: {0}")]
    BindingError(io::Error, String),

    #[error("Unable to open feature file {1}: {0}")]
    FeatureStoreError(tileforge_core::StoreError, PathBuf),

    #[error(transparent)]
    MbtilesError(#[from] tileforge_mbtiles::MbtError),

    #[error(transparent)]
    SqlxError(#[from] sqlx::Error),

    #[error(transparent)]
    WebError(#[from] actix_web::Error),

    #[error(transparent)]
    IoError(#[from] io::Error),
}
