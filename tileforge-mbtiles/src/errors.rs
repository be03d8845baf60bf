use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum MbtError {
    #[error(transparent)]
    SqlxError(#[from] sqlx::Error),

    #[error(r#"Filename "{}" passed to SQLite must be valid UTF-8"#, .0.display())]
    InvalidFilenameType(PathBuf),

    #[error("Invalid tile index: zoom_level={0}, tile_column={1}, tile_row={2}")]
    InvalidTileIndex(u8, i32, i32),
}

pub type MbtResult<T> = Result<T, MbtError>;
