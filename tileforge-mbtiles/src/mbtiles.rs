use std::ffi::OsStr;
use std::fmt::{Display, Formatter};
use std::path::Path;

use log::debug;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{query, Connection as _, Row as _, SqliteConnection};
use tileforge_tile_utils::TileId;

use crate::errors::{MbtError, MbtResult};

/// WAL allows readers to proceed while the single writer commits.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS tiles (
    zoom_level INTEGER,
    tile_column INTEGER,
    tile_row INTEGER,
    tile_data BLOB,
    created_at INTEGER DEFAULT (CAST(strftime('%s') AS INTEGER))
);
CREATE UNIQUE INDEX IF NOT EXISTS tile_index ON tiles (zoom_level, tile_column, tile_row);";

const GET_TILE_SQL: &str =
    "SELECT tile_data FROM tiles WHERE zoom_level = ? AND tile_column = ? AND tile_row = ?";
const PUT_TILE_SQL: &str =
    "REPLACE INTO tiles (zoom_level, tile_column, tile_row, tile_data) VALUES (?, ?, ?, ?)";

/// A tile store file; connections are opened per caller, writes should be
/// funneled through a single owner.
#[derive(Clone, Debug)]
pub struct Mbtiles {
    filepath: String,
    filename: String,
}

impl Display for Mbtiles {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.filepath)
    }
}

impl Mbtiles {
    pub fn new<P: AsRef<Path>>(filepath: P) -> MbtResult<Self> {
        let path = filepath.as_ref();
        Ok(Self {
            filepath: path
                .to_str()
                .ok_or_else(|| MbtError::InvalidFilenameType(path.to_path_buf()))?
                .to_string(),
            filename: path
                .file_stem()
                .unwrap_or_else(|| OsStr::new("unknown"))
                .to_string_lossy()
                .to_string(),
        })
    }

    #[must_use]
    pub fn filepath(&self) -> &str {
        &self.filepath
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub async fn open_readonly(&self) -> MbtResult<SqliteConnection> {
        debug!("Opening {self} as readonly");
        let opt = SqliteConnectOptions::new()
            .filename(self.filepath())
            .read_only(true);
        Ok(SqliteConnection::connect_with(&opt).await?)
    }

    /// Opens the write connection, creating the file and schema if missing.
    pub async fn open_or_new(&self) -> MbtResult<SqliteConnection> {
        debug!("Opening or creating {self}");
        let opt = SqliteConnectOptions::new()
            .filename(self.filepath())
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let mut conn = SqliteConnection::connect_with(&opt).await?;
        // raw_sql: the schema is several statements
        sqlx::raw_sql(SCHEMA_SQL).execute(&mut conn).await?;
        Ok(conn)
    }

    pub async fn get_tile(
        &self,
        conn: &mut SqliteConnection,
        tile: TileId,
    ) -> MbtResult<Option<Vec<u8>>> {
        let row = query(GET_TILE_SQL)
            .bind(tile.z)
            .bind(tile.x)
            .bind(tile.y_tms())
            .fetch_optional(conn)
            .await?;
        Ok(row.map(|r| r.get(0)))
    }

    /// Upserts one tile blob.
    pub async fn put_tile(
        &self,
        conn: &mut SqliteConnection,
        tile: TileId,
        data: &[u8],
    ) -> MbtResult<()> {
        query(PUT_TILE_SQL)
            .bind(tile.z)
            .bind(tile.x)
            .bind(tile.y_tms())
            .bind(data)
            .execute(conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn open_temp() -> (TempDir, Mbtiles, SqliteConnection) {
        let dir = tempfile::tempdir().unwrap();
        let mbt = Mbtiles::new(dir.path().join("tiles.mbtiles")).unwrap();
        let conn = mbt.open_or_new().await.unwrap();
        (dir, mbt, conn)
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let (_dir, mbt, mut conn) = open_temp().await;
        let tile = TileId::new(163, 395, 10);
        assert_eq!(mbt.get_tile(&mut conn, tile).await.unwrap(), None);
        mbt.put_tile(&mut conn, tile, b"blob-a").await.unwrap();
        assert_eq!(
            mbt.get_tile(&mut conn, tile).await.unwrap(),
            Some(b"blob-a".to_vec())
        );
        // upsert replaces
        mbt.put_tile(&mut conn, tile, b"blob-b").await.unwrap();
        assert_eq!(
            mbt.get_tile(&mut conn, tile).await.unwrap(),
            Some(b"blob-b".to_vec())
        );
    }

    #[tokio::test]
    async fn test_rows_stored_as_tms() {
        let (_dir, mbt, mut conn) = open_temp().await;
        let tile = TileId::new(2, 1, 2);
        mbt.put_tile(&mut conn, tile, b"x").await.unwrap();
        let row: (i64,) = sqlx::query_as("SELECT tile_row FROM tiles")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        assert_eq!(row.0, i64::from(tile.y_tms()));
    }
}
