use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tileforge_tile_utils::TileId;

use crate::errors::MbtResult;
use crate::Mbtiles;

/// Read-only connection pool over a tile store, shared by request handlers.
#[derive(Clone, Debug)]
pub struct MbtilesPool {
    mbtiles: Mbtiles,
    pool: Pool<Sqlite>,
}

impl MbtilesPool {
    pub async fn open_readonly<P: AsRef<Path>>(filepath: P) -> MbtResult<Self> {
        let mbtiles = Mbtiles::new(filepath)?;
        let opt = SqliteConnectOptions::new()
            .filename(mbtiles.filepath())
            .read_only(true);
        let pool = SqlitePoolOptions::new().connect_with(opt).await?;
        Ok(Self { mbtiles, pool })
    }

    pub async fn get_tile(&self, tile: TileId) -> MbtResult<Option<Vec<u8>>> {
        let mut conn = self.pool.acquire().await?;
        self.mbtiles.get_tile(&mut conn, tile).await
    }
}
