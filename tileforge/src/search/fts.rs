//! SQLite FTS5 search store: the `pois` content table, its linked
//! full-text index and the point r-tree used for bounded queries.

use std::ffi::OsStr;
use std::fmt::{Display, Formatter};
use std::path::Path;

use log::debug;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{query, query_as, Connection as _, Pool, Row as _, Sqlite, SqliteConnection};

use crate::ServeResult;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS pois (
    name TEXT,
    name_en TEXT,
    admin TEXT,
    tags TEXT,
    props TEXT,
    lng REAL,
    lat REAL
);
CREATE VIRTUAL TABLE IF NOT EXISTS pois_fts USING fts5(name, name_en, admin, tags, content='pois');
CREATE VIRTUAL TABLE IF NOT EXISTS rtree_index USING rtree(id, minLng, maxLng, minLat, maxLat);";

const INSERT_POI_SQL: &str =
    "INSERT INTO pois (name, name_en, admin, tags, props, lng, lat) VALUES (?, ?, ?, ?, ?, ?, ?)";

/// One row of the search index.
#[derive(Debug, Clone, PartialEq)]
pub struct PoiRow {
    pub name: String,
    pub name_en: String,
    /// Comma-separated ancestor names, innermost first.
    pub admin: String,
    /// Space-separated tag values used for ranking.
    pub tags: String,
    /// JSON blob returned to clients untouched.
    pub props: String,
    pub lng: f64,
    pub lat: f64,
}

/// A candidate row fetched for ranking.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SearchHit {
    pub name: String,
    pub name_en: String,
    pub admin: String,
    pub tags: String,
    pub props: String,
    pub lng: f64,
    pub lat: f64,
}

#[derive(Clone, Debug)]
pub struct FtsStore {
    filepath: String,
    filename: String,
}

impl Display for FtsStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.filepath)
    }
}

impl FtsStore {
    pub fn new<P: AsRef<Path>>(filepath: P) -> ServeResult<Self> {
        let path = filepath.as_ref();
        Ok(Self {
            filepath: path
                .to_str()
                .ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "non-UTF-8 path")
                })?
                .to_string(),
            filename: path
                .file_stem()
                .unwrap_or_else(|| OsStr::new("unknown"))
                .to_string_lossy()
                .to_string(),
        })
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Opens the write connection, creating the file and schema if missing.
    pub async fn open_or_new(&self) -> ServeResult<SqliteConnection> {
        debug!("Opening or creating search store {self}");
        let opt = SqliteConnectOptions::new()
            .filename(&self.filepath)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let mut conn = SqliteConnection::connect_with(&opt).await?;
        // raw_sql: the schema is several statements
        sqlx::raw_sql(SCHEMA_SQL).execute(&mut conn).await?;
        Ok(conn)
    }

    pub async fn open_readonly_pool(&self) -> ServeResult<Pool<Sqlite>> {
        let opt = SqliteConnectOptions::new()
            .filename(&self.filepath)
            .read_only(true);
        Ok(SqlitePoolOptions::new().connect_with(opt).await?)
    }

    /// Appends one tile's rows inside a transaction.
    pub async fn insert_batch(
        &self,
        conn: &mut SqliteConnection,
        rows: &[PoiRow],
    ) -> ServeResult<()> {
        let mut tx = conn.begin().await?;
        for row in rows {
            query(INSERT_POI_SQL)
                .bind(&row.name)
                .bind(&row.name_en)
                .bind(&row.admin)
                .bind(&row.tags)
                .bind(&row.props)
                .bind(row.lng)
                .bind(row.lat)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Rebuilds the FTS index from the content table and refills the r-tree.
    pub async fn rebuild_indexes(&self, conn: &mut SqliteConnection) -> ServeResult<()> {
        query("INSERT INTO pois_fts(pois_fts) VALUES('rebuild')")
            .execute(&mut *conn)
            .await?;
        query("DELETE FROM rtree_index").execute(&mut *conn).await?;
        query("INSERT INTO rtree_index SELECT rowid, lng, lng, lat, lat FROM pois")
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}

const HIT_COLUMNS: &str = "p.name, p.name_en, p.admin, p.tags, p.props, p.lng, p.lat";

/// Candidate rows for a match expression, pre-ordered by the stock FTS5
/// rank so a candidate cap keeps the most promising rows.
pub async fn matches(
    pool: &Pool<Sqlite>,
    match_expr: &str,
    limit: u32,
) -> ServeResult<Vec<SearchHit>> {
    let sql = format!(
        "SELECT {HIT_COLUMNS}
         FROM pois_fts JOIN pois p ON p.rowid = pois_fts.rowid
         WHERE pois_fts MATCH ? ORDER BY pois_fts.rank LIMIT ?"
    );
    Ok(query_as(&sql)
        .bind(match_expr)
        .bind(limit)
        .fetch_all(pool)
        .await?)
}

/// Same as [`matches`], constrained to a lng/lat box through the r-tree.
pub async fn matches_bounded(
    pool: &Pool<Sqlite>,
    match_expr: &str,
    bounds: (f64, f64, f64, f64),
    limit: u32,
) -> ServeResult<Vec<SearchHit>> {
    let sql = format!(
        "SELECT {HIT_COLUMNS}
         FROM pois_fts
         JOIN pois p ON p.rowid = pois_fts.rowid
         JOIN rtree_index r ON r.id = pois_fts.rowid
         WHERE pois_fts MATCH ?
           AND r.minLng >= ? AND r.maxLng <= ? AND r.minLat >= ? AND r.maxLat <= ?
         ORDER BY pois_fts.rank LIMIT ?"
    );
    Ok(query_as(&sql)
        .bind(match_expr)
        .bind(bounds.0)
        .bind(bounds.2)
        .bind(bounds.1)
        .bind(bounds.3)
        .bind(limit)
        .fetch_all(pool)
        .await?)
}

/// Total number of rows matching the expression (debug responses only).
pub async fn count_matches(pool: &Pool<Sqlite>, match_expr: &str) -> ServeResult<u64> {
    let row = query("SELECT COUNT(*) AS n FROM pois_fts WHERE pois_fts MATCH ?")
        .bind(match_expr)
        .fetch_one(pool)
        .await?;
    Ok(row.get::<i64, _>(0).max(0) as u64)
}

/// Number of rows containing the given phrase, for IDF computation.
pub async fn phrase_doc_count(pool: &Pool<Sqlite>, phrase: &str) -> ServeResult<u64> {
    let quoted = format!("\"{}\"", phrase.replace('"', ""));
    let row = query("SELECT COUNT(*) AS n FROM pois_fts WHERE pois_fts MATCH ?")
        .bind(quoted)
        .fetch_one(pool)
        .await?;
    Ok(row.get::<i64, _>(0).max(0) as u64)
}

pub async fn row_count(pool: &Pool<Sqlite>) -> ServeResult<u64> {
    let row = query("SELECT COUNT(*) AS n FROM pois")
        .fetch_one(pool)
        .await?;
    Ok(row.get::<i64, _>(0).max(0) as u64)
}
