use std::sync::atomic::Ordering;

use actix_web::dev::Server;
use actix_web::error::ErrorInternalServerError;
use actix_web::web::Data;
use actix_web::{route, web, App, HttpServer, Responder};
use log::error;
use sqlx::{Pool, Sqlite};
use tileforge_mbtiles::{Mbtiles, MbtilesPool};
use tokio::sync::OnceCell;

use crate::scheduler::TileScheduler;
use crate::search::FtsStore;
use crate::srv::search::get_search;
use crate::srv::tiles::get_tile;
use crate::{ServeError, ServeResult};

/// Shared server state. Read handles to both stores open lazily on first
/// use; all writes stay with the scheduler's writer task.
pub struct AppState {
    pub scheduler: TileScheduler,
    pub mbtiles: Mbtiles,
    pub fts: FtsStore,
    pub admin_key: Option<String>,
    pub max_zoom: u8,
    tile_pool: OnceCell<MbtilesPool>,
    fts_pool: OnceCell<Pool<Sqlite>>,
}

impl AppState {
    #[must_use]
    pub fn new(
        scheduler: TileScheduler,
        mbtiles: Mbtiles,
        fts: FtsStore,
        admin_key: Option<String>,
        max_zoom: u8,
    ) -> Self {
        Self {
            scheduler,
            mbtiles,
            fts,
            admin_key,
            max_zoom,
            tile_pool: OnceCell::new(),
            fts_pool: OnceCell::new(),
        }
    }

    pub async fn tile_pool(&self) -> ServeResult<&MbtilesPool> {
        Ok(self
            .tile_pool
            .get_or_try_init(|| MbtilesPool::open_readonly(self.mbtiles.filepath()))
            .await?)
    }

    pub async fn fts_pool(&self) -> ServeResult<&Pool<Sqlite>> {
        self.fts_pool
            .get_or_try_init(|| self.fts.open_readonly_pool())
            .await
    }
}

pub fn map_internal_error<T: std::fmt::Display>(e: T) -> actix_web::Error {
    error!("{e}");
    ErrorInternalServerError(e.to_string())
}

#[route("/status", method = "GET", method = "HEAD")]
async fn get_status(state: Data<AppState>) -> impl Responder {
    let stats = &state.scheduler.stats;
    let requests = stats.requests.load(Ordering::Relaxed);
    let requests_ok = stats.requests_ok.load(Ordering::Relaxed);
    let tiles_built = stats.tiles_built.load(Ordering::Relaxed);
    let avg_build_ms = stats.build_ms.load(Ordering::Relaxed) as f64 / tiles_built.max(1) as f64;
    let avg_request_ms =
        stats.request_ms.load(Ordering::Relaxed) as f64 / requests_ok.max(1) as f64;
    format!(
        "Uptime: {:.0} s\n\
         Reqs: {requests}\n\
         200 Reqs: {requests_ok}\n\
         Background reqs: {}\n\
         Bytes out: {}\n\
         Tiles built: {tiles_built}\n\
         Avg build: {avg_build_ms:.1} ms\n\
         Avg request: {avg_request_ms:.1} ms\n",
        stats.started.elapsed().as_secs_f64(),
        stats.background_requests.load(Ordering::Relaxed),
        stats.bytes_out.load(Ordering::Relaxed),
    )
}

pub fn router(cfg: &mut web::ServiceConfig) {
    cfg.service(get_tile).service(get_status).service(get_search);
}

/// Builds the HTTP server; the returned [`Server`] handle supports graceful
/// stop from the signal handler.
pub fn new_server(state: Data<AppState>, port: u16) -> ServeResult<(Server, String)> {
    let listen = format!("0.0.0.0:{port}");
    let server = HttpServer::new(move || {
        App::new()
            .app_data(Data::clone(&state))
            .configure(router)
    })
    .bind(&listen)
    .map_err(|e| ServeError::BindingError(e, listen.clone()))?
    // SIGINT is handled by the two-stage handler in main
    .disable_signals()
    .run();
    Ok((server, listen))
}
