use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use actix_web::error::{ErrorBadRequest, ErrorNotFound};
use actix_web::http::header::CONTENT_ENCODING;
use actix_web::http::StatusCode;
use actix_web::web::{Data, Path};
use actix_web::{route, HttpRequest, HttpResponse, Result as ActixResult};
use log::trace;
use tileforge_tile_utils::TileId;
use tokio::time::timeout;

use crate::srv::server::{map_internal_error, AppState};

/// How long a request waits on an in-flight build before giving up. The
/// build itself keeps running and is persisted for later requests.
const BUILD_WAIT: Duration = Duration::from_secs(30);

const TILE_CONTENT_TYPE: &str = "application/vnd.mapbox-vector-tile";

fn header_is(req: &HttpRequest, name: &str, value: &str) -> bool {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case(value))
}

#[route("/v1/{z}/{x}/{y}", method = "GET", method = "HEAD")]
pub(crate) async fn get_tile(
    req: HttpRequest,
    path: Path<(u8, i32, i32)>,
    state: Data<AppState>,
) -> ActixResult<HttpResponse> {
    let started = Instant::now();
    let stats = &state.scheduler.stats;
    stats.requests.fetch_add(1, Ordering::Relaxed);
    if header_is(&req, "X-Tile-Priority", "background") {
        stats.background_requests.fetch_add(1, Ordering::Relaxed);
    }

    let (z, x, y) = path.into_inner();
    let id = TileId::new(x, y, z);
    if !id.is_valid() {
        return Err(ErrorBadRequest(format!("invalid tile id {z}/{x}/{y}")));
    }
    if z > state.max_zoom {
        return Err(ErrorNotFound("tile beyond max zoom"));
    }
    trace!("Request {id}");

    // an admin can force a rebuild past the persisted store
    let rebuild = state.admin_key.as_deref().is_some_and(|key| {
        req.headers().contains_key("X-Rebuild-Tile") && header_is(&req, "X-Admin-Key", key)
    });

    let mut data: Option<Vec<u8>> = None;
    if !rebuild {
        let pool = state.tile_pool().await.map_err(map_internal_error)?;
        data = pool.get_tile(id).await.map_err(map_internal_error)?;
    }
    let data = match data {
        Some(blob) => blob,
        None => {
            let pending = state.scheduler.build_shared(id);
            let Ok(built) = timeout(BUILD_WAIT, pending).await else {
                return Ok(HttpResponse::new(StatusCode::REQUEST_TIMEOUT));
            };
            if built.is_empty() {
                return Err(ErrorNotFound("no features in tile"));
            }
            built.as_ref().clone()
        }
    };

    stats.requests_ok.fetch_add(1, Ordering::Relaxed);
    stats.bytes_out.fetch_add(data.len() as u64, Ordering::Relaxed);
    stats
        .request_ms
        .fetch_add(started.elapsed().as_millis() as u64, Ordering::Relaxed);

    let mut response = HttpResponse::Ok();
    response.content_type(TILE_CONTENT_TYPE);
    // clients restoring into a compressed tile cache ask us to hide the
    // encoding so their network stack does not transparently unzip
    if !header_is(&req, "X-Hide-Encoding", "yes") {
        response.insert_header((CONTENT_ENCODING, "gzip"));
    }
    Ok(response.body(data))
}
