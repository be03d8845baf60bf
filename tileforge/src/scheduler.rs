//! Tile build scheduling: a bounded worker pool for CPU-heavy builds, an
//! in-flight map deduplicating concurrent requests for the same tile, and a
//! single writer task owning all tile-store mutations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt as _, Shared};
use log::{error, info, warn};
use sqlx::SqliteConnection;
use tileforge_core::{build_tile, FeatureStore};
use tileforge_mbtiles::Mbtiles;
use tileforge_tile_utils::TileId;
use tokio::sync::{mpsc, oneshot, Semaphore};

/// Result of one tile build, shared among all waiting requests.
pub type TileData = Arc<Vec<u8>>;
type TileFuture = Shared<BoxFuture<'static, TileData>>;
type InflightMap = Arc<Mutex<HashMap<TileId, TileFuture>>>;

/// Relaxed counters surfaced through `/status`.
#[derive(Debug)]
pub struct ServerStats {
    pub started: Instant,
    pub requests: AtomicU64,
    pub requests_ok: AtomicU64,
    pub background_requests: AtomicU64,
    pub bytes_out: AtomicU64,
    pub tiles_built: AtomicU64,
    pub build_ms: AtomicU64,
    pub request_ms: AtomicU64,
}

impl Default for ServerStats {
    fn default() -> Self {
        Self {
            started: Instant::now(),
            requests: AtomicU64::new(0),
            requests_ok: AtomicU64::new(0),
            background_requests: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
            tiles_built: AtomicU64::new(0),
            build_ms: AtomicU64::new(0),
            request_ms: AtomicU64::new(0),
        }
    }
}

/// Jobs accepted by the single writer task.
pub enum WriteJob {
    PutTile { id: TileId, data: TileData },
    /// Completes once every job enqueued before it has been applied.
    Flush(oneshot::Sender<()>),
}

/// Spawns the writer task owning the tile store write connection. All
/// mutations are totally ordered by this task; after a tile is persisted its
/// in-flight entry is dropped so later requests hit the store.
pub fn spawn_writer(
    mbtiles: Mbtiles,
    conn: SqliteConnection,
    inflight: InflightMap,
) -> mpsc::Sender<WriteJob> {
    let (tx, rx) = mpsc::channel(256);
    tokio::spawn(writer_loop(mbtiles, conn, inflight, rx));
    tx
}

async fn writer_loop(
    mbtiles: Mbtiles,
    mut conn: SqliteConnection,
    inflight: InflightMap,
    mut rx: mpsc::Receiver<WriteJob>,
) {
    while let Some(job) = rx.recv().await {
        match job {
            WriteJob::PutTile { id, data } => {
                // empty results are not worth a row; they are rebuilt on the
                // next request
                if !data.is_empty() {
                    if let Err(e) = mbtiles.put_tile(&mut conn, id, &data).await {
                        error!("Error adding tile {id} to {mbtiles}: {e}");
                    }
                }
                inflight.lock().expect("in-flight lock poisoned").remove(&id);
            }
            WriteJob::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

pub struct TileScheduler {
    world: Arc<FeatureStore>,
    ocean: Arc<FeatureStore>,
    workers: Arc<Semaphore>,
    inflight: InflightMap,
    writer: mpsc::Sender<WriteJob>,
    pub stats: Arc<ServerStats>,
}

impl TileScheduler {
    #[must_use]
    pub fn new(
        world: Arc<FeatureStore>,
        ocean: Arc<FeatureStore>,
        worker_threads: usize,
        inflight: InflightMap,
        writer: mpsc::Sender<WriteJob>,
        stats: Arc<ServerStats>,
    ) -> Self {
        Self {
            world,
            ocean,
            workers: Arc::new(Semaphore::new(worker_threads.max(1))),
            inflight,
            writer,
            stats,
        }
    }

    #[must_use]
    pub fn new_inflight_map() -> InflightMap {
        Arc::new(Mutex::new(HashMap::new()))
    }

    /// Returns the shared future for a tile build, starting one if none is
    /// in flight. The lock covers only the map lookup and insert; the build
    /// itself runs on the worker pool and survives abandoned waiters.
    pub fn build_shared(&self, id: TileId) -> TileFuture {
        let mut inflight = self.inflight.lock().expect("in-flight lock poisoned");
        if let Some(pending) = inflight.get(&id) {
            return pending.clone();
        }
        let fut = self.spawn_build(id);
        inflight.insert(id, fut.clone());
        fut
    }

    fn spawn_build(&self, id: TileId) -> TileFuture {
        let world = Arc::clone(&self.world);
        let ocean = Arc::clone(&self.ocean);
        let workers = Arc::clone(&self.workers);
        let writer = self.writer.clone();
        let inflight = Arc::clone(&self.inflight);
        let stats = Arc::clone(&self.stats);
        stats.tiles_built.fetch_add(1, Ordering::Relaxed);

        let task = tokio::spawn(async move {
            let _permit = workers
                .acquire_owned()
                .await
                .expect("worker semaphore never closes");
            let started = Instant::now();
            let built = tokio::task::spawn_blocking(move || build_tile(&world, &ocean, id, true))
                .await
                .unwrap_or_else(|e| {
                    error!("Tile build task for {id} failed: {e}");
                    Vec::new()
                });
            stats
                .build_ms
                .fetch_add(started.elapsed().as_millis() as u64, Ordering::Relaxed);
            let data: TileData = Arc::new(built);
            if writer
                .send(WriteJob::PutTile {
                    id,
                    data: Arc::clone(&data),
                })
                .await
                .is_err()
            {
                // writer is gone (shutdown); drop the entry ourselves
                warn!("Writer unavailable, tile {id} not persisted");
                inflight.lock().expect("in-flight lock poisoned").remove(&id);
            }
            data
        });
        async move {
            match task.await {
                Ok(data) => data,
                Err(e) => {
                    error!("Tile build join error: {e}");
                    Arc::new(Vec::new())
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Waits for every enqueued write to land.
    pub async fn flush_writer(&self) {
        let (tx, rx) = oneshot::channel();
        if self.writer.send(WriteJob::Flush(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }
}

/// Offline quadtree build: builds `root` and recursively all children down
/// to `max_zoom`, fanning out through the scheduler's worker pool. Returns
/// the number of tiles built; `stop` aborts the fan-out between tiles.
pub async fn run_build(
    scheduler: &TileScheduler,
    root: TileId,
    max_zoom: u8,
    stop: Arc<AtomicBool>,
) -> u64 {
    let started = Instant::now();
    let mut tasks = tokio::task::JoinSet::new();
    let spawn = |tasks: &mut tokio::task::JoinSet<TileId>, id: TileId| {
        info!("Building {id}");
        let fut = scheduler.build_shared(id);
        tasks.spawn(async move {
            fut.await;
            id
        });
    };
    spawn(&mut tasks, root);

    let mut built = 0_u64;
    while let Some(finished) = tasks.join_next().await {
        let Ok(id) = finished else { continue };
        built += 1;
        if id.z < max_zoom && !stop.load(Ordering::Relaxed) {
            for quadrant in 0..4 {
                if let Some(child) = id.child(quadrant, max_zoom) {
                    spawn(&mut tasks, child);
                }
            }
        }
    }
    scheduler.flush_writer().await;
    info!("Built {built} tiles in {:.0}s", started.elapsed().as_secs_f64());
    built
}

#[cfg(test)]
mod tests {
    use tileforge_core::osm::StoreBuilder;

    use super::*;

    async fn test_scheduler(dir: &std::path::Path) -> TileScheduler {
        let mut b = StoreBuilder::new();
        b.add_node(1, (0.0, 0.0), &[("place", "continent"), ("name", "X")]);
        let world = Arc::new(b.build());
        let ocean = Arc::new(StoreBuilder::new().build());
        let mbtiles = Mbtiles::new(dir.join("tiles.mbtiles")).unwrap();
        let conn = mbtiles.open_or_new().await.unwrap();
        let inflight = TileScheduler::new_inflight_map();
        let writer = spawn_writer(mbtiles, conn, Arc::clone(&inflight));
        TileScheduler::new(
            world,
            ocean,
            2,
            inflight,
            writer,
            Arc::new(ServerStats::default()),
        )
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_build() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = test_scheduler(dir.path()).await;
        let id = TileId::new(0, 0, 0);

        let futs: Vec<_> = (0..100).map(|_| scheduler.build_shared(id)).collect();
        let results = futures::future::join_all(futs).await;
        assert_eq!(scheduler.stats.tiles_built.load(Ordering::Relaxed), 1);
        assert!(!results[0].is_empty());
        for r in &results {
            assert_eq!(r, &results[0]);
        }

        // once persisted, the in-flight entry must be gone
        scheduler.flush_writer().await;
        assert!(scheduler.inflight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_offline_build_covers_pyramid() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = test_scheduler(dir.path()).await;
        let built = run_build(
            &scheduler,
            TileId::new(0, 0, 0),
            2,
            Arc::new(AtomicBool::new(false)),
        )
        .await;
        // 1 + 4 + 16 tiles
        assert_eq!(built, 21);
    }
}
