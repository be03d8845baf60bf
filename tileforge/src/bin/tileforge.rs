use std::fs::OpenOptions;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use actix_web::web::Data;
use clap::Parser;
use tileforge::args::Args;
use tileforge::scheduler::{run_build, spawn_writer, ServerStats, TileScheduler};
use tileforge::search::{build_search_index, FtsStore};
use tileforge::srv::{new_server, AppState};
use tileforge::{ServeError, ServeResult};
use tileforge_core::FeatureStore;
use tileforge_mbtiles::Mbtiles;
use tracing::{error, event_enabled, info};

const VERSION: &str = env!("CARGO_PKG_VERSION");

async fn start(args: Args) -> ServeResult<()> {
    info!("Starting tileforge v{VERSION}");

    let world = FeatureStore::open(&args.world)
        .map_err(|e| ServeError::FeatureStoreError(e, args.world.clone()))?;
    let ocean = FeatureStore::open(&args.ocean)
        .map_err(|e| ServeError::FeatureStoreError(e, args.ocean.clone()))?;
    info!(
        "Loaded {} ({} features) and {} ({} features)",
        args.world.display(),
        world.len(),
        args.ocean.display(),
        ocean.len()
    );
    let (world, ocean) = (Arc::new(world), Arc::new(ocean));
    let threads = args.worker_threads();

    if args.buildfts {
        let store = FtsStore::new(&args.ftsdb)?;
        build_search_index(world, &store, threads).await?;
        return Ok(());
    }

    let mbtiles = Mbtiles::new(&args.db)?;
    let conn = mbtiles.open_or_new().await?;
    let inflight = TileScheduler::new_inflight_map();
    let writer = spawn_writer(mbtiles.clone(), conn, Arc::clone(&inflight));
    let scheduler = TileScheduler::new(
        world,
        ocean,
        threads,
        inflight,
        writer,
        Arc::new(ServerStats::default()),
    );

    if let Some(root) = args.build {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("SIGINT: requesting shutdown (again to force exit)");
            stop_flag.store(true, Ordering::Relaxed);
            tokio::signal::ctrl_c().await.ok();
            std::process::exit(1);
        });
        run_build(&scheduler, root, args.maxz, stop).await;
        return Ok(());
    }

    let fts = FtsStore::new(&args.ftsdb)?;
    let state = Data::new(AppState::new(
        scheduler,
        mbtiles,
        fts,
        args.admin_key.clone(),
        args.maxz,
    ));
    let (server, listen) = new_server(state, args.port)?;
    info!("Server listening on {listen} with {threads} tile threads");

    let handle = server.handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("SIGINT: requesting shutdown (again to force exit)");
        tokio::spawn(handle.stop(true));
        tokio::signal::ctrl_c().await.ok();
        std::process::exit(1);
    });

    server.await?;
    info!("Exiting");
    Ok(())
}

#[actix_web::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = setup_logging(args.log.as_deref()) {
        eprintln!("Unable to open log file: {e}");
        std::process::exit(-2);
    }

    if let Err(e) = start(args).await {
        // make sure the message lands even with logging disabled
        if event_enabled!(tracing::Level::ERROR) {
            error!("{e}");
        } else {
            eprintln!("{e}");
        }
        std::process::exit(-1);
    }
}

fn setup_logging(log_file: Option<&Path>) -> std::io::Result<()> {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt::Layer;
    use tracing_subscriber::prelude::*;

    // route `log` records from the library crates into `tracing`
    tracing_log::LogTracer::builder()
        .with_interest_cache(tracing_log::InterestCacheConfig::default())
        .init()
        .expect("the global logger is only set once");

    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();
    let registry = tracing_subscriber::registry().with(filter);
    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let layer = Layer::default().with_writer(Arc::new(file)).with_ansi(false);
            tracing::subscriber::set_global_default(registry.with(layer))
                .expect("no global default subscriber is set yet");
        }
        None => {
            let layer = Layer::default().compact();
            tracing::subscriber::set_global_default(registry.with(layer))
                .expect("no global default subscriber is set yet");
        }
    }
    Ok(())
}
