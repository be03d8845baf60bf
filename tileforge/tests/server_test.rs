use std::sync::atomic::Ordering;
use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::web::Data;
use actix_web::{test, App};
use geozero::mvt::{Message as _, Tile};
use tempfile::TempDir;
use tileforge::scheduler::{spawn_writer, ServerStats, TileScheduler};
use tileforge::search::{FtsStore, PoiRow};
use tileforge::srv::{router, AppState};
use tileforge_core::osm::StoreBuilder;
use tileforge_mbtiles::Mbtiles;
use tileforge_tile_utils::decode_gzip;

struct TestEnv {
    /// Keeps the store files alive for the duration of the test.
    _dir: TempDir,
    state: Data<AppState>,
}

async fn test_env() -> TestEnv {
    let dir = tempfile::tempdir().unwrap();

    let mut b = StoreBuilder::new();
    b.add_node(
        101,
        (0.0, 0.0),
        &[("place", "continent"), ("name", "Atlantis")],
    );
    let world = Arc::new(b.build());
    let ocean = Arc::new(StoreBuilder::new().build());

    let mbtiles = Mbtiles::new(dir.path().join("tiles.mbtiles")).unwrap();
    let conn = mbtiles.open_or_new().await.unwrap();
    let inflight = TileScheduler::new_inflight_map();
    let writer = spawn_writer(mbtiles.clone(), conn, Arc::clone(&inflight));
    let scheduler = TileScheduler::new(
        world,
        ocean,
        2,
        inflight,
        writer,
        Arc::new(ServerStats::default()),
    );

    let fts = FtsStore::new(dir.path().join("search.sqlite")).unwrap();
    let mut fts_conn = fts.open_or_new().await.unwrap();
    fts.insert_batch(
        &mut fts_conn,
        &[
            PoiRow {
                name: "San Francisco".to_string(),
                name_en: String::new(),
                admin: "California,United States".to_string(),
                tags: "city".to_string(),
                props: r#"{"osm_id":"7","osm_type":"node","place":"city"}"#.to_string(),
                lng: -122.42,
                lat: 37.77,
            },
            PoiRow {
                name: "San Francisco Zoo".to_string(),
                name_en: String::new(),
                admin: "San Francisco,California".to_string(),
                tags: "zoo".to_string(),
                props: r#"{"osm_id":"8","osm_type":"way","tourism":"zoo"}"#.to_string(),
                lng: -122.50,
                lat: 37.73,
            },
            PoiRow {
                name: "San Bruno".to_string(),
                name_en: String::new(),
                admin: "California".to_string(),
                tags: "town".to_string(),
                props: r#"{"osm_id":"9","osm_type":"node","place":"town"}"#.to_string(),
                lng: -122.41,
                lat: 37.63,
            },
        ],
    )
    .await
    .unwrap();
    fts.rebuild_indexes(&mut fts_conn).await.unwrap();

    let state = Data::new(AppState::new(
        scheduler,
        mbtiles,
        fts,
        Some("sesame".to_string()),
        14,
    ));
    TestEnv { _dir: dir, state }
}

#[actix_rt::test]
async fn test_tile_request_validation() {
    let env = test_env().await;
    let app = test::init_service(
        App::new()
            .app_data(Data::clone(&env.state))
            .configure(router),
    )
    .await;

    // x out of range for the zoom
    let req = test::TestRequest::get().uri("/v1/3/17/1").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // beyond max zoom
    let req = test::TestRequest::get().uri("/v1/15/0/0").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // non-numeric path segments never reach the handler
    let req = test::TestRequest::get().uri("/v1/a/b/c").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_client_error());
}

#[actix_rt::test]
async fn test_tile_build_and_cache_roundtrip() {
    let env = test_env().await;
    let app = test::init_service(
        App::new()
            .app_data(Data::clone(&env.state))
            .configure(router),
    )
    .await;

    let req = test::TestRequest::get().uri("/v1/0/0/0").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/vnd.mapbox-vector-tile"
    );
    assert_eq!(resp.headers().get("content-encoding").unwrap(), "gzip");
    let body = test::read_body(resp).await;
    let tile = Tile::decode(&decode_gzip(&body).unwrap()[..]).unwrap();
    assert!(tile.layers.iter().any(|l| l.name == "place"));

    // wait until the writer has persisted the tile, then request again:
    // the store must answer without a second build
    env.state.scheduler.flush_writer().await;
    let req = test::TestRequest::get()
        .uri("/v1/0/0/0")
        .insert_header(("X-Hide-Encoding", "yes"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get("content-encoding").is_none());
    assert_eq!(
        env.state.scheduler.stats.tiles_built.load(Ordering::Relaxed),
        1
    );

    // an admin-forced rebuild bypasses the cache
    let req = test::TestRequest::get()
        .uri("/v1/0/0/0")
        .insert_header(("X-Rebuild-Tile", "1"))
        .insert_header(("X-Admin-Key", "sesame"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        env.state.scheduler.stats.tiles_built.load(Ordering::Relaxed),
        2
    );

    // a wrong admin key is served from the cache
    let req = test::TestRequest::get()
        .uri("/v1/0/0/0")
        .insert_header(("X-Rebuild-Tile", "1"))
        .insert_header(("X-Admin-Key", "wrong"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        env.state.scheduler.stats.tiles_built.load(Ordering::Relaxed),
        2
    );
}

#[actix_rt::test]
async fn test_empty_tile_is_not_found() {
    let env = test_env().await;
    let app = test::init_service(
        App::new()
            .app_data(Data::clone(&env.state))
            .configure(router),
    )
    .await;
    // a z14 tile far away from the only feature
    let req = test::TestRequest::get().uri("/v1/14/100/100").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_status_counters() {
    let env = test_env().await;
    let app = test::init_service(
        App::new()
            .app_data(Data::clone(&env.state))
            .configure(router),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/v1/0/0/0")
        .insert_header(("X-Tile-Priority", "background"))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get().uri("/status").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(body.contains("Uptime:"));
    assert!(body.contains("Reqs: 1"));
    assert!(body.contains("Background reqs: 1"));
    assert!(body.contains("Tiles built: 1"));
}

#[actix_rt::test]
async fn test_search_ranking_and_bounds() {
    let env = test_env().await;
    let app = test::init_service(
        App::new()
            .app_data(Data::clone(&env.state))
            .configure(router),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/search?q=san%20francisco&bounds=-125.0,36.0,-120.0,39.0")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2, "San Bruno does not match: {results:?}");
    // the city outranks its zoo
    assert_eq!(results[0]["tags"], "city");
    assert_eq!(results[0]["props"]["place"], "city");
    assert!(results[0]["score"].as_f64().unwrap() < results[1]["score"].as_f64().unwrap());

    // prefix matching picks up partial words
    let req = test::TestRequest::get()
        .uri("/search?q=san%20fran&debug=1")
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["total"], 2);

    // bounded search constrains through the r-tree
    let req = test::TestRequest::get()
        .uri("/search?q=san&bounded=1&bounds=-122.45,37.70,-122.30,37.80")
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["props"]["osm_id"], "7");

    // missing q is a client error
    let req = test::TestRequest::get().uri("/search").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
