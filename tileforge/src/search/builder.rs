//! Search index builder: walks the tile pyramid, extracts named features
//! per leaf tile, enriches them with their containing administrative
//! polygons, and appends rows through a single writer.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};
use tileforge_core::geom::{clip_ring_to_rect, point_in_polygon, LinearRing, Polygon, Pt};
use tileforge_core::osm::{Bounds, Key, Meters, Predicate};
use tileforge_core::tile::poi_tag_keys;
use tileforge_core::{Feature, FeatureStore};
use tileforge_tile_utils::{
    meters_per_tile, projected_meters_to_lng_lat, tile_south_west, TileId, MAX_ZOOM,
};
use tokio::sync::Semaphore;

use crate::search::fts::{FtsStore, PoiRow};
use crate::ServeResult;

/// Tiles with more features than this keep subdividing (probed lazily).
const MAX_LEAF_FEATURES: usize = 16_384;

/// Tags that mark a row as noise when nothing else describes it.
const BAD_TAGS: &[&str] = &["traffic_sign", "public_transport"];

const UNIT_MIN: Pt = Pt { x: 0.0, y: 0.0 };
const UNIT_MAX: Pt = Pt { x: 1.0, y: 1.0 };

/// An administrative polygon prepared for containment tests, in tile
/// coordinates of the leaf being indexed.
struct AdminPoly {
    level: i32,
    name: String,
    name_en: String,
    min: Pt,
    max: Pt,
    polys: Vec<Polygon>,
}

/// Pre-resolved tag keys for one store.
struct Keys {
    name: Key,
    name_en: Option<Key>,
    boundary: Option<Key>,
    admin_level: Option<Key>,
    place: Option<Key>,
    heritage: Option<Key>,
    wikipedia: Option<Key>,
    bad: Vec<Key>,
    poi: Vec<(&'static str, Key)>,
}

impl Keys {
    fn resolve(store: &FeatureStore) -> Option<Self> {
        Some(Self {
            name: store.key("name")?,
            name_en: store.key("name:en"),
            boundary: store.key("boundary"),
            admin_level: store.key("admin_level"),
            place: store.key("place"),
            heritage: store.key("heritage"),
            wikipedia: store.key("wikipedia"),
            bad: BAD_TAGS.iter().filter_map(|k| store.key(k)).collect(),
            poi: poi_tag_keys()
                .filter(|k| *k != "highway")
                .filter_map(|k| store.key(k).map(|key| (k, key)))
                .collect(),
        })
    }
}

fn tile_bounds(id: TileId) -> Bounds {
    let origin = tile_south_west(id);
    let m = meters_per_tile(id.z);
    Bounds::new(origin.0, origin.1, origin.0 + m, origin.1 + m)
}

/// Builds the whole index: expand the pyramid into leaf tiles, index the
/// leaves on the worker pool, append batches through this (single) writer,
/// then rebuild the FTS and r-tree indexes.
pub async fn build_search_index(
    world: Arc<FeatureStore>,
    store: &FtsStore,
    worker_threads: usize,
) -> ServeResult<u64> {
    let started = Instant::now();
    let mut conn = store.open_or_new().await?;

    let mut leaves = Vec::new();
    let mut stack = vec![TileId::new(0, 0, 0)];
    while let Some(id) = stack.pop() {
        let subdivide = id.z < 4
            || (id.z < 10 && world.count_exceeds(&tile_bounds(id), MAX_LEAF_FEATURES));
        if subdivide {
            for quadrant in 0..4 {
                if let Some(child) = id.child(quadrant, MAX_ZOOM) {
                    stack.push(child);
                }
            }
        } else {
            leaves.push(id);
        }
    }
    info!("Indexing {} leaf tiles", leaves.len());

    let semaphore = Arc::new(Semaphore::new(worker_threads.max(1)));
    let mut tasks = tokio::task::JoinSet::new();
    for id in leaves {
        let world = Arc::clone(&world);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("semaphore never closes");
            tokio::task::spawn_blocking(move || (id, index_tile(&world, id)))
                .await
                .unwrap_or((id, Vec::new()))
        });
    }

    let mut total = 0_u64;
    while let Some(finished) = tasks.join_next().await {
        let Ok((id, rows)) = finished else { continue };
        if rows.is_empty() {
            continue;
        }
        total += rows.len() as u64;
        debug!("Indexed {} rows for tile {id}", rows.len());
        store.insert_batch(&mut conn, &rows).await?;
    }

    info!("Creating search indexes over {total} rows");
    store.rebuild_indexes(&mut conn).await?;
    info!(
        "Search index built ({total} rows) in {:.0}s",
        started.elapsed().as_secs_f64()
    );
    Ok(total)
}

/// Indexes one leaf tile: all named features inside it, each enriched with
/// the administrative polygons containing its anchor point.
#[must_use]
pub fn index_tile(world: &FeatureStore, id: TileId) -> Vec<PoiRow> {
    let Some(keys) = Keys::resolve(world) else {
        return Vec::new();
    };
    let bounds = tile_bounds(id);
    let origin = tile_south_west(id);
    let scale = 1.0 / meters_per_tile(id.z);
    let to_tile = |m: Meters| {
        Pt::new(
            ((m.0 - origin.0) * scale) as f32,
            ((m.1 - origin.1) * scale) as f32,
        )
    };

    let admins = collect_admins(world, &keys, &bounds, to_tile);

    let mut rows = Vec::new();
    for feat in world.query_box(&bounds) {
        let name = feat.tag(keys.name);
        if !name.is_set() {
            continue;
        }
        // admin areas are indexed through their place nodes instead
        let boundary = keys.boundary.map_or_else(Default::default, |k| feat.tag(k));
        let own_level = keys
            .admin_level
            .and_then(|k| feat.tag(k).num())
            .map(|l| l as i32);
        if (boundary == "administrative" || boundary == "disputed") && own_level.is_some() {
            continue;
        }
        let p = to_tile(feat.xy());
        if p.x < 0.0 || p.y < 0.0 || p.x > 1.0 || p.y > 1.0 {
            continue; // belongs to a neighbor tile
        }

        let tags = tag_string(feat, &keys);
        if tags.is_empty() && keys.bad.iter().any(|&k| feat.tag(k).is_set()) {
            continue;
        }

        let mut admin_names: Vec<&str> = Vec::new();
        let mut last_level = None;
        for admin in &admins {
            if own_level.is_some_and(|own| admin.level <= own) {
                continue;
            }
            if last_level == Some(admin.level) {
                continue;
            }
            if p.x < admin.min.x || p.y < admin.min.y || p.x > admin.max.x || p.y > admin.max.y {
                continue;
            }
            if admin.polys.iter().any(|poly| point_in_polygon(poly, p)) {
                admin_names.push(&admin.name);
                if !admin.name_en.is_empty() && admin.name_en != admin.name {
                    admin_names.push(&admin.name_en);
                }
                last_level = Some(admin.level);
            }
        }

        let name_en = keys
            .name_en
            .map_or("", |k| feat.tag(k).as_str())
            .to_string();
        let lnglat = projected_meters_to_lng_lat(feat.xy());
        rows.push(PoiRow {
            name: name.as_str().to_string(),
            name_en: if name_en == name.as_str() { String::new() } else { name_en },
            admin: admin_names.join(","),
            tags,
            props: props_json(feat, &keys),
            lng: lnglat.lng,
            lat: lnglat.lat,
        });
    }
    rows
}

fn collect_admins(
    world: &FeatureStore,
    keys: &Keys,
    bounds: &Bounds,
    to_tile: impl Fn(Meters) -> Pt,
) -> Vec<AdminPoly> {
    let predicate =
        Predicate::parse("wra[boundary=administrative,disputed]").expect("static query");
    let mut admins = Vec::new();
    for feat in world.query(&predicate, bounds) {
        let Some(level) = keys.admin_level.and_then(|k| feat.tag(k).num()) else {
            continue;
        };
        let level = level as i32;
        if !(2..=8).contains(&level) || !feat.is_area() {
            continue;
        }
        let name = feat.tag(keys.name);
        if !name.is_set() {
            continue;
        }

        let mut min = Pt::new(f32::MAX, f32::MAX);
        let mut max = Pt::new(f32::MIN, f32::MIN);
        let mut polys = Vec::new();
        for rings in feat.polygons() {
            let clipped: Polygon = rings
                .iter()
                .map(|ring| {
                    let pts: LinearRing = ring.iter().map(|&m| to_tile(m)).collect();
                    clip_ring_to_rect(&pts, UNIT_MIN, UNIT_MAX)
                })
                .filter(|ring| ring.len() >= 4)
                .collect();
            for ring in &clipped {
                for &pt in ring {
                    min = min.min(pt);
                    max = max.max(pt);
                }
            }
            if !clipped.is_empty() {
                polys.push(clipped);
            }
        }
        if polys.is_empty() {
            continue;
        }
        admins.push(AdminPoly {
            level,
            name: name.as_str().to_string(),
            name_en: keys
                .name_en
                .map_or("", |k| feat.tag(k).as_str())
                .to_string(),
            min,
            max,
            polys,
        });
    }
    // innermost (highest level, smallest area) first
    admins.sort_by(|a, b| b.level.cmp(&a.level));
    admins
}

/// Ranking tags: the place class outranks everything else; otherwise
/// heritage and wikipedia lead, followed by the POI tag values.
fn tag_string(feat: &Feature, keys: &Keys) -> String {
    let mut tags: Vec<&str> = Vec::new();
    let place = keys.place.map_or_else(Default::default, |k| feat.tag(k));
    if place.is_set() {
        tags.push(place.as_str());
    } else {
        if keys.heritage.is_some_and(|k| feat.tag(k).is_set()) {
            tags.push("heritage");
        }
        if keys.wikipedia.is_some_and(|k| feat.tag(k).is_set()) {
            tags.push("wikipedia");
        }
        for &(_, key) in &keys.poi {
            let val = feat.tag(key);
            if val.is_set() {
                tags.push(val.as_str());
            }
        }
    }
    tags.join(" ")
}

/// The JSON blob handed back verbatim by `/search`.
fn props_json(feat: &Feature, keys: &Keys) -> String {
    let mut map = serde_json::Map::new();
    map.insert("osm_id".into(), feat.id.to_string().into());
    map.insert("osm_type".into(), feat.kind.as_str().into());
    map.insert(
        "name".into(),
        feat.tag(keys.name).as_str().to_string().into(),
    );
    if let Some(k) = keys.name_en {
        let name_en = feat.tag(k);
        if name_en.is_set() {
            map.insert("name:en".into(), name_en.as_str().to_string().into());
        }
    }
    if let Some(k) = keys.place {
        let place = feat.tag(k);
        if place.is_set() {
            map.insert("place".into(), place.as_str().to_string().into());
        }
    }
    for &(name, key) in &keys.poi {
        let val = feat.tag(key);
        if val.is_set() {
            map.insert(name.into(), val.as_str().to_string().into());
        }
    }
    serde_json::Value::Object(map).to_string()
}

#[cfg(test)]
mod tests {
    use tileforge_core::osm::StoreBuilder;
    use tileforge_tile_utils::{lng_lat_to_meters, LngLat};

    use super::*;

    fn meters(lng: f64, lat: f64) -> Meters {
        lng_lat_to_meters(LngLat::new(lng, lat))
    }

    fn test_world() -> FeatureStore {
        let mut b = StoreBuilder::new();
        // an admin polygon around the prime meridian area
        let sw = meters(-5.0, -5.0);
        let ne = meters(5.0, 5.0);
        b.add_multipolygon(
            900,
            vec![vec![vec![
                (sw.0, sw.1),
                (ne.0, sw.1),
                (ne.0, ne.1),
                (sw.0, ne.1),
                (sw.0, sw.1),
            ]]],
            &[
                ("type", "boundary"),
                ("boundary", "administrative"),
                ("admin_level", "4"),
                ("name", "Meridia"),
            ],
            Vec::new(),
        );
        b.add_node(
            1,
            meters(1.0, 1.0),
            &[("place", "city"), ("name", "Nullville")],
        );
        b.add_node(
            2,
            meters(2.0, 2.0),
            &[("amenity", "restaurant"), ("name", "Null Diner"), ("cuisine", "regional")],
        );
        b.add_node(3, meters(3.0, 3.0), &[("highway", "stop")]);
        b.build()
    }

    #[test]
    fn test_index_tile_rows() {
        let world = test_world();
        // z4 tile covering the +lng/+lat quadrant near the origin
        let id = TileId::new(8, 7, 4);
        let rows = index_tile(&world, id);
        assert_eq!(rows.len(), 2);

        let city = rows.iter().find(|r| r.name == "Nullville").unwrap();
        assert_eq!(city.tags, "city");
        assert!(city.admin.contains("Meridia"));
        let props: serde_json::Value = serde_json::from_str(&city.props).unwrap();
        assert_eq!(props["osm_type"], "node");
        assert_eq!(props["place"], "city");

        let diner = rows.iter().find(|r| r.name == "Null Diner").unwrap();
        assert_eq!(diner.tags, "restaurant");
        assert!(diner.admin.contains("Meridia"));
    }

    #[test]
    fn test_admin_feature_not_self_indexed() {
        let mut b = StoreBuilder::new();
        let sw = meters(-5.0, -5.0);
        let ne = meters(5.0, 5.0);
        b.add_multipolygon(
            900,
            vec![vec![vec![
                (sw.0, sw.1),
                (ne.0, sw.1),
                (ne.0, ne.1),
                (sw.0, ne.1),
                (sw.0, sw.1),
            ]]],
            &[
                ("type", "boundary"),
                ("boundary", "administrative"),
                ("admin_level", "4"),
                ("name", "Meridia"),
            ],
            Vec::new(),
        );
        let world = b.build();
        let rows = index_tile(&world, TileId::new(8, 7, 4));
        assert!(rows.is_empty());
    }

    #[test]
    fn test_point_outside_tile_skipped() {
        let mut b = StoreBuilder::new();
        b.add_node(1, meters(-1.0, 1.0), &[("place", "town"), ("name", "West")]);
        let world = b.build();
        // tile east of the meridian does not own the western node
        let rows = index_tile(&world, TileId::new(8, 7, 4));
        assert!(rows.is_empty());
    }
}
