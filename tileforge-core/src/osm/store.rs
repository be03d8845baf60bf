//! In-memory feature store: a GeoJSON-loaded, R-tree indexed view of an
//! OSM extract. Tag keys are interned to small integer codes owned by the
//! store; a [`Key`] stays valid for as long as its store.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use geo_index::rtree::sort::HilbertSort;
use geo_index::rtree::{RTree, RTreeBuilder, RTreeIndex as _};
use geojson::GeoJson;
use log::{debug, warn};
use tileforge_tile_utils::{lng_lat_to_meters, LngLat};

use crate::osm::query::Predicate;
use crate::osm::{Bounds, Feature, FeatureGeometry, FeatureKind, Meters};

/// An interned tag key, valid for the store that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key(pub(crate) u32);

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Cannot read feature file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid GeoJSON: {0}")]
    GeoJsonError(#[from] Box<serde_json::Error>),

    #[error("Feature file must contain a GeoJSON FeatureCollection")]
    NotFeatureCollection,
}

pub struct FeatureStore {
    features: Vec<Feature>,
    key_names: Vec<String>,
    key_codes: HashMap<String, u32>,
    by_id: HashMap<(FeatureKind, i64), usize>,
    rtree: Option<RTree<f64>>,
}

impl std::fmt::Debug for FeatureStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureStore")
            .field("features", &self.features.len())
            .field("keys", &self.key_names.len())
            .finish()
    }
}

impl FeatureStore {
    /// Loads a GeoJSON FeatureCollection with OSM-style string tags in
    /// `properties`. The metadata keys `@id`, `@type` and `@members` carry
    /// the OSM identity; everything else becomes a tag.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let file = File::open(path.as_ref())?;
        let geojson = GeoJson::from_reader(BufReader::new(file)).map_err(Box::new)?;
        let GeoJson::FeatureCollection(fc) = geojson else {
            return Err(StoreError::NotFeatureCollection);
        };

        let mut builder = StoreBuilder::new();
        for (idx, feature) in fc.features.into_iter().enumerate() {
            let Some(geometry) = feature.geometry else {
                debug!("Skipping feature without geometry at index {idx}");
                continue;
            };
            let mut tags: Vec<(String, String)> = Vec::new();
            let mut id: Option<i64> = None;
            let mut kind: Option<FeatureKind> = None;
            let mut members: Vec<(FeatureKind, i64)> = Vec::new();
            if let Some(props) = feature.properties {
                for (key, value) in props {
                    match key.as_str() {
                        "@id" => id = value.as_i64(),
                        "@type" => kind = parse_kind(value.as_str().unwrap_or_default()),
                        "@members" => members = parse_members(&value),
                        _ => {
                            if let Some(v) = scalar_to_tag(&value) {
                                tags.push((key, v));
                            }
                        }
                    }
                }
            }
            if id.is_none() {
                if let Some(geojson::feature::Id::Number(n)) = feature.id {
                    id = n.as_i64();
                }
            }
            let id = id.unwrap_or_else(|| -(i64::try_from(idx).unwrap_or(0) + 1));
            let tag_refs: Vec<(&str, &str)> =
                tags.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

            match geometry.value {
                geojson::Value::Point(p) => {
                    builder.add_node(id, to_meters(&p), &tag_refs);
                }
                geojson::Value::LineString(line) => {
                    let pts = line.iter().map(|p| to_meters(p)).collect();
                    builder.add_way(id, pts, &tag_refs);
                }
                geojson::Value::Polygon(rings) => {
                    let rings: Vec<Vec<Meters>> = rings
                        .iter()
                        .map(|r| r.iter().map(|p| to_meters(p)).collect())
                        .collect();
                    if kind == Some(FeatureKind::Relation) || rings.len() > 1 {
                        builder.add_multipolygon(id, vec![rings], &tag_refs, members);
                    } else {
                        builder.add_area_way(id, rings.into_iter().next().unwrap_or_default(), &tag_refs);
                    }
                }
                geojson::Value::MultiPolygon(polys) => {
                    let polys: Vec<Vec<Vec<Meters>>> = polys
                        .iter()
                        .map(|poly| {
                            poly.iter()
                                .map(|r| r.iter().map(|p| to_meters(p)).collect())
                                .collect()
                        })
                        .collect();
                    builder.add_multipolygon(id, polys, &tag_refs, members);
                }
                geojson::Value::MultiLineString(_) if kind == Some(FeatureKind::Relation) => {
                    builder.add_relation(id, members, &tag_refs);
                }
                other => {
                    warn!("Skipping unsupported geometry {other:?} for feature {id}");
                }
            }
        }
        Ok(builder.build())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn all_features(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    #[must_use]
    pub fn key(&self, name: &str) -> Option<Key> {
        self.key_codes.get(name).copied().map(Key)
    }

    #[must_use]
    pub fn key_name(&self, key: Key) -> &str {
        &self.key_names[key.0 as usize]
    }

    /// All `(key, value)` tags of a feature.
    pub fn feature_tags<'a>(
        &'a self,
        feature: &'a Feature,
    ) -> impl Iterator<Item = (&'a str, &'a str)> {
        feature
            .tags
            .iter()
            .map(|(code, v)| (self.key_names[*code as usize].as_str(), v.as_str()))
    }

    #[must_use]
    pub fn get(&self, kind: FeatureKind, id: i64) -> Option<&Feature> {
        self.by_id.get(&(kind, id)).map(|&i| &self.features[i])
    }

    fn candidates(&self, bounds: &Bounds) -> Vec<usize> {
        let Some(rtree) = &self.rtree else {
            return Vec::new();
        };
        let mut hits: Vec<usize> = rtree
            .search(bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y)
            .into_iter()
            .map(|i| i as usize)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Features whose bounds intersect `bounds`, in load order.
    #[must_use]
    pub fn query_box(&self, bounds: &Bounds) -> Vec<&Feature> {
        self.candidates(bounds)
            .into_iter()
            .map(|i| &self.features[i])
            .filter(|f| f.bounds.intersects(bounds))
            .collect()
    }

    /// Features in `bounds` matching an attribute predicate.
    #[must_use]
    pub fn query(&self, predicate: &Predicate, bounds: &Bounds) -> Vec<&Feature> {
        self.query_box(bounds)
            .into_iter()
            .filter(|f| predicate.matches(f, self))
            .collect()
    }

    /// Short-circuiting probe: does the box hold more than `limit` features?
    #[must_use]
    pub fn count_exceeds(&self, bounds: &Bounds, limit: usize) -> bool {
        let mut count = 0;
        for i in self.candidates(bounds) {
            if self.features[i].bounds.intersects(bounds) {
                count += 1;
                if count > limit {
                    return true;
                }
            }
        }
        false
    }

    /// Area features containing the given geographic position.
    #[must_use]
    pub fn containing_lng_lat(&self, lng: f64, lat: f64) -> Vec<&Feature> {
        let p = lng_lat_to_meters(LngLat::new(lng, lat));
        let probe = Bounds::new(p.0, p.1, p.0, p.1);
        self.candidates(&probe)
            .into_iter()
            .map(|i| &self.features[i])
            .filter(|f| f.is_area() && f.bounds.contains(p))
            .filter(|f| f.polygons().iter().any(|poly| polygon_contains(poly, p)))
            .collect()
    }
}

/// Even-odd test in projected meters, all rings of the polygon together.
fn polygon_contains(polygon: &[Vec<Meters>], p: Meters) -> bool {
    let mut inside = false;
    for ring in polygon {
        let n = ring.len();
        let mut j = n.wrapping_sub(1);
        for i in 0..n {
            let (a, b) = (ring[i], ring[j]);
            if (a.1 > p.1) != (b.1 > p.1) && p.0 < (b.0 - a.0) * (p.1 - a.1) / (b.1 - a.1) + a.0 {
                inside = !inside;
            }
            j = i;
        }
    }
    inside
}

fn to_meters(position: &[f64]) -> Meters {
    lng_lat_to_meters(LngLat::new(position[0], position[1]))
}

fn parse_kind(s: &str) -> Option<FeatureKind> {
    match s {
        "node" => Some(FeatureKind::Node),
        "way" => Some(FeatureKind::Way),
        "relation" => Some(FeatureKind::Relation),
        _ => None,
    }
}

fn parse_members(value: &serde_json::Value) -> Vec<(FeatureKind, i64)> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|m| {
            if let Some(id) = m.as_i64() {
                return Some((FeatureKind::Way, id));
            }
            let obj = m.as_object()?;
            let kind = parse_kind(obj.get("type")?.as_str()?)?;
            let id = obj.get("ref")?.as_i64()?;
            Some((kind, id))
        })
        .collect()
}

fn scalar_to_tag(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(if *b { "yes" } else { "no" }.to_string()),
        _ => None,
    }
}

/// Programmatic store construction; also the backend of the GeoJSON loader.
#[derive(Debug, Default)]
pub struct StoreBuilder {
    features: Vec<Feature>,
    key_names: Vec<String>,
    key_codes: HashMap<String, u32>,
}

impl StoreBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, name: &str) -> u32 {
        if let Some(&code) = self.key_codes.get(name) {
            return code;
        }
        let code = u32::try_from(self.key_names.len()).expect("fewer than 2^32 tag keys");
        self.key_codes.insert(name.to_string(), code);
        self.key_names.push(name.to_string());
        code
    }

    fn intern_tags(&mut self, tags: &[(&str, &str)]) -> Vec<(u32, String)> {
        tags.iter()
            .map(|(k, v)| (self.intern(k), (*v).to_string()))
            .collect()
    }

    pub fn add_node(&mut self, id: i64, at: Meters, tags: &[(&str, &str)]) {
        let tags = self.intern_tags(tags);
        let mut bounds = Bounds::empty();
        bounds.extend(at);
        self.features.push(Feature {
            id,
            kind: FeatureKind::Node,
            tags,
            geometry: FeatureGeometry::Point(at),
            bounds,
            members: Vec::new(),
            belongs_to_relation: false,
        });
    }

    pub fn add_way(&mut self, id: i64, pts: Vec<Meters>, tags: &[(&str, &str)]) {
        let tags = self.intern_tags(tags);
        let mut bounds = Bounds::empty();
        for &p in &pts {
            bounds.extend(p);
        }
        self.features.push(Feature {
            id,
            kind: FeatureKind::Way,
            tags,
            geometry: FeatureGeometry::Line(pts),
            bounds,
            members: Vec::new(),
            belongs_to_relation: false,
        });
    }

    /// A closed way forming an area; `ring` carries the explicit closing
    /// point.
    pub fn add_area_way(&mut self, id: i64, mut ring: Vec<Meters>, tags: &[(&str, &str)]) {
        if ring.first() != ring.last() {
            if let Some(&first) = ring.first() {
                ring.push(first);
            }
        }
        let tags = self.intern_tags(tags);
        let mut bounds = Bounds::empty();
        for &p in &ring {
            bounds.extend(p);
        }
        self.features.push(Feature {
            id,
            kind: FeatureKind::Way,
            tags,
            geometry: FeatureGeometry::Polygon(vec![ring]),
            bounds,
            members: Vec::new(),
            belongs_to_relation: false,
        });
    }

    /// A multipolygon relation with assembled rings (outer first per
    /// polygon). A `type=multipolygon` tag is implied when absent.
    pub fn add_multipolygon(
        &mut self,
        id: i64,
        polys: Vec<Vec<Vec<Meters>>>,
        tags: &[(&str, &str)],
        members: Vec<(FeatureKind, i64)>,
    ) {
        let mut tags = self.intern_tags(tags);
        let type_code = self.intern("type");
        if !tags.iter().any(|(c, _)| *c == type_code) {
            tags.push((type_code, "multipolygon".to_string()));
        }
        let mut bounds = Bounds::empty();
        for poly in &polys {
            for ring in poly {
                for &p in ring {
                    bounds.extend(p);
                }
            }
        }
        self.features.push(Feature {
            id,
            kind: FeatureKind::Relation,
            tags,
            geometry: FeatureGeometry::MultiPolygon(polys),
            bounds,
            members,
            belongs_to_relation: false,
        });
    }

    /// A non-area relation (route, boundary); geometry comes from members.
    pub fn add_relation(
        &mut self,
        id: i64,
        members: Vec<(FeatureKind, i64)>,
        tags: &[(&str, &str)],
    ) {
        let tags = self.intern_tags(tags);
        self.features.push(Feature {
            id,
            kind: FeatureKind::Relation,
            tags,
            geometry: FeatureGeometry::Line(Vec::new()),
            bounds: Bounds::empty(),
            members,
            belongs_to_relation: false,
        });
    }

    #[must_use]
    pub fn build(mut self) -> FeatureStore {
        let mut by_id = HashMap::with_capacity(self.features.len());
        for (i, f) in self.features.iter().enumerate() {
            by_id.insert((f.kind, f.id), i);
        }

        // member-derived bounds and relation membership flags
        let memberships: Vec<(usize, Vec<usize>)> = self
            .features
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.members.is_empty())
            .map(|(i, f)| {
                let members = f
                    .members
                    .iter()
                    .filter_map(|m| by_id.get(m).copied())
                    .collect();
                (i, members)
            })
            .collect();
        for (rel, members) in &memberships {
            let mut bounds = self.features[*rel].bounds;
            if bounds == Bounds::empty() {
                for &m in members {
                    let mb = self.features[m].bounds;
                    bounds.extend((mb.min_x, mb.min_y));
                    bounds.extend((mb.max_x, mb.max_y));
                }
                self.features[*rel].bounds = bounds;
            }
            for &m in members {
                self.features[m].belongs_to_relation = true;
            }
        }

        let rtree = if self.features.is_empty() {
            None
        } else {
            let count = u32::try_from(self.features.len()).expect("fewer than 2^32 features");
            let mut builder = RTreeBuilder::<f64>::new(count);
            for f in &self.features {
                builder.add(f.bounds.min_x, f.bounds.min_y, f.bounds.max_x, f.bounds.max_y);
            }
            Some(builder.finish::<HilbertSort>())
        };

        FeatureStore {
            features: self.features,
            key_names: self.key_names,
            key_codes: self.key_codes,
            by_id,
            rtree,
        }
    }
}
