//! Builds one MVT tile: loads features inside the tile box, routes them
//! through the classifier, and assembles clipped, simplified geometries into
//! per-layer feature builders.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use geozero::mvt::tile::GeomType;
use log::{debug, error, info, warn};
use tileforge_tile_utils::{
    encode_gzip, meters_per_tile, projected_meters_to_lng_lat, tile_center, tile_south_west,
    TileId,
};

use crate::geom::{
    bounds_of, clip_lines_to_rect, clip_ring_to_rect, polylabel, simplify_rdp, LinearRing,
    MultiLineString, MultiPolygon, Polygon, Pt,
};
use crate::mvt::{encode_tile, GeomEncoder, LayerBuilder, TileValue, EXTENT};
use crate::osm::{Bounds, Feature, FeatureKind, FeatureStore, Meters, Predicate, TagValue};
use crate::tile::schema;

/// Synthetic feature id used while emitting ocean geometry.
pub const OCEAN_ID: i64 = -2;

const TILE_EXTENT: f32 = EXTENT as f32;
const UNIT_MIN: Pt = Pt { x: 0.0, y: 0.0 };
const UNIT_MAX: Pt = Pt { x: 1.0, y: 1.0 };

fn in_unit(p: Pt) -> bool {
    p.x >= 0.0 && p.y >= 0.0 && p.x <= 1.0 && p.y <= 1.0
}

/// Per-feature scratch, invalidated whenever the current feature changes.
#[derive(Debug, Default)]
struct FeatureCache {
    /// Area in mercator m², holes subtracted; `None` until loaded.
    area: Option<f64>,
    /// Clipped polygons in tile coords, winding normalized for MVT.
    mpoly: MultiPolygon,
    /// Pre-clip bbox in tile coords.
    poly_min: Pt,
    poly_max: Pt,
    /// Pre-clip centroid in tile coords.
    centroid: Pt,
}

#[derive(Debug)]
struct Pending {
    layer: usize,
    geom: GeomEncoder,
    props: Vec<(String, TileValue)>,
}

pub struct TileBuilder<'a> {
    id: TileId,
    world: &'a FeatureStore,
    ocean: &'a FeatureStore,
    /// Tile box in projected meters, for store queries and member tests.
    tile_bounds: Bounds,
    origin: Meters,
    scale: f64,
    simplify_thresh: f32,

    layers: Vec<LayerBuilder>,
    pending: Option<Pending>,
    has_geom: bool,

    feat: Option<&'a Feature>,
    feat_store: &'a FeatureStore,
    feat_id: i64,
    cache: FeatureCache,

    coastline: MultiLineString,

    built_feats: u32,
    built_pts: u32,
}

impl<'a> TileBuilder<'a> {
    fn new(world: &'a FeatureStore, ocean: &'a FeatureStore, id: TileId) -> Self {
        let origin = tile_south_west(id);
        let tile_meters = meters_per_tile(id.z);
        let layers = schema::LAYERS
            .iter()
            .map(|name| LayerBuilder::new(*name, EXTENT))
            .collect();
        Self {
            id,
            world,
            ocean,
            tile_bounds: Bounds::new(
                origin.0,
                origin.1,
                origin.0 + tile_meters,
                origin.1 + tile_meters,
            ),
            origin,
            scale: 1.0 / tile_meters,
            // no simplification at the highest zoom, which can be over-zoomed
            simplify_thresh: if id.z < 14 { 1.0 / 512.0 } else { 0.0 },
            layers,
            pending: None,
            has_geom: false,
            feat: None,
            feat_store: world,
            feat_id: -1,
            cache: FeatureCache::default(),
            coastline: Vec::new(),
            built_feats: 0,
            built_pts: 0,
        }
    }

    // ---- feature context -------------------------------------------------

    pub(crate) fn set_feature(&mut self, feat: &'a Feature, store: &'a FeatureStore) {
        self.feat = Some(feat);
        self.feat_store = store;
        self.feat_id = feat.id;
        self.cache = FeatureCache::default();
    }

    fn clear_feature(&mut self) {
        self.feat = None;
        self.cache = FeatureCache::default();
    }

    #[must_use]
    pub fn feature(&self) -> Option<&'a Feature> {
        self.feat
    }

    #[must_use]
    pub fn store(&self) -> &'a FeatureStore {
        self.feat_store
    }

    #[must_use]
    pub fn zoom(&self) -> u8 {
        self.id.z
    }

    #[must_use]
    pub fn feat_id(&self) -> i64 {
        self.feat_id
    }

    #[must_use]
    pub fn tile_bounds(&self) -> Bounds {
        self.tile_bounds
    }

    /// Looks up a tag on the current feature.
    #[must_use]
    pub fn find(&self, key: &str) -> TagValue<'a> {
        let Some(feat) = self.feat else {
            return TagValue(None);
        };
        self.feat_store
            .key(key)
            .map_or(TagValue(None), |k| feat.tag(k))
    }

    #[must_use]
    pub fn holds(&self, key: &str) -> bool {
        self.find(key).is_set()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.feat.is_some_and(Feature::is_area)
    }

    #[must_use]
    pub fn length(&self) -> f64 {
        self.feat.map_or(0.0, Feature::length)
    }

    /// Mercator m² area of the current feature, cached per feature.
    pub fn area(&mut self) -> f64 {
        if let Some(area) = self.cache.area {
            return area;
        }
        if !self.is_closed() {
            self.cache.area = Some(0.0);
            return 0.0;
        }
        self.load_area_feature();
        self.cache.area.unwrap_or(0.0)
    }

    // ---- attribute emission ----------------------------------------------

    /// No-op when the value is absent or empty.
    pub fn attribute(&mut self, key: &str, value: TagValue<'_>) {
        if value.is_set() {
            self.push_prop(key, TileValue::Str(value.as_str().to_string()));
        }
    }

    pub fn attribute_str(&mut self, key: &str, value: &str) {
        if !value.is_empty() {
            self.push_prop(key, TileValue::Str(value.to_string()));
        }
    }

    pub fn attribute_num(&mut self, key: &str, value: f64) {
        self.push_prop(key, TileValue::Double(value));
    }

    pub fn attribute_float(&mut self, key: &str, value: f32) {
        self.push_prop(key, TileValue::Float(value));
    }

    pub fn attribute_int(&mut self, key: &str, value: i64) {
        self.push_prop(key, TileValue::Int(value));
    }

    fn push_prop(&mut self, key: &str, value: TileValue) {
        if let Some(pending) = &mut self.pending {
            pending.props.push((key.to_string(), value));
        }
    }

    #[must_use]
    pub fn min_zoom(&self, z: i32) -> bool {
        i32::from(self.id.z) >= z
    }

    /// Area gate: a feature is visible once it would cover more than a
    /// (1/256)-tile pixel at the previous zoom. z14 always passes; geometry
    /// degenerate enough to wrap past ±85° latitude never does.
    pub fn set_min_zoom_by_area(&mut self, area: f64) -> bool {
        if self.id.z >= 14 {
            return true;
        }
        let threshold = (meters_per_tile(self.id.z.saturating_sub(1)) / 256.0).powi(2);
        if let Some(feat) = self.feat {
            if feat.bounds.height() > tileforge_tile_utils::EARTH_CIRCUMFERENCE / 4.0 {
                return false;
            }
            // bbox area is a cheap upper bound; skip the exact load if even
            // that cannot reach the threshold
            if area <= 0.0 && feat.bounds.area() < threshold {
                return false;
            }
        }
        let area = if area > 0.0 { area } else { self.area() };
        area > threshold
    }

    // ---- layer switching -------------------------------------------------

    pub fn layer(&mut self, name: &str, is_closed: bool) {
        self.open_layer(name, is_closed, false);
    }

    pub fn layer_as_centroid(&mut self, name: &str) {
        self.open_layer(name, false, true);
    }

    /// Finalizes the in-progress feature (commit if it acquired geometry,
    /// discard otherwise) and opens the next one. An empty name only
    /// flushes.
    fn open_layer(&mut self, name: &str, _is_closed: bool, as_centroid: bool) {
        if let Some(pending) = self.pending.take() {
            if self.has_geom && !pending.geom.is_empty() {
                self.built_feats += 1;
                self.layers[pending.layer].add_feature(pending.geom, pending.props);
            }
        }
        self.has_geom = false;
        if name.is_empty() {
            return;
        }
        let Some(layer) = self.layers.iter().position(|l| l.name() == name) else {
            warn!("Layer not found: {name}");
            return;
        };

        let Some(feat) = self.feat else {
            // synthesized ocean polygon
            let mut geom = GeomEncoder::new(GeomType::Polygon);
            self.build_coastline(&mut geom);
            self.pending = Some(Pending {
                layer,
                geom,
                props: Vec::new(),
            });
            return;
        };

        if feat.kind == FeatureKind::Node || as_centroid {
            let p = if feat.is_area() {
                self.load_area_feature();
                self.label_anchor()
            } else {
                self.to_tile_coord(feat.centroid())
            };
            let mut geom = GeomEncoder::new(GeomType::Point);
            self.has_geom = in_unit(p);
            if self.has_geom {
                let (ix, iy) = quantize(p);
                geom.add_point(ix, iy);
                self.built_pts += 1;
            }
            self.pending = Some(Pending {
                layer,
                geom,
                props: Vec::new(),
            });
        } else if feat.is_area() {
            self.load_area_feature();
            let mut geom = GeomEncoder::new(GeomType::Polygon);
            self.build_polygon(&mut geom);
            self.pending = Some(Pending {
                layer,
                geom,
                props: Vec::new(),
            });
        } else {
            let mut geom = GeomEncoder::new(GeomType::Linestring);
            if feat.kind == FeatureKind::Way {
                self.build_line(feat, &mut geom);
            } else {
                // relations contribute every way member touching the tile
                let store = self.feat_store;
                for (kind, member_id) in &feat.members {
                    if *kind != FeatureKind::Way {
                        continue;
                    }
                    if let Some(member) = store.get(*kind, *member_id) {
                        if self.tile_bounds.intersects(&member.bounds) {
                            self.build_line(member, &mut geom);
                        }
                    }
                }
            }
            self.pending = Some(Pending {
                layer,
                geom,
                props: Vec::new(),
            });
        }
    }

    // ---- geometry loading ------------------------------------------------

    fn to_tile_coord(&self, m: Meters) -> Pt {
        Pt::new(
            ((m.0 - self.origin.0) * self.scale) as f32,
            ((m.1 - self.origin.1) * self.scale) as f32,
        )
    }

    /// Simplifies, quantizes to integer tile units with the y-flip, and
    /// drops consecutive duplicates.
    fn to_tile_pts(&self, pts: &[Pt]) -> Vec<(i32, i32)> {
        let keep = simplify_rdp(pts, self.simplify_thresh);
        let mut out: Vec<(i32, i32)> = Vec::with_capacity(pts.len());
        for (i, &p) in pts.iter().enumerate() {
            if !keep.is_empty() && !keep[i] {
                continue;
            }
            let ip = quantize(p);
            if out.last() != Some(&ip) {
                out.push(ip);
            }
        }
        out
    }

    /// Loads one clipped linestring per piece of the way inside the tile.
    fn load_way_lines(&self, way: &Feature) -> MultiLineString {
        let Some(coords) = way.way_coords() else {
            return Vec::new();
        };
        let pts: Vec<Pt> = coords.iter().map(|&m| self.to_tile_coord(m)).collect();
        if pts.is_empty() {
            return Vec::new();
        }
        let (pmin, pmax) = bounds_of(&pts);
        if pmin.x > 1.0 || pmin.y > 1.0 || pmax.x < 0.0 || pmax.y < 0.0 {
            Vec::new()
        } else if pmin.x < 0.0 || pmin.y < 0.0 || pmax.x > 1.0 || pmax.y > 1.0 {
            clip_lines_to_rect(&pts, UNIT_MIN, UNIT_MAX)
        } else {
            vec![pts]
        }
    }

    fn build_line(&mut self, way: &Feature, geom: &mut GeomEncoder) {
        for line in self.load_way_lines(way) {
            let tile_pts = self.to_tile_pts(&line);
            if tile_pts.len() > 1 {
                self.has_geom = true;
                self.built_pts += tile_pts.len() as u32;
                geom.add_linestring(&tile_pts);
            }
        }
    }

    /// Accumulates tile-clipped coastline pieces for the ocean pass.
    pub(crate) fn add_coastline(&mut self) {
        if let Some(feat) = self.feat {
            let mut pieces = self.load_way_lines(feat);
            self.coastline.append(&mut pieces);
        }
    }

    /// Loads the current area feature into the per-feature cache: clipped
    /// polygons, pre-clip bbox and centroid, and mercator m² area. Outer
    /// rings end up clockwise in these y-up coords so they come out
    /// counter-clockwise after the MVT y-flip.
    fn load_area_feature(&mut self) {
        if self.cache.area.is_some() {
            return;
        }
        let Some(feat) = self.feat else {
            return;
        };
        let mut area_sum = 0.0_f64;
        let mut centroid = (0.0_f64, 0.0_f64);
        let mut poly_min = Pt::new(f32::MAX, f32::MAX);
        let mut poly_max = Pt::new(f32::MIN, f32::MIN);
        let mut mpoly: MultiPolygon = Vec::new();

        for rings in feat.polygons() {
            let mut poly: Polygon = Vec::new();
            for (i, ring) in rings.iter().enumerate() {
                let outer = i == 0;
                let mut pts: LinearRing =
                    ring.iter().map(|&m| self.to_tile_coord(m)).collect();
                let (pmin, pmax) = bounds_of(&pts);

                // area and centroid of the whole ring, before clipping
                let mut ring_area2 = 0.0_f64;
                let mut ring_centroid = (0.0_f64, 0.0_f64);
                for w in pts.windows(2) {
                    let a = f64::from(w[0].x) * f64::from(w[1].y)
                        - f64::from(w[1].x) * f64::from(w[0].y);
                    ring_area2 += a;
                    ring_centroid.0 += a * f64::from(w[0].x + w[1].x);
                    ring_centroid.1 += a * f64::from(w[0].y + w[1].y);
                }

                if pmin.x > 1.0 || pmin.y > 1.0 || pmax.x < 0.0 || pmax.y < 0.0 {
                    pts.clear();
                } else if pmin.x < 0.0 || pmin.y < 0.0 || pmax.x > 1.0 || pmax.y > 1.0 {
                    pts = clip_ring_to_rect(&pts, UNIT_MIN, UNIT_MAX);
                }
                poly_min = poly_min.min(pmin);
                poly_max = poly_max.max(pmax);

                let rev = (ring_area2 > 0.0) == outer;
                if rev {
                    pts.reverse();
                }
                let sign = if rev { 1.0 } else { -1.0 };
                area_sum += sign * ring_area2 / 2.0;
                centroid.0 += sign * ring_centroid.0;
                centroid.1 += sign * ring_centroid.1;

                if outer {
                    poly.push(pts);
                } else if !pts.is_empty() {
                    poly.push(pts);
                }
            }
            mpoly.push(poly);
        }

        self.cache.centroid = if area_sum == 0.0 {
            Pt::new(-1.0, -1.0)
        } else {
            Pt::new(
                (centroid.0 / (6.0 * area_sum)) as f32,
                (centroid.1 / (6.0 * area_sum)) as f32,
            )
        };
        self.cache.poly_min = poly_min;
        self.cache.poly_max = poly_max;
        self.cache.mpoly = mpoly;

        // tile units² to mercator m²
        let area = area_sum * meters_per_tile(self.id.z).powi(2);
        if area < 0.0 {
            debug!("Polygon for feature {} has negative area", feat.id);
        }
        self.cache.area = Some(area);
    }

    fn build_polygon(&mut self, geom: &mut GeomEncoder) {
        let mut rings_out: Vec<Vec<(i32, i32)>> = Vec::new();
        for poly in &self.cache.mpoly {
            // skip the whole polygon if the outer ring degenerated
            if poly.first().map_or(0, Vec::len) < 4 {
                continue;
            }
            for ring in poly {
                let tile_pts = self.to_tile_pts(ring);
                // tiny rings simplify down to nothing and are dropped
                if tile_pts.len() < 4 {
                } else if tile_pts.last() != tile_pts.first() {
                    debug!("Invalid polygon ring for feature {}", self.feat_id);
                } else {
                    rings_out.push(tile_pts);
                }
            }
        }
        for ring in rings_out {
            self.has_geom = true;
            self.built_pts += ring.len() as u32;
            geom.add_ring(&ring);
        }
    }

    /// Point anchor for an area label: the polygon centroid, replaced by
    /// polylabel when the centroid is inside this tile and the feature is a
    /// single reasonable polygon.
    fn label_anchor(&self) -> Pt {
        let c = self.cache.centroid;
        let mpoly = &self.cache.mpoly;
        if !in_unit(c) || mpoly.len() != 1 || mpoly[0].first().map_or(0, Vec::len) <= 3 {
            return c;
        }
        let pl = if self.id.z >= 14 {
            polylabel(&mpoly[0], 1.0 / 256.0)
        } else {
            // clip to the z14 tile containing the centroid, scaling the
            // precision so label positions agree across zooms
            let zq = f32::exp2(f32::from(14 - self.id.z));
            let p14 = Pt::new((c.x * zq).floor(), (c.y * zq).floor());
            let min14 = p14 * (1.0 / zq);
            let max14 = (p14 + Pt::new(1.0, 1.0)) * (1.0 / zq);
            let precision = (1.0 / 256.0) / zq.min(16.0);
            let inside14 = self.cache.poly_min.x >= min14.x
                && self.cache.poly_min.y >= min14.y
                && self.cache.poly_max.x <= max14.x
                && self.cache.poly_max.y <= max14.y;
            if inside14 {
                // already confined to one z14 tile, no clip needed
                polylabel(&mpoly[0], precision)
            } else {
                let clipped: Polygon = mpoly[0]
                    .iter()
                    .map(|ring| clip_ring_to_rect(ring, min14, max14))
                    .collect();
                if clipped[0].len() <= 3 {
                    return c;
                }
                polylabel(&clipped, precision)
            }
        };
        if in_unit(pl) {
            pl
        } else {
            debug!(
                "rejecting polylabel {},{} for {} (centroid {},{})",
                pl.x, pl.y, self.feat_id, c.x, c.y
            );
            c
        }
    }

    fn build_coastline(&mut self, geom: &mut GeomEncoder) {
        debug!(
            "Processing {} coastline segments for tile {}",
            self.coastline.len(),
            self.id
        );
        let Some(polys) = super::coastline::stitch(std::mem::take(&mut self.coastline)) else {
            error!("Invalid coastline segment for {}", self.id);
            return;
        };
        let mut rings_out: Vec<Vec<(i32, i32)>> = Vec::new();
        for poly in polys {
            for ring in poly {
                let tile_pts = self.to_tile_pts(&ring);
                if tile_pts.len() < 4 {
                } else if tile_pts.last() != tile_pts.first() {
                    debug!("Invalid polygon for {} coastline", self.id);
                } else {
                    rings_out.push(tile_pts);
                }
            }
        }
        for ring in rings_out {
            self.has_geom = true;
            self.built_pts += ring.len() as u32;
            geom.add_ring(&ring);
        }
    }

    // ---- top-level build -------------------------------------------------

    fn run(&mut self) {
        let bounds = self.tile_bounds;
        let world = self.world;
        let ocean = self.ocean;
        let mut nfeats = 0_u32;

        if self.id.z < 8 {
            let mut queries: Vec<&str> = vec![
                if self.id.z < 7 {
                    "n[place=continent,country,state,city]"
                } else {
                    "n[place=continent,country,state,city,town]"
                },
                "wra[boundary=administrative,disputed]",
                "a[place=island]",
                "a[natural=water,glacier]",
                "a[waterway=river]",
            ];
            if self.id.z >= 4 {
                queries.push(if self.id.z < 7 {
                    "w[highway=motorway]"
                } else {
                    "w[highway=motorway,trunk,primary]"
                });
            }
            if self.id.z >= 6 {
                queries.push("n[natural=peak,volcano]");
            }
            for q in queries {
                let predicate = Predicate::parse(q).expect("static query is well-formed");
                for feat in world.query(&predicate, &bounds) {
                    self.set_feature(feat, world);
                    schema::process_feature(self);
                    nfeats += 1;
                }
            }
            // ocean geometry comes from the ocean store at low zoom
            for feat in ocean.query_box(&bounds) {
                self.set_feature(feat, ocean);
                self.feat_id = OCEAN_ID;
                schema::process_feature(self);
                nfeats += 1;
            }
        } else {
            for feat in world.query_box(&bounds) {
                self.set_feature(feat, world);
                schema::process_feature(self);
                nfeats += 1;
            }
            self.clear_feature();
            self.feat_id = OCEAN_ID;
            if self.coastline.is_empty() {
                // no coastline in the tile: all ocean if the tile center
                // falls inside an ocean polygon, otherwise all land
                let center = projected_meters_to_lng_lat(tile_center(self.id));
                if !ocean.containing_lng_lat(center.lng, center.lat).is_empty() {
                    schema::process_feature(self);
                }
            } else {
                schema::process_feature(self);
            }
        }
        self.layer("", false); // flush the final feature
        debug!("Processed {nfeats} features for tile {}", self.id);
    }
}

fn quantize(p: Pt) -> (i32, i32) {
    (
        (p.x * TILE_EXTENT + 0.5) as i32,
        ((1.0 - p.y) * TILE_EXTENT + 0.5) as i32,
    )
}

/// Builds a tile, optionally gzip-compressed. Faults never escape: a panic
/// or error yields an empty blob, which upstream serves as 404.
#[must_use]
pub fn build_tile(world: &FeatureStore, ocean: &FeatureStore, id: TileId, compress: bool) -> Vec<u8> {
    let result = catch_unwind(AssertUnwindSafe(|| {
        build_tile_inner(world, ocean, id, compress)
    }));
    match result {
        Ok(data) => data,
        Err(_) => {
            error!("Panic while building tile {id}");
            Vec::new()
        }
    }
}

fn build_tile_inner(world: &FeatureStore, ocean: &FeatureStore, id: TileId, compress: bool) -> Vec<u8> {
    let started = Instant::now();
    let mut builder = TileBuilder::new(world, ocean, id);
    builder.run();
    let (built_feats, built_pts) = (builder.built_feats, builder.built_pts);
    let mvt = encode_tile(std::mem::take(&mut builder.layers));
    if mvt.is_empty() {
        info!("No features for tile {id}");
        return Vec::new();
    }
    let raw_size = mvt.len();
    let out = if compress {
        match encode_gzip(&mvt) {
            Ok(compressed) => compressed,
            Err(e) => {
                error!("Error compressing tile {id}: {e}");
                return Vec::new();
            }
        }
    } else {
        mvt
    };
    info!(
        "Tile {id} ({} bytes) built in {:.1} ms ({built_feats} features, {built_pts} points, {raw_size} bytes raw)",
        out.len(),
        started.elapsed().as_secs_f64() * 1000.0,
    );
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use geozero::mvt::tile::GeomType;
    use geozero::mvt::{tile, Message as _, Tile};
    use tileforge_tile_utils::decode_gzip;

    use super::*;
    use crate::osm::StoreBuilder;

    fn empty_store() -> FeatureStore {
        StoreBuilder::new().build()
    }

    fn decode(data: &[u8]) -> Tile {
        Tile::decode(data).unwrap()
    }

    fn layer<'a>(tile: &'a Tile, name: &str) -> Option<&'a tile::Layer> {
        tile.layers.iter().find(|l| l.name == name)
    }

    fn props(layer: &tile::Layer, feature: &tile::Feature) -> HashMap<String, String> {
        let mut out = HashMap::new();
        for pair in feature.tags.chunks(2) {
            let key = layer.keys[pair[0] as usize].clone();
            let value = &layer.values[pair[1] as usize];
            let rendered = value
                .string_value
                .clone()
                .or_else(|| value.double_value.map(|v| v.to_string()))
                .or_else(|| value.float_value.map(|v| v.to_string()))
                .or_else(|| value.int_value.map(|v| v.to_string()))
                .unwrap_or_default();
            out.insert(key, rendered);
        }
        out
    }

    #[test]
    fn test_continent_node_on_world_tile() {
        let mut b = StoreBuilder::new();
        b.add_node(
            101,
            (0.0, 0.0),
            &[("place", "continent"), ("name", "Atlantis")],
        );
        let world = b.build();
        let ocean = empty_store();

        let data = build_tile(&world, &ocean, TileId::new(0, 0, 0), false);
        let tile = decode(&data);
        let place = layer(&tile, "place").expect("place layer present");
        assert_eq!(place.features.len(), 1);
        let feat = &place.features[0];
        assert_eq!(feat.r#type, Some(GeomType::Point as i32));
        let attrs = props(place, feat);
        assert_eq!(attrs.get("place").map(String::as_str), Some("continent"));
        assert_eq!(attrs.get("name").map(String::as_str), Some("Atlantis"));
        assert_eq!(attrs.get("osm_type").map(String::as_str), Some("node"));
        assert_eq!(attrs.get("osm_id").map(String::as_str), Some("101"));
    }

    #[test]
    fn test_all_ocean_tile() {
        let world = empty_store();
        let mut b = StoreBuilder::new();
        // one ocean polygon covering (almost) the whole projected world
        let m = 2.0e7;
        b.add_area_way(
            1,
            vec![(-m, -m), (m, -m), (m, m), (-m, m), (-m, -m)],
            &[("area", "yes")],
        );
        let ocean = b.build();

        let data = build_tile(&world, &ocean, TileId::new(163, 395, 10), false);
        let tile = decode(&data);
        let water = layer(&tile, "water").expect("water layer present");
        assert_eq!(water.features.len(), 1);
        let feat = &water.features[0];
        assert_eq!(feat.r#type, Some(GeomType::Polygon as i32));
        let attrs = props(water, feat);
        assert_eq!(attrs.get("water").map(String::as_str), Some("ocean"));
        assert_eq!(attrs.get("class").map(String::as_str), Some("ocean"));
        // one full-tile ring: MoveTo + 2, LineTo(3) + 6, ClosePath
        assert_eq!(feat.geometry.len(), 11);
    }

    #[test]
    fn test_highway_and_building_at_z14() {
        let id = TileId::new(8192, 8190, 14);
        let origin = tile_south_west(id);
        let m = meters_per_tile(14);
        let at = |x: f64, y: f64| (origin.0 + x * m, origin.1 + y * m);

        let mut b = StoreBuilder::new();
        b.add_way(
            20,
            vec![at(0.1, 0.4), at(0.6, 0.5), at(0.9, 0.9)],
            &[("highway", "secondary"), ("name", "Hayes St")],
        );
        b.add_area_way(
            21,
            vec![at(0.2, 0.2), at(0.3, 0.2), at(0.3, 0.3), at(0.2, 0.3), at(0.2, 0.2)],
            &[("building", "yes"), ("addr:housenumber", "1234")],
        );
        let world = b.build();
        let ocean = empty_store();

        let data = build_tile(&world, &ocean, id, false);
        let tile = decode(&data);

        let transport = layer(&tile, "transportation").expect("transportation layer");
        let road = &transport.features[0];
        assert_eq!(road.r#type, Some(GeomType::Linestring as i32));
        let attrs = props(transport, road);
        assert_eq!(attrs.get("highway").map(String::as_str), Some("secondary"));
        assert_eq!(attrs.get("name").map(String::as_str), Some("Hayes St"));

        let buildings = layer(&tile, "building").expect("building layer");
        let house = &buildings.features[0];
        assert_eq!(house.r#type, Some(GeomType::Polygon as i32));
        let attrs = props(buildings, house);
        assert_eq!(attrs.get("housenumber").map(String::as_str), Some("1234"));
        // the forced POI for the named-or-addressed building is absent since
        // the building has no name, but the polygon itself must be there
        assert!(layer(&tile, "poi").is_none());
    }

    #[test]
    fn test_area_filter_gates_low_zoom() {
        let id = TileId::new(512, 511, 10);
        let origin = tile_south_west(id);
        let m = meters_per_tile(10);
        let at = |x: f64, y: f64| (origin.0 + x * m, origin.1 + y * m);

        // a meadow a couple meters across is invisible at z10 but a
        // quarter-tile one is kept
        let mut b = StoreBuilder::new();
        b.add_area_way(
            30,
            vec![
                at(0.5, 0.5),
                at(0.5005, 0.5),
                at(0.5005, 0.5005),
                at(0.5, 0.5005),
                at(0.5, 0.5),
            ],
            &[("natural", "grass")],
        );
        let world = b.build();
        assert!(build_tile(&world, &empty_store(), id, false).is_empty());

        let mut b = StoreBuilder::new();
        b.add_area_way(
            31,
            vec![at(0.2, 0.2), at(0.7, 0.2), at(0.7, 0.7), at(0.2, 0.7), at(0.2, 0.2)],
            &[("natural", "grass")],
        );
        let world = b.build();
        let tile = decode(&build_tile(&world, &empty_store(), id, false));
        let landuse = layer(&tile, "landuse").expect("landuse layer");
        let attrs = props(landuse, &landuse.features[0]);
        assert_eq!(attrs.get("natural").map(String::as_str), Some("grass"));
    }

    fn zigzag(v: u32) -> i64 {
        i64::from(v >> 1) ^ -i64::from(v & 1)
    }

    fn decode_rings(geom: &[u32]) -> Vec<Vec<(i64, i64)>> {
        let mut rings = Vec::new();
        let mut cur = Vec::new();
        let (mut x, mut y) = (0_i64, 0_i64);
        let mut i = 0;
        while i < geom.len() {
            let (op, count) = (geom[i] & 7, geom[i] >> 3);
            i += 1;
            match op {
                1 | 2 => {
                    for _ in 0..count {
                        x += zigzag(geom[i]);
                        y += zigzag(geom[i + 1]);
                        i += 2;
                        if op == 1 {
                            cur = vec![(x, y)];
                        } else {
                            cur.push((x, y));
                        }
                    }
                }
                7 => rings.push(std::mem::take(&mut cur)),
                other => panic!("unexpected command {other}"),
            }
        }
        rings
    }

    fn signed_area_y_down(ring: &[(i64, i64)]) -> i64 {
        let mut area = 0;
        for i in 0..ring.len() {
            let j = (i + 1) % ring.len();
            area += ring[i].0 * ring[j].1 - ring[j].0 * ring[i].1;
        }
        area / 2
    }

    #[test]
    fn test_polygon_winding_in_mvt_space() {
        let id = TileId::new(8192, 8190, 14);
        let origin = tile_south_west(id);
        let m = meters_per_tile(14);
        let at = |x: f64, y: f64| (origin.0 + x * m, origin.1 + y * m);

        // the source ring is counter-clockwise; emission must normalize it
        let mut b = StoreBuilder::new();
        b.add_area_way(
            60,
            vec![at(0.2, 0.2), at(0.8, 0.2), at(0.8, 0.8), at(0.2, 0.8), at(0.2, 0.2)],
            &[("building", "yes")],
        );
        let world = b.build();
        let data = build_tile(&world, &empty_store(), id, false);
        let tile = decode(&data);
        let buildings = layer(&tile, "building").expect("building layer");
        let rings = decode_rings(&buildings.features[0].geometry);
        assert_eq!(rings.len(), 1);
        // exterior rings carry positive signed area in y-down tile units
        assert!(signed_area_y_down(&rings[0]) > 0);
    }

    #[test]
    fn test_deterministic_output_and_gzip() {
        let mut b = StoreBuilder::new();
        b.add_node(1, (0.0, 0.0), &[("place", "continent"), ("name", "X")]);
        let world = b.build();
        let ocean = empty_store();
        let id = TileId::new(0, 0, 0);

        let raw1 = build_tile(&world, &ocean, id, false);
        let raw2 = build_tile(&world, &ocean, id, false);
        assert_eq!(raw1, raw2);

        let gz = build_tile(&world, &ocean, id, true);
        assert_eq!(&gz[0..2], b"\x1f\x8b");
        assert_eq!(decode_gzip(&gz).unwrap(), raw1);
    }

    #[test]
    fn test_coastline_way_splits_tile() {
        let id = TileId::new(8192, 8192, 14);
        let origin = tile_south_west(id);
        let m = meters_per_tile(14);
        let at = |x: f64, y: f64| (origin.0 + x * m, origin.1 + y * m);
        let mut b = StoreBuilder::new();
        b.add_way(
            40,
            vec![at(-0.1, 0.5), at(1.1, 0.5)],
            &[("natural", "coastline")],
        );
        let world = b.build();
        let data = build_tile(&world, &empty_store(), id, false);
        let tile = decode(&data);
        let water = layer(&tile, "water").expect("water layer");
        assert_eq!(water.features.len(), 1);
        let attrs = props(water, &water.features[0]);
        assert_eq!(attrs.get("water").map(String::as_str), Some("ocean"));
    }

    #[test]
    fn test_private_roads_are_dropped() {
        let id = TileId::new(8192, 8192, 14);
        let origin = tile_south_west(id);
        let m = meters_per_tile(14);
        let at = |x: f64, y: f64| (origin.0 + x * m, origin.1 + y * m);
        let mut b = StoreBuilder::new();
        b.add_way(
            50,
            vec![at(0.1, 0.1), at(0.9, 0.9)],
            &[("highway", "service"), ("access", "private")],
        );
        let world = b.build();
        let data = build_tile(&world, &empty_store(), id, false);
        assert!(data.is_empty());
    }
}
