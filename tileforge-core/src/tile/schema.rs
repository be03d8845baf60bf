//! Feature classification: maps OSM tag combinations to layer emissions.
//! Pure routing over the current feature's tags and geometry kind, in a
//! fixed priority order per kind; the first accepted path returns.

use crate::osm::{Feature, FeatureKind};
use crate::tile::builder::{TileBuilder, OCEAN_ID};
use crate::tile::tables::{
    AERODROME_VALUES, AEROWAY_BUILDINGS, AEROWAY_CLASSES, AMENITY_AREAS, BAD_COASTLINE_IDS,
    EXTRA_POI_TAGS, HIGHWAY_VALUES, LANDUSE_AREAS, LEISURE_AREAS, MAN_MADE_CLASSES,
    NATURAL_AREAS, NO_NAME_WATER, OTHER_ROUTES, PARK_VALUES, PAVED_VALUES, POI_TAGS,
    SAC_SCALE_VALUES, TOURISM_AREAS, TRANSIT_ROUTES, UNPAVED_VALUES, WATERWAY_AREAS,
    WATERWAY_CLASSES, WATER_LANDUSE,
};

pub(crate) const LAYERS: [&str; 8] = [
    "place",
    "boundary",
    "poi",
    "transportation",
    "transit",
    "building",
    "water",
    "landuse",
];

pub(crate) fn process_feature(b: &mut TileBuilder) {
    let Some(feat) = b.feature() else {
        // ocean polygon synthesized from coastline (or the all-ocean probe)
        b.layer("water", true);
        b.attribute_str("class", "ocean");
        b.attribute_str("water", "ocean");
        return;
    };
    if b.feat_id() == OCEAN_ID {
        // pre-built ocean polygon served from the ocean store at low zoom
        b.layer("water", true);
        b.attribute_str("class", "ocean");
        b.attribute_str("water", "ocean");
        return;
    }
    match feat.kind {
        FeatureKind::Node => process_node(b),
        FeatureKind::Way => process_way(b),
        FeatureKind::Relation => {
            if b.find("type") == "multipolygon" {
                process_way(b);
            } else {
                process_relation(b);
            }
        }
    }
}

fn process_node(b: &mut TileBuilder) {
    let place = b.find("place");
    if place.is_set() {
        let pop = b.find("population").num().unwrap_or(0.0);
        let mz = match place.as_str() {
            "continent" => 0,
            "country" => 3 - i32::from(pop > 50e6) - i32::from(pop > 20e6),
            "state" | "province" => 4,
            "city" => 5 - i32::from(pop > 5e6) - i32::from(pop > 500_000.0),
            "town" => {
                if pop > 8000.0 {
                    7
                } else {
                    8
                }
            }
            "village" => {
                if pop > 2000.0 {
                    9
                } else {
                    10
                }
            }
            "suburb" => 11,
            "hamlet" | "quarter" => 12,
            _ => 13,
        };
        if !b.min_zoom(mz) {
            return;
        }
        b.layer("place", false);
        b.attribute("class", place);
        b.attribute("place", place);
        b.attribute("ref", b.find("ref"));
        b.attribute("capital", b.find("capital"));
        if pop > 0.0 {
            b.attribute_num("population", pop);
        }
        if let Some(sqkm) = b.find("sqkm").num() {
            b.attribute_num("sqkm", sqkm);
        }
        if place == "country" {
            b.attribute("iso_a2", b.find("ISO3166-1:alpha2"));
        }
        b.attribute("place_CN", b.find("place:CN"));
        set_name_attributes(b, 0);
        set_id_attributes(b);
        return;
    }

    // many smaller airports only have an aerodrome node instead of a way
    let aeroway = b.find("aeroway");
    if aeroway == "aerodrome" {
        if !b.min_zoom(11) {
            return;
        }
        b.layer("transportation", false);
        b.attribute("aeroway", aeroway);
        b.attribute("ref", b.find("ref"));
        set_name_attributes(b, 0);
        set_ele_attributes(b);
        b.attribute("iata", b.find("iata"));
        b.attribute("icao", b.find("icao"));
        let aerodrome = b.find("aerodrome");
        b.attribute_str(
            "aerodrome",
            if AERODROME_VALUES.has(aerodrome.as_str()) {
                aerodrome.as_str()
            } else {
                "other"
            },
        );
        set_id_attributes(b);
        return;
    }

    let natural = b.find("natural");
    if natural == "peak" || natural == "volcano" {
        let prominence = b.find("prominence").num().unwrap_or(0.0);
        let mz = if prominence > 4000.0 {
            6
        } else if prominence > 3500.0 {
            7
        } else if prominence > 3000.0 {
            8
        } else if prominence > 2500.0 {
            9
        } else if prominence > 2000.0 {
            10
        } else {
            11
        };
        if !b.min_zoom(mz) {
            return;
        }
        b.layer("poi", false);
        set_name_attributes(b, 0);
        set_id_attributes(b);
        set_ele_attributes(b);
        b.attribute("natural", natural);
        if prominence > 0.0 {
            b.attribute_num("prominence", prominence);
        }
        return;
    }
    if natural == "bay" {
        if !b.min_zoom(8) {
            return;
        }
        b.layer("water", false);
        set_name_attributes(b, 0);
        return;
    }

    write_poi(b, 0.0, false);
}

fn process_way(b: &mut TileBuilder) {
    // over half of all ways are buildings, so test those first
    let building = b.find("building");
    if building.is_set() {
        let visible = b.min_zoom(13) && b.set_min_zoom_by_area(0.0);
        if !visible {
            return;
        }
        b.layer("building", true);
        set_building_height_attributes(b);
        if b.min_zoom(14) {
            // housenumber is common on poi nodes too, but of little use
            // without at least a street name
            b.attribute("housenumber", b.find("addr:housenumber"));
            write_poi(b, 0.0, true);
        }
        return;
    }

    let natural = b.find("natural");
    if natural == "coastline" {
        // side-effect only: the way can also carry boundary or other tags
        if let Some(feat) = b.feature() {
            if !BAD_COASTLINE_IDS.contains(&feat.id) {
                b.add_coastline();
            }
        }
    }

    let highway_tag = b.find("highway");
    if highway_tag.is_set() {
        process_highway(b, highway_tag.as_str());
        return;
    }

    let railway = b.find("railway");
    if railway.is_set() {
        let service = b.find("service");
        if !b.min_zoom(if service.is_set() { 12 } else { 9 }) {
            return;
        }
        b.layer("transportation", false);
        b.attribute_str("class", "rail");
        b.attribute("railway", railway);
        set_brunnel_attributes(b);
        set_name_attributes(b, 14);
        b.attribute("service", service);
        return;
    }

    let is_closed = b.is_closed();
    let waterway = b.find("waterway");
    let mut landuse = b.find("landuse").as_str().to_string();

    // a waterway way traces the course; wide rivers carry extra area
    // polygons for the water itself
    if WATERWAY_CLASSES.has(waterway.as_str()) && !is_closed {
        let named_river = waterway == "river" && b.holds("name");
        if !b.min_zoom(if named_river { 8 } else { 12 }) {
            return;
        }
        b.layer("water", false);
        if b.find("intermittent") == "yes" {
            b.attribute_int("intermittent", 1);
        }
        b.attribute("class", waterway);
        b.attribute("waterway", waterway);
        set_name_attributes(b, 0);
        set_brunnel_attributes(b);
        return;
    } else if waterway == "dam" {
        if !b.min_zoom(12) {
            return;
        }
        b.layer("building", is_closed);
        b.attribute("waterway", waterway);
        return;
    } else if waterway == "boatyard" || waterway == "fuel" {
        landuse = "industrial".to_string();
    }

    let leisure = b.find("leisure");
    let waterbody = if WATER_LANDUSE.has(&landuse) {
        landuse.clone()
    } else if WATERWAY_AREAS.has(waterway.as_str()) {
        waterway.as_str().to_string()
    } else if leisure == "swimming_pool" {
        leisure.as_str().to_string()
    } else if natural == "water" {
        // natural=bay is a name, not the water itself
        natural.as_str().to_string()
    } else {
        String::new()
    };

    if !waterbody.is_empty() {
        let visible = is_closed && b.set_min_zoom_by_area(0.0);
        if !visible || b.find("covered") == "yes" {
            return;
        }
        let class = if waterway.is_set() { "river" } else { "lake" };
        let water = b.find("water");
        b.layer("water", true);
        b.attribute_str("class", class);
        b.attribute_str(
            "water",
            if water.is_set() {
                water.as_str()
            } else {
                waterbody.as_str()
            },
        );
        if b.find("intermittent") == "yes" {
            b.attribute_int("intermittent", 1);
        }
        // skip names of minor man-made basins and of rivers, whose name
        // rides on the waterway way
        if b.holds("name") && natural == "water" && !NO_NAME_WATER.has(water.as_str()) {
            let area = b.area();
            set_name_attributes(b, 14);
            b.attribute_num("area", area);
            // a label anchor as well, for rendering the name inside
            b.layer_as_centroid("water");
            b.attribute_str("class", class);
            set_name_attributes(b, 14);
            b.attribute_num("area", area);
        }
        return;
    }

    if natural == "valley" || natural == "gorge" {
        // valleys and gorges are mapped as ways; gate on their squared length
        let len = b.length();
        if !b.set_min_zoom_by_area(len * len) {
            return;
        }
        b.layer("landuse", false);
        b.attribute("natural", natural);
        set_name_attributes(b, 0);
        return;
    }
    if natural == "bay" {
        if !b.min_zoom(8) {
            return;
        }
        b.layer_as_centroid("water");
        set_name_attributes(b, 0);
        return;
    }

    let boundary = b.find("boundary");
    let park_boundary = PARK_VALUES.has(boundary.as_str());
    if park_boundary || leisure == "nature_reserve" {
        let visible = b.set_min_zoom_by_area(0.0);
        if !visible {
            return;
        }
        // too numerous to be useful
        if b.find("protection_title") == "National Forest"
            && b.find("operator") == "United States Forest Service"
        {
            return;
        }
        write_protected_area(b, park_boundary);
        // a way can be both park boundary and admin boundary, keep going
    }

    if let Some(feat) = b.feature() {
        if !feat.belongs_to_relation && (boundary == "administrative" || boundary == "disputed") {
            write_boundary(b);
        }
    }

    let place = b.find("place");
    if place == "island" || place == "islet" {
        let visible = b.set_min_zoom_by_area(0.0);
        if visible {
            let area = b.area();
            b.layer_as_centroid("place");
            b.attribute("class", place);
            b.attribute("place", place);
            set_name_attributes(b, 0);
            set_id_attributes(b);
            b.attribute_num("area", area);
            return;
        }
    }

    let amenity = b.find("amenity");
    let tourism = b.find("tourism");
    if landuse == "field" {
        landuse = "farmland".to_string();
    } else if landuse == "meadow" && b.find("meadow") == "agricultural" {
        landuse = "farmland".to_string();
    }

    if LANDUSE_AREAS.has(&landuse)
        || NATURAL_AREAS.has(natural.as_str())
        || LEISURE_AREAS.has(leisure.as_str())
        || AMENITY_AREAS.has(amenity.as_str())
        || TOURISM_AREAS.has(tourism.as_str())
    {
        let visible = b.set_min_zoom_by_area(0.0);
        if !visible {
            return;
        }
        b.layer("landuse", true);
        b.attribute_str("landuse", &landuse);
        b.attribute("natural", natural);
        b.attribute("leisure", leisure);
        b.attribute("amenity", amenity);
        b.attribute("tourism", tourism);
        if natural == "wetland" {
            b.attribute("wetland", b.find("wetland"));
        }
        let area = b.area();
        let force = b.min_zoom(14);
        write_poi(b, area, force);
        return;
    }

    // less common ways

    let man_made = b.find("man_made");
    if MAN_MADE_CLASSES.has(man_made.as_str()) {
        let visible = b.set_min_zoom_by_area(0.0);
        if !visible {
            return;
        }
        b.layer("landuse", is_closed);
        b.attribute("class", man_made);
        b.attribute("man_made", man_made);
        return;
    }

    let route = b.find("route");
    if route == "ferry" {
        if !b.min_zoom(9) {
            return;
        }
        // the parent relation writes the ferry; avoid duplication
        if b.feature().is_some_and(|f| f.belongs_to_relation) {
            return;
        }
        b.layer("transportation", false);
        b.attribute("route", route);
        set_brunnel_attributes(b);
        set_name_attributes(b, 12);
        return;
    }

    let piste_difficulty = b.find("piste:difficulty");
    if piste_difficulty.is_set() {
        if !b.min_zoom(10) {
            return;
        }
        b.layer("transportation", is_closed);
        b.attribute_str("class", "piste");
        b.attribute_str("route", "piste");
        b.attribute("difficulty", piste_difficulty);
        b.attribute("piste_type", b.find("piste:type"));
        // grooming distinguishes backcountry "pistes"
        b.attribute("piste_grooming", b.find("piste:grooming"));
        set_name_attributes(b, 14);
        return;
    }

    let aerialway = b.find("aerialway");
    if aerialway.is_set() {
        if !b.min_zoom(10) {
            return;
        }
        b.layer("transportation", false);
        b.attribute_str("class", "aerialway");
        b.attribute("aerialway", aerialway);
        set_name_attributes(b, 14);
        return;
    }

    let aeroway = b.find("aeroway");
    if AEROWAY_BUILDINGS.has(aeroway.as_str()) {
        let visible = b.set_min_zoom_by_area(0.0);
        if !visible {
            return;
        }
        b.layer("building", true);
        b.attribute("aeroway", aeroway);
        set_building_height_attributes(b);
        if b.min_zoom(14) {
            write_poi(b, 0.0, true);
        }
        return;
    }
    if AEROWAY_CLASSES.has(aeroway.as_str()) {
        if !b.min_zoom(10) {
            return;
        }
        b.layer("transportation", is_closed);
        b.attribute("aeroway", aeroway);
        b.attribute("ref", b.find("ref"));
        if aeroway == "aerodrome" {
            set_name_attributes(b, 0);
            set_ele_attributes(b);
            b.attribute("iata", b.find("iata"));
            b.attribute("icao", b.find("icao"));
            let aerodrome = b.find("aerodrome");
            b.attribute_str(
                "aerodrome",
                if AERODROME_VALUES.has(aerodrome.as_str()) {
                    aerodrome.as_str()
                } else {
                    "other"
                },
            );
            let area = b.area();
            b.attribute_num("area", area);
        }
        return;
    }

    // anything else closed with interesting tags still gets a chance as POI
    if is_closed && natural != "coastline" {
        let area = b.area();
        write_poi(b, area, false);
    }
}

fn process_highway(b: &mut TileBuilder, highway_tag: &str) {
    let mut highway = highway_tag.to_string();
    let mut packed = HIGHWAY_VALUES.get(&highway);
    let ramp = packed < 0;
    if ramp {
        packed = -packed;
        if let Some(split) = highway.find('_') {
            highway.truncate(split);
        }
    }
    let label_zoom = if packed >> 8 != 0 { packed >> 8 } else { 14 };
    let minzoom = packed & 0xFF;
    if !b.min_zoom(minzoom) {
        return;
    }

    let access = b.find("access");
    if access == "private" || access == "no" {
        return;
    }
    // most tagged footways are sidewalks or crossings, which are mapped too
    // inconsistently to render
    if highway == "footway" && b.holds("footway") {
        return;
    }
    if b.is_closed() && !b.set_min_zoom_by_area(0.0) {
        return;
    }

    b.layer("transportation", false);
    b.attribute_str("highway", &highway);
    set_brunnel_attributes(b);
    if ramp {
        b.attribute_int("ramp", 1);
    }

    if highway == "service" {
        b.attribute("service", b.find("service"));
    }

    let oneway = b.find("oneway");
    if oneway == "yes" || oneway == "1" {
        b.attribute_int("oneway", 1);
    }

    let mut cycleway = b.find("cycleway");
    if !cycleway.is_set() {
        cycleway = b.find("cycleway:both");
    }
    if cycleway.is_set() && cycleway != "no" {
        b.attribute("cycleway", cycleway);
    }
    let cycleway_left = b.find("cycleway:left");
    if cycleway_left.is_set() && cycleway_left != "no" {
        b.attribute("cycleway_left", cycleway_left);
    }
    let cycleway_right = b.find("cycleway:right");
    if cycleway_right.is_set() && cycleway_right != "no" {
        b.attribute("cycleway_right", cycleway_right);
    }
    let bicycle = b.find("bicycle");
    if bicycle.is_set() && bicycle != "no" {
        b.attribute("bicycle", bicycle);
    }

    let surface = b.find("surface");
    if PAVED_VALUES.has(surface.as_str()) {
        b.attribute_str("surface", "paved");
    } else if UNPAVED_VALUES.has(surface.as_str()) {
        b.attribute_str("surface", "unpaved");
    }

    // trail and path info
    let trail_visibility = b.find("trail_visibility");
    if trail_visibility.is_set() && trail_visibility != "good" && trail_visibility != "excellent"
    {
        b.attribute("trail_visibility", trail_visibility);
    }
    let sac_scale = b.find("sac_scale");
    if SAC_SCALE_VALUES.has(sac_scale.as_str()) {
        b.attribute("sac_scale", sac_scale);
    }
    b.attribute("mtb_scale", b.find("mtb:scale"));
    if highway == "path" {
        b.attribute("golf", b.find("golf"));
    }

    set_name_attributes(b, label_zoom);
    b.attribute("maxspeed", b.find("maxspeed"));
    b.attribute("lanes", b.find("lanes"));
    b.attribute("ref", b.find("ref"));
}

fn process_relation(b: &mut TileBuilder) {
    let reltype = b.find("type");
    if reltype == "route" {
        let route = b.find("route");
        if route == "ferry" {
            if !b.min_zoom(9) {
                return;
            }
            b.layer("transportation", false);
            b.attribute_str("route", "ferry");
            set_name_attributes(b, 12);
            return;
        }
        if b.min_zoom(TRANSIT_ROUTES.get(route.as_str())) {
            b.layer("transit", false);
        } else if b.min_zoom(OTHER_ROUTES.get(route.as_str())) {
            b.layer("transportation", false);
        } else {
            return;
        }
        b.attribute_str("class", "route");
        b.attribute("route", route);
        b.attribute("name", b.find("name"));
        b.attribute("ref", b.find("ref"));
        b.attribute("network", b.find("network"));
        b.attribute("color", b.find("colour")); // note spelling
        set_id_attributes(b);
        return;
    }
    if reltype == "boundary" {
        let boundary = b.find("boundary");
        if boundary == "administrative" || boundary == "disputed" {
            write_boundary(b);
            return;
        }
        if !PARK_VALUES.has(boundary.as_str()) || !b.min_zoom(8) {
            return;
        }
        // marine sanctuaries are not useful for typical use
        if b.find("maritime") == "yes" {
            return;
        }
        write_protected_area(b, true);
    }
}

/// Landuse polygon plus a POI at the centroid, with shared attributes.
fn write_protected_area(b: &mut TileBuilder, class_from_boundary: bool) {
    let boundary = b.find("boundary");
    let leisure = b.find("leisure");
    let protect_class = b.find("protect_class");
    let access = b.find("access");
    let area = b.area();

    b.layer("landuse", true);
    b.attribute("class", if class_from_boundary { boundary } else { leisure });
    if class_from_boundary {
        b.attribute("boundary", boundary);
    }
    b.attribute("leisure", leisure);
    b.attribute("protect_class", protect_class);
    b.attribute("access", access);
    set_name_attributes(b, 0);
    b.attribute_num("area", area);

    b.layer_as_centroid("poi");
    b.attribute("class", if class_from_boundary { boundary } else { leisure });
    b.attribute("boundary", boundary);
    b.attribute("leisure", leisure);
    b.attribute("protect_class", protect_class);
    b.attribute("access", access);
    set_name_attributes(b, 0);
    set_id_attributes(b);
    b.attribute_num("area", area);
}

fn write_boundary(b: &mut TileBuilder) {
    let admin_level = match b.find("admin_level").num() {
        Some(level) if level >= 1.0 => level,
        _ => 11.0,
    };
    let mz = if admin_level >= 8.0 {
        12
    } else if admin_level >= 7.0 {
        10
    } else if admin_level >= 5.0 {
        8
    } else if admin_level >= 3.0 {
        4
    } else {
        2
    };
    if !b.min_zoom(mz) {
        return;
    }

    let maritime = b.find("maritime") == "yes";
    let disputed = b.find("boundary") == "disputed" || b.find("disputed") == "yes";
    let Some(feat) = b.feature() else {
        return;
    };

    if feat.kind == FeatureKind::Way {
        b.layer("boundary", false);
        b.attribute_num("admin_level", admin_level);
        set_name_attributes(b, 0);
        // natural=coastline lets styling hide coastal boundaries
        b.attribute("natural", b.find("natural"));
        if maritime {
            b.attribute_str("maritime", "yes");
        }
        if disputed {
            b.attribute_str("disputed", "yes");
        }
        return;
    }

    // inherit shared attributes from the relation onto each member way
    let name = b.find("name");
    let name_en = b.find("name:en");
    let name_en = if name_en == name { "" } else { name_en.as_str() };
    let iso_code: String = b.find("ISO3166-2").as_str().chars().take(2).collect();

    let store = b.store();
    let tile_bounds = b.tile_bounds();
    let members: Vec<&Feature> = feat
        .members
        .iter()
        .filter_map(|&(kind, id)| store.get(kind, id))
        .filter(|m| m.kind == FeatureKind::Way && tile_bounds.intersects(&m.bounds))
        .collect();
    for member in members {
        b.set_feature(member, store);
        b.layer("boundary", false);
        b.attribute_num("admin_level", admin_level);
        b.attribute("name", name);
        b.attribute_str("name_en", name_en);
        if !iso_code.is_empty() {
            b.attribute_str("iso_a2", &iso_code);
        }
        b.attribute("natural", b.find("natural"));
        if maritime || b.find("maritime") == "yes" {
            b.attribute_str("maritime", "yes");
        }
        if disputed || b.find("boundary") == "disputed" || b.find("disputed") == "yes" {
            b.attribute_str("disputed", "yes");
        }
    }
    b.set_feature(feat, store);
}

/// Generic POI writer. Returns whether a POI was emitted from the key table.
pub(crate) fn write_poi(b: &mut TileBuilder, area: f64, force: bool) -> bool {
    // below z12 only area features carry POIs
    if !b.min_zoom(12) && area <= 0.0 {
        return false;
    }

    let has_wikipedia = b.holds("wikipedia");
    let has_wikidata = b.holds("wikidata");
    let force12 = area > 0.0 || has_wikipedia || has_wikidata;
    for zmap in POI_TAGS.iter() {
        let val = b.find(zmap.key());
        if val.is_set() && (force12 || b.min_zoom(zmap.get(val.as_str()))) {
            b.layer_as_centroid("poi");
            set_name_attributes(b, 0);
            set_id_attributes(b);
            if area > 0.0 {
                b.attribute_num("area", area);
            }
            // write the value of every poi-table key present on the feature
            for other in POI_TAGS.iter() {
                b.attribute(other.key(), b.find(other.key()));
            }
            for key in EXTRA_POI_TAGS {
                b.attribute(key, b.find(key));
            }
            if has_wikipedia {
                b.attribute_int("wikipedia", 1);
            }
            if has_wikidata {
                b.attribute_int("wikidata", 1);
            }
            return true;
        }
    }
    if force && b.holds("name") {
        b.layer_as_centroid("poi");
        set_name_attributes(b, 0);
        set_id_attributes(b);
        if area > 0.0 {
            b.attribute_num("area", area);
        }
    }
    false
}

// common attribute helpers

fn set_name_attributes(b: &mut TileBuilder, label_minzoom: i32) {
    if !b.min_zoom(label_minzoom) {
        return;
    }
    let name = b.find("name");
    b.attribute("name", name);
    let name_en = b.find("name:en");
    if name_en.is_set() && name_en != name {
        b.attribute("name_en", name_en);
    }
}

fn set_id_attributes(b: &mut TileBuilder) {
    let Some(feat) = b.feature() else {
        return;
    };
    b.attribute_str("osm_id", &feat.id.to_string());
    b.attribute_str("osm_type", feat.kind.as_str());
}

fn set_ele_attributes(b: &mut TileBuilder) {
    if let Some(ele) = b.find("ele").num() {
        b.attribute_float("ele", ele as f32);
    }
}

fn set_brunnel_attributes(b: &mut TileBuilder) {
    if b.find("bridge") == "yes" {
        b.attribute_str("brunnel", "bridge");
    } else if b.find("tunnel") == "yes" {
        b.attribute_str("brunnel", "tunnel");
    } else if b.find("ford") == "yes" {
        b.attribute_str("brunnel", "ford");
    }
}

const BUILDING_FLOOR_HEIGHT: f64 = 3.66; // meters

fn set_building_height_attributes(b: &mut TileBuilder) {
    let mut height = 0.0;
    let mut min_height = 0.0;
    if let Some(h) = b.find("height").num() {
        height = h;
        min_height = b.find("min_height").num().unwrap_or(0.0);
    } else if let Some(levels) = b.find("building:levels").num() {
        height = levels * BUILDING_FLOOR_HEIGHT;
        min_height = b
            .find("building:min_level")
            .num()
            .map_or(0.0, |l| l * BUILDING_FLOOR_HEIGHT);
    }
    if height < min_height {
        height += min_height;
    }
    if height > 0.0 {
        b.attribute_float("height", height as f32);
    }
    if min_height > 0.0 {
        b.attribute_float("min_height", min_height as f32);
    }
}
