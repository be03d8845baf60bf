//! Process-lifetime classification tables: tag-value sets, tag-value →
//! minzoom maps, and the packed highway encoding.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

/// Minzoom sentinel meaning "never emit".
pub(crate) const EXCLUDE: i32 = 100;

/// String membership with falsy lookups for absent/empty values.
pub(crate) struct Set(HashSet<&'static str>);

impl Set {
    fn new(items: &[&'static str]) -> Self {
        Self(items.iter().copied().collect())
    }

    pub(crate) fn has(&self, value: &str) -> bool {
        !value.is_empty() && self.0.contains(value)
    }
}

/// Tag-value → minzoom map with a default for unlisted values.
pub(crate) struct ZMap {
    key: &'static str,
    default: i32,
    items: HashMap<&'static str, i32>,
}

impl ZMap {
    fn new(key: &'static str) -> Self {
        Self::with_default(key, EXCLUDE)
    }

    fn with_default(key: &'static str, default: i32) -> Self {
        Self {
            key,
            default,
            items: HashMap::new(),
        }
    }

    fn add(mut self, z: i32, items: &[&'static str]) -> Self {
        for item in items {
            self.items.insert(item, z);
        }
        self
    }

    pub(crate) fn key(&self) -> &'static str {
        self.key
    }

    pub(crate) fn get(&self, value: &str) -> i32 {
        self.items.get(value).copied().unwrap_or(self.default)
    }
}

/// Label zoom packed into the upper byte of a highway minzoom.
const fn lz(z: i32) -> i32 {
    z << 8
}

/// Per-class highway minzoom. Low byte is the minzoom, the next byte an
/// optional label-zoom override (default 14), a negative sign marks ramps
/// (`_link` suffix stripped, `ramp=1` emitted).
pub(crate) static HIGHWAY_VALUES: LazyLock<ZMap> = LazyLock::new(|| {
    ZMap::new("highway")
        .add(4 | lz(8), &["motorway"])
        .add(5 | lz(8), &["trunk"])
        .add(7 | lz(12), &["primary"])
        .add(9 | lz(12), &["secondary"])
        .add(11 | lz(12), &["tertiary"])
        .add(12, &["unclassified", "residential", "road", "living_street", "service"])
        .add(10, &["cycleway", "byway", "bridleway", "track"])
        .add(10, &["footway", "path", "steps", "pedestrian"])
        .add(
            -11,
            &["motorway_link", "trunk_link", "primary_link", "secondary_link", "tertiary_link"],
        )
});

pub(crate) static AERODROME_VALUES: LazyLock<Set> = LazyLock::new(|| {
    Set::new(&["international", "public", "regional", "military", "private"])
});

pub(crate) static PAVED_VALUES: LazyLock<Set> = LazyLock::new(|| {
    Set::new(&[
        "paved", "asphalt", "cobblestone", "concrete", "concrete:lanes", "concrete:plates",
        "metal", "paving_stones", "sett", "unhewn_cobblestone", "wood",
    ])
});

pub(crate) static UNPAVED_VALUES: LazyLock<Set> = LazyLock::new(|| {
    Set::new(&[
        "unpaved", "compacted", "dirt", "earth", "fine_gravel", "grass", "grass_paver",
        "gravel", "gravel_turf", "ground", "ice", "mud", "pebblestone", "salt", "sand", "snow",
        "woodchips",
    ])
});

/// `sac_scale` grades worth surfacing; easier grades add clutter only.
pub(crate) static SAC_SCALE_VALUES: LazyLock<Set> = LazyLock::new(|| {
    Set::new(&[
        "demanding_mountain_hiking",
        "alpine_hiking",
        "demanding_alpine_hiking",
        "difficult_alpine_hiking",
    ])
});

pub(crate) static PARK_VALUES: LazyLock<Set> =
    LazyLock::new(|| Set::new(&["protected_area", "national_park"]));

pub(crate) static LANDUSE_AREAS: LazyLock<Set> = LazyLock::new(|| {
    Set::new(&[
        "retail", "military", "residential", "commercial", "industrial", "railway", "cemetery",
        "forest", "grass", "allotments", "meadow", "recreation_ground", "village_green",
        "landfill", "farmland", "farmyard", "orchard", "vineyard", "plant_nursery",
        "greenhouse_horticulture", "farm",
    ])
});

pub(crate) static NATURAL_AREAS: LazyLock<Set> = LazyLock::new(|| {
    Set::new(&[
        "wood", "grassland", "grass", "scrub", "fell", "heath", "wetland", "glacier", "beach",
        "sand", "bare_rock", "scree",
    ])
});

pub(crate) static LEISURE_AREAS: LazyLock<Set> = LazyLock::new(|| {
    Set::new(&["pitch", "park", "garden", "playground", "golf_course", "stadium"])
});

pub(crate) static AMENITY_AREAS: LazyLock<Set> = LazyLock::new(|| {
    Set::new(&[
        "school", "university", "kindergarten", "college", "library", "hospital", "bus_station",
        "marketplace",
    ])
});

pub(crate) static TOURISM_AREAS: LazyLock<Set> =
    LazyLock::new(|| Set::new(&["zoo", "theme_park", "aquarium"]));

pub(crate) static WATERWAY_CLASSES: LazyLock<Set> =
    LazyLock::new(|| Set::new(&["stream", "river", "canal", "drain", "ditch"]));

pub(crate) static WATERWAY_AREAS: LazyLock<Set> = LazyLock::new(|| {
    Set::new(&["river", "riverbank", "stream", "canal", "drain", "ditch", "dock"])
});

pub(crate) static WATER_LANDUSE: LazyLock<Set> =
    LazyLock::new(|| Set::new(&["reservoir", "basin", "salt_pond"]));

/// Minor man-made or flowing water whose name lives on the waterway way.
pub(crate) static NO_NAME_WATER: LazyLock<Set> = LazyLock::new(|| {
    Set::new(&["river", "basin", "wastewater", "canal", "stream", "ditch", "drain"])
});

pub(crate) static MAN_MADE_CLASSES: LazyLock<Set> =
    LazyLock::new(|| Set::new(&["pier", "breakwater", "groyne"]));

pub(crate) static AEROWAY_CLASSES: LazyLock<Set> = LazyLock::new(|| {
    Set::new(&["taxiway", "hangar", "runway", "helipad", "aerodrome", "airstrip", "tower"])
});

pub(crate) static AEROWAY_BUILDINGS: LazyLock<Set> =
    LazyLock::new(|| Set::new(&["terminal", "gate", "tower"]));

pub(crate) static TRANSIT_ROUTES: LazyLock<ZMap> = LazyLock::new(|| {
    ZMap::new("route")
        .add(8, &["train"])
        .add(10, &["subway"])
        .add(12, &["tram", "share_taxi", "light_rail"])
        .add(14, &["bus", "trolleybus"])
});

pub(crate) static OTHER_ROUTES: LazyLock<ZMap> = LazyLock::new(|| {
    ZMap::new("route")
        .add(8, &["road"])
        .add(9, &["ferry"])
        .add(10, &["bicycle", "hiking", "mtb"])
        .add(12, &["foot", "ski"])
});

/// Coastline ways known to be broken upstream; excluded from stitching.
pub(crate) const BAD_COASTLINE_IDS: &[i64] = &[907_699_771];

/// POI tag keys in priority order. A key's map yields the minzoom for each
/// value; unlisted values use the map default, [`EXCLUDE`] drops the value.
pub(crate) static POI_TAGS: LazyLock<Vec<ZMap>> = LazyLock::new(|| {
    vec![
        ZMap::with_default("amenity", 14)
            .add(12, &["bus_station", "ferry_terminal"])
            .add(
                EXCLUDE,
                &[
                    "parking_space", "bench", "shelter", "waste_basket", "bicycle_parking",
                    "recycling", "hunting_stand", "vending_machine", "post_box",
                    "parking_entrance", "telephone", "bbq", "motorcycle_parking", "grit_bin",
                    "clock", "letter_box", "watering_place", "loading_dock", "payment_terminal",
                    "mobile_money_agent", "trolley_bay", "ticket_validator", "lounger",
                    "feeding_place", "vacuum_cleaner", "game_feeding", "smoking_area",
                    "photo_booth", "kneipp_water_cure", "table", "fixme", "office", "chair",
                ],
            ),
        ZMap::with_default("tourism", 14)
            .add(12, &["attraction", "viewpoint", "museum"])
            .add(EXCLUDE, &["yes"]),
        ZMap::with_default("leisure", 14).add(
            EXCLUDE,
            &[
                "fitness_station", "picnic_table", "slipway", "outdoor_seating", "firepit",
                "bleachers", "common", "yes",
            ],
        ),
        ZMap::with_default("shop", 14),
        ZMap::with_default("sport", 14),
        ZMap::new("landuse").add(
            14,
            &["basin", "brownfield", "cemetery", "reservoir", "winter_sports"],
        ),
        ZMap::new("historic").add(
            14,
            &["monument", "castle", "ruins", "fort", "mine", "archaeological_site"],
        ),
        ZMap::new("highway")
            .add(12, &["bus_stop", "trailhead"])
            .add(14, &["traffic_signals"]),
        ZMap::new("railway")
            .add(12, &["halt", "station", "tram_stop"])
            .add(14, &["subway_entrance", "train_station_entrance"]),
        ZMap::new("natural").add(
            13,
            &[
                "spring", "hot_spring", "fumarole", "geyser", "sinkhole", "arch",
                "cave_entrance", "saddle",
            ],
        ),
        ZMap::new("barrier").add(
            14,
            &[
                "bollard", "border_control", "cycle_barrier", "gate", "lift_gate", "sally_port",
                "stile", "toll_booth",
            ],
        ),
        ZMap::new("building").add(14, &["dormitory"]),
        ZMap::new("aerialway").add(14, &["station"]),
        ZMap::new("waterway").add(14, &["dock"]),
    ]
});

/// Extra keys copied onto POIs when present.
pub(crate) const EXTRA_POI_TAGS: &[&str] = &[
    "cuisine",
    "station",
    "religion",
    "operator",
    "archaeological_site",
    "ref",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highway_packing() {
        let motorway = HIGHWAY_VALUES.get("motorway");
        assert_eq!(motorway & 0xFF, 4);
        assert_eq!(motorway >> 8, 8);
        let link = HIGHWAY_VALUES.get("motorway_link");
        assert!(link < 0);
        assert_eq!((-link) & 0xFF, 11);
        assert_eq!(HIGHWAY_VALUES.get("proposed"), EXCLUDE);
    }

    #[test]
    fn test_zmap_defaults() {
        assert_eq!(POI_TAGS[0].get("restaurant"), 14);
        assert_eq!(POI_TAGS[0].get("bus_station"), 12);
        assert_eq!(POI_TAGS[0].get("bench"), EXCLUDE);
        assert_eq!(TRANSIT_ROUTES.get("power"), EXCLUDE);
    }

    #[test]
    fn test_set_falsy_on_empty() {
        assert!(!PAVED_VALUES.has(""));
        assert!(PAVED_VALUES.has("asphalt"));
    }
}
