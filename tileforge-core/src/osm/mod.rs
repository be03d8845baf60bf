//! OSM-derived feature model: tagged nodes, ways and relations with
//! geometry in projected (web-mercator) meters, served out of an in-memory
//! spatially indexed [`FeatureStore`].

mod query;
mod store;

pub use crate::osm::query::Predicate;
pub use crate::osm::store::{FeatureStore, Key, StoreBuilder, StoreError};

/// A position in projected meters.
pub type Meters = (f64, f64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    Node,
    Way,
    Relation,
}

impl FeatureKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FeatureKind::Node => "node",
            FeatureKind::Way => "way",
            FeatureKind::Relation => "relation",
        }
    }
}

/// Axis-aligned bounds in projected meters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    #[must_use]
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::new(f64::MAX, f64::MAX, f64::MIN, f64::MIN)
    }

    pub fn extend(&mut self, p: Meters) {
        self.min_x = self.min_x.min(p.0);
        self.min_y = self.min_y.min(p.1);
        self.max_x = self.max_x.max(p.0);
        self.max_y = self.max_y.max(p.1);
    }

    #[must_use]
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    #[must_use]
    pub fn contains(&self, p: Meters) -> bool {
        p.0 >= self.min_x && p.0 <= self.max_x && p.1 >= self.min_y && p.1 <= self.max_y
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    #[must_use]
    pub fn center(&self) -> Meters {
        (
            (self.min_x + self.max_x) * 0.5,
            (self.min_y + self.max_y) * 0.5,
        )
    }

    /// Area of the box in square meters, a cheap upper bound for the area of
    /// anything inside it.
    #[must_use]
    pub fn area(&self) -> f64 {
        (self.width() * self.height()).max(0.0)
    }
}

/// Feature geometry; polygon rings carry an explicit closing point and are
/// ordered outer ring first.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureGeometry {
    Point(Meters),
    Line(Vec<Meters>),
    Polygon(Vec<Vec<Meters>>),
    MultiPolygon(Vec<Vec<Vec<Meters>>>),
}

#[derive(Debug, Clone)]
pub struct Feature {
    pub id: i64,
    pub kind: FeatureKind,
    pub(crate) tags: Vec<(u32, String)>,
    pub geometry: FeatureGeometry,
    pub bounds: Bounds,
    pub members: Vec<(FeatureKind, i64)>,
    pub belongs_to_relation: bool,
}

impl Feature {
    #[must_use]
    pub fn is_area(&self) -> bool {
        matches!(
            self.geometry,
            FeatureGeometry::Polygon(_) | FeatureGeometry::MultiPolygon(_)
        )
    }

    #[must_use]
    pub fn tag(&self, key: Key) -> TagValue<'_> {
        TagValue(
            self.tags
                .iter()
                .find(|(code, _)| *code == key.0)
                .map(|(_, v)| v.as_str()),
        )
    }

    /// Representative point: the node position, or the bounds center.
    #[must_use]
    pub fn xy(&self) -> Meters {
        match &self.geometry {
            FeatureGeometry::Point(p) => *p,
            _ => self.bounds.center(),
        }
    }

    /// Vertex-average centroid of linear features, [`Self::xy`] otherwise.
    /// Area centroids are computed by the tile builder from clipped rings.
    #[must_use]
    pub fn centroid(&self) -> Meters {
        match &self.geometry {
            FeatureGeometry::Line(pts) if !pts.is_empty() => {
                let (sx, sy) = pts
                    .iter()
                    .fold((0.0, 0.0), |(sx, sy), p| (sx + p.0, sy + p.1));
                let n = pts.len() as f64;
                (sx / n, sy / n)
            }
            _ => self.xy(),
        }
    }

    /// Length of a linear feature in projected meters.
    #[must_use]
    pub fn length(&self) -> f64 {
        let pts = match &self.geometry {
            FeatureGeometry::Line(pts) => pts.as_slice(),
            _ => return 0.0,
        };
        pts.windows(2)
            .map(|w| ((w[1].0 - w[0].0).powi(2) + (w[1].1 - w[0].1).powi(2)).sqrt())
            .sum()
    }

    /// Unsigned polygon area in projected square meters, holes subtracted.
    #[must_use]
    pub fn area(&self) -> f64 {
        fn ring_area(ring: &[Meters]) -> f64 {
            let mut area = 0.0;
            let n = ring.len();
            for i in 0..n {
                let j = (i + 1) % n;
                area += ring[i].0 * ring[j].1 - ring[j].0 * ring[i].1;
            }
            area / 2.0
        }
        let mut total = 0.0;
        for poly in self.polygons() {
            for (i, ring) in poly.iter().enumerate() {
                let a = ring_area(ring).abs();
                if i == 0 {
                    total += a;
                } else {
                    total -= a;
                }
            }
        }
        total.max(0.0)
    }

    /// The polygons of an area feature; empty for points and lines.
    #[must_use]
    pub fn polygons(&self) -> &[Vec<Vec<Meters>>] {
        match &self.geometry {
            FeatureGeometry::Polygon(rings) => std::slice::from_ref(rings),
            FeatureGeometry::MultiPolygon(polys) => polys,
            _ => &[],
        }
    }

    /// The coordinate stream of a way: its line, or the outer ring of a
    /// single-ring area way.
    #[must_use]
    pub fn way_coords(&self) -> Option<&[Meters]> {
        match &self.geometry {
            FeatureGeometry::Line(pts) => Some(pts),
            FeatureGeometry::Polygon(rings) => rings.first().map(Vec::as_slice),
            _ => None,
        }
    }
}

/// A looked-up tag value. Absent and empty values are falsy; the strings
/// `"no"` and `"0"` stay truthy, so explicit comparisons are used to detect
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TagValue<'a>(pub Option<&'a str>);

impl<'a> TagValue<'a> {
    /// Truthiness: present and non-empty.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.is_some_and(|v| !v.is_empty())
    }

    #[must_use]
    pub fn as_str(&self) -> &'a str {
        self.0.unwrap_or("")
    }

    #[must_use]
    pub fn num(&self) -> Option<f64> {
        self.0.and_then(|v| v.trim().parse().ok())
    }
}

impl PartialEq<&str> for TagValue<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.0 == Some(*other)
    }
}

impl std::fmt::Display for TagValue<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
