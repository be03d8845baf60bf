//! Geometry primitives in normalized tile coordinates (`[0, 1]` with `y`
//! growing northward). All rings here are explicitly closed: the first point
//! is repeated at the end.

mod clip;
mod polylabel;
mod simplify;
mod visvalingam;

use std::ops::{Add, Mul, Sub};

pub use crate::geom::clip::{clip_half_plane, clip_lines_to_rect, clip_ring_to_rect, Axis, HalfPlane};
pub use crate::geom::polylabel::polylabel;
pub use crate::geom::simplify::simplify_rdp;
pub use crate::geom::visvalingam::simplify_visvalingam;

/// A point in normalized tile coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pt {
    pub x: f32,
    pub y: f32,
}

pub type LineString = Vec<Pt>;
pub type MultiLineString = Vec<LineString>;
pub type LinearRing = Vec<Pt>;
pub type Polygon = Vec<LinearRing>;
pub type MultiPolygon = Vec<Polygon>;

impl Pt {
    #[must_use]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y))
    }

    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y))
    }

    #[must_use]
    pub fn dist2(self, other: Self) -> f32 {
        let d = self - other;
        d.x * d.x + d.y * d.y
    }
}

impl Add for Pt {
    type Output = Pt;
    fn add(self, rhs: Pt) -> Pt {
        Pt::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Pt {
    type Output = Pt;
    fn sub(self, rhs: Pt) -> Pt {
        Pt::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Pt {
    type Output = Pt;
    fn mul(self, rhs: f32) -> Pt {
        Pt::new(self.x * rhs, self.y * rhs)
    }
}

/// Signed shoelace area; positive for counter-clockwise rings in these
/// y-up coordinates. The sign inverts under the MVT y-flip.
#[must_use]
pub fn ring_area(ring: &[Pt]) -> f64 {
    let mut area = 0.0;
    let n = ring.len();
    for i in 0..n {
        let j = (i + 1) % n;
        area += f64::from(ring[i].x) * f64::from(ring[j].y)
            - f64::from(ring[j].x) * f64::from(ring[i].y);
    }
    area / 2.0
}

/// Even-odd crossing test against a single ring.
#[must_use]
pub fn point_in_ring(ring: &[Pt], p: Pt) -> bool {
    let mut inside = false;
    let n = ring.len();
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let (a, b) = (ring[i], ring[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Even-odd crossing test over all rings of a polygon; outer and holes count
/// together, so a point inside an odd number of rings is inside.
#[must_use]
pub fn point_in_polygon(polygon: &[LinearRing], p: Pt) -> bool {
    let mut inside = false;
    for ring in polygon {
        if point_in_ring(ring, p) {
            inside = !inside;
        }
    }
    inside
}

/// Squared distance from `pt` to the segment `start`..`end`.
#[must_use]
pub fn dist_to_segment2(start: Pt, end: Pt, pt: Pt) -> f32 {
    let l2 = end.dist2(start);
    if l2 == 0.0 {
        // zero length segment
        return start.dist2(pt);
    }
    let d = end - start;
    let t = (((pt.x - start.x) * d.x + (pt.y - start.y) * d.y) / l2).clamp(0.0, 1.0);
    let proj = start + d * t;
    proj.dist2(pt)
}

/// Axis-aligned bounding box of a point list.
#[must_use]
pub fn bounds_of(pts: &[Pt]) -> (Pt, Pt) {
    let mut min = Pt::new(f32::MAX, f32::MAX);
    let mut max = Pt::new(f32::MIN, f32::MIN);
    for &p in pts {
        min = min.min(p);
        max = max.max(p);
    }
    (min, max)
}

#[cfg(test)]
pub(crate) fn square_ring(min: f32, max: f32) -> LinearRing {
    vec![
        Pt::new(min, min),
        Pt::new(max, min),
        Pt::new(max, max),
        Pt::new(min, max),
        Pt::new(min, min),
    ]
}
