//! Pole-of-inaccessibility label point for a single polygon, found with a
//! quad-tree priority search over cells scored by `d + h * sqrt(2)`.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::geom::{bounds_of, LinearRing, Pt};

fn seg_dist_sq(p: Pt, a: Pt, b: Pt) -> f32 {
    let (mut x, mut y) = (a.x, a.y);
    let (dx, dy) = (b.x - x, b.y - y);
    if dx != 0.0 || dy != 0.0 {
        let t = ((p.x - x) * dx + (p.y - y) * dy) / (dx * dx + dy * dy);
        if t > 1.0 {
            x = b.x;
            y = b.y;
        } else if t > 0.0 {
            x += dx * t;
            y += dy * t;
        }
    }
    let (dx, dy) = (p.x - x, p.y - y);
    dx * dx + dy * dy
}

/// Signed distance from a point to the polygon outline, negative outside.
fn point_to_polygon_dist(point: Pt, polygon: &[LinearRing]) -> f32 {
    let mut inside = false;
    let mut min_dist_sq = f32::INFINITY;
    for ring in polygon {
        let len = ring.len();
        let mut j = len.wrapping_sub(1);
        for i in 0..len {
            let (a, b) = (ring[i], ring[j]);
            if (a.y > point.y) != (b.y > point.y)
                && point.x < (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x
            {
                inside = !inside;
            }
            min_dist_sq = min_dist_sq.min(seg_dist_sq(point, a, b));
            j = i;
        }
    }
    (if inside { 1.0 } else { -1.0 }) * min_dist_sq.sqrt()
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    c: Pt,
    /// Half the cell size.
    h: f32,
    /// Distance from cell center to the polygon outline.
    d: f32,
    /// Upper bound on the distance attainable within the cell.
    max: f32,
}

impl Cell {
    fn new(c: Pt, h: f32, polygon: &[LinearRing]) -> Self {
        let d = point_to_polygon_dist(c, polygon);
        Self {
            c,
            h,
            d,
            max: d + h * std::f32::consts::SQRT_2,
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.max == other.max
    }
}
impl Eq for Cell {}
impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        self.max.total_cmp(&other.max)
    }
}

fn centroid_cell(polygon: &[LinearRing]) -> Cell {
    let ring = &polygon[0];
    let mut area = 0.0_f32;
    let mut c = Pt::new(0.0, 0.0);
    let len = ring.len();
    let mut j = len.wrapping_sub(1);
    for i in 0..len {
        let (a, b) = (ring[i], ring[j]);
        let f = a.x * b.y - b.x * a.y;
        c.x += (a.x + b.x) * f;
        c.y += (a.y + b.y) * f;
        area += f * 3.0;
        j = i;
    }
    let center = if area == 0.0 { ring[0] } else { c * (1.0 / area) };
    Cell::new(center, 0.0, polygon)
}

/// Finds a visually centered label point for `polygon` (outer ring first,
/// holes after), refined until no cell can beat the best distance by more
/// than `precision`.
#[must_use]
pub fn polylabel(polygon: &[LinearRing], precision: f32) -> Pt {
    let (min, max) = bounds_of(&polygon[0]);
    let size = max - min;
    let cell_size = size.x.min(size.y);
    if cell_size == 0.0 {
        return min;
    }
    let mut h = cell_size / 2.0;

    let mut queue = BinaryHeap::new();
    let mut x = min.x;
    while x < max.x {
        let mut y = min.y;
        while y < max.y {
            queue.push(Cell::new(Pt::new(x + h, y + h), h, polygon));
            y += cell_size;
        }
        x += cell_size;
    }

    // centroid as the first guess, bbox center as the second
    let mut best = centroid_cell(polygon);
    let bbox_cell = Cell::new(min + size * 0.5, 0.0, polygon);
    if bbox_cell.d > best.d {
        best = bbox_cell;
    }

    while let Some(cell) = queue.pop() {
        if cell.d > best.d {
            best = cell;
        }
        // no chance of a better solution within this cell
        if cell.max - best.d <= precision {
            continue;
        }
        h = cell.h / 2.0;
        queue.push(Cell::new(Pt::new(cell.c.x - h, cell.c.y - h), h, polygon));
        queue.push(Cell::new(Pt::new(cell.c.x + h, cell.c.y - h), h, polygon));
        queue.push(Cell::new(Pt::new(cell.c.x - h, cell.c.y + h), h, polygon));
        queue.push(Cell::new(Pt::new(cell.c.x + h, cell.c.y + h), h, polygon));
    }

    best.c
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::square_ring;

    #[test]
    fn test_square_center() {
        let poly = vec![square_ring(0.0, 1.0)];
        let p = polylabel(&poly, 1.0 / 256.0);
        assert!((p.x - 0.5).abs() < 0.01);
        assert!((p.y - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_donut_avoids_hole() {
        let poly = vec![square_ring(0.0, 1.0), square_ring(0.4, 0.6)];
        let p = polylabel(&poly, 1.0 / 256.0);
        // the label must sit inside the polygon but not in the hole
        assert!(point_to_polygon_dist(p, &poly) > 0.0);
        assert!(!(p.x > 0.4 && p.x < 0.6 && p.y > 0.4 && p.y < 0.6));
    }

    #[test]
    fn test_l_shape_inside() {
        let ring = vec![
            Pt::new(0.0, 0.0),
            Pt::new(1.0, 0.0),
            Pt::new(1.0, 0.3),
            Pt::new(0.3, 0.3),
            Pt::new(0.3, 1.0),
            Pt::new(0.0, 1.0),
            Pt::new(0.0, 0.0),
        ];
        let poly = vec![ring];
        let p = polylabel(&poly, 1.0 / 256.0);
        assert!(point_to_polygon_dist(p, &poly) > 0.0);
    }
}
