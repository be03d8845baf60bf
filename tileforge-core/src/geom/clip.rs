//! Sutherland-Hodgman clipping against axis-aligned half-planes, composed
//! into rectangle clips for rings and linestrings.

use crate::geom::{LineString, LinearRing, MultiLineString, Pt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    fn coord(self, p: Pt) -> f32 {
        match self {
            Axis::X => p.x,
            Axis::Y => p.y,
        }
    }

    /// Point on segment `a`..`b` where the axis coordinate equals `k`.
    fn intersect(self, a: Pt, b: Pt, k: f32) -> Pt {
        let (ca, cb) = (self.coord(a), self.coord(b));
        let t = (k - ca) / (cb - ca);
        match self {
            Axis::X => Pt::new(k, a.y + t * (b.y - a.y)),
            Axis::Y => Pt::new(a.x + t * (b.x - a.x), k),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HalfPlane {
    pub axis: Axis,
    pub bound: f32,
    /// Keep coordinates `<= bound` when true, `>= bound` otherwise.
    pub keep_below: bool,
}

impl HalfPlane {
    fn inside(&self, p: Pt) -> bool {
        let c = self.axis.coord(p);
        if self.keep_below {
            c <= self.bound
        } else {
            c >= self.bound
        }
    }
}

/// Clips a closed ring against one half-plane. The input ring's explicit
/// closing point is optional; the output is explicitly closed (or empty).
#[must_use]
pub fn clip_half_plane(ring: &[Pt], hp: HalfPlane) -> LinearRing {
    let pts = match ring {
        [head @ .., last] if head.first() == Some(last) => head,
        other => other,
    };
    let n = pts.len();
    if n < 3 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(n + 4);
    for i in 0..n {
        let cur = pts[i];
        let prev = pts[(i + n - 1) % n];
        let cur_in = hp.inside(cur);
        let prev_in = hp.inside(prev);
        if cur_in {
            if !prev_in {
                out.push(hp.axis.intersect(prev, cur, hp.bound));
            }
            out.push(cur);
        } else if prev_in {
            out.push(hp.axis.intersect(prev, cur, hp.bound));
        }
    }
    if let Some(&first) = out.first() {
        out.push(first);
    }
    out
}

fn rect_planes(min: Pt, max: Pt) -> [HalfPlane; 4] {
    [
        HalfPlane { axis: Axis::X, bound: min.x, keep_below: false },
        HalfPlane { axis: Axis::X, bound: max.x, keep_below: true },
        HalfPlane { axis: Axis::Y, bound: min.y, keep_below: false },
        HalfPlane { axis: Axis::Y, bound: max.y, keep_below: true },
    ]
}

/// Clips a closed ring to an axis-aligned rectangle. Degenerate results
/// (fewer than 4 points including the closing point) come back empty.
#[must_use]
pub fn clip_ring_to_rect(ring: &[Pt], min: Pt, max: Pt) -> LinearRing {
    let mut out = ring.to_vec();
    for hp in rect_planes(min, max) {
        out = clip_half_plane(&out, hp);
        if out.is_empty() {
            return out;
        }
    }
    if out.len() < 4 {
        out.clear();
    }
    out
}

fn clip_line_half_plane(line: &[Pt], hp: HalfPlane, out: &mut MultiLineString) {
    let mut piece: LineString = Vec::new();
    for (i, &cur) in line.iter().enumerate() {
        let cur_in = hp.inside(cur);
        if i == 0 {
            if cur_in {
                piece.push(cur);
            }
            continue;
        }
        let prev = line[i - 1];
        let prev_in = hp.inside(prev);
        match (prev_in, cur_in) {
            (true, true) => piece.push(cur),
            (true, false) => {
                piece.push(hp.axis.intersect(prev, cur, hp.bound));
                if piece.len() > 1 {
                    out.push(std::mem::take(&mut piece));
                } else {
                    piece.clear();
                }
            }
            (false, true) => {
                piece.push(hp.axis.intersect(prev, cur, hp.bound));
                piece.push(cur);
            }
            (false, false) => {}
        }
    }
    if piece.len() > 1 {
        out.push(piece);
    }
}

/// Clips an open linestring to a rectangle, splitting it wherever it leaves
/// the rectangle.
#[must_use]
pub fn clip_lines_to_rect(line: &[Pt], min: Pt, max: Pt) -> MultiLineString {
    let mut pieces = vec![line.to_vec()];
    for hp in rect_planes(min, max) {
        let mut next = Vec::with_capacity(pieces.len());
        for piece in &pieces {
            clip_line_half_plane(piece, hp, &mut next);
        }
        if next.is_empty() {
            return next;
        }
        pieces = next;
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{ring_area, square_ring};

    const UNIT_MIN: Pt = Pt { x: 0.0, y: 0.0 };
    const UNIT_MAX: Pt = Pt { x: 1.0, y: 1.0 };

    #[test]
    fn test_interior_ring_unchanged() {
        let ring = square_ring(0.25, 0.75);
        let clipped = clip_ring_to_rect(&ring, UNIT_MIN, UNIT_MAX);
        assert_eq!(clipped, ring);
    }

    #[test]
    fn test_clip_is_idempotent() {
        let ring = vec![
            Pt::new(-0.5, 0.5),
            Pt::new(0.5, -0.5),
            Pt::new(1.5, 0.5),
            Pt::new(0.5, 1.5),
            Pt::new(-0.5, 0.5),
        ];
        let once = clip_ring_to_rect(&ring, UNIT_MIN, UNIT_MAX);
        let twice = clip_ring_to_rect(&once, UNIT_MIN, UNIT_MAX);
        assert_eq!(once, twice);
        assert_eq!(once.first(), once.last());
        // the diamond clipped to the unit square keeps half its area
        assert!((ring_area(&once).abs() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_ring_outside_is_empty() {
        let ring = square_ring(2.0, 3.0);
        assert!(clip_ring_to_rect(&ring, UNIT_MIN, UNIT_MAX).is_empty());
    }

    #[test]
    fn test_winding_preserved() {
        let ccw = vec![
            Pt::new(-1.0, -1.0),
            Pt::new(2.0, -1.0),
            Pt::new(2.0, 2.0),
            Pt::new(-1.0, 2.0),
            Pt::new(-1.0, -1.0),
        ];
        let clipped = clip_ring_to_rect(&ccw, UNIT_MIN, UNIT_MAX);
        assert!(ring_area(&clipped) > 0.0);
    }

    #[test]
    fn test_line_crossing_splits() {
        // zig-zag leaving and re-entering through the right edge
        let line = vec![
            Pt::new(0.5, 0.2),
            Pt::new(1.5, 0.4),
            Pt::new(0.5, 0.6),
        ];
        let pieces = clip_lines_to_rect(&line, UNIT_MIN, UNIT_MAX);
        assert_eq!(pieces.len(), 2);
        for piece in &pieces {
            assert!(piece.len() >= 2);
        }
        // both pieces end on the right edge where the line left the tile
        assert!((pieces[0].last().unwrap().x - 1.0).abs() < 1e-6);
        assert!((pieces[1][0].x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_interior_line_preserved() {
        let line = vec![Pt::new(0.1, 0.1), Pt::new(0.9, 0.9)];
        let pieces = clip_lines_to_rect(&line, UNIT_MIN, UNIT_MAX);
        assert_eq!(pieces, vec![line]);
    }
}
