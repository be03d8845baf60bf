//! Stitches tile-clipped coastline segments into closed ocean polygons.
//!
//! Coastline ways carry water on their right-hand side, so closed outer
//! rings arrive clockwise (negative area in y-up tile coordinates) and
//! islands counter-clockwise. Open segments must start and end on the tile
//! perimeter; the gap between one segment's exit and the next segment's
//! entry is walked clockwise along the tile edge, inserting corner vertices
//! as needed.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;

use crate::geom::{
    point_in_ring, ring_area, LineString, LinearRing, MultiLineString, MultiPolygon, Polygon, Pt,
};

/// Map key with a total order over point coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PtKey(Pt);

impl Eq for PtKey {}

impl Ord for PtKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .x
            .total_cmp(&other.0.x)
            .then(self.0.y.total_cmp(&other.0.y))
    }
}

impl PartialOrd for PtKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Dist(f32);

impl Eq for Dist {}

impl Ord for Dist {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for Dist {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

const CORNERS: [Pt; 4] = [
    Pt { x: 0.0, y: 0.0 },
    Pt { x: 0.0, y: 1.0 },
    Pt { x: 1.0, y: 1.0 },
    Pt { x: 1.0, y: 0.0 },
];

/// Clockwise distance along the tile perimeter from (0,0) to `p`, in
/// `[0, 4)`; `None` if `p` is not on the perimeter.
fn perim_dist_cw(p: Pt) -> Option<f32> {
    if p.x == 0.0 {
        Some(p.y)
    } else if p.y == 1.0 {
        Some(1.0 + p.x)
    } else if p.x == 1.0 {
        Some(2.0 + (1.0 - p.y))
    } else if p.y == 0.0 {
        Some(3.0 + (1.0 - p.x))
    } else {
        None
    }
}

/// Stitches coastline segments into ocean polygons (outer ring first, then
/// its islands). An empty input produces the all-ocean tile. Returns `None`
/// when an open segment does not terminate on the tile perimeter; callers
/// abort ocean emission for the tile.
pub(crate) fn stitch(coastline: MultiLineString) -> Option<MultiPolygon> {
    let mut outers: MultiPolygon = Vec::new();
    let mut inners: Polygon = Vec::new();
    let mut add_ring = |ring: LinearRing| {
        if ring_area(&ring) > 0.0 {
            inners.push(ring);
        } else {
            outers.push(vec![ring]);
        }
    };

    let mut segments: BTreeMap<PtKey, LineString> = BTreeMap::new();
    for way in coastline {
        if way.len() < 2 {
            continue;
        }
        if way.first() == way.last() {
            add_ring(way);
        } else {
            segments.insert(PtKey(way[0]), way);
        }
    }

    // join segments whose endpoints meet inside the tile
    let mut cursor = segments.first_key_value().map(|(k, _)| *k);
    while let Some(key) = cursor {
        let back = PtKey(*segments[&key].last().expect("segments are non-empty"));
        if back == key {
            let ring = segments.remove(&key).expect("cursor is valid");
            add_ring(ring);
            cursor = next_key(&segments, key);
        } else if segments.contains_key(&back) {
            let tail = segments.remove(&back).expect("checked");
            segments
                .get_mut(&key)
                .expect("cursor is valid")
                .extend(tail);
            // stay on this key to chase the new tail
        } else {
            cursor = next_key(&segments, key);
        }
    }

    // remaining segments run from the perimeter back to the perimeter; walk
    // from each exit clockwise along the edge to the next entry
    let mut edgesegs: BTreeMap<Dist, LineString> = BTreeMap::new();
    for (_, seg) in segments {
        let d = perim_dist_cw(seg[0])?;
        edgesegs.insert(Dist(d), seg);
    }

    while let Some((d_front, mut ring)) = edgesegs.pop_first() {
        loop {
            let d_back = perim_dist_cw(*ring.last().expect("non-empty"))?;
            let next = if d_back <= d_front.0 {
                None
            } else {
                edgesegs
                    .range((Bound::Included(Dist(d_back)), Bound::Unbounded))
                    .next()
                    .map(|(k, _)| *k)
            };
            match next {
                None => {
                    // wraps around to this ring's own entry point
                    let mut dest = d_front.0;
                    if dest < d_back {
                        dest += 4.0;
                    }
                    push_corners(&mut ring, d_back, dest);
                    let first = ring[0];
                    ring.push(first);
                    add_ring(ring);
                    break;
                }
                Some(k) => {
                    let seg = edgesegs.remove(&k).expect("key from range");
                    push_corners(&mut ring, d_back, k.0);
                    ring.extend(seg);
                }
            }
        }
    }

    if outers.is_empty() {
        // no outer ring at all: the tile is an island interior
        outers.push(vec![vec![
            Pt::new(0.0, 0.0),
            Pt::new(0.0, 1.0),
            Pt::new(1.0, 1.0),
            Pt::new(1.0, 0.0),
            Pt::new(0.0, 0.0),
        ]]);
    }

    if outers.len() == 1 {
        outers[0].extend(inners);
    } else {
        for inner in inners {
            // prefer a probe point off the tile edge to dodge numerical
            // trouble, since outers likely include edge runs
            let pin = inner
                .iter()
                .copied()
                .find(|p| p.x != 0.0 && p.y != 0.0 && p.x != 1.0 && p.y != 1.0)
                .unwrap_or(inner[0]);
            for outer in &mut outers {
                if point_in_ring(&outer[0], pin) {
                    outer.push(inner);
                    break;
                }
            }
        }
    }

    Some(outers)
}

fn next_key(segments: &BTreeMap<PtKey, LineString>, after: PtKey) -> Option<PtKey> {
    segments
        .range((Bound::Excluded(after), Bound::Unbounded))
        .next()
        .map(|(k, _)| *k)
}

fn push_corners(ring: &mut LineString, from: f32, to: f32) {
    let mut c = from.ceil() as i32;
    while (c as f32) < to {
        ring.push(CORNERS[(c.rem_euclid(4)) as usize]);
        c += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::square_ring;

    #[test]
    fn test_empty_input_is_all_ocean() {
        let polys = stitch(Vec::new()).unwrap();
        assert_eq!(polys.len(), 1);
        assert_eq!(polys[0].len(), 1);
        assert!((ring_area(&polys[0][0]).abs() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_horizontal_crossing_keeps_water_right() {
        // west-to-east coastline across the middle: water on the right means
        // the ocean is the southern half
        let seg = vec![Pt::new(0.0, 0.5), Pt::new(1.0, 0.5)];
        let polys = stitch(vec![seg]).unwrap();
        assert_eq!(polys.len(), 1);
        let outer = &polys[0][0];
        assert_eq!(outer.first(), outer.last());
        assert!((ring_area(outer).abs() - 0.5).abs() < 1e-6);
        // all points in the southern half
        assert!(outer.iter().all(|p| p.y <= 0.5));
    }

    #[test]
    fn test_island_becomes_hole_in_full_tile() {
        // a closed counter-clockwise ring is an island
        let island = square_ring(0.25, 0.75);
        assert!(ring_area(&island) > 0.0);
        let polys = stitch(vec![island.clone()]).unwrap();
        assert_eq!(polys.len(), 1);
        assert_eq!(polys[0].len(), 2);
        assert!((ring_area(&polys[0][0]).abs() - 1.0) < 1e-6);
        assert_eq!(polys[0][1], island);
    }

    #[test]
    fn test_split_segments_are_joined() {
        // the same crossing as above, but split at an interior point
        let a = vec![Pt::new(0.0, 0.5), Pt::new(0.5, 0.5)];
        let b = vec![Pt::new(0.5, 0.5), Pt::new(1.0, 0.5)];
        let polys = stitch(vec![b, a]).unwrap();
        assert_eq!(polys.len(), 1);
        assert!((ring_area(&polys[0][0]).abs() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_two_segments_bound_a_channel() {
        // land above y=0.75 and below y=0.25, ocean in between; the two
        // segments are chained across the right edge without corner visits
        let top = vec![Pt::new(0.0, 0.75), Pt::new(1.0, 0.75)];
        let bottom = vec![Pt::new(1.0, 0.25), Pt::new(0.0, 0.25)];
        let polys = stitch(vec![top, bottom]).unwrap();
        assert_eq!(polys.len(), 1);
        let outer = &polys[0][0];
        assert_eq!(outer.first(), outer.last());
        assert!((ring_area(outer).abs() - 0.5).abs() < 1e-6);
        assert!(outer.iter().all(|p| p.y >= 0.25 - 1e-6 && p.y <= 0.75 + 1e-6));
    }

    #[test]
    fn test_corner_walk_inserts_corners() {
        // coastline entering at the left edge and leaving through the top:
        // the ocean ring must walk clockwise through (1,1), (1,0) and (0,0)
        let seg = vec![Pt::new(0.0, 0.5), Pt::new(0.5, 1.0)];
        let polys = stitch(vec![seg]).unwrap();
        assert_eq!(polys.len(), 1);
        let outer = &polys[0][0];
        for corner in [Pt::new(1.0, 1.0), Pt::new(1.0, 0.0), Pt::new(0.0, 0.0)] {
            assert!(outer.contains(&corner), "missing corner {corner:?}");
        }
        assert!(ring_area(outer) < 0.0);
    }

    #[test]
    fn test_interior_endpoint_is_rejected() {
        let dangling = vec![Pt::new(0.0, 0.5), Pt::new(0.5, 0.5)];
        assert!(stitch(vec![dangling]).is_none());
    }
}
