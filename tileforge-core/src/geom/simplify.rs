//! Ramer-Douglas-Peucker simplification returning a keep-mask over the input.

use crate::geom::{dist_to_segment2, Pt};

fn rdp_mark(pts: &[Pt], keep: &mut [bool], start: usize, end: usize, thresh2: f32) {
    let mut max_dist2 = 0.0_f32;
    let mut argmax = 0;
    let (p0, p1) = (pts[start], pts[end]);
    for (i, &p) in pts.iter().enumerate().take(end).skip(start + 1) {
        let d2 = dist_to_segment2(p0, p1, p);
        if d2 > max_dist2 {
            max_dist2 = d2;
            argmax = i;
        }
    }
    if max_dist2 < thresh2 {
        return;
    }
    keep[argmax] = true;
    rdp_mark(pts, keep, start, argmax, thresh2);
    rdp_mark(pts, keep, argmax, end, thresh2);
}

/// Douglas-Peucker with squared-distance threshold `thresh`². Returns an
/// empty mask (meaning "keep everything") when simplification is disabled or
/// the input is too short; endpoints are always kept.
#[must_use]
pub fn simplify_rdp(pts: &[Pt], thresh: f32) -> Vec<bool> {
    if thresh <= 0.0 || pts.len() < 3 {
        return Vec::new();
    }
    let mut keep = vec![false; pts.len()];
    keep[0] = true;
    *keep.last_mut().expect("non-empty") = true;
    rdp_mark(pts, &mut keep, 0, pts.len() - 1, thresh * thresh);
    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(pts: &[Pt], keep: &[bool]) -> Vec<Pt> {
        if keep.is_empty() {
            return pts.to_vec();
        }
        pts.iter()
            .zip(keep)
            .filter_map(|(p, k)| k.then_some(*p))
            .collect()
    }

    #[test]
    fn test_collinear_collapses() {
        let pts: Vec<Pt> = (0..10).map(|i| Pt::new(i as f32 * 0.1, 0.0)).collect();
        let keep = simplify_rdp(&pts, 0.01);
        let out = apply(&pts, &keep);
        assert_eq!(out, vec![pts[0], pts[9]]);
    }

    #[test]
    fn test_endpoints_and_spikes_kept() {
        let pts = vec![
            Pt::new(0.0, 0.0),
            Pt::new(0.5, 0.5),
            Pt::new(1.0, 0.0),
        ];
        let keep = simplify_rdp(&pts, 0.1);
        assert_eq!(apply(&pts, &keep), pts);
    }

    #[test]
    fn test_zero_threshold_keeps_all() {
        let pts: Vec<Pt> = (0..5).map(|i| Pt::new(i as f32, (i % 2) as f32)).collect();
        assert!(simplify_rdp(&pts, 0.0).is_empty());
    }

    #[test]
    fn test_deviation_bounded_by_threshold() {
        let pts: Vec<Pt> = (0..50)
            .map(|i| {
                let x = i as f32 / 49.0;
                Pt::new(x, (x * 20.0).sin() * 0.02)
            })
            .collect();
        let thresh = 0.05;
        let keep = simplify_rdp(&pts, thresh);
        let out = apply(&pts, &keep);
        // every dropped point stays within the threshold of the kept polyline
        for &p in &pts {
            let min_d2 = out
                .windows(2)
                .map(|w| dist_to_segment2(w[0], w[1], p))
                .fold(f32::MAX, f32::min);
            assert!(min_d2 <= thresh * thresh + 1e-6);
        }
    }
}
