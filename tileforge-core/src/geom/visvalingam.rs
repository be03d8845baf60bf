//! Visvalingam-Whyatt simplification: repeatedly removes the vertex whose
//! effective triangle is smallest, propagating removed areas to neighbors as
//! a floor so removal order stays monotonic. Returns a keep-mask like
//! [`simplify_rdp`](crate::geom::simplify_rdp).

use crate::geom::Pt;

struct Item {
    /// Doubled triangle area of this vertex with its live neighbors.
    area: f64,
    prev: Option<usize>,
    next: Option<usize>,
    heap_pos: usize,
}

struct MinHeap {
    items: Vec<Item>,
    heap: Vec<usize>,
}

impl MinHeap {
    fn push(&mut self, idx: usize) {
        self.items[idx].heap_pos = self.heap.len();
        self.heap.push(idx);
        self.up(self.items[idx].heap_pos);
    }

    fn pop(&mut self) -> Option<usize> {
        let removed = *self.heap.first()?;
        let last = self.heap.pop().expect("non-empty");
        if !self.heap.is_empty() {
            self.items[last].heap_pos = 0;
            self.heap[0] = last;
            self.down(0);
        }
        Some(removed)
    }

    fn update(&mut self, idx: usize, area: f64) {
        let shrank = self.items[idx].area > area;
        self.items[idx].area = area;
        if shrank {
            self.up(self.items[idx].heap_pos);
        } else {
            self.down(self.items[idx].heap_pos);
        }
    }

    fn up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.items[self.heap[parent]].area <= self.items[self.heap[i]].area {
                break;
            }
            self.swap(i, parent);
            i = parent;
        }
    }

    fn down(&mut self, mut i: usize) {
        loop {
            let (left, right) = (2 * i + 1, 2 * i + 2);
            let mut smallest = i;
            if left < self.heap.len()
                && self.items[self.heap[left]].area < self.items[self.heap[smallest]].area
            {
                smallest = left;
            }
            if right < self.heap.len()
                && self.items[self.heap[right]].area < self.items[self.heap[smallest]].area
            {
                smallest = right;
            }
            if smallest == i {
                break;
            }
            self.swap(i, smallest);
            i = smallest;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.items[self.heap[a]].heap_pos = a;
        self.items[self.heap[b]].heap_pos = b;
    }
}

fn doubled_triangle_area(pts: &[Pt], i1: usize, i2: usize, i3: usize) -> f64 {
    let (a, b, c) = (pts[i1], pts[i2], pts[i3]);
    f64::from((b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)).abs()
}

/// Simplifies until the smallest remaining doubled triangle area exceeds
/// `2 * thresh`. Endpoints carry infinite area and are always kept.
#[must_use]
pub fn simplify_visvalingam(pts: &[Pt], thresh: f32) -> Vec<bool> {
    if thresh <= 0.0 || pts.len() < 3 {
        return Vec::new();
    }
    let thresh = f64::from(thresh) * 2.0;
    let n = pts.len();

    let mut hp = MinHeap {
        items: Vec::with_capacity(n),
        heap: Vec::with_capacity(n),
    };
    for i in 0..n {
        let area = if i == 0 || i == n - 1 {
            f64::INFINITY
        } else {
            doubled_triangle_area(pts, i - 1, i, i + 1)
        };
        hp.items.push(Item {
            area,
            prev: (i > 0).then(|| i - 1),
            next: (i < n - 1).then_some(i + 1),
            heap_pos: 0,
        });
    }
    for i in 0..n {
        hp.push(i);
    }

    let mut removed = vec![false; n];
    while let Some(current) = hp.pop() {
        if hp.items[current].area > thresh {
            break;
        }
        removed[current] = true;

        let prev = hp.items[current].prev.expect("interior vertex");
        let next = hp.items[current].next.expect("interior vertex");
        hp.items[prev].next = Some(next);
        hp.items[next].prev = Some(prev);

        // a removed area propagates as a floor to its neighbors
        let floor = hp.items[current].area;
        if let Some(pp) = hp.items[prev].prev {
            let area = doubled_triangle_area(pts, pp, prev, next).max(floor);
            hp.update(prev, area);
        }
        if let Some(nn) = hp.items[next].next {
            let area = doubled_triangle_area(pts, prev, next, nn).max(floor);
            hp.update(next, area);
        }
    }

    removed.iter().map(|r| !r).collect()
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
    fn test_removes_smallest_triangle() {
        let pts = vec![
            Pt::new(0.0, 0.0),
            Pt::new(0.5, 0.001), // tiny bump
            Pt::new(1.0, 0.0),
            Pt::new(1.5, 0.5), // significant corner
            Pt::new(2.0, 0.0),
        ];
        let keep = simplify_visvalingam(&pts, 0.01);
        let out = apply(&pts, &keep);
        assert!(!out.contains(&pts[1]));
        assert!(out.contains(&pts[3]));
        assert_eq!(out.first(), Some(&pts[0]));
        assert_eq!(out.last(), Some(&pts[4]));
    }

    #[test]
    fn test_threshold_zero_keeps_all() {
        let pts = vec![Pt::new(0.0, 0.0), Pt::new(0.5, 0.0), Pt::new(1.0, 0.0)];
        assert!(simplify_visvalingam(&pts, 0.0).is_empty());
    }

    #[test]
    fn test_collinear_interior_dropped() {
        let pts: Vec<Pt> = (0..6).map(|i| Pt::new(i as f32, 0.0)).collect();
        let keep = simplify_visvalingam(&pts, 1e-6);
        let out = apply(&pts, &keep);
        assert_eq!(out, vec![pts[0], pts[5]]);
    }
}
