//! Parallel construction of the binary radix tree and of its AABBs.
//!
//! This implements "Maximizing Parallelism in the Construction of BVHs, Octrees, and k-d Trees",
//! Tero Karras, 2012.

use super::LbvhNode;
use crate::bounding_volume::Aabb;
use crate::math::{AtomicRealBits, Point, Real, DIM};
use crate::utils::parallel;
use core::sync::atomic::{AtomicU32, Ordering};

/// Builds the complete binary tree over the sorted Morton `codes` of `sorted_points`.
///
/// Returns the `2n - 1` nodes, with valid parent pointers and AABBs, and the root index.
pub(super) fn build_hierarchy(codes: &[u64], sorted_points: &[Point<Real>]) -> (Vec<LbvhNode>, u32) {
    let n = sorted_points.len();
    assert_eq!(codes.len(), n);

    if n == 1 {
        return (vec![LbvhNode::leaf(sorted_points[0], 0)], 0);
    }

    let mut nodes = parallel::map(n - 1, |i| internal_node(codes, i));
    nodes.extend(parallel::map(n, |p| {
        LbvhNode::leaf(sorted_points[p], p as u32)
    }));

    assign_parents(&mut nodes, n);
    let root = compute_aabbs(&mut nodes, n);
    (nodes, root)
}

/// The length of the longest common prefix of the keys of the sorted leaves `i` and `j`.
///
/// The key of a leaf is its Morton code extended by its position, so that all keys are
/// distinct. Returns `-1` if `j` is out of bounds.
#[inline]
fn common_prefix(codes: &[u64], i: i64, j: i64) -> i32 {
    if j < 0 || j >= codes.len() as i64 {
        return -1;
    }

    let (ci, cj) = (codes[i as usize], codes[j as usize]);

    if ci == cj {
        64 + (i as u32 ^ j as u32).leading_zeros() as i32
    } else {
        (ci ^ cj).leading_zeros() as i32
    }
}

/// Computes the range and children of the `i`-th internal node.
fn internal_node(codes: &[u64], i: usize) -> LbvhNode {
    let n = codes.len();
    let i = i as i64;
    let delta = |j: i64| common_prefix(codes, i, j);

    // The range of the node extends toward the neighbor sharing the longest prefix.
    let d = if delta(i + 1) >= delta(i - 1) { 1 } else { -1 };

    // Upper bound of the range length, then binary search of the other end.
    let delta_min = delta(i - d);
    let mut l_max = 2;
    while delta(i + l_max * d) > delta_min {
        l_max *= 2;
    }

    let mut l = 0;
    let mut t = l_max / 2;
    while t >= 1 {
        if delta(i + (l + t) * d) > delta_min {
            l += t;
        }
        t /= 2;
    }
    let j = i + l * d;

    // Binary search of the last position sharing more than the node’s prefix with `i`.
    let delta_node = delta(j);
    let mut s = 0;
    let mut t = l;
    loop {
        t = (t + 1) / 2;
        if delta(i + (s + t) * d) > delta_node {
            s += t;
        }
        if t <= 1 {
            break;
        }
    }
    let gamma = i + s * d + d.min(0);

    let first = i.min(j);
    let last = i.max(j);
    let leaf = |p: i64| (n - 1) as u32 + p as u32;
    let left = if gamma == first {
        leaf(gamma)
    } else {
        gamma as u32
    };
    let right = if gamma + 1 == last {
        leaf(gamma + 1)
    } else {
        (gamma + 1) as u32
    };

    LbvhNode::internal(left, right, first as u32, (last - first + 1) as u32)
}

/// Sets the parent pointers of every child of the `n - 1` internal nodes.
fn assign_parents(nodes: &mut [LbvhNode], n: usize) {
    let parents: Vec<_> = (0..nodes.len())
        .map(|_| AtomicU32::new(LbvhNode::INVALID))
        .collect();

    {
        let nodes = &*nodes;
        // Every node has at most one parent: the stores never overlap.
        parallel::for_each_index(n - 1, |i| {
            parents[nodes[i].left as usize].store(i as u32, Ordering::Relaxed);
            parents[nodes[i].right as usize].store(i as u32, Ordering::Relaxed);
        });
    }

    parallel::for_each_mut(nodes, |i, node| {
        node.parent = parents[i].load(Ordering::Relaxed);
    });
}

/// An AABB that can be written and read concurrently, one coordinate at a time.
struct AtomicAabb {
    mins: [AtomicRealBits; DIM],
    maxs: [AtomicRealBits; DIM],
}

impl AtomicAabb {
    fn new() -> Self {
        Self {
            mins: core::array::from_fn(|_| AtomicRealBits::new(0)),
            maxs: core::array::from_fn(|_| AtomicRealBits::new(0)),
        }
    }

    fn store(&self, aabb: &Aabb) {
        for k in 0..DIM {
            self.mins[k].store(aabb.mins[k].to_bits(), Ordering::Relaxed);
            self.maxs[k].store(aabb.maxs[k].to_bits(), Ordering::Relaxed);
        }
    }

    fn load(&self) -> Aabb {
        let mut result = Aabb::new_invalid();
        for k in 0..DIM {
            result.mins[k] = Real::from_bits(self.mins[k].load(Ordering::Relaxed));
            result.maxs[k] = Real::from_bits(self.maxs[k].load(Ordering::Relaxed));
        }
        result
    }
}

/// Computes the AABBs of the `n - 1` internal nodes, from the leaves up.
///
/// Returns the index of the root.
fn compute_aabbs(nodes: &mut [LbvhNode], n: usize) -> u32 {
    let visits: Vec<_> = (0..n - 1).map(|_| AtomicU32::new(0)).collect();
    let aabbs: Vec<_> = (0..n - 1).map(|_| AtomicAabb::new()).collect();
    let root = AtomicU32::new(LbvhNode::INVALID);

    {
        let nodes = &*nodes;
        let child_aabb = |id: u32| {
            if (id as usize) < n - 1 {
                aabbs[id as usize].load()
            } else {
                nodes[id as usize].aabb()
            }
        };

        parallel::for_each_index(n, |p| {
            let mut id = (n - 1 + p) as u32;

            loop {
                let parent = nodes[id as usize].parent;

                if parent == LbvhNode::INVALID {
                    root.store(id, Ordering::Relaxed);
                    return;
                }

                // The first child to reach its parent stops there. The second one sees the AABB
                // of its sibling (released by the first visit) and proceeds upward.
                if visits[parent as usize].fetch_add(1, Ordering::AcqRel) == 0 {
                    return;
                }

                let parent_node = &nodes[parent as usize];
                let aabb = child_aabb(parent_node.left).merged(&child_aabb(parent_node.right));
                aabbs[parent as usize].store(&aabb);
                id = parent;
            }
        });
    }

    parallel::for_each_mut(&mut nodes[..n - 1], |i, node| {
        let aabb = aabbs[i].load();
        node.mins = aabb.mins;
        node.maxs = aabb.maxs;
    });

    root.into_inner()
}

#[cfg(test)]
mod test {
    use super::{build_hierarchy, common_prefix};
    use crate::math::{Point, Real};
    use crate::partitioning::LbvhNode;

    fn points_on_first_axis(xs: &[Real]) -> Vec<Point<Real>> {
        xs.iter()
            .map(|x| {
                let mut p = Point::<Real>::origin();
                p[0] = *x;
                p
            })
            .collect()
    }

    #[test]
    fn duplicate_codes_are_disambiguated() {
        let codes = [0b0001, 0b0001, 0b0001, 0b0100];
        assert_eq!(common_prefix(&codes, 0, -1), -1);
        assert_eq!(common_prefix(&codes, 0, 4), -1);
        assert_eq!(common_prefix(&codes, 0, 1), 64 + 31);
        assert_eq!(common_prefix(&codes, 0, 2), 64 + 30);
        assert_eq!(common_prefix(&codes, 2, 3), 61);
    }

    #[test]
    fn karras_layout() {
        // The example of the Karras paper, with 8 leaves.
        let codes = [0b00001, 0b00010, 0b00100, 0b00101, 0b10011, 0b11000, 0b11001, 0b11110];
        let points = points_on_first_axis(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        let (nodes, root) = build_hierarchy(&codes, &points);

        assert_eq!(nodes.len(), 15);
        assert_eq!(root, 0);
        assert_eq!(nodes[0].parent, LbvhNode::INVALID);

        let leaf = |p: u32| 7 + p;
        // (left, right, first, count) of the internal nodes.
        let expected = [
            (3, 4, 0, 8),
            (leaf(0), leaf(1), 0, 2),
            (leaf(2), leaf(3), 2, 2),
            (1, 2, 0, 4),
            (leaf(4), 5, 4, 4),
            (6, leaf(7), 5, 3),
            (leaf(5), leaf(6), 5, 2),
        ];

        for (i, (left, right, first, count)) in expected.into_iter().enumerate() {
            let node = &nodes[i];
            assert_eq!((node.left, node.right), (left, right), "node {}", i);
            assert_eq!((node.first, node.count), (first, count), "node {}", i);
            assert!(!node.is_leaf());
            assert_eq!(nodes[left as usize].parent, i as u32);
            assert_eq!(nodes[right as usize].parent, i as u32);
            assert_eq!(node.mins[0], first as Real);
            assert_eq!(node.maxs[0], (first + count - 1) as Real);
        }
    }

    #[test]
    fn single_leaf() {
        let points = points_on_first_axis(&[42.0]);
        let (nodes, root) = build_hierarchy(&[0], &points);
        assert_eq!(root, 0);
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].is_leaf() && nodes[0].is_root());
        assert_eq!(nodes[0].points_range(), 0..1);
    }

    #[test]
    fn all_duplicates() {
        let points = points_on_first_axis(&[1.0; 100]);
        let (nodes, root) = build_hierarchy(&[7; 100], &points);
        assert_eq!(nodes.len(), 199);
        assert_eq!(root, 0);
        assert_eq!(nodes[0].count, 100);
        assert!(nodes.iter().all(|n| n.is_root() == (n.count == 100)));
    }
}
