use super::{Lbvh, LbvhNode, LbvhNodeFlags};
use crate::utils::parallel;

impl Lbvh {
    /// Collapses every maximal subtree covering at most `leaf_size` points into a single leaf.
    ///
    /// The nodes below a merged leaf are flagged [`LbvhNodeFlags::INVALID`] but stay in the node
    /// buffer until [`Lbvh::compact_nodes`] removes them.
    pub(super) fn merge_leaves(&mut self) {
        let leaf_size = self.config.leaf_size;

        if leaf_size <= 1 {
            return;
        }

        // Leaf counts only grow toward the root. A node is kept iff its parent covers more than
        // `leaf_size` points, and a kept node covering at most `leaf_size` points is a leaf.
        let nodes = self.nodes();
        let kept = parallel::map(nodes.len(), |i| {
            let parent = nodes[i].parent;
            parent == LbvhNode::INVALID || nodes[parent as usize].count > leaf_size
        });

        parallel::for_each_mut(&mut self.nodes[..self.node_count], |i, node| {
            if !kept[i] {
                node.flags.insert(LbvhNodeFlags::INVALID);
            } else if node.count <= leaf_size && !node.is_leaf() {
                node.flags = LbvhNodeFlags::LEAF;
                node.left = LbvhNode::INVALID;
                node.right = LbvhNode::INVALID;
            }
        });
    }
}

#[cfg(test)]
mod test {
    use crate::math::{Point, Real};
    use crate::partitioning::{Lbvh, LbvhConfig, LbvhNode};

    fn line(len: usize) -> Vec<Point<Real>> {
        (0..len)
            .map(|i| {
                let mut p = Point::<Real>::origin();
                p[0] = i as Real;
                p
            })
            .collect()
    }

    #[test]
    fn merged_leaves_respect_leaf_size() {
        for leaf_size in [2, 3, 8, 100] {
            let config = LbvhConfig::default()
                .with_leaf_size(leaf_size)
                .with_compact(false);
            let mut lbvh = Lbvh::new(config);
            lbvh.build(&line(57)).unwrap();

            // Without compaction, the node buffer is untouched.
            assert_eq!(lbvh.node_count(), 2 * 57 - 1);

            for node in lbvh.nodes() {
                if !node.is_valid() {
                    continue;
                }

                if node.is_leaf() {
                    assert!(node.count <= leaf_size);
                    assert_eq!(node.left, LbvhNode::INVALID);
                    assert_eq!(node.right, LbvhNode::INVALID);
                }

                if !node.is_root() {
                    let parent = lbvh.node(node.parent);
                    assert!(parent.is_valid() && !parent.is_leaf());
                    assert!(parent.count > leaf_size);
                }
            }

            assert_eq!(lbvh.reachable_point_count(lbvh.root()), 57);
            let _ = lbvh.assert_well_formed();
        }
    }

    #[test]
    fn small_set_collapses_into_the_root() {
        let mut lbvh = Lbvh::new(LbvhConfig::default().with_leaf_size(16));
        lbvh.build(&line(10)).unwrap();
        assert_eq!(lbvh.node_count(), 1);
        assert_eq!(lbvh.root(), 0);
        assert!(lbvh.node(0).is_leaf());
        assert_eq!(lbvh.node(0).points_range(), 0..10);
        assert_eq!(lbvh.depth(), 1);
    }
}
