use super::{Lbvh, LbvhNode};

impl Lbvh {
    /// Counts the number of points that can be reached from the node at index `id`.
    ///
    /// This is mostly a utility for debugging.
    pub fn reachable_point_count(&self, id: u32) -> u32 {
        if !self.is_built() {
            return 0;
        }

        let node = self.node(id);

        if node.is_leaf() {
            node.count
        } else {
            self.reachable_point_count(node.left) + self.reachable_point_count(node.right)
        }
    }

    /// Panics if the tree isn’t well-formed.
    ///
    /// The tree is well-formed if:
    /// - it is topologically correct: links are valid and mutually consistent, and every node
    ///   covers the concatenation of the point ranges of its children,
    /// - it is geometrically correct: a node’s AABB encloses the AABBs of its children and the
    ///   points it covers,
    /// - every point is covered by exactly one leaf and [`Lbvh::sorted_indices`] is a
    ///   permutation,
    /// - leaves hold at most [`LbvhConfig::leaf_size`](super::LbvhConfig::leaf_size) points, and
    ///   the nodes not reachable from the root are flagged invalid (or removed by compaction).
    ///
    /// Returns the number of leaves.
    pub fn assert_well_formed(&self) -> usize {
        if !self.is_built() {
            assert_eq!(self.node_count, 0);
            assert_eq!(self.root, LbvhNode::INVALID);
            assert!(self.sorted_points.is_empty());
            return 0;
        }

        let point_count = self.point_count();
        let nodes = self.nodes();
        assert!(nodes.len() <= 2 * point_count - 1);
        assert_eq!(self.sorted_points.len(), point_count);

        let mut covered = vec![false; point_count];
        for id in self.sorted_indices.iter() {
            assert!(!covered[*id as usize], "{} appears twice", id);
            covered[*id as usize] = true;
        }

        let root = self.node(self.root);
        assert!(root.is_root());
        assert_eq!(root.points_range(), 0..point_count);
        assert_eq!(root.aabb(), self.extent);

        let mut reached = vec![false; nodes.len()];
        let mut points_seen = vec![false; point_count];
        let mut leaf_count = 0;
        let mut stack = vec![self.root];

        while let Some(id) = stack.pop() {
            assert!(!reached[id as usize], "node {} reached twice", id);
            reached[id as usize] = true;

            let node = &nodes[id as usize];
            let aabb = node.aabb();
            assert!(node.is_valid());
            assert!(node.count >= 1);

            if node.is_leaf() {
                leaf_count += 1;
                assert_eq!(node.left, LbvhNode::INVALID);
                assert_eq!(node.right, LbvhNode::INVALID);
                assert!(node.count <= self.config.leaf_size);

                for p in node.points_range() {
                    assert!(!points_seen[p]);
                    points_seen[p] = true;
                    assert!(aabb.contains_local_point(&self.sorted_points[p]));
                }
            } else {
                let left = &nodes[node.left as usize];
                let right = &nodes[node.right as usize];

                for (child_id, child) in [(node.left, left), (node.right, right)] {
                    assert_eq!(child.parent, id, "bad parent of {}", child_id);
                    assert!(aabb.contains(&child.aabb()));
                    stack.push(child_id);
                }

                assert_eq!(left.first, node.first);
                assert_eq!(right.first, left.first + left.count);
                assert_eq!(left.count + right.count, node.count);
                assert_eq!(aabb, left.aabb().merged(&right.aabb()));
            }
        }

        assert!(points_seen.iter().all(|seen| *seen));

        for (id, node) in nodes.iter().enumerate() {
            assert_eq!(
                reached[id],
                node.is_valid(),
                "node {} is unreachable but valid, or the reverse",
                id
            );
        }

        leaf_count
    }
}
