use super::{Lbvh, LbvhNode};
use crate::utils::{parallel, StreamCompaction};

impl Lbvh {
    /// Removes the invalid nodes from the node buffer and remaps the node indices.
    ///
    /// Valid nodes only link to valid nodes, so every link survives the remap.
    pub(super) fn compact_nodes(&mut self) {
        let nodes = self.nodes();
        let valid = parallel::map(nodes.len(), |i| nodes[i].is_valid());
        let compaction = StreamCompaction::new(&valid);

        if compaction.removed_count() == 0 {
            return;
        }

        let remap = |id: u32| {
            if id == LbvhNode::INVALID {
                id
            } else {
                let new_id = compaction.new_index(id);
                debug_assert!(new_id.is_some(), "link to the removed node {}", id);
                new_id.unwrap_or(LbvhNode::INVALID)
            }
        };

        compaction.relocate(&mut self.nodes[..self.node_count], |node| {
            node.left = remap(node.left);
            node.right = remap(node.right);
            node.parent = remap(node.parent);
        });

        self.root = remap(self.root);
        self.node_count = compaction.len();

        if self.config.shrink_to_fit {
            self.nodes.truncate(self.node_count);
            self.nodes.shrink_to_fit();
        }

        log::trace!(
            "Removed {} nodes; {} remain.",
            compaction.removed_count(),
            self.node_count
        );
    }
}
