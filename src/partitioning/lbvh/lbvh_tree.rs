use super::{lbvh_build, lbvh_morton, LbvhError};
use crate::bounding_volume::Aabb;
use crate::math::{Point, Real, DIM};
use crate::utils::parallel;
use core::ops::Range;

/// Parameters of the construction and queries of an [`Lbvh`].
///
/// The configuration is fixed when the [`Lbvh`] is created and applies to every subsequent
/// build.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct LbvhConfig {
    /// The maximum number of points of a leaf after leaf merging.
    ///
    /// With `1`, no merging happens and every leaf holds exactly one point. Must not be zero.
    pub leaf_size: u32,
    /// Remove the nodes made unreachable by leaf merging from the node buffer.
    ///
    /// This has no effect if `leaf_size == 1`.
    pub compact: bool,
    /// Traverse the query points in Morton order for better memory locality.
    ///
    /// Results are the same either way.
    pub sort_queries: bool,
    /// After compaction, truncate the node buffer and release its unused capacity.
    pub shrink_to_fit: bool,
}

impl Default for LbvhConfig {
    fn default() -> Self {
        Self {
            leaf_size: 32,
            compact: true,
            sort_queries: true,
            shrink_to_fit: false,
        }
    }
}

impl LbvhConfig {
    /// Sets the maximum number of points per leaf.
    pub fn with_leaf_size(mut self, leaf_size: u32) -> Self {
        self.leaf_size = leaf_size;
        self
    }

    /// Enables or disables node compaction after leaf merging.
    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    /// Enables or disables the Morton sorting of query points.
    pub fn with_sort_queries(mut self, sort_queries: bool) -> Self {
        self.sort_queries = sort_queries;
        self
    }

    /// Enables or disables the release of the node buffer’s unused capacity after compaction.
    pub fn with_shrink_to_fit(mut self, shrink_to_fit: bool) -> Self {
        self.shrink_to_fit = shrink_to_fit;
        self
    }

    pub(super) fn merges_leaves(&self) -> bool {
        self.leaf_size > 1
    }
}

#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
/// The status of an [`LbvhNode`].
pub struct LbvhNodeFlags(u8);

bitflags::bitflags! {
    impl LbvhNodeFlags: u8 {
        /// If set, the node has no children and owns a range of sorted points.
        const LEAF = 1;
        /// If set, the node lies below a merged leaf and must not be traversed.
        const INVALID = 1 << 1;
    }
}

/// A node of an [`Lbvh`].
///
/// Every node, leaf or not, covers the contiguous range `first..first + count` of the points
/// sorted by Morton code (see [`Lbvh::sorted_indices`]).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct LbvhNode {
    /// Minimum corner of the AABB of the points covered by this node.
    pub mins: Point<Real>,
    /// Maximum corner of the AABB of the points covered by this node.
    pub maxs: Point<Real>,
    /// Index of the left child, or [`LbvhNode::INVALID`] for leaves.
    pub left: u32,
    /// Index of the right child, or [`LbvhNode::INVALID`] for leaves.
    pub right: u32,
    /// Index of the parent node, or [`LbvhNode::INVALID`] for the root.
    pub parent: u32,
    /// The first sorted point covered by this node.
    pub first: u32,
    /// The number of sorted points covered by this node.
    pub count: u32,
    /// The status of this node.
    pub flags: LbvhNodeFlags,
}

impl LbvhNode {
    /// Sentinel value of child and parent indices that don’t point to any node.
    pub const INVALID: u32 = u32::MAX;

    pub(super) fn leaf(point: Point<Real>, sorted_id: u32) -> Self {
        Self {
            mins: point,
            maxs: point,
            left: Self::INVALID,
            right: Self::INVALID,
            parent: Self::INVALID,
            first: sorted_id,
            count: 1,
            flags: LbvhNodeFlags::LEAF,
        }
    }

    /// An internal node with a still unknown AABB and parent.
    pub(super) fn internal(left: u32, right: u32, first: u32, count: u32) -> Self {
        let invalid = Aabb::new_invalid();
        Self {
            mins: invalid.mins,
            maxs: invalid.maxs,
            left,
            right,
            parent: Self::INVALID,
            first,
            count,
            flags: LbvhNodeFlags::empty(),
        }
    }

    /// The AABB of the points covered by this node.
    #[inline]
    pub fn aabb(&self) -> Aabb {
        Aabb::new(self.mins, self.maxs)
    }

    /// Does this node own points directly?
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.flags.contains(LbvhNodeFlags::LEAF)
    }

    /// Is this node part of the tree?
    ///
    /// Nodes below a merged leaf are invalid until they are removed by compaction.
    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.flags.contains(LbvhNodeFlags::INVALID)
    }

    /// Is this node the root of its tree?
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent == Self::INVALID
    }

    /// The range of sorted points covered by this node.
    #[inline]
    pub fn points_range(&self) -> Range<usize> {
        self.first as usize..(self.first + self.count) as usize
    }

    /// The squared distance from `point` to the AABB of this node.
    ///
    /// This is a lower bound of the squared distance from `point` to any point covered by this
    /// node.
    #[inline]
    pub fn distance_squared_to_point(&self, point: &Point<Real>) -> Real {
        self.aabb().distance_squared_to_local_point(point)
    }
}

/// A Linear Bounding Volume Hierarchy over a set of points.
///
/// The tree is built from scratch by [`Lbvh::build`] in a sequence of data-parallel phases:
/// 1. The extent of the point set is computed, and each point is assigned a Morton code relative
///    to that extent.
/// 2. The points are sorted by Morton code. The sorted order defines the leaf layout.
/// 3. A binary radix tree is built over the sorted codes, one internal node per task, with no
///    synchronization (Karras 2012). The node AABBs are then computed bottom-up.
/// 4. Small subtrees are merged into leaves of up to [`LbvhConfig::leaf_size`] points.
/// 5. The nodes made unreachable by merging are removed from the node buffer.
///
/// Once built, the tree is immutable and can answer any number of exact nearest-neighbor
/// queries in parallel (see [`Lbvh::search_knn`]).
///
/// # Node layout
///
/// Before merging, a tree over `n` points has `2n - 1` nodes: the internal nodes occupy
/// `[0, n - 1)` and the leaf of the `p`-th sorted point is at index `n - 1 + p`. After
/// compaction, the valid nodes occupy `[0, node_count)` in no particular order.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Lbvh {
    pub(super) config: LbvhConfig,
    pub(super) nodes: Vec<LbvhNode>,
    pub(super) node_count: usize,
    pub(super) root: u32,
    pub(super) sorted_indices: Vec<u32>,
    pub(super) sorted_points: Vec<Point<Real>>,
    pub(super) extent: Aabb,
}

impl Default for Lbvh {
    fn default() -> Self {
        Self::new(LbvhConfig::default())
    }
}

impl Lbvh {
    /// The maximum number of points a tree can hold.
    ///
    /// The `2n - 1` nodes must be addressable with `u32` indices below [`LbvhNode::INVALID`].
    pub const MAX_POINTS: usize = (u32::MAX / 2) as usize;

    /// Creates an empty tree, to be populated by [`Lbvh::build`].
    pub fn new(config: LbvhConfig) -> Self {
        Self {
            config,
            nodes: vec![],
            node_count: 0,
            root: LbvhNode::INVALID,
            sorted_indices: vec![],
            sorted_points: vec![],
            extent: Aabb::new_invalid(),
        }
    }

    /// The configuration of this tree.
    #[inline]
    pub fn config(&self) -> &LbvhConfig {
        &self.config
    }

    /// Has this tree been built?
    #[inline]
    pub fn is_built(&self) -> bool {
        !self.sorted_indices.is_empty()
    }

    /// The number of points indexed by this tree.
    #[inline]
    pub fn point_count(&self) -> usize {
        self.sorted_indices.len()
    }

    /// The number of nodes of this tree.
    ///
    /// This is `2 * point_count - 1` without leaf merging, and less than that after compaction.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// The index of the root node, or [`LbvhNode::INVALID`] if the tree isn’t built.
    #[inline]
    pub fn root(&self) -> u32 {
        self.root
    }

    /// The nodes of this tree.
    ///
    /// The node buffer may be longer than [`Lbvh::node_count`] if it was compacted without
    /// [`LbvhConfig::shrink_to_fit`]. The stale entries are never exposed.
    #[inline]
    pub fn nodes(&self) -> &[LbvhNode] {
        &self.nodes[..self.node_count]
    }

    /// The node at index `id`.
    ///
    /// Panics if `id >= self.node_count()`.
    #[inline]
    pub fn node(&self, id: u32) -> &LbvhNode {
        &self.nodes()[id as usize]
    }

    /// The capacity of the node buffer, including stale entries left by compaction.
    #[inline]
    pub fn node_buffer_len(&self) -> usize {
        self.nodes.len()
    }

    /// The permutation from sorted point positions to the indices of the input points.
    #[inline]
    pub fn sorted_indices(&self) -> &[u32] {
        &self.sorted_indices
    }

    /// The input points, sorted by Morton code.
    #[inline]
    pub fn sorted_points(&self) -> &[Point<Real>] {
        &self.sorted_points
    }

    /// The AABB of the indexed point set.
    ///
    /// This is an invalid AABB if the tree isn’t built.
    #[inline]
    pub fn extent(&self) -> Aabb {
        self.extent
    }

    /// The AABB of the root node, if the tree is built.
    pub fn root_aabb(&self) -> Option<Aabb> {
        self.is_built().then(|| self.node(self.root).aabb())
    }

    /// The number of nodes on the longest path from the root to a leaf.
    pub fn depth(&self) -> usize {
        if !self.is_built() {
            return 0;
        }

        let mut max_depth = 0;
        let mut stack = vec![(self.root, 1)];

        while let Some((id, depth)) = stack.pop() {
            let node = self.node(id);
            max_depth = max_depth.max(depth);

            if !node.is_leaf() {
                stack.push((node.left, depth + 1));
                stack.push((node.right, depth + 1));
            }
        }

        max_depth
    }

    /// Builds the tree over the given points, replacing its previous content.
    ///
    /// The neighbors returned by queries are identified by their index in `points`.
    ///
    /// If this fails, the tree is left unchanged.
    pub fn build(&mut self, points: &[Point<Real>]) -> Result<(), LbvhError> {
        self.check_build_input(points)?;

        let n = points.len();
        let extent = lbvh_morton::compute_extent(points);
        let (codes, sorted_indices) = lbvh_morton::morton_order(points, &extent);
        let sorted_points = parallel::map(n, |p| points[sorted_indices[p] as usize]);
        log::trace!("Sorted {} points by Morton code.", n);

        let (nodes, root) = lbvh_build::build_hierarchy(&codes, &sorted_points);
        log::trace!("Built the radix tree with {} nodes.", nodes.len());

        self.node_count = nodes.len();
        self.nodes = nodes;
        self.root = root;
        self.sorted_indices = sorted_indices;
        self.sorted_points = sorted_points;
        self.extent = extent;

        let full_node_count = self.node_count;

        if self.config.merges_leaves() {
            self.merge_leaves();
            log::trace!("Merged leaves up to {} points.", self.config.leaf_size);

            if self.config.compact {
                self.compact_nodes();
                log::trace!("Compacted the node buffer.");
            }
        }

        log::debug!(
            "Built LBVH: {} points, {} nodes ({} before compaction), root {}, leaf size {}.",
            n,
            self.node_count,
            full_node_count,
            self.root,
            self.config.leaf_size
        );

        Ok(())
    }

    /// Builds the tree from a flat buffer of point coordinates.
    ///
    /// The buffer holds `dim` consecutive coordinates per point, and `dim` must match the
    /// dimension of this tree.
    pub fn build_flat(&mut self, coords: &[Real], dim: usize) -> Result<(), LbvhError> {
        let points = points_from_flat(coords, dim)?;
        self.build(&points)
    }

    fn check_build_input(&self, points: &[Point<Real>]) -> Result<(), LbvhError> {
        if self.config.leaf_size == 0 {
            return Err(LbvhError::InvalidLeafSize);
        }

        check_point_count(points.len())?;

        if let Some(index) =
            parallel::find_first(points.len(), |i| !points[i].iter().all(|x| x.is_finite()))
        {
            return Err(LbvhError::NonFinitePoint { index });
        }

        Ok(())
    }
}

fn check_point_count(len: usize) -> Result<(), LbvhError> {
    if len == 0 {
        Err(LbvhError::EmptyInput)
    } else if len > Lbvh::MAX_POINTS {
        Err(LbvhError::TooManyPoints(len))
    } else {
        Ok(())
    }
}

/// Reads points from a buffer of `dim` consecutive coordinates per point.
pub(super) fn points_from_flat(coords: &[Real], dim: usize) -> Result<Vec<Point<Real>>, LbvhError> {
    if dim != DIM || coords.len() % DIM != 0 {
        return Err(LbvhError::DimensionMismatch {
            expected: DIM,
            found: dim,
        });
    }

    Ok(coords.chunks_exact(DIM).map(Point::from_slice).collect())
}

#[cfg(test)]
mod test {
    use super::{check_point_count, points_from_flat, Lbvh, LbvhConfig, LbvhError};
    use crate::math::DIM;

    #[test]
    fn point_count_limits() {
        assert_eq!(check_point_count(0), Err(LbvhError::EmptyInput));
        assert_eq!(check_point_count(1), Ok(()));
        assert_eq!(check_point_count(Lbvh::MAX_POINTS), Ok(()));
        assert_eq!(
            check_point_count(Lbvh::MAX_POINTS + 1),
            Err(LbvhError::TooManyPoints(Lbvh::MAX_POINTS + 1))
        );
        // The last node index stays below the sentinel.
        assert!(2 * Lbvh::MAX_POINTS - 1 < u32::MAX as usize);
    }

    #[test]
    fn flat_buffers() {
        let coords: Vec<_> = (0..DIM * 3).map(|i| i as crate::math::Real).collect();
        let points = points_from_flat(&coords, DIM).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[1][0], DIM as crate::math::Real);

        let mismatch = Err(LbvhError::DimensionMismatch {
            expected: DIM,
            found: DIM + 1,
        });
        assert_eq!(points_from_flat(&coords, DIM + 1), mismatch);
        assert!(points_from_flat(&coords[1..], DIM).is_err());
    }

    #[test]
    fn config_builder() {
        let config = LbvhConfig::default()
            .with_leaf_size(4)
            .with_compact(false)
            .with_sort_queries(false)
            .with_shrink_to_fit(true);
        assert_eq!(config.leaf_size, 4);
        assert!(!config.compact && !config.sort_queries && config.shrink_to_fit);

        let lbvh = Lbvh::new(config);
        assert!(!lbvh.is_built());
        assert_eq!(lbvh.depth(), 0);
        assert_eq!(lbvh.root_aabb(), None);
        assert!(lbvh.nodes().is_empty());
    }
}
