use super::lbvh_tree::points_from_flat;
use super::{lbvh_morton, Lbvh, LbvhError};
use crate::math::{Point, Real};
use crate::utils::parallel;
use ordered_float::OrderedFloat;
use smallvec::SmallVec;

/// The neighbors found by a batch of nearest-neighbor queries.
///
/// The result is laid out as a row-major matrix with one row of [`KnnResult::k`] entries per
/// query, in the order the queries were given. Each row lists the neighbors of its query by
/// increasing squared distance, ties being broken by increasing point index. Rows with less than
/// `k` neighbors are padded with [`KnnResult::NO_NEIGHBOR`] and an infinite distance.
#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct KnnResult {
    k: usize,
    query_count: usize,
    indices: Vec<u32>,
    distances2: Vec<Real>,
}

impl KnnResult {
    /// The index of the padding entries of rows with less than `k` neighbors.
    pub const NO_NEIGHBOR: u32 = u32::MAX;

    /// The maximum number of entries, over all rows, of a result.
    pub const MAX_ENTRIES: usize = isize::MAX as usize / size_of::<Real>();

    /// The number of entries per query.
    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// The number of queries.
    #[inline]
    pub fn query_count(&self) -> usize {
        self.query_count
    }

    /// The point indices of all rows, concatenated.
    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// The squared distances of all rows, concatenated.
    #[inline]
    pub fn distances2(&self) -> &[Real] {
        &self.distances2
    }

    /// The point indices of the row of the `query`-th query.
    #[inline]
    pub fn row_indices(&self, query: usize) -> &[u32] {
        &self.indices[query * self.k..(query + 1) * self.k]
    }

    /// The squared distances of the row of the `query`-th query.
    #[inline]
    pub fn row_distances2(&self, query: usize) -> &[Real] {
        &self.distances2[query * self.k..(query + 1) * self.k]
    }

    /// The `(point index, squared distance)` pairs found for the `query`-th query, padding
    /// excluded.
    pub fn neighbors(&self, query: usize) -> impl Iterator<Item = (u32, Real)> + '_ {
        self.row_indices(query)
            .iter()
            .copied()
            .zip(self.row_distances2(query).iter().copied())
            .take_while(|(id, _)| *id != Self::NO_NEIGHBOR)
    }

    /// The number of neighbors found for the `query`-th query.
    pub fn neighbor_count(&self, query: usize) -> usize {
        self.neighbors(query).count()
    }

    /// Moves out the point indices and squared distances buffers.
    pub fn into_raw_parts(self) -> (Vec<u32>, Vec<Real>) {
        (self.indices, self.distances2)
    }
}

/// A neighbor candidate, ordered by distance then index.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Neighbor {
    dist2: OrderedFloat<Real>,
    index: u32,
}

type Neighbors = SmallVec<[Neighbor; 16]>;

/// The best neighbors found so far by a single query.
struct NeighborSet {
    capacity: usize,
    max_dist2: Real,
    neighbors: Neighbors,
}

impl NeighborSet {
    fn new(capacity: usize, max_dist2: Real) -> Self {
        Self {
            capacity,
            max_dist2,
            neighbors: SmallVec::new(),
        }
    }

    /// Points further than this can’t enter the set anymore.
    #[inline]
    fn bound(&self) -> Real {
        if self.neighbors.len() == self.capacity {
            self.neighbors
                .last()
                .map_or(self.max_dist2, |worst| worst.dist2.0)
        } else {
            self.max_dist2
        }
    }

    /// Inserts `neighbor` at its rank, evicting the worst neighbor if the set is full.
    fn insert(&mut self, neighbor: Neighbor) {
        if neighbor.dist2.0 > self.max_dist2 {
            return;
        }

        if self.neighbors.len() == self.capacity {
            match self.neighbors.last() {
                Some(worst) if neighbor < *worst => {
                    let _ = self.neighbors.pop();
                }
                _ => return,
            }
        }

        let rank = self.neighbors.partition_point(|n| *n < neighbor);
        self.neighbors.insert(rank, neighbor);
    }
}

/// Checks that `query_count` rows of `k` entries fit in a result.
fn check_entry_count(query_count: usize, k: usize) -> Result<(), LbvhError> {
    match query_count.checked_mul(k) {
        Some(len) if len <= KnnResult::MAX_ENTRIES => Ok(()),
        _ => Err(LbvhError::ResultTooLarge { query_count, k }),
    }
}

impl Lbvh {
    /// Finds the `k` nearest points of every query point.
    ///
    /// The search is exact: each row of the result lists the `k` smallest
    /// `(squared distance, point index)` pairs, as an exhaustive search would. If the tree holds
    /// less than `k` points, rows are padded (see [`KnnResult`]). With `k == 0`, rows are empty.
    ///
    /// Fails with [`LbvhError::ResultTooLarge`] if the result would exceed
    /// [`KnnResult::MAX_ENTRIES`] entries.
    ///
    /// Queries run in parallel and don’t modify the tree.
    pub fn search_knn(&self, queries: &[Point<Real>], k: usize) -> Result<KnnResult, LbvhError> {
        self.check_queries(queries)?;
        check_entry_count(queries.len(), k)?;
        let result = self.search(queries, k, Real::INFINITY);
        log::debug!("Answered {} KNN queries with k = {}.", queries.len(), k);
        Ok(result)
    }

    /// Finds the `k` nearest points of every query point given as a flat coordinate buffer.
    ///
    /// The buffer holds `dim` consecutive coordinates per query, and `dim` must match the
    /// dimension of this tree. See [`Lbvh::search_knn`].
    pub fn search_knn_flat(
        &self,
        coords: &[Real],
        dim: usize,
        k: i64,
    ) -> Result<KnnResult, LbvhError> {
        let queries = points_from_flat(coords, dim)?;

        if k < 0 {
            return Err(LbvhError::NegativeK(k));
        }

        self.search_knn(&queries, k as usize)
    }

    /// Finds up to `max_nn` nearest points within `radius` of every query point.
    ///
    /// A point is within the radius if its squared distance to the query is at most `radius²`.
    /// The result has `max_nn` entries per row. See [`Lbvh::search_knn`].
    pub fn search_radius(
        &self,
        queries: &[Point<Real>],
        radius: Real,
        max_nn: usize,
    ) -> Result<KnnResult, LbvhError> {
        self.check_queries(queries)?;

        if !radius.is_finite() || radius < 0.0 {
            return Err(LbvhError::InvalidRadius);
        }

        check_entry_count(queries.len(), max_nn)?;

        let result = self.search(queries, max_nn, radius * radius);
        log::debug!(
            "Answered {} radius queries with radius = {} and max_nn = {}.",
            queries.len(),
            radius,
            max_nn
        );
        Ok(result)
    }

    fn check_queries(&self, queries: &[Point<Real>]) -> Result<(), LbvhError> {
        if !self.is_built() {
            Err(LbvhError::NotBuilt)
        } else if queries.is_empty() {
            Err(LbvhError::EmptyQueries)
        } else {
            Ok(())
        }
    }

    fn search(&self, queries: &[Point<Real>], k: usize, max_dist2: Real) -> KnnResult {
        let query_count = queries.len();

        if k == 0 {
            return KnnResult {
                k,
                query_count,
                ..Default::default()
            };
        }

        let capacity = k.min(self.point_count());

        // Queries close to each other visit the same nodes, so they run next to each other.
        let order = (self.config.sort_queries && query_count > 1)
            .then(|| lbvh_morton::morton_order(queries, &self.extent).1);

        let rows = parallel::map(query_count, |slot| {
            let q = order.as_ref().map_or(slot, |order| order[slot] as usize);
            self.nearest(&queries[q], capacity, max_dist2)
        });

        let mut slots: Vec<u32> = (0..query_count as u32).collect();
        if let Some(order) = &order {
            for (slot, q) in order.iter().enumerate() {
                slots[*q as usize] = slot as u32;
            }
        }

        let entry_count = query_count * k;
        let entry = |e: usize| rows[slots[e / k] as usize].get(e % k);
        let indices = parallel::map(entry_count, |e| {
            entry(e).map_or(KnnResult::NO_NEIGHBOR, |n| n.index)
        });
        let distances2 = parallel::map(entry_count, |e| {
            entry(e).map_or(Real::INFINITY, |n| n.dist2.0)
        });

        KnnResult {
            k,
            query_count,
            indices,
            distances2,
        }
    }

    /// Depth-first traversal from the root, nearest child first.
    fn nearest(&self, query: &Point<Real>, capacity: usize, max_dist2: Real) -> Neighbors {
        let nodes = self.nodes();
        let mut set = NeighborSet::new(capacity, max_dist2);
        let mut stack: SmallVec<[(u32, Real); 64]> = SmallVec::new();
        stack.push((
            self.root,
            nodes[self.root as usize].distance_squared_to_point(query),
        ));

        while let Some((id, lower_bound)) = stack.pop() {
            // The bound may have shrunk since this node was pushed.
            if lower_bound > set.bound() {
                continue;
            }

            let node = &nodes[id as usize];

            if node.is_leaf() {
                for p in node.points_range() {
                    set.insert(Neighbor {
                        dist2: OrderedFloat(na::distance_squared(query, &self.sorted_points[p])),
                        index: self.sorted_indices[p],
                    });
                }
            } else {
                let left = (
                    node.left,
                    nodes[node.left as usize].distance_squared_to_point(query),
                );
                let right = (
                    node.right,
                    nodes[node.right as usize].distance_squared_to_point(query),
                );
                let (near, far) = if left.1 <= right.1 {
                    (left, right)
                } else {
                    (right, left)
                };

                let bound = set.bound();
                if far.1 <= bound {
                    stack.push(far);
                }
                if near.1 <= bound {
                    stack.push(near);
                }
            }
        }

        set.neighbors
    }
}

#[cfg(test)]
mod test {
    use super::{Neighbor, NeighborSet};
    use ordered_float::OrderedFloat;

    fn neighbor(dist2: crate::math::Real, index: u32) -> Neighbor {
        Neighbor {
            dist2: OrderedFloat(dist2),
            index,
        }
    }

    #[test]
    fn bounded_neighbor_set() {
        let mut set = NeighborSet::new(3, crate::math::Real::INFINITY);
        assert_eq!(set.bound(), crate::math::Real::INFINITY);

        set.insert(neighbor(4.0, 0));
        set.insert(neighbor(1.0, 5));
        set.insert(neighbor(4.0, 2));
        assert_eq!(set.bound(), 4.0);

        // Equal distances are ranked by index.
        set.insert(neighbor(4.0, 1));
        set.insert(neighbor(4.0, 3));
        set.insert(neighbor(9.0, 4));

        let ids: Vec<_> = set.neighbors.iter().map(|n| n.index).collect();
        assert_eq!(ids, vec![5, 0, 1]);
    }

    #[test]
    fn radius_bounded_neighbor_set() {
        let mut set = NeighborSet::new(10, 2.0);
        assert_eq!(set.bound(), 2.0);
        set.insert(neighbor(2.5, 0));
        set.insert(neighbor(2.0, 1));
        set.insert(neighbor(0.5, 2));

        let ids: Vec<_> = set.neighbors.iter().map(|n| n.index).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(set.bound(), 2.0);
    }
}
