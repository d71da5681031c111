/// Errors that can occur when building or querying an [`Lbvh`](super::Lbvh).
///
/// All of them are detected before any work starts: a failed operation never modifies the tree.
#[derive(thiserror::Error, Copy, Clone, Debug, PartialEq, Eq)]
pub enum LbvhError {
    /// Attempted to build a tree from an empty point set.
    #[error("cannot build a tree from an empty point set")]
    EmptyInput,
    /// A point has a NaN or infinite coordinate.
    #[error("the point at index {index} has a non-finite coordinate")]
    NonFinitePoint {
        /// The index of the offending point in the input set.
        index: usize,
    },
    /// The point set is too large to be indexed with 32-bit node indices.
    #[error("too many points: {0} exceeds the maximum of {max}", max = super::Lbvh::MAX_POINTS)]
    TooManyPoints(usize),
    /// The configured leaf size is zero.
    #[error("the leaf size must be at least 1")]
    InvalidLeafSize,
    /// Attempted to run a query with no query point.
    #[error("the query set is empty")]
    EmptyQueries,
    /// Attempted to query a tree that hasn’t been built yet.
    #[error("the tree hasn’t been built")]
    NotBuilt,
    /// A negative neighbor count was requested.
    #[error("the number of neighbors must be non-negative, got {0}")]
    NegativeK(i64),
    /// A flat coordinate buffer doesn’t match the dimension of the tree.
    ///
    /// This is also reported if the length of the buffer isn’t a multiple of the dimension.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// The dimension of the tree.
        expected: usize,
        /// The dimension of the input.
        found: usize,
    },
    /// The search radius is negative or non-finite.
    #[error("the search radius must be finite and non-negative")]
    InvalidRadius,
    /// The result of a query batch would hold more entries than a buffer can address.
    #[error("{query_count} queries with {k} entries each exceed the maximum result size of {max}", max = super::KnnResult::MAX_ENTRIES)]
    ResultTooLarge {
        /// The number of queries.
        query_count: usize,
        /// The requested number of entries per query.
        k: usize,
    },
}
