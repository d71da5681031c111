//! Linear bounding volume hierarchy over points, for exact nearest-neighbor queries.

pub use lbvh_error::LbvhError;
pub use lbvh_knn::KnnResult;
pub use lbvh_tree::{Lbvh, LbvhConfig, LbvhNode, LbvhNodeFlags};

mod lbvh_build;
mod lbvh_compact;
mod lbvh_error;
mod lbvh_knn;
mod lbvh_morton;
mod lbvh_optimize;
mod lbvh_tree;
mod lbvh_validation;
