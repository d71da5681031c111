//! Spatial partitioning tools.

pub use self::lbvh::{KnnResult, Lbvh, LbvhConfig, LbvhError, LbvhNode, LbvhNodeFlags};

pub mod lbvh;
