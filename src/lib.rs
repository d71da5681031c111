/*!
lbvh
========

**lbvh** is a 2 and 3-dimensional linear bounding volume hierarchy for exact
k-nearest-neighbor queries on large point sets, written with the rust
programming language.

The tree is built from scratch by a sequence of data-parallel phases (extent
reduction, Morton encoding, sorting, lock-free radix-tree construction, leaf
merging and stream compaction) and then queried in parallel, one traversal per
query point.

```
# #[cfg(all(feature = "dim3", feature = "f32"))] {
use lbvh3d::partitioning::{Lbvh, LbvhConfig};
use nalgebra::Point3;

let points = vec![
    Point3::new(0.0, 0.0, 0.0),
    Point3::new(1.0, 0.0, 0.0),
    Point3::new(0.0, 2.0, 0.0),
];

let mut lbvh = Lbvh::new(LbvhConfig::default());
lbvh.build(&points).unwrap();

let result = lbvh.search_knn(&[Point3::new(0.9, 0.1, 0.0)], 2).unwrap();
let nearest: Vec<_> = result.neighbors(0).collect();
assert_eq!(nearest[0].0, 1);
assert_eq!(nearest[1].0, 0);
# }
```
*/

#![deny(non_camel_case_types)]
#![deny(unused_parens)]
#![deny(non_upper_case_globals)]
#![deny(unused_results)]
#![warn(missing_docs)]
#![warn(unused_imports)]
#![allow(missing_copy_implementations)]
#![allow(clippy::manual_range_contains)] // This usually makes it way more verbose that it could be.
#![deny(unused_qualifications)]

#[cfg(feature = "serde-serialize")]
#[macro_use]
extern crate serde;

pub extern crate nalgebra as na;

pub mod bounding_volume;
pub mod partitioning;
pub mod utils;

mod real {
    /// The scalar type used throughout this crate.
    #[cfg(feature = "f64")]
    pub use f64 as Real;

    /// The scalar type used throughout this crate.
    #[cfg(feature = "f32")]
    pub use f32 as Real;

    /// An atomic cell able to hold the bit pattern of a [`Real`].
    #[cfg(feature = "f64")]
    pub type AtomicRealBits = core::sync::atomic::AtomicU64;

    /// An atomic cell able to hold the bit pattern of a [`Real`].
    #[cfg(feature = "f32")]
    pub type AtomicRealBits = core::sync::atomic::AtomicU32;
}

/// Compilation flags dependent aliases for mathematical types.
#[cfg(feature = "dim3")]
pub mod math {
    pub use super::real::*;
    pub use na::{Point3, Vector3};

    /// The dimension of the space.
    pub const DIM: usize = 3;

    /// The point type.
    pub use Point3 as Point;

    /// The vector type.
    pub use Vector3 as Vector;
}

/// Compilation flags dependent aliases for mathematical types.
#[cfg(feature = "dim2")]
pub mod math {
    pub use super::real::*;
    pub use na::{Point2, Vector2};

    /// The dimension of the space.
    pub const DIM: usize = 2;

    /// The point type.
    pub use Point2 as Point;

    /// The vector type.
    pub use Vector2 as Vector;
}
