//! Data-parallel primitives and bit tricks used by the tree construction.
//!
//! None of these know anything about the tree itself: they are the "parallel algorithm
//! library" the construction phases are written against.

pub use self::compaction::StreamCompaction;
pub use self::scan::exclusive_scan;

pub mod compaction;
pub mod morton;
pub mod parallel;
pub mod scan;
