//! Spatial ordering of the points of an LBVH.

use crate::bounding_volume::Aabb;
use crate::math::{Point, Real, Vector};
use crate::utils::{morton, parallel};

/// The AABB of all the given points.
pub(super) fn compute_extent(points: &[Point<Real>]) -> Aabb {
    parallel::reduce(
        points.len(),
        Aabb::new_invalid(),
        |i| Aabb::from_point(points[i]),
        |a, b| a.merged(&b),
    )
}

/// The coordinates of `point` relative to `extent`, mapped to the unit square/cube.
///
/// Axes where `extent` is flat map to zero. Points outside of `extent` are not clamped here.
pub(super) fn normalize(point: &Point<Real>, extent: &Aabb) -> Vector<f64> {
    let mut result = Vector::zeros();

    for i in 0..result.len() {
        // Halved so the differences stay finite for extents spanning the whole f64 range.
        let mins = extent.mins[i] as f64 * 0.5;
        let width = extent.maxs[i] as f64 * 0.5 - mins;
        if width > 0.0 {
            result[i] = (point[i] as f64 * 0.5 - mins) / width;
        }
    }

    result
}

/// The Morton code of `point` relative to `extent`.
///
/// Points outside of `extent` are clamped to its boundary.
#[inline]
pub(super) fn morton_code(point: &Point<Real>, extent: &Aabb) -> u64 {
    morton::morton_encode_u64_unorm(normalize(point, extent))
}

/// Sorts the points by Morton code.
///
/// Returns the sorted codes and the permutation from sorted positions to point indices. Points
/// with equal codes stay sorted by index.
pub(super) fn morton_order(points: &[Point<Real>], extent: &Aabb) -> (Vec<u64>, Vec<u32>) {
    let mut keyed = parallel::map(points.len(), |i| {
        (morton_code(&points[i], extent), i as u32)
    });
    parallel::sort_by_key(&mut keyed, |(code, _)| *code);

    let codes = parallel::map(keyed.len(), |i| keyed[i].0);
    let permutation = parallel::map(keyed.len(), |i| keyed[i].1);
    (codes, permutation)
}
