//! Axis Aligned Bounding Box.

use crate::math::{Point, Real, Vector, DIM};

/// An Axis-Aligned Bounding Box (AABB).
///
/// An AABB is defined by its minimum and maximum corners. The AABB of a single point is
/// degenerate: both corners are equal to that point.
///
/// # Invariant
///
/// A valid AABB has `mins[i] <= maxs[i]` on every axis. [`Aabb::new_invalid`] deliberately breaks
/// this invariant so that it can be used as the neutral element of [`Aabb::merged`].
///
/// # Example
///
/// ```rust
/// # #[cfg(all(feature = "dim3", feature = "f32"))] {
/// use lbvh3d::bounding_volume::Aabb;
/// use nalgebra::Point3;
///
/// let aabb = Aabb::from_points([
///     Point3::new(1.0, 2.0, 3.0),
///     Point3::new(-1.0, 4.0, 2.0),
///     Point3::new(0.0, 0.0, 5.0),
/// ]);
///
/// assert_eq!(aabb.mins, Point3::new(-1.0, 0.0, 2.0));
/// assert_eq!(aabb.maxs, Point3::new(1.0, 4.0, 5.0));
/// assert_eq!(aabb.distance_squared_to_local_point(&Point3::new(3.0, 2.0, 3.0)), 4.0);
/// # }
/// ```
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Copy, Clone)]
#[repr(C)]
pub struct Aabb {
    /// The point with minimum coordinates.
    pub mins: Point<Real>,
    /// The point with maximum coordinates.
    pub maxs: Point<Real>,
}

impl Aabb {
    /// Creates a new AABB from its minimum and maximum corners.
    #[inline]
    pub fn new(mins: Point<Real>, maxs: Point<Real>) -> Aabb {
        Aabb { mins, maxs }
    }

    /// Creates an invalid AABB with inverted bounds.
    ///
    /// Merging anything into it yields that thing, which makes it the starting value of
    /// min/max reductions.
    #[inline]
    pub fn new_invalid() -> Self {
        Self::new(
            Vector::repeat(Real::MAX).into(),
            Vector::repeat(-Real::MAX).into(),
        )
    }

    /// The degenerate AABB of a single point.
    #[inline]
    pub fn from_point(point: Point<Real>) -> Self {
        Self::new(point, point)
    }

    /// Creates a new AABB that tightly encloses a set of points.
    ///
    /// Returns an invalid AABB (see [`Aabb::new_invalid`]) if `pts` is empty.
    pub fn from_points<I>(pts: I) -> Self
    where
        I: IntoIterator<Item = Point<Real>>,
    {
        let mut result = Self::new_invalid();
        for pt in pts {
            result.take_point(pt);
        }
        result
    }

    /// Does this AABB enclose at least one point, i.e., are its bounds not inverted?
    #[inline]
    pub fn is_valid(&self) -> bool {
        na::partial_le(&self.mins, &self.maxs)
    }

    /// The size of this AABB along each axis.
    #[inline]
    pub fn extents(&self) -> Vector<Real> {
        self.maxs - self.mins
    }

    /// Enlarges this AABB so it also contains the point `pt`.
    #[inline]
    pub fn take_point(&mut self, pt: Point<Real>) {
        self.mins = self.mins.inf(&pt);
        self.maxs = self.maxs.sup(&pt);
    }

    /// The smallest AABB containing both `self` and `other`.
    #[inline]
    pub fn merged(&self, other: &Aabb) -> Aabb {
        Aabb {
            mins: self.mins.inf(&other.mins),
            maxs: self.maxs.sup(&other.maxs),
        }
    }

    /// Checks if `self` and `other` overlap (touching counts as overlapping).
    #[inline]
    pub fn intersects(&self, other: &Aabb) -> bool {
        na::partial_le(&self.mins, &other.maxs) && na::partial_ge(&self.maxs, &other.mins)
    }

    /// Checks if `self` fully encloses `other`.
    #[inline]
    pub fn contains(&self, other: &Aabb) -> bool {
        na::partial_le(&self.mins, &other.mins) && na::partial_ge(&self.maxs, &other.maxs)
    }

    /// Does this AABB contain a point expressed in the same coordinate frame as `self`?
    #[inline]
    pub fn contains_local_point(&self, point: &Point<Real>) -> bool {
        for i in 0..DIM {
            if point[i] < self.mins[i] || point[i] > self.maxs[i] {
                return false;
            }
        }

        true
    }

    /// The squared distance between `point` and the closest point of this AABB.
    ///
    /// This is zero if the point is inside of the AABB. For any point `p` enclosed by `self`,
    /// this is a lower bound of the squared distance between `point` and `p`.
    #[inline]
    pub fn distance_squared_to_local_point(&self, point: &Point<Real>) -> Real {
        let below = self.mins - point;
        let above = point - self.maxs;
        below.sup(&above).sup(&Vector::zeros()).norm_squared()
    }
}

#[cfg(test)]
mod test {
    use super::Aabb;
    use crate::math::{Point, Real, Vector};

    #[test]
    fn invalid_aabb_is_merge_identity() {
        let aabb = Aabb::new(Point::origin(), Vector::repeat(2.0).into());
        assert!(!Aabb::new_invalid().is_valid());
        assert_eq!(Aabb::new_invalid().merged(&aabb), aabb);
        assert_eq!(Aabb::from_points(core::iter::empty()), Aabb::new_invalid());
    }

    #[test]
    fn point_distance_lower_bound() {
        let aabb = Aabb::new(Point::origin(), Vector::repeat(1.0).into());
        assert_eq!(aabb.distance_squared_to_local_point(&Point::origin()), 0.0);
        assert_eq!(
            aabb.distance_squared_to_local_point(&Vector::repeat(0.5).into()),
            0.0
        );

        let outside: Point<Real> = Vector::repeat(3.0).into();
        let expected = 4.0 * crate::math::DIM as Real;
        assert_eq!(aabb.distance_squared_to_local_point(&outside), expected);
        assert_eq!(
            aabb.distance_squared_to_local_point(&(-outside.coords).into()),
            9.0 * crate::math::DIM as Real
        );
    }

    #[test]
    fn containment() {
        let small = Aabb::from_point(Vector::repeat(0.25).into());
        let big = Aabb::new(Point::origin(), Vector::repeat(1.0).into());
        assert!(big.contains(&small));
        assert!(!small.contains(&big));
        assert!(big.intersects(&small));
        assert!(big.contains_local_point(&small.mins));
        assert_eq!(small.extents(), Vector::zeros());
    }
}
