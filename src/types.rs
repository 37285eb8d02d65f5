//! Common types and traits for 3D geometry.
//!
//! Axis convention throughout the crate: X runs along the bin length,
//! Y along the bin width and Z along the bin height.

use std::cmp::Ordering;
use std::ops::Add;

/// Global numerical tolerance for floating-point comparisons.
pub const EPSILON_GENERAL: f64 = 1e-6;

/// Tolerance used when grouping positions (piles sharing a floor footprint).
pub const EPSILON_POSITION: f64 = 1e-3;

/// Represents a 3D vector: either a position or a set of dimensions.
///
/// # Examples
/// ```
/// use pack_it_now::types::Vec3;
///
/// let origin = Vec3::new(1.0, 2.0, 3.0);
/// let dims = Vec3::new(10.0, 20.0, 30.0);
/// assert_eq!((origin + dims).z, 33.0);
/// assert_eq!(dims.volume(), 6000.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Creates a new 3D vector.
    ///
    /// # Parameters
    /// * `x` - X component (length)
    /// * `y` - Y component (width)
    /// * `z` - Z component (height)
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Creates a zero vector (origin).
    #[inline]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Calculates the volume (product of all components).
    #[inline]
    pub fn volume(&self) -> f64 {
        self.x * self.y * self.z
    }

    /// Checks if all components are positive and finite.
    #[inline]
    pub fn is_valid_dimension(&self) -> bool {
        self.x > 0.0
            && self.y > 0.0
            && self.z > 0.0
            && self.x.is_finite()
            && self.y.is_finite()
            && self.z.is_finite()
    }

    /// Checks if the vector fits within another vector (component-wise <=).
    ///
    /// # Parameters
    /// * `container` - The outer vector (e.g., bin dimensions)
    /// * `tolerance` - Numerical tolerance for the comparison
    #[inline]
    pub fn fits_within(&self, container: &Self, tolerance: f64) -> bool {
        self.x <= container.x + tolerance
            && self.y <= container.y + tolerance
            && self.z <= container.z + tolerance
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}


/// Trait for objects with 3D dimensions.
pub trait Dimensional {
    /// Returns the dimensions of the object.
    fn dimensions(&self) -> Vec3;

    /// Calculates the volume.
    fn volume(&self) -> f64 {
        self.dimensions().volume()
    }
}

/// Trait for objects with an optional weight.
pub trait Weighted {
    /// Returns the weight, `0.0` when none was given.
    fn weight(&self) -> f64;
}

/// Represents an Axis-Aligned Bounding Box (AABB).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner (position)
    pub min: Vec3,
    /// Maximum corner (position + dimensions)
    pub max: Vec3,
}

impl BoundingBox {
    /// Creates a bounding box from position and dimensions.
    #[inline]
    pub fn from_position_and_dims(position: Vec3, dims: Vec3) -> Self {
        Self {
            min: position,
            max: position + dims,
        }
    }

    /// Grows the box by `margin` on every side of the X and Y axes.
    #[inline]
    pub fn inflated_xy(&self, margin: f64) -> Self {
        Self {
            min: Vec3::new(self.min.x - margin, self.min.y - margin, self.min.z),
            max: Vec3::new(self.max.x + margin, self.max.y + margin, self.max.z),
        }
    }

    /// Checks if two bounding boxes intersect with a positive volume.
    ///
    /// Touching faces do not count; `tolerance` absorbs rounding noise.
    #[inline]
    pub fn intersects(&self, other: &Self, tolerance: f64) -> bool {
        !(self.max.x <= other.min.x + tolerance
            || other.max.x <= self.min.x + tolerance
            || self.max.y <= other.min.y + tolerance
            || other.max.y <= self.min.y + tolerance
            || self.max.z <= other.min.z + tolerance
            || other.max.z <= self.min.z + tolerance)
    }

    /// Checks if this box lies fully inside `outer`.
    #[inline]
    pub fn is_inside(&self, outer: &Self, tolerance: f64) -> bool {
        self.min.x >= outer.min.x - tolerance
            && self.min.y >= outer.min.y - tolerance
            && self.min.z >= outer.min.z - tolerance
            && self.max.x <= outer.max.x + tolerance
            && self.max.y <= outer.max.y + tolerance
            && self.max.z <= outer.max.z + tolerance
    }

}

/// Descending comparison of two floats; NaN-safe and deterministic.
#[inline]
pub fn desc(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

/// Validation functions shared by records and options.
pub mod validation {
    /// Validates a strictly positive, finite value.
    ///
    /// # Returns
    /// `Ok(())` for valid values, otherwise error text
    pub fn validate_positive(value: f64, name: &str) -> Result<(), String> {
        if value.is_nan() {
            return Err(format!("{} must not be NaN", name));
        }
        if value.is_infinite() {
            return Err(format!("{} must not be infinite", name));
        }
        if value <= 0.0 {
            return Err(format!("{} must be positive, got: {}", name, value));
        }
        Ok(())
    }

    /// Validates a finite value that may be zero.
    pub fn validate_non_negative(value: f64, name: &str) -> Result<(), String> {
        if !value.is_finite() {
            return Err(format!("{} must be finite, got: {}", name, value));
        }
        if value < 0.0 {
            return Err(format!("{} must not be negative, got: {}", name, value));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
    }

    #[test]
    fn test_vec3_volume() {
        let dims = Vec3::new(10.0, 20.0, 30.0);
        assert!((dims.volume() - 6000.0).abs() < EPSILON_GENERAL);
    }

    #[test]
    fn test_vec3_fits_within() {
        let small = Vec3::new(5.0, 5.0, 5.0);
        let large = Vec3::new(10.0, 10.0, 10.0);

        assert!(small.fits_within(&large, EPSILON_GENERAL));
        assert!(!large.fits_within(&small, EPSILON_GENERAL));
        assert!(!Vec3::new(0.0, 1.0, 1.0).is_valid_dimension());
    }

    #[test]
    fn test_bounding_box_intersects() {
        let a = BoundingBox::from_position_and_dims(Vec3::zero(), Vec3::new(10.0, 10.0, 10.0));
        let b = BoundingBox::from_position_and_dims(
            Vec3::new(5.0, 5.0, 5.0),
            Vec3::new(10.0, 10.0, 10.0),
        );
        let touching = BoundingBox::from_position_and_dims(
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(10.0, 10.0, 10.0),
        );

        assert!(a.intersects(&b, EPSILON_GENERAL));
        assert!(!a.intersects(&touching, EPSILON_GENERAL));
    }

    #[test]
    fn test_bounding_box_containment_and_inflation() {
        let outer = BoundingBox::from_position_and_dims(Vec3::zero(), Vec3::new(10.0, 10.0, 10.0));
        let inner = BoundingBox::from_position_and_dims(
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(8.0, 8.0, 10.0),
        );

        assert!(inner.is_inside(&outer, EPSILON_GENERAL));
        assert!(inner.inflated_xy(1.0).is_inside(&outer, EPSILON_GENERAL));
        assert!(!inner.inflated_xy(1.5).is_inside(&outer, EPSILON_GENERAL));
    }

    #[test]
    fn test_desc_orders_largest_first() {
        let mut values = vec![1.0, 3.0, 2.0];
        values.sort_by(|a, b| desc(*a, *b));
        assert_eq!(values, vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_validation() {
        assert!(validation::validate_positive(10.0, "Height").is_ok());
        assert!(validation::validate_positive(0.0, "Height").is_err());
        assert!(validation::validate_positive(f64::NAN, "Height").is_err());
        assert!(validation::validate_non_negative(0.0, "Clearance").is_ok());
        assert!(validation::validate_non_negative(-1.0, "Clearance").is_err());
        assert!(validation::validate_non_negative(f64::INFINITY, "Clearance").is_err());
    }
}
