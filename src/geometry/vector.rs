//! Two-component vectors and points.
//!
//! [`Vector2D`] is `#[repr(C)]` and [`bytemuck::Pod`], so slices of it travel
//! over the communicator without any packing step.

use crate::mesh_error::FvError;
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

/// Tolerance used by the geometric predicates.
pub const EPSILON: f64 = 1e-12;

/// A 2D vector of `f64` components.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
#[cfg_attr(feature = "mpi-support", derive(mpi::traits::Equivalence))]
pub struct Vector2D {
    pub x: f64,
    pub y: f64,
}

/// Points and vectors share one representation.
pub type Point2D = Vector2D;

static_assertions::assert_eq_size!(Vector2D, [f64; 2]);

impl Vector2D {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    #[inline]
    pub fn mag_sqr(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    #[inline]
    pub fn mag(self) -> f64 {
        self.mag_sqr().sqrt()
    }

    /// Unit vector in the same direction; the zero vector maps to itself.
    pub fn unit_vec(self) -> Self {
        let m = self.mag();
        if m < EPSILON { self } else { self / m }
    }

    /// Clockwise normal `(y, -x)`. For a counter-clockwise edge this points outward.
    #[inline]
    pub fn normal_vec(self) -> Self {
        Self::new(self.y, -self.x)
    }

    /// Counter-clockwise tangent `(-y, x)`.
    #[inline]
    pub fn tangent_vec(self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// Polar angle in `[0, 2π)`.
    pub fn angle(self) -> f64 {
        let theta = self.y.atan2(self.x);
        if theta < 0.0 {
            theta + 2.0 * std::f64::consts::PI
        } else {
            theta
        }
    }

    /// Rotate counter-clockwise by `theta` radians about the origin.
    pub fn rotate(self, theta: f64) -> Self {
        let (s, c) = theta.sin_cos();
        Self::new(c * self.x - s * self.y, s * self.x + c * self.y)
    }

    #[inline]
    pub fn abs(self) -> Self {
        Self::new(self.x.abs(), self.y.abs())
    }

    /// Component-wise product.
    #[inline]
    pub fn pointwise(self, other: Self) -> Self {
        Self::new(self.x * other.x, self.y * other.y)
    }

    #[inline]
    pub fn component(self, i: usize) -> f64 {
        match i {
            0 => self.x,
            _ => self.y,
        }
    }

    #[inline]
    pub fn component_mut(&mut self, i: usize) -> &mut f64 {
        match i {
            0 => &mut self.x,
            _ => &mut self.y,
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[inline]
pub fn dot(u: Vector2D, v: Vector2D) -> f64 {
    u.x * v.x + u.y * v.y
}

/// z-component of the 3D cross product.
#[inline]
pub fn cross(u: Vector2D, v: Vector2D) -> f64 {
    u.x * v.y - u.y * v.x
}

impl Add for Vector2D {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector2D {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Vector2D {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl Mul<f64> for Vector2D {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Mul<Vector2D> for f64 {
    type Output = Vector2D;
    #[inline]
    fn mul(self, rhs: Vector2D) -> Vector2D {
        rhs * self
    }
}

impl Div<f64> for Vector2D {
    type Output = Self;
    #[inline]
    fn div(self, rhs: f64) -> Self {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

impl AddAssign for Vector2D {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl SubAssign for Vector2D {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl MulAssign<f64> for Vector2D {
    #[inline]
    fn mul_assign(&mut self, rhs: f64) {
        self.x *= rhs;
        self.y *= rhs;
    }
}

impl DivAssign<f64> for Vector2D {
    #[inline]
    fn div_assign(&mut self, rhs: f64) {
        self.x /= rhs;
        self.y /= rhs;
    }
}

impl std::iter::Sum for Vector2D {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, v| acc + v)
    }
}

impl num_traits::Zero for Vector2D {
    fn zero() -> Self {
        Vector2D::zero()
    }
    fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

impl fmt::Display for Vector2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(f64, f64)> for Vector2D {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl From<[f64; 2]> for Vector2D {
    fn from([x, y]: [f64; 2]) -> Self {
        Self::new(x, y)
    }
}

/// Parses `"(x, y)"`, `"x y"` or `"x,y"`.
impl FromStr for Vector2D {
    type Err = FvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FvError::InvalidConfigValue {
            component: "Vector2D",
            key: "vector".into(),
            value: s.to_string(),
        };
        let trimmed = s.trim().trim_start_matches('(').trim_end_matches(')');
        let mut parts = trimmed
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|p| !p.is_empty());
        let x = parts.next().ok_or_else(invalid)?.parse::<f64>().map_err(|_| invalid())?;
        let y = parts.next().ok_or_else(invalid)?.parse::<f64>().map_err(|_| invalid())?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self::new(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_variants() {
        assert_eq!("(1, 2)".parse::<Vector2D>().unwrap(), Vector2D::new(1.0, 2.0));
        assert_eq!("1.5 -2".parse::<Vector2D>().unwrap(), Vector2D::new(1.5, -2.0));
        assert!("(1, 2, 3)".parse::<Vector2D>().is_err());
        assert!("abc".parse::<Vector2D>().is_err());
    }

    #[test]
    fn normal_points_outward_for_ccw_edge() {
        // bottom edge of a CCW unit square goes +x; outward is -y
        let n = Vector2D::new(1.0, 0.0).normal_vec();
        assert_eq!(n, Vector2D::new(0.0, -1.0));
    }

    #[test]
    fn angle_is_in_positive_range() {
        let a = Vector2D::new(0.0, -1.0).angle();
        assert!((a - 1.5 * std::f64::consts::PI).abs() < 1e-14);
    }
}
