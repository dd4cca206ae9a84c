//! Value types a field can hold.

use crate::algs::context::Reducible;
use crate::config::FromInput;
use crate::geometry::{dot, Vector2D};
use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// Scalar or 2-vector cell value.
///
/// A value has `N_COMPONENTS` components; equations give each component its
/// own interleaved row.
pub trait FieldValue:
    Reducible
    + FromInput
    + Default
    + Debug
    + PartialEq
    + Add<Output = Self>
    + Sub<Output = Self>
    + Neg<Output = Self>
    + Mul<f64, Output = Self>
    + Div<f64, Output = Self>
    + AddAssign
    + SubAssign
    + Send
    + Sync
    + 'static
{
    const N_COMPONENTS: usize;

    fn component(self, i: usize) -> f64;

    fn set_component(&mut self, i: usize, v: f64);

    /// Value reflected at a symmetry plane with unit normal `n`.
    fn symmetry_value(self, n: Vector2D) -> Self;

    fn magnitude(self) -> f64;
}

impl FieldValue for f64 {
    const N_COMPONENTS: usize = 1;

    #[inline]
    fn component(self, _i: usize) -> f64 {
        self
    }

    #[inline]
    fn set_component(&mut self, _i: usize, v: f64) {
        *self = v;
    }

    fn symmetry_value(self, _n: Vector2D) -> Self {
        self
    }

    fn magnitude(self) -> f64 {
        self.abs()
    }
}

impl FieldValue for Vector2D {
    const N_COMPONENTS: usize = 2;

    #[inline]
    fn component(self, i: usize) -> f64 {
        Vector2D::component(self, i)
    }

    #[inline]
    fn set_component(&mut self, i: usize, v: f64) {
        *self.component_mut(i) = v;
    }

    /// Tangential part only.
    fn symmetry_value(self, n: Vector2D) -> Self {
        self - n * dot(self, n)
    }

    fn magnitude(self) -> f64 {
        self.mag()
    }
}
