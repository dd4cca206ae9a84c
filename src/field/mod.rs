//! Fields over a [`FiniteVolumeGrid2D`](crate::topology::FiniteVolumeGrid2D)
//! and their boundary conditions.

pub mod boundary;
pub mod finite_volume_field;
pub mod gradient;
pub mod value;

pub use boundary::{BoundaryCondition, BoundaryType};
pub use finite_volume_field::{
    FieldSnapshot, FiniteVolumeField, ScalarFiniteVolumeField, VectorFiniteVolumeField,
};
pub use gradient::{component_gradients, gradient};
pub use value::FieldValue;
