//! Boundary-condition kinds and per-patch tables.

use crate::mesh_error::FvError;
use std::fmt;
use std::str::FromStr;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BoundaryType {
    Fixed,
    NormalGradient,
    Symmetry,
    Outflow,
}

impl FromStr for BoundaryType {
    type Err = FvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(BoundaryType::Fixed),
            "normal_gradient" => Ok(BoundaryType::NormalGradient),
            "symmetry" => Ok(BoundaryType::Symmetry),
            "outflow" => Ok(BoundaryType::Outflow),
            other => Err(FvError::UnknownBoundaryType {
                component: "FiniteVolumeField",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for BoundaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BoundaryType::Fixed => "fixed",
            BoundaryType::NormalGradient => "normal_gradient",
            BoundaryType::Symmetry => "symmetry",
            BoundaryType::Outflow => "outflow",
        })
    }
}

/// Kind and reference value for one patch.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundaryCondition<T> {
    pub kind: BoundaryType,
    pub value: T,
}

impl<T> BoundaryCondition<T> {
    pub fn new(kind: BoundaryType, value: T) -> Self {
        Self { kind, value }
    }
}

/// The error raised when a discretization meets a patch without a condition.
pub(crate) fn unspecified(field: &str, patch: &str) -> FvError {
    FvError::UnknownBoundaryType {
        component: "FiniteVolumeField",
        value: format!("<unspecified> for field `{field}` on patch `{patch}`"),
    }
}
