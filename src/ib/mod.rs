//! Immersed bodies: their shapes and motion, the cells they cover, and how
//! they constrain equations and feel the flow.

pub mod collision;
pub mod immersed_boundary;
pub mod interpolation;
pub mod motion;
pub mod object;

pub use collision::CollisionModel;
pub use immersed_boundary::{CellStatus, ImmersedBoundary, CASE_DIR};
pub use interpolation::BilinearInterpolator;
pub use motion::{BodyLoad, Motion};
pub use object::{
    read_polygon_file, IbBoundaryCondition, IbBoundaryType, IbRefValue, ImmersedBoundaryObject,
};
