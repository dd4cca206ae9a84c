//! Geometry utilities for fv-immersed.
//!
//! Vectors, segments and polygons used by the mesh, the parametric shapes of
//! immersed bodies, and interface reconstruction on polygonal cells.

pub mod plic;
pub mod polygon;
pub mod shape;
pub mod vector;

pub use polygon::{LineSegment2D, Polygon};
pub use shape::Shape2D;
pub use vector::{cross, dot, Point2D, Vector2D};
