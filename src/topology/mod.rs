//! Mesh topology and partition.
//!
//! This module turns an externally partitioned mesh graph into the per-rank
//! grid the rest of the crate works on. It includes:
//! - [`PartitionedMesh`], the global input graph
//! - [`FiniteVolumeGrid2D`] with its cells, faces, links and patches
//! - ownership metadata and the halo exchange plan for ghost cells
//! - an R-tree [`CellIndex`] for point location and nearest-cell lookups
//! - [`ZoneRegistry`] and [`CellGroup`] for classifying cells

pub mod cell;
pub mod grid;
pub mod halo;
pub mod ownership;
pub mod partition;
pub mod spatial;
pub mod zone;

pub use cell::{BoundaryLink, Cell, DiagonalLink, Face, FaceType, InteriorLink};
pub use grid::{FiniteVolumeGrid2D, Patch, DEFAULT_PATCH};
pub use halo::{HaloLink, HaloPlan};
pub use ownership::{CellOwnership, OwnershipEntry};
pub use partition::{PartitionedMesh, PatchSpec};
pub use spatial::CellIndex;
pub use zone::{CellGroup, CellZone, ZoneRegistry};
