#![cfg_attr(docsrs, feature(doc_cfg))]
//! # fv-immersed
//!
//! fv-immersed is the distributed core of a 2D finite-volume solver with
//! moving immersed boundaries. It builds per-rank unstructured grids from an
//! externally partitioned mesh, stores cell- and face-centred fields, assembles
//! and solves sparse equations, and classifies cells against rigid bodies that
//! move through the mesh.
//!
//! ## Features
//! - Partitioned unstructured grids with ghost cells, halo exchange and a
//!   contiguous global ordering of active cells
//! - Scalar and vector fields with boundary conditions and time history
//! - Fixed-stencil sparse equations with algebra, finite-volume operators and
//!   a GMRES solver with Schwarz sweeps across ranks
//! - Immersed bodies (circle, box, polygon) with prescribed or force-driven
//!   motion, cell classification, constraint rows, surface forces and
//!   collisions
//! - Pluggable communication backends (serial, threads, MPI)
//!
//! ## Determinism
//!
//! Collectives reduce in rank order, so results do not depend on message
//! arrival order. Tests that draw random samples fix their `SmallRng` seeds.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! fv-immersed = "0.3"
//! # features = ["mpi-support"]
//! ```

pub mod algs;
pub mod config;
pub mod equation;
pub mod field;
pub mod geometry;
pub mod ib;
pub mod mesh_error;
pub mod topology;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, NoComm, ThreadComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::context::CommContext;
    pub use crate::config::Input;
    pub use crate::equation::{fv, Equation, Gmres, GmresConfig, LinearSolver, SolveReport};
    pub use crate::field::{
        BoundaryType, FieldValue, FiniteVolumeField, ScalarFiniteVolumeField,
        VectorFiniteVolumeField,
    };
    pub use crate::geometry::{Point2D, Polygon, Shape2D, Vector2D};
    pub use crate::ib::{CellStatus, ImmersedBoundary, ImmersedBoundaryObject, Motion};
    pub use crate::main_info;
    pub use crate::mesh_error::FvError;
    pub use crate::topology::{CellGroup, FiniteVolumeGrid2D, PartitionedMesh};
}
