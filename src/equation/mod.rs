//! Equation assembly.
//!
//! [`Equation`] is the fixed-shape sparse system, [`fv`] builds the
//! finite-volume terms and [`solver`] holds the local linear solvers handed to
//! [`Equation::solve`].

pub mod assembly;
pub mod fv;
pub mod solver;

pub use assembly::{Equation, SolveReport};
pub use solver::{CsrMatrix, Gmres, GmresConfig, LinearSolver, LocalSolve};
