//! FvError: Unified error type for fv-immersed public APIs
//!
//! Configuration and topology problems are raised at construction time, before
//! any simulation step runs. Shape mismatches between equations or fields are
//! reported here by the `try_*` APIs; the operator overloads panic with the same
//! message instead. Linear-solver non-convergence is *not* an error, see
//! [`SolveReport`](crate::equation::SolveReport).

use thiserror::Error;

/// Unified error type for fv-immersed operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FvError {
    /// A required configuration key was absent.
    #[error("{component}: missing required configuration key `{key}`")]
    MissingConfigKey { component: &'static str, key: String },
    /// A configuration value could not be parsed into the requested type.
    #[error("{component}: invalid value `{value}` for key `{key}`")]
    InvalidConfigValue {
        component: &'static str,
        key: String,
        value: String,
    },
    /// `geometry.type` named an unknown shape.
    #[error("ImmersedBoundary: invalid geometry type \"{0}\"")]
    UnknownGeometry(String),
    /// `motion.type` named an unknown motion law.
    #[error("ImmersedBoundary: invalid motion type \"{0}\"")]
    UnknownMotion(String),
    /// A boundary type string was unrecognized, or a patch has no boundary type.
    #[error("{component}: unrecognized or unspecified boundary type \"{value}\"")]
    UnknownBoundaryType { component: &'static str, value: String },
    /// A polygon point file could not be opened or read.
    #[error("failed to read geometry file \"{path}\": {reason}")]
    GeometryFile { path: String, reason: String },

    /// A face is referenced by more than two cells, or a patch edge matches no cell.
    #[error("Topology error: dangling face between nodes {0} and {1}")]
    DanglingFace(usize, usize),
    /// A cell has fewer than three faces.
    #[error("Topology error: cell {cell} has only {faces} faces")]
    DegenerateCell { cell: usize, faces: usize },
    /// A node or cell index was out of range for the partitioned mesh.
    #[error("Topology error: {what} index {index} out of range")]
    MissingEntity { what: &'static str, index: usize },
    /// The partition assigns a cell to a rank outside the communicator.
    #[error("Partition error: cell {cell} owned by rank {owner}, but only {size} ranks exist")]
    InvalidPartition {
        cell: usize,
        owner: usize,
        size: usize,
    },

    /// Two equations (or an equation and a field) have different shapes.
    #[error("Shape mismatch in {op}: {lhs} vs {rhs}")]
    ShapeMismatch {
        op: &'static str,
        lhs: usize,
        rhs: usize,
    },
    /// Two fields defined over different grids were combined.
    #[error("Grid mismatch: field `{lhs}` and field `{rhs}` live on different grids")]
    GridMismatch { lhs: String, rhs: String },
    /// A coefficient was added outside the fixed stencil of its row.
    #[error("Stencil miss: cell {col} is not in the stencil of row cell {row}")]
    StencilMiss { row: usize, col: usize },
    /// A cell is not active (not owned, or excluded from discretization).
    #[error("Cell {0} is not an active cell on this rank")]
    InactiveCell(usize),
    /// `old_field(i)` with `i` beyond the saved history.
    #[error("Field history index {index} out of range (history holds {len})")]
    HistoryOutOfRange { index: usize, len: usize },

    /// A received payload did not match the expected element type or count.
    #[error("Communication error: {0}")]
    Communication(String),
    /// Unknown immersed-boundary object name.
    #[error("ImmersedBoundary: no immersed boundary object named \"{0}\"")]
    UnknownObject(String),
}
