//! Message passing: byte-level backends, typed payload encoding and the
//! explicit communication context.

pub mod communicator;
pub mod context;
pub mod wire;

pub use communicator::{Communicator, NoComm, ThreadComm, Wait};
#[cfg(feature = "mpi-support")]
pub use communicator::MpiComm;
pub use context::{CommContext, Completed, RecvRequest, ReduceOp, Reducible};
