#![allow(dead_code)]
use fv_immersed::{
    algs::communicator::{Communicator, NoComm},
    algs::context::CommContext,
    topology::{FiniteVolumeGrid2D, PartitionedMesh},
};

/// Unit-square-style `nx × ny` grid of spacing `h` on a single rank.
pub fn serial_grid(nx: usize, ny: usize, h: f64) -> (FiniteVolumeGrid2D, CommContext<NoComm>) {
    let comm = CommContext::new(NoComm);
    let grid = FiniteVolumeGrid2D::from_partition(&PartitionedMesh::rectilinear(nx, ny, h, h), &comm)
        .expect("serial grid");
    (grid, comm)
}

/// This rank's piece of an `nx × ny` grid split into vertical strips, one per rank.
pub fn strip_grid<C: Communicator>(
    comm: &CommContext<C>,
    nx: usize,
    ny: usize,
    h: f64,
) -> FiniteVolumeGrid2D {
    let mesh = PartitionedMesh::rectilinear(nx, ny, h, h).partition_strips(comm.size());
    FiniteVolumeGrid2D::from_partition(&mesh, comm).expect("partitioned grid")
}

/// Route `log` output through env_logger once per test binary.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
