//! Byte-level message passing between ranks.
//!
//! Messages are *contiguous byte slices* delivered whole and in order per
//! `(source, destination, tag)`. All handles are **waitable**; nothing may be
//! read from a receive until its handle has been waited on. The typed API used
//! by the rest of the crate is [`CommContext`](crate::algs::context::CommContext).
//!
//! Backends:
//! - [`NoComm`]: a single rank, no peers.
//! - [`ThreadComm`]: one OS thread per rank inside one process, sharing a mailbox.
//! - `MpiComm` (feature `mpi-support`): one process per rank.

use bytes::Bytes;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;

/// Non-blocking point-to-point interface.
pub trait Communicator: 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16) -> Self::RecvHandle;
}

/// Anything that can be waited on.
pub trait Wait {
    /// Block until completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Single-rank communicator for serial runs. Every exchange has zero peers.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16) {}
}

// --- ThreadComm: intra-process, one thread per rank ---
type Key = (usize, usize, u16); // (src, dst, tag)
type Mailbox = Arc<DashMap<Key, VecDeque<Bytes>>>;

/// In-process communicator. Ranks of one universe share a FIFO mailbox.
#[derive(Clone, Debug)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    mailbox: Mailbox,
}

impl ThreadComm {
    /// Create `size` connected ranks.
    pub fn universe(size: usize) -> Vec<ThreadComm> {
        let mailbox: Mailbox = Arc::new(DashMap::new());
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
            })
            .collect()
    }

    /// Run `f` on `size` ranks, one scoped thread each, and collect the
    /// per-rank results in rank order.
    pub fn run<R, F>(size: usize, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(crate::algs::context::CommContext<ThreadComm>) -> R + Sync,
    {
        let f = &f;
        std::thread::scope(|s| {
            let handles: Vec<_> = Self::universe(size)
                .into_iter()
                .map(|comm| s.spawn(move || f(crate::algs::context::CommContext::new(comm))))
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(r) => r,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }
}

/// Pending receive on a [`ThreadComm`] mailbox slot.
pub struct ThreadRecv {
    mailbox: Mailbox,
    key: Key,
}

impl Wait for ThreadRecv {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            if let Some(mut slot) = self.mailbox.get_mut(&self.key) {
                if let Some(bytes) = slot.pop_front() {
                    return Some(bytes.to_vec());
                }
            }
            std::thread::yield_now();
        }
    }
}

impl Communicator for ThreadComm {
    type SendHandle = ();
    type RecvHandle = ThreadRecv;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
        let key = (self.rank, peer, tag);
        self.mailbox
            .entry(key)
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16) -> ThreadRecv {
        ThreadRecv {
            mailbox: Arc::clone(&self.mailbox),
            key: (peer, self.rank, tag),
        }
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use mpi::environment::Universe;
    use mpi::request::StaticScope;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    /// One MPI process per rank on `MPI_COMM_WORLD`.
    pub struct MpiComm {
        _universe: Universe,
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        /// Initialise MPI. Returns `None` if MPI was already initialised.
        pub fn new() -> Option<Self> {
            let universe = mpi::initialize()?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Some(Self {
                _universe: universe,
                world,
                rank,
                size,
            })
        }
    }

    /// Completes an outstanding send and releases its buffer.
    pub struct MpiSend(Box<dyn FnOnce()>);

    impl Wait for MpiSend {
        fn wait(self) -> Option<Vec<u8>> {
            (self.0)();
            None
        }
    }

    /// Deferred receive; matched when waited on.
    pub struct MpiRecv {
        peer: i32,
        tag: i32,
    }

    impl Wait for MpiRecv {
        fn wait(self) -> Option<Vec<u8>> {
            let world = SimpleCommunicator::world();
            let (data, _status) = world
                .process_at_rank(self.peer)
                .receive_vec_with_tag::<u8>(self.tag);
            Some(data)
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiSend;
        type RecvHandle = MpiRecv;

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiSend {
            let owned: &'static [u8] = Box::leak(buf.to_vec().into_boxed_slice());
            let request = self
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, owned, tag as i32);
            MpiSend(Box::new(move || {
                request.wait();
                // SAFETY: the request has completed, so MPI no longer reads `owned`,
                // which came from `Box::leak` above and is not aliased elsewhere.
                unsafe { drop(Box::from_raw(owned as *const [u8] as *mut [u8])) };
            }))
        }

        fn irecv(&self, peer: usize, tag: u16) -> MpiRecv {
            MpiRecv {
                peer: peer as i32,
                tag: tag as i32,
            }
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
