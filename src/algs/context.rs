//! Typed communication context passed explicitly to every component.
//!
//! [`CommContext`] wraps a byte-level [`Communicator`] and offers typed
//! point-to-point calls and synchronous collectives over [`bytemuck::Pod`]
//! payloads. Non-blocking receives are queued on the context and can only be
//! read through the [`Completed`] set returned by [`CommContext::wait_all`].
//!
//! Collectives are built on point-to-point messages with tags from a reserved
//! range at the top of the `u16` space, so they never match user traffic.
//! Every rank of the group must enter every collective in the same order.

use crate::algs::communicator::{Communicator, Wait};
use crate::algs::wire;
use crate::geometry::Vector2D;
use crate::mesh_error::FvError;
use bytemuck::Pod;
use hashbrown::HashMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::io::Write;
use std::marker::PhantomData;

/// First tag reserved for collectives. User tags must be below it.
pub const RESERVED_TAG_BASE: u16 = 0xF000;

const TAG_BARRIER: u16 = RESERVED_TAG_BASE;
const TAG_BROADCAST: u16 = RESERVED_TAG_BASE + 1;
const TAG_GATHER: u16 = RESERVED_TAG_BASE + 2;
const TAG_SCATTER: u16 = RESERVED_TAG_BASE + 3;

/// Reduction applied by [`CommContext::all_reduce`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Min,
    Max,
}

/// Payload types that can be combined by a reduction.
pub trait Reducible: Pod {
    fn combine(self, other: Self, op: ReduceOp) -> Self;
}

macro_rules! impl_reducible {
    ($($t:ty),*) => {$(
        impl Reducible for $t {
            #[inline]
            fn combine(self, other: Self, op: ReduceOp) -> Self {
                match op {
                    ReduceOp::Sum => self + other,
                    ReduceOp::Min => if other < self { other } else { self },
                    ReduceOp::Max => if other > self { other } else { self },
                }
            }
        }
    )*};
}

impl_reducible!(f64, i32, i64, u64, usize);

/// Component-wise.
impl Reducible for Vector2D {
    fn combine(self, other: Self, op: ReduceOp) -> Self {
        Vector2D::new(
            self.x.combine(other.x, op),
            self.y.combine(other.y, op),
        )
    }
}

/// A queued non-blocking receive. Redeem it with [`Completed::take`].
#[must_use = "a posted receive must be redeemed after wait_all"]
#[derive(Debug)]
pub struct RecvRequest<T> {
    id: usize,
    source: usize,
    _marker: PhantomData<T>,
}

impl<T> RecvRequest<T> {
    pub fn source(&self) -> usize {
        self.source
    }
}

/// Payloads of every receive completed by one [`CommContext::wait_all`].
#[derive(Debug, Default)]
pub struct Completed {
    payloads: HashMap<usize, Vec<u8>>,
}

impl Completed {
    /// Decode the payload of `req`.
    pub fn take<T: Pod>(&mut self, req: RecvRequest<T>) -> Result<Vec<T>, FvError> {
        let bytes = self.payloads.remove(&req.id).ok_or_else(|| {
            FvError::Communication(format!(
                "receive {} from rank {} was not completed by this wait",
                req.id, req.source
            ))
        })?;
        wire::decode(&bytes)
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

/// Explicit communication context.
pub struct CommContext<C: Communicator> {
    comm: C,
    pending_sends: RefCell<Vec<C::SendHandle>>,
    pending_recvs: RefCell<Vec<(usize, C::RecvHandle)>>,
    next_request: Cell<usize>,
}

impl<C: Communicator> CommContext<C> {
    pub fn new(comm: C) -> Self {
        Self {
            comm,
            pending_sends: RefCell::new(Vec::new()),
            pending_recvs: RefCell::new(Vec::new()),
            next_request: Cell::new(0),
        }
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.comm.size()
    }

    #[inline]
    pub fn main_proc_no(&self) -> usize {
        0
    }

    #[inline]
    pub fn is_main_proc(&self) -> bool {
        self.rank() == self.main_proc_no()
    }

    fn check_user_tag(tag: u16) -> Result<(), FvError> {
        if tag >= RESERVED_TAG_BASE {
            return Err(FvError::Communication(format!(
                "tag {tag} lies in the reserved collective range"
            )));
        }
        Ok(())
    }

    fn check_peer(&self, peer: usize) -> Result<(), FvError> {
        if peer >= self.size() {
            return Err(FvError::Communication(format!(
                "rank {peer} outside communicator of size {}",
                self.size()
            )));
        }
        Ok(())
    }

    fn recv_bytes(&self, source: usize, tag: u16) -> Result<Vec<u8>, FvError> {
        self.comm.irecv(source, tag).wait().ok_or_else(|| {
            FvError::Communication(format!("no message from rank {source} with tag {tag}"))
        })
    }

    // ---- point-to-point ----

    /// Blocking send.
    pub fn send<T: Pod>(&self, dest: usize, values: &[T], tag: u16) -> Result<(), FvError> {
        Self::check_user_tag(tag)?;
        self.check_peer(dest)?;
        self.comm.isend(dest, tag, wire::encode(values)).wait();
        Ok(())
    }

    /// Blocking receive.
    pub fn recv<T: Pod>(&self, source: usize, tag: u16) -> Result<Vec<T>, FvError> {
        Self::check_user_tag(tag)?;
        self.check_peer(source)?;
        wire::decode(&self.recv_bytes(source, tag)?)
    }

    /// Non-blocking send; completed by the next [`wait_all`](Self::wait_all).
    pub fn isend<T: Pod>(&self, dest: usize, values: &[T], tag: u16) -> Result<(), FvError> {
        Self::check_user_tag(tag)?;
        self.check_peer(dest)?;
        let handle = self.comm.isend(dest, tag, wire::encode(values));
        self.pending_sends.borrow_mut().push(handle);
        Ok(())
    }

    /// Post a non-blocking receive.
    pub fn irecv<T: Pod>(&self, source: usize, tag: u16) -> Result<RecvRequest<T>, FvError> {
        Self::check_user_tag(tag)?;
        self.check_peer(source)?;
        let id = self.next_request.get();
        self.next_request.set(id + 1);
        let handle = self.comm.irecv(source, tag);
        self.pending_recvs.borrow_mut().push((id, handle));
        Ok(RecvRequest {
            id,
            source,
            _marker: PhantomData,
        })
    }

    /// Complete every outstanding send and receive.
    pub fn wait_all(&self) -> Result<Completed, FvError> {
        for h in self.pending_sends.borrow_mut().drain(..) {
            h.wait();
        }
        let recvs: Vec<_> = self.pending_recvs.borrow_mut().drain(..).collect();
        let mut done = Completed::default();
        for (id, h) in recvs {
            let bytes = h.wait().ok_or_else(|| {
                FvError::Communication(format!("receive {id} completed without data"))
            })?;
            done.payloads.insert(id, bytes);
        }
        Ok(done)
    }

    // ---- collectives ----

    fn gather_bytes(&self, root: usize, bytes: &[u8], tag: u16) -> Result<Vec<Vec<u8>>, FvError> {
        if self.rank() != root {
            self.comm.isend(root, tag, bytes).wait();
            return Ok(Vec::new());
        }
        (0..self.size())
            .map(|p| {
                if p == root {
                    Ok(bytes.to_vec())
                } else {
                    self.recv_bytes(p, tag)
                }
            })
            .collect()
    }

    fn broadcast_bytes(&self, root: usize, bytes: &[u8], tag: u16) -> Result<Vec<u8>, FvError> {
        if self.rank() == root {
            let handles: Vec<_> = (0..self.size())
                .filter(|&p| p != root)
                .map(|p| self.comm.isend(p, tag, bytes))
                .collect();
            for h in handles {
                h.wait();
            }
            Ok(bytes.to_vec())
        } else {
            self.recv_bytes(root, tag)
        }
    }

    /// Block until every rank has entered.
    pub fn barrier(&self) -> Result<(), FvError> {
        let main = self.main_proc_no();
        self.gather_bytes(main, &[], TAG_BARRIER)?;
        self.broadcast_bytes(main, &[], TAG_BARRIER)?;
        Ok(())
    }

    /// Every rank receives `root`'s value.
    pub fn broadcast<T: Pod>(&self, root: usize, value: T) -> Result<T, FvError> {
        self.check_peer(root)?;
        let bytes = self.broadcast_bytes(root, wire::encode(std::slice::from_ref(&value)), TAG_BROADCAST)?;
        wire::decode_one(&bytes)
    }

    /// Every rank receives `root`'s slice; other ranks' input is ignored.
    pub fn broadcast_vec<T: Pod>(&self, root: usize, values: &[T]) -> Result<Vec<T>, FvError> {
        self.check_peer(root)?;
        let bytes = self.broadcast_bytes(root, wire::encode(values), TAG_BROADCAST)?;
        wire::decode(&bytes)
    }

    /// Rank `p` receives `values[p]` from `root`.
    pub fn scatter<T: Pod>(&self, root: usize, values: &[T]) -> Result<T, FvError> {
        self.check_peer(root)?;
        if self.rank() != root {
            return wire::decode_one(&self.recv_bytes(root, TAG_SCATTER)?);
        }
        if values.len() != self.size() {
            return Err(FvError::ShapeMismatch {
                op: "scatter",
                lhs: values.len(),
                rhs: self.size(),
            });
        }
        for (p, v) in values.iter().enumerate().filter(|(p, _)| *p != root) {
            self.comm
                .isend(p, TAG_SCATTER, wire::encode(std::slice::from_ref(v)))
                .wait();
        }
        Ok(values[root])
    }

    /// One value per rank on `root`, in rank order; empty elsewhere.
    pub fn gather<T: Pod>(&self, root: usize, value: T) -> Result<Vec<T>, FvError> {
        self.check_peer(root)?;
        self.gather_bytes(root, wire::encode(std::slice::from_ref(&value)), TAG_GATHER)?
            .iter()
            .map(|b| wire::decode_one(b))
            .collect()
    }

    /// Variable-length gather: every rank's slice concatenated in rank order on
    /// `root`; empty elsewhere.
    pub fn gatherv<T: Pod>(&self, root: usize, values: &[T]) -> Result<Vec<T>, FvError> {
        self.check_peer(root)?;
        let mut out = Vec::new();
        for b in self.gather_bytes(root, wire::encode(values), TAG_GATHER)? {
            out.extend(wire::decode::<T>(&b)?);
        }
        Ok(out)
    }

    /// One value per rank on every rank.
    pub fn all_gather<T: Pod>(&self, value: T) -> Result<Vec<T>, FvError> {
        let main = self.main_proc_no();
        let gathered = self.gather(main, value)?;
        let all = self.broadcast_vec(main, &gathered)?;
        if all.len() != self.size() {
            return Err(FvError::ShapeMismatch {
                op: "all_gather",
                lhs: all.len(),
                rhs: self.size(),
            });
        }
        Ok(all)
    }

    /// Every rank's slice concatenated in rank order, on every rank.
    pub fn all_gatherv<T: Pod>(&self, values: &[T]) -> Result<Vec<T>, FvError> {
        let main = self.main_proc_no();
        let gathered = self.gatherv(main, values)?;
        self.broadcast_vec(main, &gathered)
    }

    /// Reduce over all ranks in rank order; every rank gets the same result.
    pub fn all_reduce<T: Reducible>(&self, value: T, op: ReduceOp) -> Result<T, FvError> {
        let main = self.main_proc_no();
        let gathered = self.gather(main, value)?;
        let reduced = gathered
            .into_iter()
            .reduce(|a, b| a.combine(b, op))
            .unwrap_or(value);
        self.broadcast(main, reduced)
    }

    pub fn sum<T: Reducible>(&self, value: T) -> Result<T, FvError> {
        self.all_reduce(value, ReduceOp::Sum)
    }

    pub fn min<T: Reducible>(&self, value: T) -> Result<T, FvError> {
        self.all_reduce(value, ReduceOp::Min)
    }

    pub fn max<T: Reducible>(&self, value: T) -> Result<T, FvError> {
        self.all_reduce(value, ReduceOp::Max)
    }

    /// Element-wise sum of equal-length slices across ranks.
    pub fn sum_vector<T: Reducible>(&self, values: &[T]) -> Result<Vec<T>, FvError> {
        let main = self.main_proc_no();
        let gathered = self.gather_bytes(main, wire::encode(values), TAG_GATHER)?;
        let mut acc = values.to_vec();
        for (_, b) in gathered.iter().enumerate().filter(|&(p, _)| p != main) {
            let other = wire::decode_exact::<T>(b, acc.len())?;
            for (a, o) in acc.iter_mut().zip(other) {
                *a = a.combine(o, ReduceOp::Sum);
            }
        }
        self.broadcast_vec(main, &acc)
    }

    /// Print on the main rank only. Returns the number of bytes written there,
    /// zero on every other rank.
    pub fn printf(&self, args: fmt::Arguments<'_>) -> usize {
        if !self.is_main_proc() {
            return 0;
        }
        let text = args.to_string();
        let mut out = std::io::stdout().lock();
        match out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
            Ok(()) => text.len(),
            Err(_) => 0,
        }
    }
}

impl<C: Communicator> fmt::Debug for CommContext<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommContext")
            .field("rank", &self.rank())
            .field("size", &self.size())
            .finish()
    }
}

/// `log::info!` on the main rank only.
#[macro_export]
macro_rules! main_info {
    ($comm:expr, $($arg:tt)+) => {
        if $comm.is_main_proc() {
            log::info!($($arg)+);
        }
    };
}
