//! One-layer halo exchange plan.
//!
//! Each rank requests its ghost cells from their owners by partitioned-graph
//! id; the owner answers nothing but remembers the request as its send list.
//! Both sides order the lists by global id, so a later exchange packs and
//! unpacks in the same order with no per-message headers.

use crate::algs::communicator::Communicator;
use crate::algs::context::CommContext;
use crate::mesh_error::FvError;
use crate::topology::ownership::CellOwnership;
use bytemuck::Pod;
use hashbrown::HashMap;

const HALO_REQUEST_TAG: u16 = 0x0A00;
const HALO_DATA_TAG: u16 = 0x0A01;

/// Cells exchanged with one neighbour rank.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HaloLink {
    pub rank: usize,
    /// Owned cells whose values the neighbour mirrors.
    pub send: Vec<usize>,
    /// Ghost cells owned by the neighbour.
    pub recv: Vec<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HaloPlan {
    links: Vec<HaloLink>,
}

impl HaloPlan {
    /// Negotiate send lists with every neighbour rank.
    pub fn negotiate<C: Communicator>(
        ownership: &CellOwnership,
        comm: &CommContext<C>,
    ) -> Result<Self, FvError> {
        let local_of_global: HashMap<usize, usize> = ownership
            .owned_cells()
            .filter_map(|c| ownership.entry(c).map(|e| (e.global_id, c)))
            .collect();

        let mut links = Vec::new();
        let mut requests = Vec::new();
        for rank in ownership.neighbor_ranks() {
            let mut recv: Vec<usize> = ownership
                .ghost_cells()
                .filter(|&c| ownership.entry(c).is_some_and(|e| e.owner == rank))
                .collect();
            recv.sort_by_key(|&c| ownership.entry(c).map(|e| e.global_id));
            let wanted: Vec<u64> = recv
                .iter()
                .filter_map(|&c| ownership.entry(c).map(|e| e.global_id as u64))
                .collect();
            comm.isend(rank, &wanted, HALO_REQUEST_TAG)?;
            requests.push(comm.irecv::<u64>(rank, HALO_REQUEST_TAG)?);
            links.push(HaloLink {
                rank,
                send: Vec::new(),
                recv,
            });
        }

        let mut done = comm.wait_all()?;
        for (link, req) in links.iter_mut().zip(requests) {
            let asked = done.take(req)?;
            link.send = asked
                .into_iter()
                .map(|g| {
                    local_of_global.get(&(g as usize)).copied().ok_or_else(|| {
                        FvError::Communication(format!(
                            "rank {} requested cell {g}, which rank {} does not own",
                            link.rank,
                            comm.rank()
                        ))
                    })
                })
                .collect::<Result<_, _>>()?;
        }
        Ok(Self { links })
    }

    pub fn links(&self) -> &[HaloLink] {
        &self.links
    }

    pub fn neighbor_ranks(&self) -> impl Iterator<Item = usize> + '_ {
        self.links.iter().map(|l| l.rank)
    }

    /// Overwrite every ghost entry of `values` with its owner's value.
    pub fn exchange<T: Pod, C: Communicator>(
        &self,
        comm: &CommContext<C>,
        values: &mut [T],
    ) -> Result<(), FvError> {
        let mut requests = Vec::with_capacity(self.links.len());
        for link in &self.links {
            let packed: Vec<T> = link.send.iter().map(|&c| values[c]).collect();
            comm.isend(link.rank, &packed, HALO_DATA_TAG)?;
            requests.push(comm.irecv::<T>(link.rank, HALO_DATA_TAG)?);
        }
        let mut done = comm.wait_all()?;
        for (link, req) in self.links.iter().zip(requests) {
            let got = done.take(req)?;
            if got.len() != link.recv.len() {
                return Err(FvError::Communication(format!(
                    "rank {} sent {} halo values, expected {}",
                    link.rank,
                    got.len(),
                    link.recv.len()
                )));
            }
            for (&c, v) in link.recv.iter().zip(got) {
                values[c] = v;
            }
        }
        Ok(())
    }
}
