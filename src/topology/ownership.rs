//! Ownership metadata for local cells.
//!
//! The [`CellOwnership`] table records, per local cell, the owning rank, whether
//! the cell is a ghost on the current rank and its id in the partitioned graph.

use std::collections::BTreeSet;

#[derive(Copy, Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OwnershipEntry {
    pub owner: usize,
    pub is_ghost: bool,
    pub global_id: usize,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct CellOwnership {
    my_rank: usize,
    entries: Vec<OwnershipEntry>,
}

impl CellOwnership {
    pub fn new(my_rank: usize) -> Self {
        Self {
            my_rank,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append the next local cell; ghostness follows from `owner`.
    pub fn push(&mut self, global_id: usize, owner: usize) -> usize {
        self.entries.push(OwnershipEntry {
            owner,
            is_ghost: owner != self.my_rank,
            global_id,
        });
        self.entries.len() - 1
    }

    pub fn entry(&self, cell: usize) -> Option<OwnershipEntry> {
        self.entries.get(cell).copied()
    }


    pub fn is_ghost(&self, cell: usize) -> Option<bool> {
        self.entry(cell).map(|e| e.is_ghost)
    }

    pub fn is_owned(&self, cell: usize) -> bool {
        self.entry(cell).is_some_and(|e| !e.is_ghost)
    }

    pub fn owned_cells(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.is_ghost)
            .map(|(i, _)| i)
    }

    pub fn ghost_cells(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_ghost)
            .map(|(i, _)| i)
    }

    /// Ranks owning at least one ghost cell, sorted.
    pub fn neighbor_ranks(&self) -> BTreeSet<usize> {
        self.entries
            .iter()
            .filter(|e| e.is_ghost)
            .map(|e| e.owner)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ghosts_follow_owner() {
        let mut own = CellOwnership::new(1);
        own.push(10, 1);
        own.push(11, 0);
        own.push(12, 2);
        assert_eq!(own.owned_cells().collect::<Vec<_>>(), vec![0]);
        assert_eq!(own.ghost_cells().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(own.neighbor_ranks().into_iter().collect::<Vec<_>>(), vec![0, 2]);
        assert!(own.entry(5).is_none());
    }
}
