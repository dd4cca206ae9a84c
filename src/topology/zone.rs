//! Cell groups and mutually exclusive cell zones.
//!
//! A [`ZoneRegistry`] is an arena-style membership table: each local cell maps
//! to at most one [`CellZone`]. Moving a cell between zones is a single table
//! write, and [`ZoneRegistry::reassign`] swaps in a whole new table at once, so
//! zones of one registry can never overlap.
//!
//! A [`CellGroup`] is a plain, sorted, duplicate-free set of cells with no
//! exclusivity guarantee.

use crate::mesh_error::FvError;

/// Handle to a zone within one registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellZone(usize);

impl CellZone {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Membership table mapping every cell to at most one zone.
#[derive(Clone, Debug, Default)]
pub struct ZoneRegistry {
    names: Vec<String>,
    membership: Vec<Option<CellZone>>,
}

impl ZoneRegistry {
    /// Registry over `n_cells` cells, none assigned yet.
    pub fn new(n_cells: usize) -> Self {
        Self {
            names: Vec::new(),
            membership: vec![None; n_cells],
        }
    }

    pub fn n_cells(&self) -> usize {
        self.membership.len()
    }

    /// Register a zone, or return the existing one with that name.
    pub fn add_zone(&mut self, name: &str) -> CellZone {
        if let Some(z) = self.zone(name) {
            return z;
        }
        self.names.push(name.to_string());
        CellZone(self.names.len() - 1)
    }

    pub fn zone(&self, name: &str) -> Option<CellZone> {
        self.names.iter().position(|n| n == name).map(CellZone)
    }

    pub fn name(&self, zone: CellZone) -> &str {
        &self.names[zone.0]
    }

    pub fn zones(&self) -> impl Iterator<Item = CellZone> + '_ {
        (0..self.names.len()).map(CellZone)
    }

    pub fn zone_of(&self, cell: usize) -> Option<CellZone> {
        self.membership.get(cell).copied().flatten()
    }

    /// Move `cell` into `zone`, leaving whatever zone it was in.
    pub fn assign(&mut self, cell: usize, zone: CellZone) -> Result<(), FvError> {
        let slot = self.membership.get_mut(cell).ok_or(FvError::MissingEntity {
            what: "cell",
            index: cell,
        })?;
        *slot = Some(zone);
        Ok(())
    }

    pub fn remove(&mut self, cell: usize) {
        if let Some(slot) = self.membership.get_mut(cell) {
            *slot = None;
        }
    }

    /// Replace the whole membership table.
    pub fn reassign(&mut self, table: Vec<Option<CellZone>>) -> Result<(), FvError> {
        if table.len() != self.membership.len() {
            return Err(FvError::ShapeMismatch {
                op: "zone reassignment",
                lhs: table.len(),
                rhs: self.membership.len(),
            });
        }
        if let Some(bad) = table.iter().flatten().find(|z| z.0 >= self.names.len()) {
            return Err(FvError::MissingEntity {
                what: "zone",
                index: bad.0,
            });
        }
        self.membership = table;
        Ok(())
    }

    pub fn table(&self) -> &[Option<CellZone>] {
        &self.membership
    }

    /// Cells currently in `zone`, ascending.
    pub fn members(&self, zone: CellZone) -> CellGroup {
        CellGroup::from_sorted(
            self.membership
                .iter()
                .enumerate()
                .filter(|(_, z)| **z == Some(zone))
                .map(|(c, _)| c)
                .collect(),
        )
    }

    pub fn count(&self, zone: CellZone) -> usize {
        self.membership.iter().filter(|z| **z == Some(zone)).count()
    }
}

/// Sorted, duplicate-free set of local cell ids.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CellGroup {
    cells: Vec<usize>,
}

impl CellGroup {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_sorted(cells: Vec<usize>) -> Self {
        Self { cells }
    }

    pub fn add(&mut self, cell: usize) -> bool {
        match self.cells.binary_search(&cell) {
            Ok(_) => false,
            Err(pos) => {
                self.cells.insert(pos, cell);
                true
            }
        }
    }

    pub fn remove(&mut self, cell: usize) -> bool {
        match self.cells.binary_search(&cell) {
            Ok(pos) => {
                self.cells.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub fn contains(&self, cell: usize) -> bool {
        self.cells.binary_search(&cell).is_ok()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.cells.iter().copied()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.cells
    }
}

impl FromIterator<usize> for CellGroup {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut cells: Vec<usize> = iter.into_iter().collect();
        cells.sort_unstable();
        cells.dedup();
        Self { cells }
    }
}

impl Extend<usize> for CellGroup {
    fn extend<I: IntoIterator<Item = usize>>(&mut self, iter: I) {
        self.cells.extend(iter);
        self.cells.sort_unstable();
        self.cells.dedup();
    }
}

impl<'a> IntoIterator for &'a CellGroup {
    type Item = usize;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, usize>>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zones_never_overlap() {
        let mut reg = ZoneRegistry::new(4);
        let fluid = reg.add_zone("fluid");
        let solid = reg.add_zone("solid");
        for c in 0..4 {
            reg.assign(c, fluid).unwrap();
        }
        reg.assign(2, solid).unwrap();
        assert_eq!(reg.members(fluid).as_slice(), &[0, 1, 3]);
        assert_eq!(reg.members(solid).as_slice(), &[2]);
        assert_eq!(reg.add_zone("fluid"), fluid);
    }

    #[test]
    fn reassign_checks_shape() {
        let mut reg = ZoneRegistry::new(2);
        let z = reg.add_zone("a");
        assert!(reg.reassign(vec![Some(z)]).is_err());
        reg.reassign(vec![None, Some(z)]).unwrap();
        assert_eq!(reg.zone_of(1), Some(z));
        assert!(reg.reassign(vec![None, Some(CellZone(5))]).is_err());
    }

    #[test]
    fn groups_are_sorted_sets() {
        let mut g: CellGroup = [5, 1, 5, 3].into_iter().collect();
        assert_eq!(g.as_slice(), &[1, 3, 5]);
        assert!(!g.add(3));
        assert!(g.add(2));
        assert!(g.remove(5));
        assert_eq!(g.iter().collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}
