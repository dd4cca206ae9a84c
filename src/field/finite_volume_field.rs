//! Cell-, face- and node-centred fields with boundary conditions and history.
//!
//! The cell array covers every local cell (owned and ghost); ghost entries are
//! refreshed by [`FiniteVolumeField::send_messages`]. Face values are derived
//! data, recomputed by [`FiniteVolumeField::interpolate_faces`].
//!
//! Combining two fields that belong to different grids panics through the
//! operators and returns [`FvError::GridMismatch`] through the `try_*` methods.

use crate::algs::communicator::Communicator;
use crate::algs::context::CommContext;
use crate::config::Input;
use crate::field::boundary::{unspecified, BoundaryCondition, BoundaryType};
use crate::field::value::FieldValue;
use crate::geometry::Vector2D;
use crate::mesh_error::FvError;
use crate::topology::{Face, FiniteVolumeGrid2D};
use std::collections::VecDeque;
use std::ops::{AddAssign, DivAssign, Index, IndexMut, MulAssign, SubAssign};

/// A saved state of a field.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSnapshot<T> {
    pub time_step: f64,
    pub cells: Vec<T>,
    pub faces: Vec<T>,
}

impl<T: Copy> Index<usize> for FieldSnapshot<T> {
    type Output = T;
    fn index(&self, cell: usize) -> &T {
        &self.cells[cell]
    }
}

#[derive(Clone, Debug)]
pub struct FiniteVolumeField<T: FieldValue> {
    name: String,
    grid_id: u64,
    patch_names: Vec<String>,
    cells: Vec<T>,
    faces: Vec<T>,
    nodes: Vec<T>,
    boundaries: Vec<Option<BoundaryCondition<T>>>,
    history: VecDeque<FieldSnapshot<T>>,
    history_capacity: Option<usize>,
    prev_iteration: Option<FieldSnapshot<T>>,
}

pub type ScalarFiniteVolumeField = FiniteVolumeField<f64>;
pub type VectorFiniteVolumeField = FiniteVolumeField<Vector2D>;

impl<T: FieldValue> FiniteVolumeField<T> {
    /// Zero field with no boundary conditions.
    pub fn new(grid: &FiniteVolumeGrid2D, name: &str) -> Self {
        Self::with_value(grid, name, T::default())
    }

    pub fn with_value(grid: &FiniteVolumeGrid2D, name: &str, value: T) -> Self {
        Self {
            name: name.to_string(),
            grid_id: grid.id(),
            patch_names: grid.patches().iter().map(|p| p.name().to_string()).collect(),
            cells: vec![value; grid.n_cells()],
            faces: vec![value; grid.faces().len()],
            nodes: Vec::new(),
            boundaries: vec![None; grid.patches().len()],
            history: VecDeque::new(),
            history_capacity: None,
            prev_iteration: None,
        }
    }

    /// Zero field with boundary conditions read from
    /// `Boundaries.<name>.<patch>.{type, value}`. Patches without an entry stay
    /// unspecified; an unrecognised type is an error.
    pub fn from_input(input: &Input, grid: &FiniteVolumeGrid2D, name: &str) -> Result<Self, FvError> {
        let mut field = Self::new(grid, name);
        let Some(table) = input.child_optional(&format!("Boundaries.{name}")) else {
            return Ok(field);
        };
        for patch in grid.patches() {
            let Some(entry) = table.child_optional(patch.name()) else {
                continue;
            };
            let kind: BoundaryType = entry.get::<String>("type")?.parse()?;
            let value = entry.get_or("value", T::default())?;
            field.boundaries[patch.id()] = Some(BoundaryCondition::new(kind, value));
        }
        Ok(field)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn grid_id(&self) -> u64 {
        self.grid_id
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [T] {
        &mut self.cells
    }

    pub fn faces(&self) -> &[T] {
        &self.faces
    }

    pub fn faces_mut(&mut self) -> &mut [T] {
        &mut self.faces
    }

    pub fn nodes(&self) -> &[T] {
        &self.nodes
    }

    pub fn has_nodal_values(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn face_value(&self, face: usize) -> T {
        self.faces[face]
    }

    // ---- boundaries ----

    pub fn set_boundary(
        &mut self,
        grid: &FiniteVolumeGrid2D,
        patch: &str,
        kind: BoundaryType,
        value: T,
    ) -> Result<(), FvError> {
        self.check_grid(grid)?;
        let p = grid.patch_by_name(patch).ok_or_else(|| FvError::MissingConfigKey {
            component: "FiniteVolumeField",
            key: format!("Boundaries.{}.{}", self.name, patch),
        })?;
        self.boundaries[p.id()] = Some(BoundaryCondition::new(kind, value));
        Ok(())
    }

    /// Apply the same condition to every patch.
    pub fn set_all_boundaries(&mut self, kind: BoundaryType, value: T) {
        for b in &mut self.boundaries {
            *b = Some(BoundaryCondition::new(kind, value));
        }
    }

    pub fn copy_boundary_types<U: FieldValue>(&mut self, other: &FiniteVolumeField<U>) {
        for (mine, theirs) in self.boundaries.iter_mut().zip(&other.boundaries) {
            *mine = theirs.map(|b| BoundaryCondition::new(b.kind, T::default()));
        }
    }

    pub fn boundary_condition(&self, patch: usize) -> Result<BoundaryCondition<T>, FvError> {
        self.boundaries
            .get(patch)
            .copied()
            .flatten()
            .ok_or_else(|| {
                let name = self.patch_names.get(patch).map(String::as_str).unwrap_or("?");
                unspecified(&self.name, name)
            })
    }

    pub fn boundary_type(&self, patch: usize) -> Result<BoundaryType, FvError> {
        self.boundary_condition(patch).map(|b| b.kind)
    }

    pub fn boundary_ref_value(&self, patch: usize) -> Result<T, FvError> {
        self.boundary_condition(patch).map(|b| b.value)
    }

    /// Condition of the patch a boundary face belongs to.
    pub fn boundary_info(&self, face: &Face) -> Result<BoundaryCondition<T>, FvError> {
        match face.patch() {
            Some(p) => self.boundary_condition(p),
            None => Err(unspecified(&self.name, "<interior face>")),
        }
    }

    // ---- initialisation ----

    /// Every cell, face and node.
    pub fn fill(&mut self, value: T) {
        self.cells.fill(value);
        self.faces.fill(value);
        self.nodes.fill(value);
    }

    /// The cells of a group; faces and nodes are left alone.
    pub fn fill_interior<I: IntoIterator<Item = usize>>(&mut self, value: T, cells: I) {
        for c in cells {
            self.cells[c] = value;
        }
    }

    // ---- faces and nodes ----

    /// Volume-weighted linear interpolation to interior faces, then boundary faces.
    pub fn interpolate_faces(&mut self, grid: &FiniteVolumeGrid2D) -> Result<(), FvError> {
        self.interpolate_faces_with(grid, |face| grid.face_volume_weight(face.id()))
    }

    /// Interior faces get `alpha(face) * φ_l + (1 - alpha(face)) * φ_r`.
    pub fn interpolate_faces_with<F>(&mut self, grid: &FiniteVolumeGrid2D, alpha: F) -> Result<(), FvError>
    where
        F: Fn(&Face) -> f64,
    {
        self.check_grid(grid)?;
        for face in grid.interior_faces() {
            if let Some(r) = face.r_cell() {
                let a = alpha(face);
                self.faces[face.id()] = self.cells[face.l_cell()] * a + self.cells[r] * (1.0 - a);
            }
        }
        self.set_boundary_faces(grid)
    }

    /// Apply the boundary table to boundary faces.
    pub fn set_boundary_faces(&mut self, grid: &FiniteVolumeGrid2D) -> Result<(), FvError> {
        self.check_grid(grid)?;
        for face in grid.boundary_faces() {
            let bc = self.boundary_info(face)?;
            let inner = self.cells[face.l_cell()];
            self.faces[face.id()] = match bc.kind {
                BoundaryType::Fixed => bc.value,
                BoundaryType::NormalGradient | BoundaryType::Outflow => inner,
                BoundaryType::Symmetry => inner.symmetry_value(face.norm().unit_vec()),
            };
        }
        Ok(())
    }

    pub fn init_nodes(&mut self, grid: &FiniteVolumeGrid2D) {
        self.nodes = vec![T::default(); grid.nodes().len()];
    }

    /// Inverse-distance average of the cells around each node.
    pub fn interpolate_nodes(&mut self, grid: &FiniteVolumeGrid2D) -> Result<(), FvError> {
        self.check_grid(grid)?;
        if self.nodes.len() != grid.nodes().len() {
            self.init_nodes(grid);
        }
        for (n, pt) in grid.nodes().iter().enumerate() {
            let mut sum = T::default();
            let mut weights = 0.0;
            for &c in grid.node_cells(n) {
                let w = 1.0 / (grid.cell(c).centroid() - *pt).mag().max(f64::MIN_POSITIVE);
                sum += self.cells[c] * w;
                weights += w;
            }
            if weights > 0.0 {
                self.nodes[n] = sum / weights;
            }
        }
        Ok(())
    }

    // ---- parallel ----

    /// Refresh ghost cell values from their owners.
    pub fn send_messages<C: Communicator>(
        &mut self,
        grid: &FiniteVolumeGrid2D,
        comm: &CommContext<C>,
    ) -> Result<(), FvError> {
        self.check_grid(grid)?;
        grid.send_messages(comm, &mut self.cells)
    }

    // ---- history ----

    fn snapshot(&self, time_step: f64) -> FieldSnapshot<T> {
        FieldSnapshot {
            time_step,
            cells: self.cells.clone(),
            faces: self.faces.clone(),
        }
    }

    /// Push the current state, evicting the oldest snapshot once the history
    /// is full. The first call fixes the capacity at `n`; later values of `n`
    /// are ignored.
    pub fn save_previous_time_step(&mut self, time_step: f64, n: usize) {
        let capacity = *self.history_capacity.get_or_insert(n);
        if capacity != n {
            log::debug!("{}: history capacity stays at {capacity} (asked for {n})", self.name);
        }
        self.history.push_front(self.snapshot(time_step));
        self.history.truncate(capacity);
    }

    pub fn history_capacity(&self) -> Option<usize> {
        self.history_capacity
    }

    /// The `i`-th most recent snapshot, `0` being the latest.
    pub fn old_field(&self, i: usize) -> Result<&FieldSnapshot<T>, FvError> {
        self.history.get(i).ok_or(FvError::HistoryOutOfRange {
            index: i,
            len: self.history.len(),
        })
    }

    pub fn old_time_step(&self, i: usize) -> Result<f64, FvError> {
        self.old_field(i).map(|s| s.time_step)
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn save_previous_iteration(&mut self) {
        self.prev_iteration = Some(self.snapshot(0.0));
    }

    pub fn prev_iteration(&self) -> Option<&FieldSnapshot<T>> {
        self.prev_iteration.as_ref()
    }

    // ---- arithmetic ----

    fn check_grid(&self, grid: &FiniteVolumeGrid2D) -> Result<(), FvError> {
        if grid.id() != self.grid_id {
            return Err(FvError::GridMismatch {
                lhs: self.name.clone(),
                rhs: format!("<grid {}>", grid.id()),
            });
        }
        Ok(())
    }

    fn check_same_grid<U: FieldValue>(&self, other: &FiniteVolumeField<U>) -> Result<(), FvError> {
        if self.grid_id != other.grid_id || self.cells.len() != other.cells.len() {
            return Err(FvError::GridMismatch {
                lhs: self.name.clone(),
                rhs: other.name.clone(),
            });
        }
        Ok(())
    }

    pub fn try_add_assign(&mut self, rhs: &Self) -> Result<(), FvError> {
        self.check_same_grid(rhs)?;
        self.cells.iter_mut().zip(&rhs.cells).for_each(|(a, b)| *a += *b);
        self.faces.iter_mut().zip(&rhs.faces).for_each(|(a, b)| *a += *b);
        Ok(())
    }

    pub fn try_sub_assign(&mut self, rhs: &Self) -> Result<(), FvError> {
        self.check_same_grid(rhs)?;
        self.cells.iter_mut().zip(&rhs.cells).for_each(|(a, b)| *a -= *b);
        self.faces.iter_mut().zip(&rhs.faces).for_each(|(a, b)| *a -= *b);
        Ok(())
    }

    pub fn try_mul_assign_field(&mut self, rhs: &ScalarFiniteVolumeField) -> Result<(), FvError> {
        self.check_same_grid(rhs)?;
        self.cells.iter_mut().zip(&rhs.cells).for_each(|(a, b)| *a = *a * *b);
        self.faces.iter_mut().zip(&rhs.faces).for_each(|(a, b)| *a = *a * *b);
        Ok(())
    }

    pub fn try_div_assign_field(&mut self, rhs: &ScalarFiniteVolumeField) -> Result<(), FvError> {
        self.check_same_grid(rhs)?;
        self.cells.iter_mut().zip(&rhs.cells).for_each(|(a, b)| *a = *a / *b);
        self.faces.iter_mut().zip(&rhs.faces).for_each(|(a, b)| *a = *a / *b);
        Ok(())
    }
}

impl<T: FieldValue> Index<usize> for FiniteVolumeField<T> {
    type Output = T;
    fn index(&self, cell: usize) -> &T {
        &self.cells[cell]
    }
}

impl<T: FieldValue> IndexMut<usize> for FiniteVolumeField<T> {
    fn index_mut(&mut self, cell: usize) -> &mut T {
        &mut self.cells[cell]
    }
}

macro_rules! panicking_field_op {
    ($trait:ident, $method:ident, $rhs:ty, $try:ident) => {
        impl<T: FieldValue> $trait<$rhs> for FiniteVolumeField<T> {
            fn $method(&mut self, rhs: $rhs) {
                if let Err(e) = self.$try(rhs) {
                    panic!("{e}");
                }
            }
        }
    };
}

panicking_field_op!(AddAssign, add_assign, &FiniteVolumeField<T>, try_add_assign);
panicking_field_op!(SubAssign, sub_assign, &FiniteVolumeField<T>, try_sub_assign);
panicking_field_op!(MulAssign, mul_assign, &ScalarFiniteVolumeField, try_mul_assign_field);
panicking_field_op!(DivAssign, div_assign, &ScalarFiniteVolumeField, try_div_assign_field);

impl<T: FieldValue> MulAssign<f64> for FiniteVolumeField<T> {
    fn mul_assign(&mut self, rhs: f64) {
        self.cells.iter_mut().for_each(|a| *a = *a * rhs);
        self.faces.iter_mut().for_each(|a| *a = *a * rhs);
    }
}

impl<T: FieldValue> DivAssign<f64> for FiniteVolumeField<T> {
    fn div_assign(&mut self, rhs: f64) {
        self.cells.iter_mut().for_each(|a| *a = *a / rhs);
        self.faces.iter_mut().for_each(|a| *a = *a / rhs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::topology::{CellGroup, PartitionedMesh};
    use serde_json::json;

    fn grid(nx: usize) -> FiniteVolumeGrid2D {
        let mesh = PartitionedMesh::rectilinear(nx, 1, 1.0, 1.0);
        FiniteVolumeGrid2D::from_partition(&mesh, &CommContext::new(NoComm)).unwrap()
    }

    #[test]
    fn boundaries_from_input() {
        let g = grid(2);
        let input = Input::from_value(json!({
            "Boundaries": { "u": {
                "x-": { "type": "fixed", "value": [1.0, 0.0] },
                "x+": { "type": "normal_gradient" },
                "y-": { "type": "symmetry" },
                "y+": { "type": "symmetry" }
            }}
        }));
        let u = VectorFiniteVolumeField::from_input(&input, &g, "u").unwrap();
        let inlet = g.patch_by_name("x-").unwrap().id();
        assert_eq!(u.boundary_type(inlet).unwrap(), BoundaryType::Fixed);
        assert_eq!(u.boundary_ref_value(inlet).unwrap(), Vector2D::new(1.0, 0.0));

        let bad = Input::from_value(json!({ "Boundaries": { "p": { "x-": { "type": "partial_slip" } } } }));
        assert!(matches!(
            ScalarFiniteVolumeField::from_input(&bad, &g, "p"),
            Err(FvError::UnknownBoundaryType { .. })
        ));
    }

    #[test]
    fn unspecified_boundary_is_reported_on_use() {
        let g = grid(2);
        let mut p = ScalarFiniteVolumeField::new(&g, "p");
        assert!(matches!(
            p.interpolate_faces(&g),
            Err(FvError::UnknownBoundaryType { .. })
        ));
    }

    #[test]
    fn face_interpolation_and_boundaries() {
        let g = grid(2);
        let mut p = ScalarFiniteVolumeField::new(&g, "p");
        p.set_all_boundaries(BoundaryType::NormalGradient, 0.0);
        p.set_boundary(&g, "x-", BoundaryType::Fixed, 5.0).unwrap();
        p[0] = 1.0;
        p[1] = 3.0;
        p.interpolate_faces(&g).unwrap();
        let shared = g.cell(0).interior_links()[0].face;
        assert_eq!(p.face_value(shared), 2.0);
        let west = g.patch_by_name("x-").unwrap().faces()[0];
        assert_eq!(p.face_value(west), 5.0);
        let east = g.patch_by_name("x+").unwrap().faces()[0];
        assert_eq!(p.face_value(east), 3.0);
    }

    #[test]
    fn history_is_bounded() {
        let g = grid(1);
        let mut p = ScalarFiniteVolumeField::new(&g, "p");
        for step in 0..4 {
            p.fill(step as f64);
            p.save_previous_time_step(0.1 * step as f64, 2);
        }
        assert_eq!(p.history_len(), 2);
        assert_eq!(p.old_field(0).unwrap()[0], 3.0);
        assert_eq!(p.old_field(1).unwrap()[0], 2.0);
        assert!(matches!(
            p.old_field(2),
            Err(FvError::HistoryOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn history_capacity_is_fixed_by_the_first_save() {
        let g = grid(1);
        let mut p = ScalarFiniteVolumeField::new(&g, "p");
        assert_eq!(p.history_capacity(), None);
        p.save_previous_time_step(0.1, 2);
        for step in 1..5 {
            p.fill(step as f64);
            p.save_previous_time_step(0.1, 4);
        }
        assert_eq!(p.history_capacity(), Some(2));
        assert_eq!(p.history_len(), 2);
        p.save_previous_time_step(0.1, 1);
        assert_eq!(p.history_len(), 2);
        assert_eq!(p.old_field(1).unwrap()[0], 4.0);
    }

    #[test]
    fn fill_interior_touches_only_the_group() {
        let g = grid(4);
        let mut p = ScalarFiniteVolumeField::with_value(&g, "p", 1.0);
        let group: CellGroup = [3, 0].into_iter().collect();
        p.fill_interior(7.0, &group);
        assert_eq!((p[0], p[1], p[2], p[3]), (7.0, 1.0, 1.0, 7.0));
        p.fill_interior(0.0, g.local_cells());
        assert!(g.local_cells().all(|c| p[c] == 0.0));
    }

    #[test]
    fn arithmetic_across_grids_fails() {
        let (g1, g2) = (grid(2), grid(2));
        let mut a = ScalarFiniteVolumeField::with_value(&g1, "a", 1.0);
        let b = ScalarFiniteVolumeField::with_value(&g2, "b", 1.0);
        assert!(matches!(a.try_add_assign(&b), Err(FvError::GridMismatch { .. })));
        let c = ScalarFiniteVolumeField::with_value(&g1, "c", 2.0);
        a += &c;
        a *= &c;
        a /= 2.0;
        assert_eq!(a.cells(), &[3.0, 3.0]);
    }

    #[test]
    #[should_panic(expected = "Grid mismatch")]
    fn operator_panics_on_mismatch() {
        let (g1, g2) = (grid(1), grid(1));
        let mut a = ScalarFiniteVolumeField::new(&g1, "a");
        a -= &ScalarFiniteVolumeField::new(&g2, "b");
    }
}
