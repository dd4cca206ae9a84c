//! Fixed-shape sparse linear systems built term by term.
//!
//! An [`Equation`] holds one row per active owned cell and component. Each row
//! has a fixed stencil (the cell itself followed by its active face
//! neighbours), so every equation assembled over the same grid ordering has the
//! same shape and terms combine entry by entry.
//!
//! Rows read `A·φ = s`: a discretized term `op(φ)` is stored as `A·φ − s`, and
//! balancing against a right-hand side moves it into `s`.

use crate::algs::communicator::Communicator;
use crate::algs::context::CommContext;
use crate::equation::solver::{CsrMatrix, LinearSolver};
use crate::field::{FieldValue, FiniteVolumeField, ScalarFiniteVolumeField};
use crate::mesh_error::FvError;
use crate::topology::FiniteVolumeGrid2D;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};
use std::sync::Arc;

const MAX_SCHWARZ_SWEEPS: usize = 200;
const INNER_TOL_MARGIN: f64 = 0.1;

/// Sparsity pattern shared by equations over one grid ordering.
#[derive(Debug, PartialEq)]
struct Stencil {
    grid_id: u64,
    row_of: Vec<Option<usize>>,
    row_cells: Vec<usize>,
    row_ptr: Vec<usize>,
    cols: Vec<usize>,
    col_global: Vec<usize>,
    offset: usize,
}

impl Stencil {
    fn build(grid: &FiniteVolumeGrid2D) -> Self {
        let row_cells = grid.local_active_cells().to_vec();
        let mut row_of = vec![None; grid.n_cells()];
        let (mut row_ptr, mut cols, mut col_global) = (vec![0], Vec::new(), Vec::new());
        for (k, &c) in row_cells.iter().enumerate() {
            row_of[c] = Some(k);
            if let Some(g) = grid.global_index(c) {
                cols.push(c);
                col_global.push(g);
            }
            for l in grid.cell(c).interior_links() {
                if let Some(g) = grid.global_index(l.cell) {
                    cols.push(l.cell);
                    col_global.push(g);
                }
            }
            row_ptr.push(cols.len());
        }
        Self {
            grid_id: grid.id(),
            row_of,
            row_cells,
            row_ptr,
            cols,
            col_global,
            offset: grid.active_offset(),
        }
    }

    fn entry(&self, row_cell: usize, col_cell: usize) -> Result<usize, FvError> {
        let k = self.row(row_cell)?;
        (self.row_ptr[k]..self.row_ptr[k + 1])
            .find(|&e| self.cols[e] == col_cell)
            .ok_or(FvError::StencilMiss {
                row: row_cell,
                col: col_cell,
            })
    }

    fn row(&self, cell: usize) -> Result<usize, FvError> {
        self.row_of
            .get(cell)
            .copied()
            .flatten()
            .ok_or(FvError::InactiveCell(cell))
    }
}

/// Result of [`Equation::solve`]. Non-convergence is reported, not raised.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SolveReport {
    /// Global `‖s − A·φ‖₂` after the solve.
    pub residual: f64,
    /// Inner solver iterations summed over all sweeps on this rank.
    pub iterations: usize,
    pub converged: bool,
}

/// Sparse system for a field of `T`.
#[derive(Clone, Debug)]
pub struct Equation<T: FieldValue> {
    name: String,
    stencil: Arc<Stencil>,
    coeffs: Vec<f64>,
    sources: Vec<T>,
}

impl<T: FieldValue> Equation<T> {
    /// Zero system sized to the active cells of `grid`.
    pub fn new(grid: &FiniteVolumeGrid2D, field: &FiniteVolumeField<T>) -> Result<Self, FvError> {
        if field.grid_id() != grid.id() {
            return Err(FvError::GridMismatch {
                lhs: field.name().to_string(),
                rhs: format!("<grid {}>", grid.id()),
            });
        }
        let stencil = Arc::new(Stencil::build(grid));
        Ok(Self {
            name: field.name().to_string(),
            coeffs: vec![0.0; stencil.cols.len() * T::N_COMPONENTS],
            sources: vec![T::default(); stencil.row_cells.len()],
            stencil,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of active cells (rows per component).
    pub fn n_rows(&self) -> usize {
        self.sources.len()
    }

    pub fn n_entries(&self) -> usize {
        self.stencil.cols.len()
    }

    /// Local cells owning the rows, in row order.
    pub fn row_cells(&self) -> &[usize] {
        &self.stencil.row_cells
    }

    /// Local cells of the stencil of `row_cell`.
    pub fn stencil_of(&self, row_cell: usize) -> Result<&[usize], FvError> {
        let k = self.stencil.row(row_cell)?;
        Ok(&self.stencil.cols[self.stencil.row_ptr[k]..self.stencil.row_ptr[k + 1]])
    }

    pub fn same_shape(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.stencil, &other.stencil) || self.stencil == other.stencil
    }

    fn check_shape(&self, other: &Self, op: &'static str) -> Result<(), FvError> {
        if self.same_shape(other) {
            Ok(())
        } else {
            Err(FvError::ShapeMismatch {
                op,
                lhs: self.n_entries(),
                rhs: other.n_entries(),
            })
        }
    }

    // ---- assembly ----

    /// Accumulate `coeff` at `(row_cell, col_cell)` in every component row.
    pub fn add_coeff(&mut self, row_cell: usize, col_cell: usize, coeff: f64) -> Result<(), FvError> {
        let e = self.stencil.entry(row_cell, col_cell)?;
        for c in 0..T::N_COMPONENTS {
            self.coeffs[e * T::N_COMPONENTS + c] += coeff;
        }
        Ok(())
    }

    /// Accumulate into a single component row.
    pub fn add_component(
        &mut self,
        row_cell: usize,
        col_cell: usize,
        component: usize,
        coeff: f64,
    ) -> Result<(), FvError> {
        let e = self.stencil.entry(row_cell, col_cell)?;
        self.coeffs[e * T::N_COMPONENTS + component] += coeff;
        Ok(())
    }

    /// Overwrite the coefficient at `(row_cell, col_cell)` in every component row.
    pub fn set(&mut self, row_cell: usize, col_cell: usize, coeff: f64) -> Result<(), FvError> {
        let e = self.stencil.entry(row_cell, col_cell)?;
        for c in 0..T::N_COMPONENTS {
            self.coeffs[e * T::N_COMPONENTS + c] = coeff;
        }
        Ok(())
    }

    pub fn add_source(&mut self, cell: usize, value: T) -> Result<(), FvError> {
        let k = self.stencil.row(cell)?;
        self.sources[k] += value;
        Ok(())
    }

    pub fn set_source(&mut self, cell: usize, value: T) -> Result<(), FvError> {
        let k = self.stencil.row(cell)?;
        self.sources[k] = value;
        Ok(())
    }

    /// Coefficient of component `component` at `(row_cell, col_cell)`.
    pub fn coeff(&self, row_cell: usize, col_cell: usize, component: usize) -> Result<f64, FvError> {
        let e = self.stencil.entry(row_cell, col_cell)?;
        Ok(self.coeffs[e * T::N_COMPONENTS + component])
    }

    pub fn source(&self, cell: usize) -> Result<T, FvError> {
        Ok(self.sources[self.stencil.row(cell)?])
    }

    /// Sources in row order.
    pub fn sources(&self) -> &[T] {
        &self.sources
    }

    /// Zero every coefficient and source.
    pub fn clear(&mut self) {
        self.coeffs.fill(0.0);
        self.sources.fill(T::default());
    }

    /// Zero the rows of the given cells. Inactive cells are skipped.
    pub fn clear_rows<I: IntoIterator<Item = usize>>(&mut self, cells: I) {
        let n = T::N_COMPONENTS;
        for cell in cells {
            if let Ok(k) = self.stencil.row(cell) {
                let (a, b) = (self.stencil.row_ptr[k], self.stencil.row_ptr[k + 1]);
                self.coeffs[a * n..b * n].fill(0.0);
                self.sources[k] = T::default();
            }
        }
    }

    /// `(row, col, coeff)` with global indices; component `c` of cell `g` is
    /// index `N·g + c`.
    pub fn triplets(&self) -> Vec<(usize, usize, f64)> {
        let s = &self.stencil;
        let n = T::N_COMPONENTS;
        let mut out = Vec::with_capacity(self.coeffs.len());
        for k in 0..s.row_cells.len() {
            let g_row = s.offset + k;
            for e in s.row_ptr[k]..s.row_ptr[k + 1] {
                for c in 0..n {
                    out.push((n * g_row + c, n * s.col_global[e] + c, self.coeffs[e * n + c]));
                }
            }
        }
        out
    }

    /// Sum of all coefficients in each row, by component.
    pub fn row_sums(&self) -> Vec<f64> {
        let s = &self.stencil;
        let n = T::N_COMPONENTS;
        let mut out = vec![0.0; s.row_cells.len() * n];
        for k in 0..s.row_cells.len() {
            for e in s.row_ptr[k]..s.row_ptr[k + 1] {
                for c in 0..n {
                    out[k * n + c] += self.coeffs[e * n + c];
                }
            }
        }
        out
    }

    // ---- algebra ----

    pub fn try_add_assign(&mut self, rhs: &Self) -> Result<(), FvError> {
        self.check_shape(rhs, "equation +")?;
        self.coeffs.iter_mut().zip(&rhs.coeffs).for_each(|(a, b)| *a += b);
        self.sources.iter_mut().zip(&rhs.sources).for_each(|(a, b)| *a += *b);
        Ok(())
    }

    pub fn try_sub_assign(&mut self, rhs: &Self) -> Result<(), FvError> {
        self.check_shape(rhs, "equation -")?;
        self.coeffs.iter_mut().zip(&rhs.coeffs).for_each(|(a, b)| *a -= b);
        self.sources.iter_mut().zip(&rhs.sources).for_each(|(a, b)| *a -= *b);
        Ok(())
    }

    /// Scale each row by the scalar field value of its cell.
    pub fn try_mul_field(&mut self, rhs: &ScalarFiniteVolumeField) -> Result<(), FvError> {
        self.scale_rows(rhs, |a, f| a * f, "equation * field")
    }

    pub fn try_div_field(&mut self, rhs: &ScalarFiniteVolumeField) -> Result<(), FvError> {
        self.scale_rows(rhs, |a, f| a / f, "equation / field")
    }

    fn scale_rows(
        &mut self,
        rhs: &ScalarFiniteVolumeField,
        op: impl Fn(f64, f64) -> f64,
        name: &'static str,
    ) -> Result<(), FvError> {
        if rhs.grid_id() != self.stencil.grid_id {
            return Err(FvError::GridMismatch {
                lhs: self.name.clone(),
                rhs: rhs.name().to_string(),
            });
        }
        if rhs.len() != self.stencil.row_of.len() {
            return Err(FvError::ShapeMismatch {
                op: name,
                lhs: self.stencil.row_of.len(),
                rhs: rhs.len(),
            });
        }
        let n = T::N_COMPONENTS;
        let s = Arc::clone(&self.stencil);
        for (k, &cell) in s.row_cells.iter().enumerate() {
            let f = rhs[cell];
            for e in s.row_ptr[k]..s.row_ptr[k + 1] {
                for c in 0..n {
                    self.coeffs[e * n + c] = op(self.coeffs[e * n + c], f);
                }
            }
            let src = self.sources[k];
            let mut scaled = src;
            for c in 0..n {
                scaled.set_component(c, op(src.component(c), f));
            }
            self.sources[k] = scaled;
        }
        Ok(())
    }

    // ---- balance ----

    /// `op(φ) == value` in every row.
    pub fn equate_value(&mut self, value: T) -> &mut Self {
        self.sources.iter_mut().for_each(|s| *s += value);
        self
    }

    /// `op(φ) == rhs` cell by cell.
    pub fn equate_field(&mut self, rhs: &FiniteVolumeField<T>) -> Result<&mut Self, FvError> {
        if rhs.grid_id() != self.stencil.grid_id {
            return Err(FvError::GridMismatch {
                lhs: self.name.clone(),
                rhs: rhs.name().to_string(),
            });
        }
        for (k, &cell) in self.stencil.row_cells.iter().enumerate() {
            self.sources[k] += rhs[cell];
        }
        Ok(self)
    }

    /// `lhs == rhs` between two operators: `A_l − A_r` and `s_l − s_r`.
    pub fn equate(&mut self, rhs: &Self) -> Result<&mut Self, FvError> {
        self.try_sub_assign(rhs)?;
        Ok(self)
    }

    // ---- solve ----

    /// Solve for `field` and write the result into its owned active cells.
    ///
    /// Each rank solves its own block; couplings to ghost cells use the current
    /// ghost values and are refreshed by a halo exchange between sweeps until
    /// the global residual meets the solver tolerance or the sweep limit.
    pub fn solve<C: Communicator>(
        &self,
        grid: &FiniteVolumeGrid2D,
        field: &mut FiniteVolumeField<T>,
        comm: &CommContext<C>,
        solver: &dyn LinearSolver,
        tol: f64,
    ) -> Result<SolveReport, FvError> {
        let s = &self.stencil;
        if field.grid_id() != s.grid_id || grid.id() != s.grid_id {
            return Err(FvError::GridMismatch {
                lhs: self.name.clone(),
                rhs: field.name().to_string(),
            });
        }
        let n = T::N_COMPONENTS;
        let n_rows = s.row_cells.len() * n;

        // local block, ghost entries split off
        let mut a = CsrMatrix {
            row_ptr: vec![0],
            ..Default::default()
        };
        let mut ghost_terms: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n_rows];
        for k in 0..s.row_cells.len() {
            for c in 0..n {
                for e in s.row_ptr[k]..s.row_ptr[k + 1] {
                    let v = self.coeffs[e * n + c];
                    match s.row_of[s.cols[e]] {
                        Some(local) => {
                            a.cols.push(local * n + c);
                            a.vals.push(v);
                        }
                        None => ghost_terms[k * n + c].push((s.cols[e], v)),
                    }
                }
                a.row_ptr.push(a.cols.len());
            }
        }
        let has_ghosts = comm.max(ghost_terms.iter().map(Vec::len).sum::<usize>())? > 0;

        let mut x: Vec<f64> = (0..n_rows)
            .map(|i| field[s.row_cells[i / n]].component(i % n))
            .collect();
        let mut b = vec![0.0; n_rows];
        let b_norm = comm
            .sum(self.sources.iter().map(|v| (0..n).map(|c| v.component(c).powi(2)).sum::<f64>()).sum::<f64>())?
            .sqrt()
            .max(f64::MIN_POSITIVE);

        let mut iterations = 0;
        let mut residual = f64::INFINITY;
        for _sweep in 0..MAX_SCHWARZ_SWEEPS {
            for (i, bi) in b.iter_mut().enumerate() {
                let ghost: f64 = ghost_terms[i]
                    .iter()
                    .map(|&(cell, v)| v * field[cell].component(i % n))
                    .sum();
                *bi = self.sources[i / n].component(i % n) - ghost;
            }
            // the local block must beat the global target with some margin
            let b_local = b.iter().map(|v| v * v).sum::<f64>().sqrt();
            let local_tol = if b_local > 0.0 {
                INNER_TOL_MARGIN * tol * b_norm / b_local
            } else {
                tol
            };
            let local = solver.solve(&a, &b, &mut x, local_tol);
            iterations += local.iterations;
            for (i, xi) in x.iter().enumerate() {
                field[s.row_cells[i / n]].set_component(i % n, *xi);
            }
            if has_ghosts {
                field.send_messages(grid, comm)?;
            }
            let previous = residual;
            residual = self.global_residual(field, comm)?;
            if !has_ghosts || residual <= tol * b_norm {
                break;
            }
            if residual >= previous {
                log::debug!("{}: sweeps stalled at residual {:.3e}", self.name, residual);
                break;
            }
        }
        let converged = residual <= tol * b_norm;
        if !converged {
            log::warn!(
                "{}: solve stopped at residual {:.3e} (tolerance {:.3e})",
                self.name,
                residual,
                tol * b_norm
            );
        } else {
            log::debug!("{}: solved in {} iterations", self.name, iterations);
        }
        Ok(SolveReport {
            residual,
            iterations,
            converged,
        })
    }

    /// Global `‖s − A·φ‖₂` using the field's current cell values.
    pub fn global_residual<C: Communicator>(
        &self,
        field: &FiniteVolumeField<T>,
        comm: &CommContext<C>,
    ) -> Result<f64, FvError> {
        let s = &self.stencil;
        let n = T::N_COMPONENTS;
        let mut sq = 0.0;
        for k in 0..s.row_cells.len() {
            for c in 0..n {
                let ax: f64 = (s.row_ptr[k]..s.row_ptr[k + 1])
                    .map(|e| self.coeffs[e * n + c] * field[s.cols[e]].component(c))
                    .sum();
                sq += (self.sources[k].component(c) - ax).powi(2);
            }
        }
        Ok(comm.sum(sq)?.sqrt())
    }
}

macro_rules! panicking_equation_op {
    ($trait:ident, $method:ident, $try:ident) => {
        impl<T: FieldValue> $trait<&Equation<T>> for Equation<T> {
            fn $method(&mut self, rhs: &Equation<T>) {
                if let Err(e) = self.$try(rhs) {
                    panic!("{e}");
                }
            }
        }
        impl<T: FieldValue> $trait<Equation<T>> for Equation<T> {
            fn $method(&mut self, rhs: Equation<T>) {
                self.$method(&rhs);
            }
        }
    };
}

panicking_equation_op!(AddAssign, add_assign, try_add_assign);
panicking_equation_op!(SubAssign, sub_assign, try_sub_assign);

impl<T: FieldValue> Add<&Equation<T>> for Equation<T> {
    type Output = Equation<T>;
    fn add(mut self, rhs: &Equation<T>) -> Equation<T> {
        self += rhs;
        self
    }
}

impl<T: FieldValue> Add for Equation<T> {
    type Output = Equation<T>;
    fn add(mut self, rhs: Equation<T>) -> Equation<T> {
        self += &rhs;
        self
    }
}

impl<T: FieldValue> Sub<&Equation<T>> for Equation<T> {
    type Output = Equation<T>;
    fn sub(mut self, rhs: &Equation<T>) -> Equation<T> {
        self -= rhs;
        self
    }
}

impl<T: FieldValue> Sub for Equation<T> {
    type Output = Equation<T>;
    fn sub(mut self, rhs: Equation<T>) -> Equation<T> {
        self -= &rhs;
        self
    }
}

impl<T: FieldValue> Neg for Equation<T> {
    type Output = Equation<T>;
    fn neg(mut self) -> Equation<T> {
        self.coeffs.iter_mut().for_each(|a| *a = -*a);
        self.sources.iter_mut().for_each(|s| *s = -*s);
        self
    }
}

impl<T: FieldValue> MulAssign<f64> for Equation<T> {
    fn mul_assign(&mut self, rhs: f64) {
        self.coeffs.iter_mut().for_each(|a| *a *= rhs);
        self.sources.iter_mut().for_each(|s| *s = *s * rhs);
    }
}

impl<T: FieldValue> DivAssign<f64> for Equation<T> {
    fn div_assign(&mut self, rhs: f64) {
        self.coeffs.iter_mut().for_each(|a| *a /= rhs);
        self.sources.iter_mut().for_each(|s| *s = *s / rhs);
    }
}

impl<T: FieldValue> Mul<f64> for Equation<T> {
    type Output = Equation<T>;
    fn mul(mut self, rhs: f64) -> Equation<T> {
        self *= rhs;
        self
    }
}

impl<T: FieldValue> Mul<Equation<T>> for f64 {
    type Output = Equation<T>;
    fn mul(self, rhs: Equation<T>) -> Equation<T> {
        rhs * self
    }
}

impl<T: FieldValue> Div<f64> for Equation<T> {
    type Output = Equation<T>;
    fn div(mut self, rhs: f64) -> Equation<T> {
        self /= rhs;
        self
    }
}

impl<T: FieldValue> Mul<&ScalarFiniteVolumeField> for Equation<T> {
    type Output = Equation<T>;
    fn mul(mut self, rhs: &ScalarFiniteVolumeField) -> Equation<T> {
        if let Err(e) = self.try_mul_field(rhs) {
            panic!("{e}");
        }
        self
    }
}

impl<T: FieldValue> Div<&ScalarFiniteVolumeField> for Equation<T> {
    type Output = Equation<T>;
    fn div(mut self, rhs: &ScalarFiniteVolumeField) -> Equation<T> {
        if let Err(e) = self.try_div_field(rhs) {
            panic!("{e}");
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::equation::solver::Gmres;
    use crate::field::ScalarFiniteVolumeField;
    use crate::geometry::Vector2D;
    use crate::field::VectorFiniteVolumeField;
    use crate::topology::PartitionedMesh;

    fn setup(nx: usize) -> (FiniteVolumeGrid2D, CommContext<NoComm>) {
        let comm = CommContext::new(NoComm);
        let mesh = PartitionedMesh::rectilinear(nx, 1, 1.0, 1.0);
        (FiniteVolumeGrid2D::from_partition(&mesh, &comm).unwrap(), comm)
    }

    #[test]
    fn stencil_is_self_then_face_neighbours() {
        let (g, _) = setup(3);
        let phi = ScalarFiniteVolumeField::new(&g, "phi");
        let eqn = Equation::new(&g, &phi).unwrap();
        assert_eq!(eqn.stencil_of(1).unwrap(), &[1, 0, 2]);
        assert_eq!(eqn.n_entries(), 7);
    }

    #[test]
    fn adding_outside_the_stencil_fails() {
        let (g, _) = setup(3);
        let phi = ScalarFiniteVolumeField::new(&g, "phi");
        let mut eqn = Equation::new(&g, &phi).unwrap();
        assert_eq!(eqn.add_coeff(0, 2, 1.0), Err(FvError::StencilMiss { row: 0, col: 2 }));
        eqn.add_coeff(0, 1, 1.0).unwrap();
        eqn.add_coeff(0, 1, 0.5).unwrap();
        assert_eq!(eqn.coeff(0, 1, 0).unwrap(), 1.5);
    }

    #[test]
    fn vector_rows_are_interleaved() {
        let (g, _) = setup(2);
        let u = VectorFiniteVolumeField::new(&g, "u");
        let mut eqn = Equation::new(&g, &u).unwrap();
        eqn.add_coeff(1, 0, 2.0).unwrap();
        eqn.add_component(1, 1, 1, 3.0).unwrap();
        let t = eqn.triplets();
        assert!(t.contains(&(2, 0, 2.0)));
        assert!(t.contains(&(3, 1, 2.0)));
        assert!(t.contains(&(3, 3, 3.0)));
        assert!(t.contains(&(2, 2, 0.0)));
    }

    #[test]
    fn field_scaling_broadcasts_per_cell() {
        let (g, _) = setup(2);
        let u = VectorFiniteVolumeField::new(&g, "u");
        let mut eqn = Equation::new(&g, &u).unwrap();
        eqn.add_coeff(0, 0, 1.0).unwrap();
        eqn.add_source(0, Vector2D::new(1.0, 2.0)).unwrap();
        let mut rho = ScalarFiniteVolumeField::new(&g, "rho");
        rho[0] = 3.0;
        let eqn = eqn * &rho;
        assert_eq!(eqn.coeff(0, 0, 0).unwrap(), 3.0);
        assert_eq!(eqn.coeff(0, 0, 1).unwrap(), 3.0);
        assert_eq!(eqn.source(0).unwrap(), Vector2D::new(3.0, 6.0));
    }

    #[test]
    fn serial_solve_writes_back() {
        let (g, comm) = setup(3);
        let mut phi = ScalarFiniteVolumeField::new(&g, "phi");
        let mut eqn = Equation::new(&g, &phi).unwrap();
        for c in 0..3 {
            eqn.add_coeff(c, c, 2.0).unwrap();
            eqn.add_source(c, 2.0 * (c as f64 + 1.0)).unwrap();
        }
        let report = eqn.solve(&g, &mut phi, &comm, &Gmres::default(), 1e-10).unwrap();
        assert!(report.converged);
        assert!((phi[2] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn tolerance_below_the_solver_default_still_converges() {
        let (g, comm) = setup(12);
        let mut phi = ScalarFiniteVolumeField::new(&g, "phi");
        let mut eqn = Equation::new(&g, &phi).unwrap();
        for c in 0..12 {
            eqn.add_coeff(c, c, 2.5).unwrap();
            for &n in eqn.stencil_of(c).unwrap().to_vec().iter().skip(1) {
                eqn.add_coeff(c, n, -1.0).unwrap();
            }
            eqn.add_source(c, 1.0).unwrap();
        }
        let report = eqn.solve(&g, &mut phi, &comm, &Gmres::default(), 1e-13).unwrap();
        assert!(report.converged, "{report:?}");
        assert!(report.residual <= 1e-13 * 12f64.sqrt());
    }

    #[test]
    fn coefficient_adds_coexist_with_operator_add() {
        // `Add` in scope must not shadow the assembly method
        use std::ops::Add;
        let (g, _) = setup(2);
        let phi = ScalarFiniteVolumeField::new(&g, "phi");
        let mut a = Equation::new(&g, &phi).unwrap();
        a.add_coeff(0, 0, 1.0).unwrap();
        let mut b = Equation::new(&g, &phi).unwrap();
        b.add_coeff(0, 1, 2.0).unwrap();
        let sum = Add::add(a, &b);
        assert_eq!(sum.coeff(0, 0, 0).unwrap(), 1.0);
        assert_eq!(sum.coeff(0, 1, 0).unwrap(), 2.0);
    }

    #[test]
    #[should_panic(expected = "Shape mismatch")]
    fn mismatched_shapes_panic() {
        let (g1, _) = setup(2);
        let (g2, _) = setup(3);
        let a = Equation::new(&g1, &ScalarFiniteVolumeField::new(&g1, "a")).unwrap();
        let b = Equation::new(&g2, &ScalarFiniteVolumeField::new(&g2, "b")).unwrap();
        let _ = a + b;
    }
}
