//! Finite-volume terms.
//!
//! Each function returns an [`Equation`] holding the discretized operator as
//! `A·φ − s`. Terms are combined with `+`/`-` and balanced with
//! [`Equation::equate`]. Rows exist only for active owned cells; a coupling to
//! a neighbour outside the system is lagged into the source with the
//! neighbour's current value.

use crate::equation::assembly::Equation;
use crate::field::{BoundaryType, FieldValue, FiniteVolumeField, ScalarFiniteVolumeField, VectorFiniteVolumeField};
use crate::geometry::{dot, Vector2D};
use crate::mesh_error::FvError;
use crate::topology::{BoundaryLink, FiniteVolumeGrid2D, InteriorLink};

fn couple<T: FieldValue>(
    eqn: &mut Equation<T>,
    grid: &FiniteVolumeGrid2D,
    phi: &FiniteVolumeField<T>,
    row: usize,
    col: usize,
    coeff: f64,
) -> Result<(), FvError> {
    if coeff == 0.0 {
        return Ok(());
    }
    if grid.global_index(col).is_some() {
        eqn.add_coeff(row, col, coeff)
    } else {
        eqn.add_source(row, -(phi[col] * coeff))
    }
}

fn boundary_convection<T: FieldValue>(
    eqn: &mut Equation<T>,
    phi: &FiniteVolumeField<T>,
    cell: usize,
    link: &BoundaryLink,
    flux: f64,
    theta: f64,
) -> Result<(), FvError> {
    let bc = phi.boundary_condition(link.patch)?;
    match bc.kind {
        BoundaryType::Fixed => eqn.add_source(cell, -(bc.value * flux)),
        BoundaryType::NormalGradient | BoundaryType::Outflow => {
            eqn.add_coeff(cell, cell, theta * flux)?;
            eqn.add_source(cell, -(phi[cell] * ((1.0 - theta) * flux)))
        }
        BoundaryType::Symmetry => Ok(()),
    }
}

fn face_flux(u: &VectorFiniteVolumeField, face: usize, out_norm: Vector2D) -> f64 {
    dot(u.face_value(face), out_norm)
}

/// First-order upwind `∇·(u φ)` with face velocities from `u`.
///
/// `theta` weights the implicit part; the rest is evaluated from the current
/// cell values.
pub fn div<T: FieldValue>(
    grid: &FiniteVolumeGrid2D,
    u: &VectorFiniteVolumeField,
    phi: &FiniteVolumeField<T>,
    theta: f64,
) -> Result<Equation<T>, FvError> {
    let mut eqn = Equation::new(grid, phi)?;
    for &c in grid.local_active_cells() {
        let cell = grid.cell(c);
        for l in cell.interior_links() {
            let flux = face_flux(u, l.face, l.out_norm);
            let upwind = if flux > 0.0 {
                c
            } else if flux < 0.0 {
                l.cell
            } else {
                continue;
            };
            couple(&mut eqn, grid, phi, c, upwind, theta * flux)?;
            eqn.add_source(c, -(phi[upwind] * ((1.0 - theta) * flux)))?;
        }
        for l in cell.boundary_links() {
            let flux = face_flux(u, l.face, l.out_norm);
            boundary_convection(&mut eqn, phi, c, l, flux, theta)?;
        }
    }
    Ok(eqn)
}

/// Central `∇·(u φ)`, volume-weighted face values.
pub fn divc<T: FieldValue>(
    grid: &FiniteVolumeGrid2D,
    u: &VectorFiniteVolumeField,
    phi: &FiniteVolumeField<T>,
) -> Result<Equation<T>, FvError> {
    let mut eqn = Equation::new(grid, phi)?;
    for &c in grid.local_active_cells() {
        let cell = grid.cell(c);
        for l in cell.interior_links() {
            let flux = face_flux(u, l.face, l.out_norm);
            if flux == 0.0 {
                continue;
            }
            eqn.add_coeff(c, c, flux * l.volume_weight)?;
            couple(&mut eqn, grid, phi, c, l.cell, flux * (1.0 - l.volume_weight))?;
        }
        for l in cell.boundary_links() {
            let flux = face_flux(u, l.face, l.out_norm);
            boundary_convection(&mut eqn, phi, c, l, flux, 1.0)?;
        }
    }
    Ok(eqn)
}

fn diffusion<T, G>(
    grid: &FiniteVolumeGrid2D,
    phi: &FiniteVolumeField<T>,
    gamma_interior: G,
    gamma_boundary: impl Fn(usize, &BoundaryLink) -> f64,
) -> Result<Equation<T>, FvError>
where
    T: FieldValue,
    G: Fn(usize, &InteriorLink) -> f64,
{
    let mut eqn = Equation::new(grid, phi)?;
    for &c in grid.local_active_cells() {
        let cell = grid.cell(c);
        for l in cell.interior_links() {
            let coeff = gamma_interior(c, l) * dot(l.out_norm, l.r_cell_vec) / l.r_cell_vec.mag_sqr();
            eqn.add_coeff(c, c, -coeff)?;
            couple(&mut eqn, grid, phi, c, l.cell, coeff)?;
        }
        for l in cell.boundary_links() {
            let bc = phi.boundary_condition(l.patch)?;
            let gamma = gamma_boundary(c, l);
            match bc.kind {
                BoundaryType::Fixed => {
                    let coeff = gamma * dot(l.out_norm, l.r_face_vec) / l.r_face_vec.mag_sqr();
                    eqn.add_coeff(c, c, -coeff)?;
                    eqn.add_source(c, -(bc.value * coeff))?;
                }
                BoundaryType::NormalGradient => {
                    eqn.add_source(c, -(bc.value * (gamma * l.out_norm.mag())))?;
                }
                BoundaryType::Symmetry | BoundaryType::Outflow => {}
            }
        }
    }
    Ok(eqn)
}

/// `∇·(Γ ∇φ)` with constant `Γ`, two-point orthogonal flux.
pub fn laplacian<T: FieldValue>(
    grid: &FiniteVolumeGrid2D,
    gamma: f64,
    phi: &FiniteVolumeField<T>,
) -> Result<Equation<T>, FvError> {
    diffusion(grid, phi, |_, _| gamma, |_, _| gamma)
}

/// `∇·(Γ ∇φ)` with `Γ` interpolated to faces by volume weight.
pub fn laplacian_field<T: FieldValue>(
    grid: &FiniteVolumeGrid2D,
    gamma: &ScalarFiniteVolumeField,
    phi: &FiniteVolumeField<T>,
) -> Result<Equation<T>, FvError> {
    if gamma.grid_id() != grid.id() {
        return Err(FvError::GridMismatch {
            lhs: gamma.name().to_string(),
            rhs: phi.name().to_string(),
        });
    }
    diffusion(
        grid,
        phi,
        |c, l| l.volume_weight * gamma[c] + (1.0 - l.volume_weight) * gamma[l.cell],
        |c, _| gamma[c],
    )
}

/// Euler `∂φ/∂t` against the most recent saved time level.
///
/// Without saved history the current cell values stand in for the old level.
pub fn ddt<T: FieldValue>(
    grid: &FiniteVolumeGrid2D,
    phi: &FiniteVolumeField<T>,
    time_step: f64,
) -> Result<Equation<T>, FvError> {
    let mut eqn = Equation::new(grid, phi)?;
    let old = if phi.history_len() > 0 {
        Some(phi.old_field(0)?)
    } else {
        None
    };
    for &c in grid.local_active_cells() {
        let v = grid.cell(c).volume();
        let phi0 = old.map_or(phi[c], |o| o[c]);
        eqn.add_coeff(c, c, v / time_step)?;
        eqn.add_source(c, phi0 * (v / time_step))?;
    }
    Ok(eqn)
}

/// Explicit volumetric source `S` integrated over each cell.
pub fn source<T: FieldValue>(
    grid: &FiniteVolumeGrid2D,
    phi: &FiniteVolumeField<T>,
    s: &FiniteVolumeField<T>,
) -> Result<Equation<T>, FvError> {
    if s.grid_id() != grid.id() {
        return Err(FvError::GridMismatch {
            lhs: phi.name().to_string(),
            rhs: s.name().to_string(),
        });
    }
    let mut eqn = Equation::new(grid, phi)?;
    for &c in grid.local_active_cells() {
        eqn.add_source(c, -(s[c] * grid.cell(c).volume()))?;
    }
    Ok(eqn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::algs::context::CommContext;
    use crate::equation::solver::Gmres;
    use crate::topology::PartitionedMesh;

    fn grid(nx: usize, ny: usize, h: f64) -> (FiniteVolumeGrid2D, CommContext<NoComm>) {
        let comm = CommContext::new(NoComm);
        let mesh = PartitionedMesh::rectilinear(nx, ny, h, h);
        (FiniteVolumeGrid2D::from_partition(&mesh, &comm).unwrap(), comm)
    }

    #[test]
    fn interior_laplacian_rows_sum_to_zero() {
        let (g, _) = grid(4, 4, 0.25);
        let mut phi = ScalarFiniteVolumeField::new(&g, "phi");
        phi.set_all_boundaries(BoundaryType::NormalGradient, 0.0);
        let eqn = laplacian(&g, 1.0, &phi).unwrap();
        for s in eqn.row_sums() {
            assert!(s.abs() < 1e-12);
        }
        assert!((eqn.coeff(5, 5, 0).unwrap() + 4.0).abs() < 1e-12);
    }

    #[test]
    fn one_dimensional_dirichlet_profile_is_linear() {
        let (g, comm) = grid(8, 1, 0.125);
        let mut phi = ScalarFiniteVolumeField::new(&g, "phi");
        phi.set_all_boundaries(BoundaryType::NormalGradient, 0.0);
        phi.set_boundary(&g, "x-", BoundaryType::Fixed, 0.0).unwrap();
        phi.set_boundary(&g, "x+", BoundaryType::Fixed, 1.0).unwrap();
        let eqn = laplacian(&g, 1.0, &phi).unwrap();
        let report = eqn.solve(&g, &mut phi, &comm, &Gmres::default(), 1e-12).unwrap();
        assert!(report.converged);
        for c in g.cells() {
            assert!((phi[c.id()] - c.centroid().x).abs() < 1e-9);
        }
    }

    #[test]
    fn upwind_picks_by_flux_sign() {
        let (g, _) = grid(3, 1, 1.0);
        let mut u = VectorFiniteVolumeField::with_value(&g, "u", Vector2D::new(1.0, 0.0));
        u.set_all_boundaries(BoundaryType::Fixed, Vector2D::new(1.0, 0.0));
        let mut phi = ScalarFiniteVolumeField::new(&g, "phi");
        phi.set_all_boundaries(BoundaryType::NormalGradient, 0.0);
        phi.set_boundary(&g, "x-", BoundaryType::Fixed, 2.0).unwrap();
        let eqn = div(&g, &u, &phi, 1.0).unwrap();
        assert_eq!(eqn.coeff(1, 1, 0).unwrap(), 1.0);
        assert_eq!(eqn.coeff(1, 0, 0).unwrap(), -1.0);
        assert_eq!(eqn.coeff(1, 2, 0).unwrap(), 0.0);
        assert_eq!(eqn.source(0).unwrap(), 2.0);
    }

    #[test]
    fn zero_flux_contributes_nothing() {
        let (g, _) = grid(3, 3, 1.0);
        let mut u = VectorFiniteVolumeField::new(&g, "u");
        u.set_all_boundaries(BoundaryType::Fixed, Vector2D::zero());
        let mut phi = ScalarFiniteVolumeField::new(&g, "phi");
        phi.set_all_boundaries(BoundaryType::Fixed, 1.0);
        let eqn = div(&g, &u, &phi, 0.5).unwrap();
        assert!(eqn.triplets().iter().all(|t| t.2 == 0.0));
        assert!(eqn.sources().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn unset_boundary_is_fatal() {
        let (g, _) = grid(2, 2, 1.0);
        let phi = ScalarFiniteVolumeField::new(&g, "phi");
        assert!(matches!(
            laplacian(&g, 1.0, &phi),
            Err(FvError::UnknownBoundaryType { .. })
        ));
    }

    #[test]
    fn ddt_uses_saved_level() {
        let (g, _) = grid(2, 1, 1.0);
        let mut phi = ScalarFiniteVolumeField::with_value(&g, "phi", 3.0);
        phi.save_previous_time_step(0.5, 1);
        phi.fill(10.0);
        let eqn = ddt(&g, &phi, 0.5).unwrap();
        assert_eq!(eqn.coeff(0, 0, 0).unwrap(), 2.0);
        assert_eq!(eqn.source(0).unwrap(), 6.0);
    }
}
