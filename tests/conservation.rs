mod util;
use util::*;

use fv_immersed::algs::communicator::ThreadComm;
use fv_immersed::equation::{fv, Gmres};
use fv_immersed::field::{BoundaryType, ScalarFiniteVolumeField, VectorFiniteVolumeField};
use fv_immersed::geometry::Vector2D;
use serial_test::serial;

fn coefficient_total(triplets: &[(usize, usize, f64)]) -> f64 {
    triplets.iter().map(|t| t.2).sum()
}

#[test]
#[serial]
fn diffusion_fluxes_cancel_across_ranks() {
    let totals = ThreadComm::run(3, |comm| {
        let grid = strip_grid(&comm, 12, 6, 0.1);
        let mut phi = ScalarFiniteVolumeField::new(&grid, "phi");
        phi.set_all_boundaries(BoundaryType::Symmetry, 0.0);
        let eqn = fv::laplacian(&grid, 0.7, &phi).unwrap();
        comm.sum(coefficient_total(&eqn.triplets())).unwrap()
    });
    for t in &totals {
        assert!(t.abs() < 1e-10, "{t}");
    }
    assert_eq!(totals[0], totals[2]);
}

#[test]
#[serial]
fn upwind_fluxes_cancel_across_ranks() {
    ThreadComm::run(2, |comm| {
        let grid = strip_grid(&comm, 10, 10, 0.1);
        let u = VectorFiniteVolumeField::with_value(&grid, "u", Vector2D::new(1.0, 0.5));
        let mut phi = ScalarFiniteVolumeField::new(&grid, "phi");
        phi.set_all_boundaries(BoundaryType::Symmetry, 0.0);
        let eqn = fv::div(&grid, &u, &phi, 1.0).unwrap();
        let total = comm.sum(coefficient_total(&eqn.triplets())).unwrap();
        assert!(total.abs() < 1e-12, "{total}");
        // u is not tangential to the walls, so only rows without a boundary
        // face see a divergence-free flux balance
        let mut interior_rows = 0;
        for (&cell, s) in eqn.row_cells().iter().zip(eqn.row_sums()) {
            if grid.cell(cell).boundary_links().is_empty() {
                assert!(s.abs() < 1e-12, "row of cell {cell} sums to {s}");
                interior_rows += 1;
            }
        }
        assert_eq!(comm.sum(interior_rows).unwrap(), 8 * 8);
    });
}

#[test]
#[serial]
fn distributed_dirichlet_solve_matches_serial_profile() {
    init_logger();
    ThreadComm::run(2, |comm| {
        let grid = strip_grid(&comm, 8, 1, 0.125);
        let mut phi = ScalarFiniteVolumeField::new(&grid, "phi");
        phi.set_all_boundaries(BoundaryType::NormalGradient, 0.0);
        phi.set_boundary(&grid, "x-", BoundaryType::Fixed, 0.0).unwrap();
        phi.set_boundary(&grid, "x+", BoundaryType::Fixed, 1.0).unwrap();
        let eqn = fv::laplacian(&grid, 1.0, &phi).unwrap();
        let report = eqn.solve(&grid, &mut phi, &comm, &Gmres::default(), 1e-12).unwrap();
        assert!(report.converged, "{report:?}");
        for c in grid.local_cells() {
            assert!((phi[c] - grid.cell(c).centroid().x).abs() < 1e-8);
        }
    });
}
