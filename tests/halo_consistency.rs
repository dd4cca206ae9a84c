mod util;
use util::*;

use fv_immersed::algs::communicator::ThreadComm;
use fv_immersed::field::{ScalarFiniteVolumeField, VectorFiniteVolumeField};
use fv_immersed::geometry::{Point2D, Shape2D, Vector2D};
use fv_immersed::ib::{CellStatus, CollisionModel, ImmersedBoundary, ImmersedBoundaryObject};
use hashbrown::HashMap;
use serial_test::serial;

fn owner_value(global_id: usize) -> f64 {
    1.5 * global_id as f64 + 0.25
}

#[test]
#[serial]
fn ghost_values_match_their_owners() {
    ThreadComm::run(3, |comm| {
        let grid = strip_grid(&comm, 12, 4, 0.25);
        assert!(grid.ghost_cells().count() > 0);
        let mut phi = ScalarFiniteVolumeField::with_value(&grid, "phi", -1.0);
        let mut u = VectorFiniteVolumeField::new(&grid, "u");
        for c in grid.local_cells() {
            let g = grid.cell(c).global_id();
            phi[c] = owner_value(g);
            u[c] = Vector2D::new(g as f64, -(g as f64));
        }
        phi.send_messages(&grid, &comm).unwrap();
        u.send_messages(&grid, &comm).unwrap();
        for c in grid.ghost_cells() {
            let g = grid.cell(c).global_id();
            assert_eq!(phi[c], owner_value(g));
            assert_eq!(u[c], Vector2D::new(g as f64, -(g as f64)));
            assert_ne!(grid.cell(c).owner(), comm.rank());
        }

        // mutate again and exchange again
        for c in grid.local_cells() {
            phi[c] *= 2.0;
        }
        phi.send_messages(&grid, &comm).unwrap();
        for c in grid.ghost_cells() {
            assert_eq!(phi[c], 2.0 * owner_value(grid.cell(c).global_id()));
        }
    });
}

#[test]
#[serial]
fn ghost_ordering_and_status_match_their_owners() {
    ThreadComm::run(2, |comm| {
        let mut grid = strip_grid(&comm, 10, 10, 0.1);
        // the disk straddles the partition boundary at x = 0.5
        let body = ImmersedBoundaryObject::new("disk", 0, Shape2D::circle(Point2D::new(0.5, 0.5), 0.25));
        let ib = ImmersedBoundary::from_objects(vec![body], CollisionModel::default(), false, &mut grid, &comm)
            .unwrap();

        let mut owned = Vec::new();
        for c in grid.local_cells() {
            owned.push(grid.cell(c).global_id() as u64);
            owned.push(grid.global_index(c).map_or(u64::MAX, |i| i as u64));
            owned.push(ib.cell_status(c).code() as u64);
        }
        let all = comm.all_gatherv(&owned).unwrap();
        let by_id: HashMap<u64, (u64, u64)> = all.chunks(3).map(|t| (t[0], (t[1], t[2]))).collect();
        assert_eq!(by_id.len(), 100);

        let mut seen_covered = false;
        for c in grid.ghost_cells() {
            let (index, status) = by_id[&(grid.cell(c).global_id() as u64)];
            assert_eq!(grid.global_index(c).map_or(u64::MAX, |i| i as u64), index);
            let remote = ib.owner_status(c).unwrap();
            assert_eq!(remote.code() as u64, status);
            seen_covered |= matches!(remote, CellStatus::Ib | CellStatus::Solid);
        }
        assert!(seen_covered);
    });
}
