mod util;
use util::*;

use fv_immersed::algs::communicator::ThreadComm;
use fv_immersed::field::{BoundaryType, ScalarFiniteVolumeField, VectorFiniteVolumeField};
use fv_immersed::geometry::{Point2D, Shape2D, Vector2D};
use fv_immersed::ib::{CollisionModel, ImmersedBoundary, ImmersedBoundaryObject};
use serial_test::serial;

const BODY_RHO: f64 = 2.5;
const G: Vector2D = Vector2D { x: 0.0, y: -9.81 };

#[test]
#[serial]
fn static_disk_in_quiescent_fluid_feels_only_its_weight() {
    init_logger();
    let results = ThreadComm::run(3, |comm| {
        let mut grid = strip_grid(&comm, 30, 30, 1.0 / 30.0);
        let mut body = ImmersedBoundaryObject::new("disk", 0, Shape2D::circle(Point2D::new(0.5, 0.5), 0.2));
        body.set_rho(BODY_RHO);
        let mut ib =
            ImmersedBoundary::from_objects(vec![body], CollisionModel::default(), false, &mut grid, &comm)
                .unwrap();

        let mut u = VectorFiniteVolumeField::new(&grid, "u");
        u.set_all_boundaries(BoundaryType::Fixed, Vector2D::zero());
        let mut p = ScalarFiniteVolumeField::with_value(&grid, "p", 3.0);
        p.set_all_boundaries(BoundaryType::NormalGradient, 0.0);

        let forces = ib.compute_force(&grid, &comm, 0.0, 1e-3, &u, &p, G).unwrap();
        let obj = ib.ib_obj_by_name("disk").unwrap();
        assert_eq!(obj.force(), forces[0]);
        (forces[0], obj.torque(), obj.shape().area())
    });

    let (force, torque, area) = results[0];
    let weight = BODY_RHO * area * G;
    assert!((force - weight).mag() < 1e-10 * weight.mag(), "{force} vs {weight}");
    assert!(torque.abs() < 1e-12);
    for r in &results[1..] {
        assert_eq!(r.0, force);
        assert_eq!(r.1, torque);
    }
}

#[test]
fn forcing_residual_is_summed_over_ranks() {
    let results = ThreadComm::run(2, |comm| {
        let mut grid = strip_grid(&comm, 20, 20, 0.05);
        let body = ImmersedBoundaryObject::new("disk", 0, Shape2D::circle(Point2D::new(0.5, 0.5), 0.2));
        let ib = ImmersedBoundary::from_objects(vec![body], CollisionModel::default(), false, &mut grid, &comm)
            .unwrap();
        let rho = ScalarFiniteVolumeField::with_value(&grid, "rho", 1.0);
        let u_star = VectorFiniteVolumeField::with_value(&grid, "u", Vector2D::new(0.2, 0.0));
        let mut fb = VectorFiniteVolumeField::new(&grid, "fb");
        ib.direct_forcing_term(&grid, &u_star, 0.1, &mut fb).unwrap();
        let covered = ib.ib_cells().len() + ib.solid_cells().len();
        let local_volume = covered as f64 * 0.05 * 0.05;
        let total_volume = comm.sum(local_volume).unwrap();
        let f = ib.forcing_residual_force(&grid, &comm, &rho, &fb).unwrap();
        (f[0], total_volume)
    });
    // body at rest: fb = -u*/dt on covered cells, force = rho * u*/dt * V
    let (f, volume) = results[0];
    assert!((f - Vector2D::new(2.0 * volume, 0.0)).mag() < 1e-10);
    assert_eq!(results[1].0, f);
}
