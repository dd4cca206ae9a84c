mod util;
use util::*;

use fv_immersed::geometry::plic::interface_polygon;
use fv_immersed::geometry::{dot, Point2D, Vector2D};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

#[test]
fn reconstructed_area_matches_volume_fraction() {
    let (grid, _) = serial_grid(40, 40, 0.0025);
    let mut rng = SmallRng::seed_from_u64(0x5EED_F00D);
    for _ in 0..1000 {
        let cell = grid.cell(rng.gen_range(0..grid.n_cells()));
        let gamma: f64 = rng.r#gen();
        let theta = rng.gen_range(0.0..2.0 * PI);
        let n = Vector2D::new(theta.cos(), theta.sin());
        let pgn = interface_polygon(cell.shape(), gamma, n);
        let fraction = pgn.area() / cell.volume();
        assert!((fraction - gamma).abs() < 1e-10, "gamma {gamma}, got {fraction}");
    }
}

#[test]
fn phase_lies_behind_the_interface() {
    let (grid, _) = serial_grid(4, 4, 0.25);
    let cell = grid.cell(5);
    let n = Vector2D::new(1.0, 2.0).unit_vec();
    let pgn = interface_polygon(cell.shape(), 0.3, n);
    let level = |v: &Point2D| dot(n, *v);
    let corners = cell.shape().vertices();
    let low = corners.iter().min_by(|a, b| level(a).total_cmp(&level(b))).unwrap();
    let high = corners.iter().max_by(|a, b| level(a).total_cmp(&level(b))).unwrap();
    assert!(pgn.vertices().contains(low));
    assert!(!pgn.vertices().contains(high));
    assert!((pgn.area() - 0.3 * cell.volume()).abs() < 1e-12);
}
