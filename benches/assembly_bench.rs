use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use fv_immersed::algs::communicator::NoComm;
use fv_immersed::algs::context::CommContext;
use fv_immersed::equation::{fv, Gmres};
use fv_immersed::field::{BoundaryType, ScalarFiniteVolumeField, VectorFiniteVolumeField};
use fv_immersed::geometry::{Point2D, Shape2D, Vector2D};
use fv_immersed::ib::{CollisionModel, ImmersedBoundary, ImmersedBoundaryObject};
use fv_immersed::topology::{FiniteVolumeGrid2D, PartitionedMesh};

fn grid(n: usize) -> (FiniteVolumeGrid2D, CommContext<NoComm>) {
    let comm = CommContext::new(NoComm);
    let h = 1.0 / n as f64;
    let grid = FiniteVolumeGrid2D::from_partition(&PartitionedMesh::rectilinear(n, n, h, h), &comm)
        .expect("grid");
    (grid, comm)
}

fn bench_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble_convection_diffusion");
    for &n in &[32usize, 64, 128] {
        let (g, _) = grid(n);
        let mut rng = SmallRng::seed_from_u64(42);
        let mut u = VectorFiniteVolumeField::new(&g, "u");
        for c in 0..g.n_cells() {
            u[c] = Vector2D::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
        }
        u.set_all_boundaries(BoundaryType::Fixed, Vector2D::zero());
        u.interpolate_faces(&g).expect("faces");
        let mut phi = ScalarFiniteVolumeField::new(&g, "phi");
        phi.set_all_boundaries(BoundaryType::Fixed, 1.0);
        phi.save_previous_time_step(1e-3, 1);

        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let mut eqn = fv::ddt(&g, &phi, 1e-3).expect("ddt");
                eqn += fv::div(&g, &u, &phi, 0.5).expect("div");
                eqn -= fv::laplacian(&g, 1e-2, &phi).expect("laplacian");
                eqn
            })
        });
    }
    group.finish();
}

fn bench_solve(c: &mut Criterion) {
    let (g, comm) = grid(48);
    let mut phi = ScalarFiniteVolumeField::new(&g, "phi");
    phi.set_all_boundaries(BoundaryType::Fixed, 0.0);
    phi.set_boundary(&g, "y+", BoundaryType::Fixed, 1.0).expect("patch");
    let eqn = fv::laplacian(&g, 1.0, &phi).expect("laplacian");
    let solver = Gmres::default();
    c.bench_function("gmres_poisson_48", |b| {
        b.iter(|| {
            let mut x = phi.clone();
            eqn.solve(&g, &mut x, &comm, &solver, 1e-8).expect("solve")
        })
    });
}

fn bench_classification(c: &mut Criterion) {
    let (mut g, comm) = grid(96);
    let body = ImmersedBoundaryObject::new("disk", 0, Shape2D::circle(Point2D::new(0.5, 0.5), 0.2));
    let mut ib = ImmersedBoundary::from_objects(vec![body], CollisionModel::default(), false, &mut g, &comm)
        .expect("ib");
    c.bench_function("ib_update_cells_96", |b| {
        b.iter(|| ib.update_cells(&mut g, &comm).expect("update"))
    });
}

criterion_group!(benches, bench_assembly, bench_solve, bench_classification);
criterion_main!(benches);
