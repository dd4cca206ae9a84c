//! Green–Gauss cell gradients from face values.
//!
//! Face values must be current (see
//! [`interpolate_faces`](crate::field::FiniteVolumeField::interpolate_faces)).

use crate::field::finite_volume_field::{ScalarFiniteVolumeField, VectorFiniteVolumeField};
use crate::field::value::FieldValue;
use crate::field::FiniteVolumeField;
use crate::geometry::Vector2D;
use crate::topology::FiniteVolumeGrid2D;

fn green_gauss<T: FieldValue>(
    grid: &FiniteVolumeGrid2D,
    field: &FiniteVolumeField<T>,
    component: usize,
    name: &str,
) -> VectorFiniteVolumeField {
    let mut grad = VectorFiniteVolumeField::new(grid, name);
    for cell in grid.cells().iter().filter(|c| !c.is_ghost()) {
        let mut sum = Vector2D::zero();
        for l in cell.interior_links() {
            sum += l.out_norm * field.face_value(l.face).component(component);
        }
        for l in cell.boundary_links() {
            sum += l.out_norm * field.face_value(l.face).component(component);
        }
        grad[cell.id()] = sum / cell.volume();
    }
    grad
}

/// `∇φ` on owned cells. Ghost entries are zero until exchanged.
pub fn gradient(grid: &FiniteVolumeGrid2D, phi: &ScalarFiniteVolumeField) -> VectorFiniteVolumeField {
    green_gauss(grid, phi, 0, &format!("grad({})", phi.name()))
}

/// `[∇u_x, ∇u_y]` on owned cells.
pub fn component_gradients(
    grid: &FiniteVolumeGrid2D,
    u: &VectorFiniteVolumeField,
) -> [VectorFiniteVolumeField; 2] {
    [
        green_gauss(grid, u, 0, &format!("grad({}.x)", u.name())),
        green_gauss(grid, u, 1, &format!("grad({}.y)", u.name())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::algs::context::CommContext;
    use crate::field::BoundaryType;
    use crate::topology::PartitionedMesh;

    #[test]
    fn linear_field_has_exact_interior_gradient() {
        let mesh = PartitionedMesh::rectilinear(4, 4, 0.5, 0.5);
        let grid = FiniteVolumeGrid2D::from_partition(&mesh, &CommContext::new(NoComm)).unwrap();
        let mut phi = ScalarFiniteVolumeField::new(&grid, "phi");
        phi.set_all_boundaries(BoundaryType::NormalGradient, 0.0);
        for c in grid.cells() {
            phi[c.id()] = 2.0 * c.centroid().x - c.centroid().y;
        }
        phi.interpolate_faces(&grid).unwrap();
        let g = gradient(&grid, &phi);
        // cell (1, 1) has no boundary faces
        let inner = 4 + 1;
        assert!((g[inner] - Vector2D::new(2.0, -1.0)).mag() < 1e-12);
    }
}
