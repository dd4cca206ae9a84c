//! Soft repulsion between bodies and against the domain walls.

use crate::geometry::{Point2D, Vector2D};
use crate::ib::object::ImmersedBoundaryObject;

/// Quadratic penalty on the gap between bounding circles.
///
/// Two bodies interact once their bounding circles come within `range` of
/// each other; the repulsion is `(r_p + r_q + range − d)² / stiffness`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CollisionModel {
    pub stiffness: f64,
    pub range: f64,
}

impl Default for CollisionModel {
    fn default() -> Self {
        Self {
            stiffness: 1e-4,
            range: 0.0,
        }
    }
}

impl CollisionModel {
    pub fn new(stiffness: f64, range: f64) -> Self {
        Self { stiffness, range }
    }

    fn penalty(&self, overlap: f64) -> f64 {
        if overlap > 0.0 {
            overlap * overlap / self.stiffness
        } else {
            0.0
        }
    }

    /// Force on `p` exerted by `q`. Zero for a body against itself.
    pub fn force(&self, p: &ImmersedBoundaryObject, q: &ImmersedBoundaryObject) -> Vector2D {
        if p.id() == q.id() {
            return Vector2D::zero();
        }
        let r = p.position() - q.position();
        let d = r.mag();
        let reach = p.shape().bounding_radius() + q.shape().bounding_radius() + self.range;
        if d >= reach || d == 0.0 {
            return Vector2D::zero();
        }
        r.unit_vec() * self.penalty(reach - d)
    }

    /// Force on `p` from the four walls of the box `[lo, hi]`.
    pub fn wall_force(&self, p: &ImmersedBoundaryObject, lo: Point2D, hi: Point2D) -> Vector2D {
        let c = p.position();
        let reach = p.shape().bounding_radius() + self.range;
        let walls = [
            (c.x - lo.x, Vector2D::new(1.0, 0.0)),
            (hi.x - c.x, Vector2D::new(-1.0, 0.0)),
            (c.y - lo.y, Vector2D::new(0.0, 1.0)),
            (hi.y - c.y, Vector2D::new(0.0, -1.0)),
        ];
        walls
            .into_iter()
            .map(|(d, n)| n * self.penalty(reach - d))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Shape2D;

    fn disk(id: usize, x: f64) -> ImmersedBoundaryObject {
        ImmersedBoundaryObject::new("d", id, Shape2D::circle(Point2D::new(x, 0.5), 0.1))
    }

    #[test]
    fn overlapping_disks_repel_symmetrically() {
        let m = CollisionModel::new(1.0, 0.05);
        let (a, b) = (disk(0, 0.4), disk(1, 0.6));
        let fa = m.force(&a, &b);
        let fb = m.force(&b, &a);
        assert!(fa.x < 0.0);
        assert!((fa + fb).mag() < 1e-15);
        assert!((fa.x + 0.05f64.powi(2)).abs() < 1e-12);
        assert_eq!(m.force(&a, &a), Vector2D::zero());
        assert_eq!(m.force(&disk(0, 0.0), &disk(1, 1.0)), Vector2D::zero());
    }

    #[test]
    fn wall_pushes_inward() {
        let m = CollisionModel::new(1.0, 0.0);
        let f = m.wall_force(&disk(0, 0.05), Point2D::zero(), Point2D::new(1.0, 1.0));
        assert!((f - Vector2D::new(0.05f64.powi(2), 0.0)).mag() < 1e-12);
    }
}
