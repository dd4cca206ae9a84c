//! Parametric solid shapes for immersed bodies.
//!
//! [`Shape2D`] is a closed set of variants dispatched by `match`. Every query the
//! immersed-boundary code needs is here: containment, nearest boundary point,
//! segment crossings and the integral properties used by the motion laws.

use crate::geometry::polygon::{LineSegment2D, Polygon};
use crate::geometry::vector::{dot, EPSILON, Point2D, Vector2D};
use std::f64::consts::PI;

/// A solid body outline.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape2D {
    Circle { center: Point2D, radius: f64 },
    /// Axis-aligned box given by its lower-left and upper-right corners.
    Box { min: Point2D, max: Point2D },
    Polygon(Polygon),
}

impl Shape2D {
    pub fn circle(center: Point2D, radius: f64) -> Self {
        Shape2D::Circle { center, radius }
    }

    /// Box of `width × height` centred on `center`.
    pub fn centered_box(center: Point2D, width: f64, height: f64) -> Self {
        let half = Vector2D::new(0.5 * width, 0.5 * height);
        Shape2D::Box {
            min: center - half,
            max: center + half,
        }
    }

    pub fn polygon(vertices: Vec<Point2D>) -> Self {
        Shape2D::Polygon(Polygon::new(vertices))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Shape2D::Circle { .. } => "circle",
            Shape2D::Box { .. } => "box",
            Shape2D::Polygon(_) => "polygon",
        }
    }

    /// Box corners in counter-clockwise order starting at `min`.
    fn box_vertices(min: Point2D, max: Point2D) -> [Point2D; 4] {
        [
            min,
            Point2D::new(max.x, min.y),
            max,
            Point2D::new(min.x, max.y),
        ]
    }

    /// Polygonal representation. Circles are sampled with `n_circle` vertices.
    pub fn to_polygon(&self, n_circle: usize) -> Polygon {
        match self {
            Shape2D::Circle { center, radius } => {
                let n = n_circle.max(3);
                Polygon::new((0..n).map(|i| {
                    let theta = 2.0 * PI * i as f64 / n as f64;
                    *center + Vector2D::new(theta.cos(), theta.sin()) * *radius
                }))
            }
            Shape2D::Box { min, max } => Polygon::new(Self::box_vertices(*min, *max)),
            Shape2D::Polygon(pgn) => pgn.clone(),
        }
    }

    pub fn centroid(&self) -> Point2D {
        match self {
            Shape2D::Circle { center, .. } => *center,
            Shape2D::Box { min, max } => 0.5 * (*min + *max),
            Shape2D::Polygon(pgn) => pgn.centroid(),
        }
    }

    pub fn area(&self) -> f64 {
        match self {
            Shape2D::Circle { radius, .. } => PI * radius * radius,
            Shape2D::Box { min, max } => (max.x - min.x) * (max.y - min.y),
            Shape2D::Polygon(pgn) => pgn.area(),
        }
    }

    /// Polar second moment of area about the centroid.
    pub fn polar_moment(&self) -> f64 {
        match self {
            Shape2D::Circle { radius, .. } => 0.5 * PI * radius.powi(4),
            Shape2D::Box { min, max } => {
                let (w, h) = (max.x - min.x, max.y - min.y);
                w * h * (w * w + h * h) / 12.0
            }
            Shape2D::Polygon(pgn) => pgn.polar_moment(),
        }
    }

    /// Radius of the smallest centroid-centred circle enclosing the shape.
    pub fn bounding_radius(&self) -> f64 {
        match self {
            Shape2D::Circle { radius, .. } => *radius,
            Shape2D::Box { min, max } => 0.5 * (*max - *min).mag(),
            Shape2D::Polygon(pgn) => pgn.bounding_radius(),
        }
    }

    pub fn is_inside(&self, pt: Point2D) -> bool {
        match self {
            Shape2D::Circle { center, radius } => (pt - *center).mag_sqr() <= radius * radius,
            Shape2D::Box { min, max } => {
                pt.x >= min.x && pt.x <= max.x && pt.y >= min.y && pt.y <= max.y
            }
            Shape2D::Polygon(pgn) => pgn.is_inside(pt),
        }
    }

    /// Closest point on the shape boundary to `pt` (inside or outside).
    pub fn nearest_intersect(&self, pt: Point2D) -> Point2D {
        match self {
            Shape2D::Circle { center, radius } => {
                let r = pt - *center;
                if r.mag() < EPSILON {
                    *center + Vector2D::new(*radius, 0.0)
                } else {
                    *center + r.unit_vec() * *radius
                }
            }
            Shape2D::Box { .. } => self.to_polygon(0).nearest_intersect(pt),
            Shape2D::Polygon(pgn) => pgn.nearest_intersect(pt),
        }
    }

    /// Boundary edge closest to `pt`. For circles this is the tangent segment
    /// of unit length centred on the nearest boundary point.
    pub fn nearest_edge(&self, pt: Point2D) -> LineSegment2D {
        match self {
            Shape2D::Circle { .. } => {
                let xc = self.nearest_intersect(pt);
                let t = (xc - self.centroid()).unit_vec().tangent_vec();
                LineSegment2D::new(xc - 0.5 * t, xc + 0.5 * t)
            }
            Shape2D::Box { .. } | Shape2D::Polygon(_) => {
                let pgn = self.to_polygon(0);
                pgn.nearest_edge(pt)
                    .unwrap_or_else(|| LineSegment2D::new(pt, pt))
            }
        }
    }

    /// Outward unit normal of the boundary nearest to `pt`.
    pub fn nearest_edge_normal(&self, pt: Point2D) -> Vector2D {
        match self {
            Shape2D::Circle { center, .. } => {
                let r = self.nearest_intersect(pt) - *center;
                r.unit_vec()
            }
            _ => self.nearest_edge(pt).direction().normal_vec().unit_vec(),
        }
    }

    /// Crossings of `seg` with the boundary, ordered from `seg.pt_a`.
    ///
    /// Convex shapes yield 0, 1 or 2 points.
    pub fn intersections(&self, seg: &LineSegment2D) -> Vec<Point2D> {
        match self {
            Shape2D::Circle { center, radius } => {
                let d = seg.direction();
                let f = seg.pt_a - *center;
                let a = d.mag_sqr();
                if a < EPSILON * EPSILON {
                    return Vec::new();
                }
                let b = 2.0 * dot(f, d);
                let c = f.mag_sqr() - radius * radius;
                let disc = b * b - 4.0 * a * c;
                if disc < 0.0 {
                    return Vec::new();
                }
                let sq = disc.sqrt();
                let mut out = Vec::with_capacity(2);
                for t in [(-b - sq) / (2.0 * a), (-b + sq) / (2.0 * a)] {
                    if (0.0..=1.0).contains(&t) {
                        let p = seg.at(t);
                        if out.last().is_none_or(|q: &Point2D| (*q - p).mag() > EPSILON) {
                            out.push(p);
                        }
                    }
                }
                out
            }
            Shape2D::Box { .. } => self.to_polygon(0).intersections(seg),
            Shape2D::Polygon(pgn) => pgn.intersections(seg),
        }
    }

    pub fn translate(&mut self, delta: Vector2D) {
        match self {
            Shape2D::Circle { center, .. } => *center += delta,
            Shape2D::Box { min, max } => {
                *min += delta;
                *max += delta;
            }
            Shape2D::Polygon(pgn) => pgn.translate(delta),
        }
    }

    /// Move so the centroid coincides with `pos`.
    pub fn move_to(&mut self, pos: Point2D) {
        let delta = pos - self.centroid();
        self.translate(delta);
    }

    /// Scale about the centroid.
    pub fn scale(&mut self, factor: f64) {
        match self {
            Shape2D::Circle { radius, .. } => *radius *= factor,
            Shape2D::Box { min, max } => {
                let c = 0.5 * (*min + *max);
                *min = c + (*min - c) * factor;
                *max = c + (*max - c) * factor;
            }
            Shape2D::Polygon(pgn) => pgn.scale(factor),
        }
    }

    /// Rotate counter-clockwise about the centroid. A box is first re-expressed
    /// as a polygon, since a rotated box is no longer axis-aligned.
    pub fn rotate(&mut self, theta: f64) {
        match self {
            Shape2D::Circle { .. } => {}
            Shape2D::Box { min, max } => {
                let mut pgn = Polygon::new(Self::box_vertices(*min, *max));
                pgn.rotate(theta);
                *self = Shape2D::Polygon(pgn);
            }
            Shape2D::Polygon(pgn) => pgn.rotate(theta),
        }
    }
}
