//! Line segments and simple polygons.
//!
//! Polygons are stored counter-clockwise; construction reorients clockwise input.
//! Edge `i` runs from vertex `i` to vertex `i + 1 (mod n)`.

use crate::geometry::vector::{cross, dot, EPSILON, Point2D, Vector2D};
use itertools::Itertools;

/// A directed segment `pt_a -> pt_b`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LineSegment2D {
    pub pt_a: Point2D,
    pub pt_b: Point2D,
}

impl LineSegment2D {
    pub fn new(pt_a: Point2D, pt_b: Point2D) -> Self {
        Self { pt_a, pt_b }
    }

    #[inline]
    pub fn direction(&self) -> Vector2D {
        self.pt_b - self.pt_a
    }

    #[inline]
    pub fn length_sqr(&self) -> f64 {
        self.direction().mag_sqr()
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.direction().mag()
    }

    #[inline]
    pub fn midpoint(&self) -> Point2D {
        0.5 * (self.pt_a + self.pt_b)
    }

    /// Closest point on the segment to `pt`.
    pub fn nearest_point(&self, pt: Point2D) -> Point2D {
        let d = self.direction();
        let len_sqr = d.mag_sqr();
        if len_sqr < EPSILON * EPSILON {
            return self.pt_a;
        }
        let t = (dot(pt - self.pt_a, d) / len_sqr).clamp(0.0, 1.0);
        self.pt_a + t * d
    }

    /// Parameter `t ∈ [0, 1]` along `self` where it crosses `other`, if it does.
    ///
    /// Collinear overlaps are reported as no intersection.
    pub fn intersection_param(&self, other: &LineSegment2D) -> Option<f64> {
        let r = self.direction();
        let s = other.direction();
        let denom = cross(r, s);
        if denom.abs() < EPSILON * r.mag().max(1.0) * s.mag().max(1.0) {
            return None;
        }
        let qp = other.pt_a - self.pt_a;
        let t = cross(qp, s) / denom;
        let u = cross(qp, r) / denom;
        let tol = 1e-12;
        if (-tol..=1.0 + tol).contains(&t) && (-tol..=1.0 + tol).contains(&u) {
            Some(t.clamp(0.0, 1.0))
        } else {
            None
        }
    }

    /// Point at parameter `t`.
    #[inline]
    pub fn at(&self, t: f64) -> Point2D {
        self.pt_a + t * self.direction()
    }
}

/// A simple polygon with counter-clockwise vertices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Polygon {
    vertices: Vec<Point2D>,
}

impl Polygon {
    /// Build a polygon, dropping a repeated closing vertex and reorienting to CCW.
    pub fn new<I: IntoIterator<Item = Point2D>>(vertices: I) -> Self {
        let mut vertices: Vec<Point2D> = vertices.into_iter().collect();
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        let mut pgn = Self { vertices };
        if pgn.signed_area() < 0.0 {
            pgn.vertices.reverse();
        }
        pgn
    }

    pub fn vertices(&self) -> &[Point2D] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Iterate over the edges, closing the loop.
    pub fn edges(&self) -> impl Iterator<Item = LineSegment2D> + '_ {
        self.vertices
            .iter()
            .circular_tuple_windows()
            .map(|(a, b)| LineSegment2D::new(*a, *b))
    }

    fn signed_area(&self) -> f64 {
        if self.vertices.len() < 3 {
            return 0.0;
        }
        let o = self.vertices[0];
        0.5 * self
            .vertices
            .iter()
            .circular_tuple_windows()
            .map(|(a, b)| cross(*a - o, *b - o))
            .sum::<f64>()
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Area centroid; degenerate polygons fall back to the vertex average.
    pub fn centroid(&self) -> Point2D {
        let a = self.signed_area();
        if a.abs() < EPSILON * EPSILON {
            if self.vertices.is_empty() {
                return Point2D::zero();
            }
            return self.vertices.iter().copied().sum::<Vector2D>() / self.vertices.len() as f64;
        }
        // shift to the first vertex to limit cancellation
        let o = self.vertices[0];
        let mut c = Vector2D::zero();
        for (p, q) in self.vertices.iter().circular_tuple_windows() {
            let (p, q) = (*p - o, *q - o);
            c += (p + q) * cross(p, q);
        }
        o + c / (6.0 * a)
    }

    /// Even-odd containment test.
    pub fn is_inside(&self, pt: Point2D) -> bool {
        let mut inside = false;
        for (a, b) in self.vertices.iter().circular_tuple_windows() {
            if (a.y > pt.y) != (b.y > pt.y) {
                let x = a.x + (pt.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if pt.x < x {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Closest edge to `pt`.
    pub fn nearest_edge(&self, pt: Point2D) -> Option<LineSegment2D> {
        self.edges().min_by(|e1, e2| {
            let d1 = (e1.nearest_point(pt) - pt).mag_sqr();
            let d2 = (e2.nearest_point(pt) - pt).mag_sqr();
            d1.total_cmp(&d2)
        })
    }

    /// Closest point on the polygon boundary to `pt`.
    pub fn nearest_intersect(&self, pt: Point2D) -> Point2D {
        self.nearest_edge(pt)
            .map(|e| e.nearest_point(pt))
            .unwrap_or(pt)
    }

    /// Crossings of `seg` with the boundary, ordered from `seg.pt_a`.
    ///
    /// Hits on a shared vertex are reported once.
    pub fn intersections(&self, seg: &LineSegment2D) -> Vec<Point2D> {
        let mut params: Vec<f64> = self
            .edges()
            .filter_map(|edge| seg.intersection_param(&edge))
            .collect();
        params.sort_by(f64::total_cmp);
        params.dedup_by(|a, b| (*a - *b).abs() < 1e-10);
        params.into_iter().map(|t| seg.at(t)).collect()
    }

    pub fn translate(&mut self, delta: Vector2D) {
        for v in &mut self.vertices {
            *v += delta;
        }
    }

    /// Scale about the centroid.
    pub fn scale(&mut self, factor: f64) {
        let c = self.centroid();
        for v in &mut self.vertices {
            *v = c + (*v - c) * factor;
        }
    }

    /// Rotate counter-clockwise about the centroid by `theta` radians.
    pub fn rotate(&mut self, theta: f64) {
        let c = self.centroid();
        for v in &mut self.vertices {
            *v = c + (*v - c).rotate(theta);
        }
    }

    /// Largest vertex distance from the centroid.
    pub fn bounding_radius(&self) -> f64 {
        let c = self.centroid();
        self.vertices
            .iter()
            .map(|v| (*v - c).mag())
            .fold(0.0, f64::max)
    }

    /// Second moment of area about the centroid (polar).
    pub fn polar_moment(&self) -> f64 {
        let c = self.centroid();
        let mut j = 0.0;
        for (p, q) in self.vertices.iter().circular_tuple_windows() {
            let (p, q) = (*p - c, *q - c);
            let w = cross(p, q);
            j += w * (dot(p, p) + dot(p, q) + dot(q, q));
        }
        (j / 12.0).abs()
    }

    /// Keep the part where `dot(n, x) <= d` (Sutherland–Hodgman against one plane).
    pub fn clip(&self, n: Vector2D, d: f64) -> Polygon {
        let side = |p: Point2D| dot(n, p) - d;
        let mut out = Vec::with_capacity(self.vertices.len() + 1);
        for (a, b) in self.vertices.iter().circular_tuple_windows() {
            let (sa, sb) = (side(*a), side(*b));
            if sa <= 0.0 {
                out.push(*a);
            }
            if (sa < 0.0 && sb > 0.0) || (sa > 0.0 && sb < 0.0) {
                let t = sa / (sa - sb);
                out.push(*a + t * (*b - *a));
            }
        }
        Polygon { vertices: out }
    }
}
