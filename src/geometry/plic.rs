//! Piecewise-linear interface reconstruction (PLIC) on polygonal cells.
//!
//! Given a cell, a volume fraction `γ` and an interface normal `n`, find the
//! line `n·x = d` such that the part of the cell behind it (`n·x <= d`) has
//! area `γ·V`. The normal therefore points out of the reconstructed phase.

use crate::geometry::polygon::Polygon;
use crate::geometry::vector::{dot, Vector2D};

const MAX_BISECTIONS: usize = 200;

/// Phase polygon inside `cell` with area `gamma * cell.area()`.
///
/// `gamma` is clamped to `[0, 1]`; a zero normal yields the full or empty cell.
pub fn interface_polygon(cell: &Polygon, gamma: f64, normal: Vector2D) -> Polygon {
    let gamma = gamma.clamp(0.0, 1.0);
    let n = normal.unit_vec();
    if cell.is_empty() || gamma <= 0.0 || n.mag_sqr() == 0.0 {
        return if gamma >= 1.0 { cell.clone() } else { Polygon::default() };
    }
    if gamma >= 1.0 {
        return cell.clone();
    }

    let target = gamma * cell.area();

    // sort the vertex levels and bracket the segment of d where the area crosses
    let mut levels: Vec<f64> = cell.vertices().iter().map(|v| dot(n, *v)).collect();
    levels.sort_by(f64::total_cmp);
    levels.dedup();

    let area_at = |d: f64| cell.clip(n, d).area();

    let mut lo = levels[0];
    let mut hi = levels[levels.len() - 1];
    for w in levels.windows(2) {
        if area_at(w[1]) >= target {
            lo = w[0];
            hi = w[1];
            break;
        }
    }

    // area(d) is monotone (piecewise quadratic) on [lo, hi]
    for _ in 0..MAX_BISECTIONS {
        let mid = 0.5 * (lo + hi);
        if mid <= lo || mid >= hi {
            break;
        }
        if area_at(mid) < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    let (a_lo, a_hi) = (area_at(lo), area_at(hi));
    let d = if (a_lo - target).abs() <= (a_hi - target).abs() { lo } else { hi };
    cell.clip(n, d)
}
