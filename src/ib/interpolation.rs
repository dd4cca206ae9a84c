//! Bilinear sampling of cell-centred fields at arbitrary points.

use crate::field::FiniteVolumeField;
use crate::field::FieldValue;
use crate::geometry::{Point2D, Vector2D};
use crate::topology::FiniteVolumeGrid2D;

const PIVOT_TOL: f64 = 1e-12;

/// Weights of `φ(x, y) = a + b·x + c·y + d·x·y` fitted through four cell
/// centroids around the sample point.
#[derive(Clone, Debug, PartialEq)]
pub struct BilinearInterpolator {
    point: Point2D,
    cells: [usize; 4],
    value_weights: [f64; 4],
    dx_weights: [f64; 4],
    dy_weights: [f64; 4],
}

/// Solve `m·x = rhs` by Gaussian elimination with partial pivoting.
fn solve4(mut m: [[f64; 4]; 4], mut rhs: [f64; 4]) -> Option<[f64; 4]> {
    for col in 0..4 {
        let pivot = (col..4).max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))?;
        if m[pivot][col].abs() < PIVOT_TOL {
            return None;
        }
        m.swap(col, pivot);
        rhs.swap(col, pivot);
        for row in col + 1..4 {
            let f = m[row][col] / m[col][col];
            for k in col..4 {
                m[row][k] -= f * m[col][k];
            }
            rhs[row] -= f * rhs[col];
        }
    }
    let mut x = [0.0; 4];
    for row in (0..4).rev() {
        let s: f64 = (row + 1..4).map(|k| m[row][k] * x[k]).sum();
        x[row] = (rhs[row] - s) / m[row][row];
    }
    Some(x)
}

/// The four cells sharing `node`, nearest centroids first.
fn cells_around(grid: &FiniteVolumeGrid2D, node: usize, point: Point2D) -> Option<[usize; 4]> {
    let mut cells = grid.node_cells(node).to_vec();
    if cells.len() < 4 {
        return None;
    }
    cells.sort_by(|&a, &b| {
        let da = (grid.cell(a).centroid() - point).mag_sqr();
        let db = (grid.cell(b).centroid() - point).mag_sqr();
        da.total_cmp(&db).then(a.cmp(&b))
    });
    cells.truncate(4);
    cells.try_into().ok()
}

impl BilinearInterpolator {
    /// Stencil of the cells surrounding `point`.
    ///
    /// The cells sharing the node of the containing cell nearest to `point`
    /// are tried first, then its other nodes, then the four nearest
    /// centroids. `None` when no candidate determines a bilinear fit.
    pub fn new(grid: &FiniteVolumeGrid2D, point: Point2D) -> Option<Self> {
        let anchor = grid
            .find_cell(point)
            .or_else(|| grid.nearest_cells(point, 1).first().copied())?;
        let mut nodes = grid.cell(anchor).nodes().to_vec();
        let nodes_at = grid.nodes();
        nodes.sort_by(|&a, &b| {
            (nodes_at[a] - point)
                .mag_sqr()
                .total_cmp(&(nodes_at[b] - point).mag_sqr())
        });
        nodes
            .into_iter()
            .filter_map(|n| cells_around(grid, n, point))
            .chain(std::iter::once_with(|| grid.nearest_cells(point, 4).try_into().ok()).flatten())
            .find_map(|cells| Self::fit(grid, point, cells))
    }

    fn fit(grid: &FiniteVolumeGrid2D, point: Point2D, cells: [usize; 4]) -> Option<Self> {
        // local coordinates keep the system well scaled
        let origin = grid.cell(cells[0]).centroid();
        let h = cells
            .iter()
            .map(|&c| (grid.cell(c).centroid() - origin).mag())
            .fold(0.0, f64::max)
            .max(f64::MIN_POSITIVE);
        let local = |p: Point2D| (p - origin) / h;

        // m^T: column i holds the basis at centroid i
        let mut mt = [[0.0; 4]; 4];
        for (i, &c) in cells.iter().enumerate() {
            let q = local(grid.cell(c).centroid());
            let basis = [1.0, q.x, q.y, q.x * q.y];
            for (r, b) in basis.into_iter().enumerate() {
                mt[r][i] = b;
            }
        }
        let p = local(point);
        let value_weights = solve4(mt, [1.0, p.x, p.y, p.x * p.y])?;
        let dx_weights = solve4(mt, [0.0, 1.0 / h, 0.0, p.y / h])?;
        let dy_weights = solve4(mt, [0.0, 0.0, 1.0 / h, p.x / h])?;
        Some(Self {
            point,
            cells,
            value_weights,
            dx_weights,
            dy_weights,
        })
    }

    pub fn point(&self) -> Point2D {
        self.point
    }

    pub fn cells(&self) -> &[usize; 4] {
        &self.cells
    }

    /// Interpolated value of `field` at the sample point.
    pub fn value<T: FieldValue>(&self, field: &FiniteVolumeField<T>) -> T {
        self.cells
            .iter()
            .zip(&self.value_weights)
            .fold(T::default(), |acc, (&c, &w)| acc + field[c] * w)
    }

    /// Gradient of the bilinear fit of component `component`.
    pub fn grad<T: FieldValue>(&self, field: &FiniteVolumeField<T>, component: usize) -> Vector2D {
        self.cells
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let v = field[c].component(component);
                Vector2D::new(self.dx_weights[i] * v, self.dy_weights[i] * v)
            })
            .sum()
    }
}
