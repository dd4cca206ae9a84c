//! R-tree over the local cells for point location and nearest-centroid
//! queries.

use crate::geometry::Point2D;
use crate::topology::cell::Cell;
use rstar::primitives::GeomWithData;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// Axis-aligned box around one cell.
#[derive(Clone, Debug)]
struct CellEnvelope {
    cell: usize,
    lo: [f64; 2],
    hi: [f64; 2],
}

impl CellEnvelope {
    fn new(cell: &Cell) -> Self {
        let (mut lo, mut hi) = ([f64::MAX; 2], [f64::MIN; 2]);
        for v in cell.shape.vertices() {
            lo = [lo[0].min(v.x), lo[1].min(v.y)];
            hi = [hi[0].max(v.x), hi[1].max(v.y)];
        }
        Self { cell: cell.id, lo, hi }
    }
}

impl RTreeObject for CellEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.lo, self.hi)
    }
}

impl PointDistance for CellEnvelope {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = (self.lo[0] - point[0]).max(point[0] - self.hi[0]).max(0.0);
        let dy = (self.lo[1] - point[1]).max(point[1] - self.hi[1]).max(0.0);
        dx * dx + dy * dy
    }

    fn contains_point(&self, point: &[f64; 2]) -> bool {
        point[0] >= self.lo[0]
            && point[0] <= self.hi[0]
            && point[1] >= self.lo[1]
            && point[1] <= self.hi[1]
    }
}

type Centroid = GeomWithData<[f64; 2], usize>;

#[derive(Clone, Debug, Default)]
pub struct CellIndex {
    boxes: RTree<CellEnvelope>,
    centroids: RTree<Centroid>,
}

impl CellIndex {
    pub fn build(cells: &[Cell]) -> Self {
        Self {
            boxes: RTree::bulk_load(cells.iter().map(CellEnvelope::new).collect()),
            centroids: RTree::bulk_load(
                cells
                    .iter()
                    .map(|c| Centroid::new([c.centroid.x, c.centroid.y], c.id))
                    .collect(),
            ),
        }
    }

    /// Cells whose bounding box holds `pt`; the caller does the exact test.
    pub fn candidates(&self, pt: Point2D) -> impl Iterator<Item = usize> + '_ {
        self.boxes.locate_all_at_point(&[pt.x, pt.y]).map(|e| e.cell)
    }

    /// The `k` nearest centroids, ties broken by cell id.
    pub fn nearest(&self, pt: Point2D, k: usize) -> Vec<usize> {
        if k == 0 {
            return Vec::new();
        }
        let mut found: Vec<(f64, usize)> = Vec::with_capacity(k + 4);
        for (c, d2) in self.centroids.nearest_neighbor_iter_with_distance_2(&[pt.x, pt.y]) {
            if found.len() >= k && d2 > found[k - 1].0 {
                break;
            }
            found.push((d2, c.data));
        }
        found.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        found.into_iter().take(k).map(|(_, c)| c).collect()
    }
}
