//! The externally partitioned mesh graph a grid is built from.
//!
//! Every rank receives the same [`PartitionedMesh`]: global node coordinates,
//! global cells as counter-clockwise node loops, the owning rank of each cell
//! and the named boundary patches. Partitioning itself happens elsewhere; the
//! strip partitioner here only exists to set up tests and demos.

use crate::geometry::{Point2D, Polygon};
use crate::mesh_error::FvError;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// A named boundary patch given as a list of node-pair edges.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatchSpec {
    pub name: String,
    pub edges: Vec<[usize; 2]>,
}

/// Global, already partitioned mesh graph.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PartitionedMesh {
    pub nodes: Vec<Point2D>,
    pub cells: Vec<Vec<usize>>,
    pub owners: Vec<usize>,
    pub patches: Vec<PatchSpec>,
}

/// Unordered edge key.
#[inline]
pub(crate) fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b { (a, b) } else { (b, a) }
}

impl PartitionedMesh {
    /// `nx × ny` rectangular cells of size `hx × hy` with the lower-left corner
    /// at the origin, all owned by rank 0. Patches are `x-`, `x+`, `y-`, `y+`.
    pub fn rectilinear(nx: usize, ny: usize, hx: f64, hy: f64) -> Self {
        let node = |i: usize, j: usize| j * (nx + 1) + i;
        let nodes = (0..=ny)
            .flat_map(|j| (0..=nx).map(move |i| Point2D::new(i as f64 * hx, j as f64 * hy)))
            .collect();
        let cells = (0..ny)
            .flat_map(|j| {
                (0..nx).map(move |i| {
                    vec![node(i, j), node(i + 1, j), node(i + 1, j + 1), node(i, j + 1)]
                })
            })
            .collect::<Vec<_>>();
        let patches = vec![
            PatchSpec {
                name: "x-".into(),
                edges: (0..ny).map(|j| [node(0, j + 1), node(0, j)]).collect(),
            },
            PatchSpec {
                name: "x+".into(),
                edges: (0..ny).map(|j| [node(nx, j), node(nx, j + 1)]).collect(),
            },
            PatchSpec {
                name: "y-".into(),
                edges: (0..nx).map(|i| [node(i, 0), node(i + 1, 0)]).collect(),
            },
            PatchSpec {
                name: "y+".into(),
                edges: (0..nx).map(|i| [node(i + 1, ny), node(i, ny)]).collect(),
            },
        ];
        let owners = vec![0; cells.len()];
        Self {
            nodes,
            cells,
            owners,
            patches,
        }
    }

    /// Reassign owners in `n_parts` vertical strips of roughly equal width,
    /// by cell centroid x-coordinate.
    pub fn partition_strips(mut self, n_parts: usize) -> Self {
        let n_parts = n_parts.max(1);
        let xs: Vec<f64> = self
            .cells
            .iter()
            .map(|c| Polygon::new(c.iter().map(|&n| self.nodes[n])).centroid().x)
            .collect();
        let (lo, hi) = xs
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)));
        let width = (hi - lo).max(f64::MIN_POSITIVE);
        self.owners = xs
            .iter()
            .map(|&x| (((x - lo) / width * n_parts as f64) as usize).min(n_parts - 1))
            .collect();
        self
    }

    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    /// Check indices and ownership before any grid is built.
    pub fn validate(&self, n_ranks: usize) -> Result<(), FvError> {
        if self.owners.len() != self.cells.len() {
            return Err(FvError::ShapeMismatch {
                op: "partition owners",
                lhs: self.owners.len(),
                rhs: self.cells.len(),
            });
        }
        for (cell, (loop_, &owner)) in self.cells.iter().zip(&self.owners).enumerate() {
            if owner >= n_ranks {
                return Err(FvError::InvalidPartition {
                    cell,
                    owner,
                    size: n_ranks,
                });
            }
            if loop_.len() < 3 {
                return Err(FvError::DegenerateCell {
                    cell,
                    faces: loop_.len(),
                });
            }
            if let Some(&bad) = loop_.iter().find(|&&n| n >= self.nodes.len()) {
                return Err(FvError::MissingEntity {
                    what: "node",
                    index: bad,
                });
            }
        }
        Ok(())
    }

    /// Map from unordered edge to the (at most two) cells using it.
    pub(crate) fn edge_cells(&self) -> Result<HashMap<(usize, usize), Vec<usize>>, FvError> {
        let mut map: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        for (c, loop_) in self.cells.iter().enumerate() {
            for k in 0..loop_.len() {
                let (a, b) = (loop_[k], loop_[(k + 1) % loop_.len()]);
                let users = map.entry(edge_key(a, b)).or_default();
                users.push(c);
                if users.len() > 2 {
                    return Err(FvError::DanglingFace(a, b));
                }
            }
        }
        Ok(map)
    }

    /// Patch index of every boundary edge. A patch edge that is not on exactly
    /// one cell is dangling.
    pub(crate) fn patch_of_edges(
        &self,
        edge_cells: &HashMap<(usize, usize), Vec<usize>>,
    ) -> Result<HashMap<(usize, usize), usize>, FvError> {
        let mut out = HashMap::new();
        for (p, patch) in self.patches.iter().enumerate() {
            for &[a, b] in &patch.edges {
                let key = edge_key(a, b);
                match edge_cells.get(&key) {
                    Some(users) if users.len() == 1 => {
                        out.insert(key, p);
                    }
                    _ => return Err(FvError::DanglingFace(a, b)),
                }
            }
        }
        Ok(out)
    }
}
