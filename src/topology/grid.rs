//! Per-rank view of a partitioned 2D finite-volume grid.
//!
//! A [`FiniteVolumeGrid2D`] holds the cells owned by this rank followed by one
//! layer of ghost cells (every foreign cell sharing at least a node with an
//! owned cell). Local ids are stable for the lifetime of the grid: owned cells
//! come first in partitioned-graph order, then ghosts in the same order.
//!
//! Faces are built for every edge of an owned cell. Ghost cells keep only the
//! faces they share with owned cells, so their links are partial.

use crate::algs::communicator::Communicator;
use crate::algs::context::CommContext;
use crate::geometry::{cross, Point2D, Polygon};
use crate::mesh_error::FvError;
use crate::topology::cell::{BoundaryLink, Cell, DiagonalLink, Face, InteriorLink};
use crate::topology::halo::HaloPlan;
use crate::topology::ownership::CellOwnership;
use crate::topology::partition::{edge_key, PartitionedMesh};
use crate::topology::spatial::CellIndex;
use bytemuck::Pod;
use hashbrown::HashMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_GRID_ID: AtomicU64 = AtomicU64::new(1);

/// Name given to boundary faces not listed in any patch.
pub const DEFAULT_PATCH: &str = "default";

/// A named set of boundary faces.
#[derive(Clone, Debug, PartialEq)]
pub struct Patch {
    pub(crate) id: usize,
    pub(crate) name: String,
    pub(crate) faces: Vec<usize>,
}

impl Patch {
    pub fn id(&self) -> usize {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn faces(&self) -> &[usize] {
        &self.faces
    }
}

#[derive(Clone, Debug)]
pub struct FiniteVolumeGrid2D {
    id: u64,
    rank: usize,
    n_ranks: usize,
    nodes: Vec<Point2D>,
    node_cells: Vec<Vec<usize>>,
    cells: Vec<Cell>,
    faces: Vec<Face>,
    patches: Vec<Patch>,
    ownership: CellOwnership,
    halo: HaloPlan,
    active: Vec<bool>,
    global_index: Vec<Option<usize>>,
    local_active: Vec<usize>,
    active_offset: usize,
    n_global_active: usize,
    bounds: (Point2D, Point2D),
    index: CellIndex,
}

/// Node loop of `cell` reoriented counter-clockwise.
fn ccw_loop(mesh: &PartitionedMesh, cell: usize) -> Vec<usize> {
    let mut loop_ = mesh.cells[cell].clone();
    let o = mesh.nodes[loop_[0]];
    let twice_area: f64 = (0..loop_.len())
        .map(|k| {
            let a = mesh.nodes[loop_[k]] - o;
            let b = mesh.nodes[loop_[(k + 1) % loop_.len()]] - o;
            cross(a, b)
        })
        .sum();
    if twice_area < 0.0 {
        loop_.reverse();
    }
    loop_
}

impl FiniteVolumeGrid2D {
    /// Build this rank's piece of `mesh`, including the halo exchange plan and
    /// an initial global ordering in which every owned cell is active.
    pub fn from_partition<C: Communicator>(
        mesh: &PartitionedMesh,
        comm: &CommContext<C>,
    ) -> Result<Self, FvError> {
        let (rank, n_ranks) = (comm.rank(), comm.size());
        mesh.validate(n_ranks)?;
        let edge_cells = mesh.edge_cells()?;
        let patch_of_edge = mesh.patch_of_edges(&edge_cells)?;

        let mut global_node_cells = vec![Vec::new(); mesh.nodes.len()];
        for (c, loop_) in mesh.cells.iter().enumerate() {
            for &n in loop_ {
                global_node_cells[n].push(c);
            }
        }

        // owned cells, then the node-adjacent ghost layer
        let owned: Vec<usize> = (0..mesh.n_cells()).filter(|&c| mesh.owners[c] == rank).collect();
        let ghosts: BTreeSet<usize> = owned
            .iter()
            .flat_map(|&c| mesh.cells[c].iter().flat_map(|&n| global_node_cells[n].iter().copied()))
            .filter(|&c| mesh.owners[c] != rank)
            .collect();
        let local_cells: Vec<usize> = owned.iter().copied().chain(ghosts).collect();
        let local_of: HashMap<usize, usize> =
            local_cells.iter().enumerate().map(|(l, &g)| (g, l)).collect();

        let global_nodes: BTreeSet<usize> = local_cells
            .iter()
            .flat_map(|&c| mesh.cells[c].iter().copied())
            .collect();
        let node_of: HashMap<usize, usize> =
            global_nodes.iter().enumerate().map(|(l, &g)| (g, l)).collect();
        let nodes: Vec<Point2D> = global_nodes.iter().map(|&g| mesh.nodes[g]).collect();

        let mut ownership = CellOwnership::new(rank);
        let mut cells = Vec::with_capacity(local_cells.len());
        let mut loops = Vec::with_capacity(local_cells.len());
        for (l, &g) in local_cells.iter().enumerate() {
            let loop_ = ccw_loop(mesh, g);
            let owner = mesh.owners[g];
            ownership.push(g, owner);
            let local_nodes: Vec<usize> = loop_.iter().map(|n| node_of[n]).collect();
            let shape = Polygon::new(loop_.iter().map(|&n| mesh.nodes[n]));
            cells.push(Cell::new(l, g, owner, owner != rank, local_nodes, shape));
            loops.push(loop_);
        }

        let mut patches: Vec<Patch> = mesh
            .patches
            .iter()
            .enumerate()
            .map(|(id, p)| Patch {
                id,
                name: p.name.clone(),
                faces: Vec::new(),
            })
            .collect();

        let mut faces: Vec<Face> = Vec::new();
        let mut face_of_edge: HashMap<(usize, usize), usize> = HashMap::new();
        for l in 0..owned.len() {
            let loop_ = &loops[l];
            for k in 0..loop_.len() {
                let (a, b) = (loop_[k], loop_[(k + 1) % loop_.len()]);
                let key = edge_key(a, b);
                if face_of_edge.contains_key(&key) {
                    continue;
                }
                let other = edge_cells
                    .get(&key)
                    .and_then(|users| users.iter().copied().find(|&u| u != local_cells[l]))
                    .map(|g| local_of.get(&g).copied().ok_or(FvError::DanglingFace(a, b)))
                    .transpose()?;
                let patch = match other {
                    Some(_) => None,
                    None => Some(match patch_of_edge.get(&key) {
                        Some(&p) => p,
                        None => match patches.iter().position(|p| p.name == DEFAULT_PATCH) {
                            Some(p) => p,
                            None => {
                                patches.push(Patch {
                                    id: patches.len(),
                                    name: DEFAULT_PATCH.into(),
                                    faces: Vec::new(),
                                });
                                patches.len() - 1
                            }
                        },
                    }),
                };
                let id = faces.len();
                faces.push(Face::new(
                    id,
                    [node_of[&a], node_of[&b]],
                    [mesh.nodes[a], mesh.nodes[b]],
                    l,
                    other,
                    patch,
                ));
                face_of_edge.insert(key, id);
                cells[l].faces.push(id);
                if let Some(r) = other {
                    cells[r].faces.push(id);
                }
                if let Some(p) = patch {
                    patches[p].faces.push(id);
                }
            }
        }

        for (l, cell) in cells.iter().enumerate().take(owned.len()) {
            if cell.faces.len() < 3 {
                return Err(FvError::DegenerateCell {
                    cell: local_cells[l],
                    faces: cell.faces.len(),
                });
            }
        }

        let mut node_cells = vec![Vec::new(); nodes.len()];
        for cell in &cells {
            for &n in &cell.nodes {
                node_cells[n].push(cell.id);
            }
        }

        let halo = HaloPlan::negotiate(&ownership, comm)?;
        let bounds = nodes.iter().fold(
            (
                Point2D::new(f64::INFINITY, f64::INFINITY),
                Point2D::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            ),
            |(lo, hi), p| {
                (
                    Point2D::new(lo.x.min(p.x), lo.y.min(p.y)),
                    Point2D::new(hi.x.max(p.x), hi.y.max(p.y)),
                )
            },
        );

        let n_local = cells.len();
        let mut active = vec![false; n_local];
        for a in active.iter_mut().take(owned.len()) {
            *a = true;
        }

        let index = CellIndex::build(&cells);
        let mut grid = Self {
            id: NEXT_GRID_ID.fetch_add(1, Ordering::Relaxed),
            rank,
            n_ranks,
            nodes,
            node_cells,
            cells,
            faces,
            patches,
            ownership,
            halo,
            active,
            global_index: vec![None; n_local],
            local_active: Vec::new(),
            active_offset: 0,
            n_global_active: 0,
            bounds,
            index,
        };
        grid.init_links();
        grid.init_diagonal_links();
        grid.compute_global_ordering(comm)?;
        log::debug!(
            "rank {}: grid with {} owned, {} ghost cells and {} faces",
            rank,
            owned.len(),
            n_local - owned.len(),
            grid.faces.len()
        );
        Ok(grid)
    }

    /// Re-derive link geometry from the current (possibly scaled) faces.
    pub fn init_links(&mut self) {
        let mut interior = vec![Vec::new(); self.cells.len()];
        let mut boundary = vec![Vec::new(); self.cells.len()];
        for cell in &self.cells {
            for &f in &cell.faces {
                let face = &self.faces[f];
                let r_face_vec = face.centroid - cell.centroid;
                let out_norm = face.outward_norm(cell.centroid);
                match face.neighbor_of(cell.id) {
                    Some(nb) => {
                        let other = &self.cells[nb];
                        let (d_self, d_nb) =
                            ((face.centroid - cell.centroid).mag(), (other.centroid - face.centroid).mag());
                        interior[cell.id].push(InteriorLink {
                            face: f,
                            cell: nb,
                            r_face_vec,
                            r_cell_vec: other.centroid - cell.centroid,
                            out_norm,
                            volume_weight: other.volume / (cell.volume + other.volume),
                            distance_weight: d_nb / (d_self + d_nb),
                        });
                    }
                    None => {
                        if let Some(patch) = face.patch {
                            boundary[cell.id].push(BoundaryLink {
                                face: f,
                                patch,
                                r_face_vec,
                                out_norm,
                            });
                        }
                    }
                }
            }
        }
        for ((cell, i), b) in self.cells.iter_mut().zip(interior).zip(boundary) {
            cell.interior_links = i;
            cell.boundary_links = b;
        }
    }

    fn init_diagonal_links(&mut self) {
        let mut diagonal = vec![Vec::new(); self.cells.len()];
        for cell in self.cells.iter().filter(|c| !c.is_ghost) {
            let face_nbs: BTreeSet<usize> = cell.interior_links.iter().map(|l| l.cell).collect();
            let node_nbs: BTreeSet<usize> = cell
                .nodes
                .iter()
                .flat_map(|&n| self.node_cells[n].iter().copied())
                .filter(|&c| c != cell.id && !face_nbs.contains(&c))
                .collect();
            diagonal[cell.id] = node_nbs
                .into_iter()
                .map(|c| DiagonalLink {
                    cell: c,
                    r_cell_vec: self.cells[c].centroid - cell.centroid,
                })
                .collect();
        }
        for (cell, d) in self.cells.iter_mut().zip(diagonal) {
            cell.diagonal_links = d;
        }
    }

    /// Scale the open length of `face` by `factor`, clamped to `(0, 1]`.
    /// Call [`init_links`](Self::init_links) afterwards.
    pub fn scale_face(&mut self, face: usize, factor: f64) -> Result<(), FvError> {
        let f = self.faces.get_mut(face).ok_or(FvError::MissingEntity {
            what: "face",
            index: face,
        })?;
        f.scale = factor.clamp(f64::MIN_POSITIVE, 1.0);
        f.norm = f.base_norm * f.scale;
        Ok(())
    }

    /// Undo every cut-face scaling.
    pub fn reset_face_scales(&mut self) {
        for f in &mut self.faces {
            f.scale = 1.0;
            f.norm = f.base_norm;
        }
    }

    /// Mark an owned cell as taking part in (or excluded from) discretization.
    /// Ghost cells are never active.
    pub fn set_active(&mut self, cell: usize, active: bool) -> Result<(), FvError> {
        if !self.ownership.is_owned(cell) {
            return Err(FvError::InactiveCell(cell));
        }
        self.active[cell] = active;
        Ok(())
    }

    /// Give active owned cells contiguous global indices in rank order and
    /// fetch the indices of ghost cells from their owners.
    pub fn compute_global_ordering<C: Communicator>(
        &mut self,
        comm: &CommContext<C>,
    ) -> Result<(), FvError> {
        self.local_active = (0..self.cells.len())
            .filter(|&c| self.active[c] && !self.cells[c].is_ghost)
            .collect();
        let counts = comm.all_gather(self.local_active.len() as u64)?;
        self.active_offset = counts[..self.rank].iter().sum::<u64>() as usize;
        self.n_global_active = counts.iter().sum::<u64>() as usize;

        let mut index = vec![-1i64; self.cells.len()];
        for (k, &c) in self.local_active.iter().enumerate() {
            index[c] = (self.active_offset + k) as i64;
        }
        self.halo.exchange(comm, &mut index)?;
        self.global_index = index
            .into_iter()
            .map(|i| usize::try_from(i).ok())
            .collect();
        Ok(())
    }

    /// Halo exchange: overwrite every ghost entry with its owner's value.
    pub fn send_messages<T: Pod, C: Communicator>(
        &self,
        comm: &CommContext<C>,
        values: &mut [T],
    ) -> Result<(), FvError> {
        if values.len() != self.cells.len() {
            return Err(FvError::ShapeMismatch {
                op: "halo exchange",
                lhs: values.len(),
                rhs: self.cells.len(),
            });
        }
        self.halo.exchange(comm, values)
    }

    // ---- queries ----

    /// Identity tag used to detect fields from different grids.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn n_ranks(&self) -> usize {
        self.n_ranks
    }

    pub fn nodes(&self) -> &[Point2D] {
        &self.nodes
    }

    /// Local cells touching each node.
    pub fn node_cells(&self, node: usize) -> &[usize] {
        &self.node_cells[node]
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, id: usize) -> &Cell {
        &self.cells[id]
    }

    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn face(&self, id: usize) -> &Face {
        &self.faces[id]
    }

    pub fn interior_faces(&self) -> impl Iterator<Item = &Face> + '_ {
        self.faces.iter().filter(|f| f.is_interior())
    }

    pub fn boundary_faces(&self) -> impl Iterator<Item = &Face> + '_ {
        self.faces.iter().filter(|f| f.is_boundary())
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn patch(&self, id: usize) -> &Patch {
        &self.patches[id]
    }

    pub fn patch_by_name(&self, name: &str) -> Option<&Patch> {
        self.patches.iter().find(|p| p.name == name)
    }

    pub fn ownership(&self) -> &CellOwnership {
        &self.ownership
    }

    pub fn halo(&self) -> &HaloPlan {
        &self.halo
    }

    pub fn local_cells(&self) -> impl Iterator<Item = usize> + '_ {
        self.ownership.owned_cells()
    }

    pub fn ghost_cells(&self) -> impl Iterator<Item = usize> + '_ {
        self.ownership.ghost_cells()
    }

    pub fn n_local_cells(&self) -> usize {
        self.ownership.owned_cells().count()
    }

    /// Active owned cells in global-index order.
    pub fn local_active_cells(&self) -> &[usize] {
        &self.local_active
    }

    pub fn n_active_cells(&self) -> usize {
        self.local_active.len()
    }

    pub fn n_global_active_cells(&self) -> usize {
        self.n_global_active
    }

    /// First global index owned by this rank.
    pub fn active_offset(&self) -> usize {
        self.active_offset
    }

    pub fn is_active(&self, cell: usize) -> bool {
        self.active.get(cell).copied().unwrap_or(false) && !self.cells[cell].is_ghost
    }

    /// Global index of an active cell (owned or ghost).
    pub fn global_index(&self, cell: usize) -> Option<usize> {
        self.global_index.get(cell).copied().flatten()
    }

    /// Lower-left and upper-right corners of the local nodes.
    pub fn bounds(&self) -> (Point2D, Point2D) {
        self.bounds
    }

    /// Bounding box over all ranks.
    pub fn global_bounds<C: Communicator>(
        &self,
        comm: &CommContext<C>,
    ) -> Result<(Point2D, Point2D), FvError> {
        Ok((comm.min(self.bounds.0)?, comm.max(self.bounds.1)?))
    }

    /// The `k` local cells with centroids nearest to `pt`, nearest first.
    pub fn nearest_cells(&self, pt: Point2D, k: usize) -> Vec<usize> {
        self.index.nearest(pt, k)
    }

    /// Local cell containing `pt`.
    pub fn find_cell(&self, pt: Point2D) -> Option<usize> {
        self.index
            .candidates(pt)
            .filter(|&c| self.cells[c].is_inside(pt))
            .min()
    }

    /// Weight of the left cell for volume-weighted face interpolation.
    pub fn face_volume_weight(&self, face: usize) -> f64 {
        let f = &self.faces[face];
        match f.r_cell {
            Some(r) => {
                let (vl, vr) = (self.cells[f.l_cell].volume, self.cells[r].volume);
                vr / (vl + vr)
            }
            None => 1.0,
        }
    }

    /// Sum of owned cell volumes.
    pub fn local_volume(&self) -> f64 {
        self.local_cells().map(|c| self.cells[c].volume).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;

    fn serial(nx: usize, ny: usize) -> FiniteVolumeGrid2D {
        let mesh = PartitionedMesh::rectilinear(nx, ny, 1.0, 1.0);
        FiniteVolumeGrid2D::from_partition(&mesh, &CommContext::new(NoComm)).unwrap()
    }

    #[test]
    fn serial_grid_has_no_ghosts() {
        let g = serial(3, 3);
        assert_eq!(g.n_cells(), 9);
        assert_eq!(g.ghost_cells().count(), 0);
        assert_eq!(g.faces().len(), 24);
        assert_eq!(g.boundary_faces().count(), 12);
        assert_eq!(g.n_global_active_cells(), 9);
        assert!((g.local_volume() - 9.0).abs() < 1e-12);
    }

    #[test]
    fn links_point_outward() {
        let g = serial(3, 3);
        let centre = g.cell(4);
        assert_eq!(centre.interior_links().len(), 4);
        assert_eq!(centre.diagonal_links().len(), 4);
        for l in centre.interior_links() {
            assert!(crate::geometry::dot(l.out_norm, l.r_cell_vec) > 0.0);
            assert!((l.volume_weight - 0.5).abs() < 1e-14);
        }
        let corner = g.cell(0);
        assert_eq!(corner.boundary_links().len(), 2);
        for l in corner.boundary_links() {
            assert!(crate::geometry::dot(l.out_norm, l.r_face_vec) > 0.0);
        }
    }

    #[test]
    fn scaled_faces_shrink_links() {
        let mut g = serial(2, 1);
        let f = g.cell(0).interior_links()[0].face;
        g.scale_face(f, 0.25).unwrap();
        g.init_links();
        assert!((g.cell(0).interior_links()[0].out_norm.mag() - 0.25).abs() < 1e-14);
        g.reset_face_scales();
        g.init_links();
        assert!((g.cell(1).interior_links()[0].out_norm.mag() - 1.0).abs() < 1e-14);
    }

    #[test]
    fn queries() {
        let g = serial(4, 4);
        assert_eq!(g.find_cell(Point2D::new(2.5, 1.5)), Some(6));
        assert_eq!(g.nearest_cells(Point2D::new(0.4, 0.4), 1), vec![0]);
        assert_eq!(g.bounds(), (Point2D::new(0.0, 0.0), Point2D::new(4.0, 4.0)));
    }

    #[test]
    fn degenerate_input_is_fatal() {
        let mut mesh = PartitionedMesh::rectilinear(1, 1, 1.0, 1.0);
        mesh.cells[0].truncate(2);
        let err = FiniteVolumeGrid2D::from_partition(&mesh, &CommContext::new(NoComm)).unwrap_err();
        assert!(matches!(err, FvError::DegenerateCell { .. }));
    }
}
