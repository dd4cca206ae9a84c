//! Cells, faces and the links between them.
//!
//! Links are derived data: they cache the geometric quantities a
//! discretization needs (outward normals, centroid offsets, interpolation
//! weights) and are rebuilt by
//! [`FiniteVolumeGrid2D::init_links`](crate::topology::FiniteVolumeGrid2D::init_links)
//! whenever face areas change.

use crate::geometry::{dot, Point2D, Polygon, Vector2D};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FaceType {
    Interior,
    Boundary,
}

/// An edge between one or two cells.
///
/// `norm` points from `l_cell` towards `r_cell` (outward for boundary faces)
/// and has the face length as magnitude, times the cut scale factor.
#[derive(Clone, Debug)]
pub struct Face {
    pub(crate) id: usize,
    pub(crate) nodes: [usize; 2],
    pub(crate) l_cell: usize,
    pub(crate) r_cell: Option<usize>,
    pub(crate) kind: FaceType,
    pub(crate) patch: Option<usize>,
    pub(crate) centroid: Point2D,
    pub(crate) base_norm: Vector2D,
    pub(crate) norm: Vector2D,
    pub(crate) tangent: Vector2D,
    pub(crate) scale: f64,
}

impl Face {
    pub(crate) fn new(
        id: usize,
        nodes: [usize; 2],
        coords: [Point2D; 2],
        l_cell: usize,
        r_cell: Option<usize>,
        patch: Option<usize>,
    ) -> Self {
        let tangent = coords[1] - coords[0];
        let base_norm = tangent.normal_vec();
        Self {
            id,
            nodes,
            l_cell,
            r_cell,
            kind: if r_cell.is_some() {
                FaceType::Interior
            } else {
                FaceType::Boundary
            },
            patch,
            centroid: 0.5 * (coords[0] + coords[1]),
            base_norm,
            norm: base_norm,
            tangent,
            scale: 1.0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn nodes(&self) -> [usize; 2] {
        self.nodes
    }

    pub fn l_cell(&self) -> usize {
        self.l_cell
    }

    pub fn r_cell(&self) -> Option<usize> {
        self.r_cell
    }

    pub fn kind(&self) -> FaceType {
        self.kind
    }

    pub fn is_interior(&self) -> bool {
        self.kind == FaceType::Interior
    }

    pub fn is_boundary(&self) -> bool {
        self.kind == FaceType::Boundary
    }

    pub fn patch(&self) -> Option<usize> {
        self.patch
    }

    pub fn centroid(&self) -> Point2D {
        self.centroid
    }

    /// Scaled normal.
    pub fn norm(&self) -> Vector2D {
        self.norm
    }

    pub fn tan(&self) -> Vector2D {
        self.tangent
    }

    /// Fraction of the face left open by cut-cell treatment, in `(0, 1]`.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn length(&self) -> f64 {
        self.tangent.mag()
    }

    /// The normal oriented away from `point`.
    pub fn outward_norm(&self, point: Point2D) -> Vector2D {
        if dot(self.norm, self.centroid - point) >= 0.0 {
            self.norm
        } else {
            -self.norm
        }
    }

    /// The other cell across this face, seen from `cell`.
    pub fn neighbor_of(&self, cell: usize) -> Option<usize> {
        match self.r_cell {
            Some(r) if r == cell => Some(self.l_cell),
            Some(r) if self.l_cell == cell => Some(r),
            _ => None,
        }
    }
}

/// Link from a cell to a boundary face.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundaryLink {
    pub face: usize,
    pub patch: usize,
    pub r_face_vec: Vector2D,
    pub out_norm: Vector2D,
}

/// Link from a cell to a face neighbour.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct InteriorLink {
    pub face: usize,
    pub cell: usize,
    pub r_face_vec: Vector2D,
    pub r_cell_vec: Vector2D,
    pub out_norm: Vector2D,
    /// Weight of the owning cell in linear face interpolation, by volume.
    pub volume_weight: f64,
    /// Weight of the owning cell in linear face interpolation, by distance.
    pub distance_weight: f64,
}

/// Link to a cell that shares only a node.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DiagonalLink {
    pub cell: usize,
    pub r_cell_vec: Vector2D,
}

/// A control volume.
#[derive(Clone, Debug)]
pub struct Cell {
    pub(crate) id: usize,
    pub(crate) global_id: usize,
    pub(crate) owner: usize,
    pub(crate) is_ghost: bool,
    pub(crate) nodes: Vec<usize>,
    pub(crate) shape: Polygon,
    pub(crate) centroid: Point2D,
    pub(crate) volume: f64,
    pub(crate) faces: Vec<usize>,
    pub(crate) interior_links: Vec<InteriorLink>,
    pub(crate) boundary_links: Vec<BoundaryLink>,
    pub(crate) diagonal_links: Vec<DiagonalLink>,
}

impl Cell {
    pub(crate) fn new(
        id: usize,
        global_id: usize,
        owner: usize,
        is_ghost: bool,
        nodes: Vec<usize>,
        shape: Polygon,
    ) -> Self {
        Self {
            id,
            global_id,
            owner,
            is_ghost,
            nodes,
            centroid: shape.centroid(),
            volume: shape.area(),
            shape,
            faces: Vec::new(),
            interior_links: Vec::new(),
            boundary_links: Vec::new(),
            diagonal_links: Vec::new(),
        }
    }

    /// Local index.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Index in the partitioned graph.
    pub fn global_id(&self) -> usize {
        self.global_id
    }

    pub fn owner(&self) -> usize {
        self.owner
    }

    pub fn is_ghost(&self) -> bool {
        self.is_ghost
    }

    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    pub fn shape(&self) -> &Polygon {
        &self.shape
    }

    pub fn centroid(&self) -> Point2D {
        self.centroid
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn faces(&self) -> &[usize] {
        &self.faces
    }

    pub fn interior_links(&self) -> &[InteriorLink] {
        &self.interior_links
    }

    pub fn boundary_links(&self) -> &[BoundaryLink] {
        &self.boundary_links
    }

    pub fn diagonal_links(&self) -> &[DiagonalLink] {
        &self.diagonal_links
    }

    /// Face neighbours followed by node neighbours.
    pub fn neighbors(&self) -> impl Iterator<Item = usize> + '_ {
        self.interior_links
            .iter()
            .map(|l| l.cell)
            .chain(self.diagonal_links.iter().map(|l| l.cell))
    }

    pub fn is_inside(&self, pt: Point2D) -> bool {
        self.shape.is_inside(pt)
    }
}
