//! Classification of cells against immersed bodies and the coupling of the
//! bodies to equations and forces.
//!
//! Every local cell is in exactly one zone of the module's [`ZoneRegistry`]:
//! fluid, IB, solid, freshly cleared or buffer. Ghost cells are buffer cells;
//! their owners' classification is still available through
//! [`ImmersedBoundary::owner_status`] after the status halo exchange.

use crate::algs::communicator::Communicator;
use crate::algs::context::CommContext;
use crate::config::Input;
use crate::equation::Equation;
use crate::field::{FieldValue, FiniteVolumeField, ScalarFiniteVolumeField, VectorFiniteVolumeField};
use crate::geometry::{cross, dot, LineSegment2D, Point2D, Vector2D};
use crate::ib::collision::CollisionModel;
use crate::ib::interpolation::BilinearInterpolator;
use crate::ib::object::{IbBoundaryType, ImmersedBoundaryObject};
use crate::main_info;
use crate::mesh_error::FvError;
use crate::topology::{CellGroup, CellZone, FiniteVolumeGrid2D, ZoneRegistry};
use std::path::Path;

/// Directory polygon point files are read from by [`ImmersedBoundary::new`].
pub const CASE_DIR: &str = "case";

/// Input keys under `ImmersedBoundaries` that are not bodies.
const RESERVED_KEYS: [&str; 2] = ["Collisions", "Options"];

/// Classification of a cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CellStatus {
    Fluid = 1,
    Ib = 2,
    Solid = 3,
    FreshlyCleared = 4,
    Buffer = 5,
}

impl CellStatus {
    pub const ALL: [CellStatus; 5] = [
        CellStatus::Fluid,
        CellStatus::Ib,
        CellStatus::Solid,
        CellStatus::FreshlyCleared,
        CellStatus::Buffer,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    fn zone_name(self) -> &'static str {
        match self {
            CellStatus::Fluid => "fluid",
            CellStatus::Ib => "ib",
            CellStatus::Solid => "solid",
            CellStatus::FreshlyCleared => "fresh",
            CellStatus::Buffer => "buffer",
        }
    }
}

/// Surface stress sample used by [`ImmersedBoundary::compute_force`].
#[derive(Copy, Clone, Debug)]
struct StressSample {
    point: Point2D,
    pressure: f64,
    shear: f64,
}

/// All immersed bodies of a run and the cell classification they induce.
#[derive(Clone, Debug)]
pub struct ImmersedBoundary {
    objects: Vec<ImmersedBoundaryObject>,
    collision: CollisionModel,
    cut_faces: bool,
    grid_id: u64,
    zones: ZoneRegistry,
    status_zones: [CellZone; 5],
    status: Vec<i32>,
    buffer: CellGroup,
}

impl ImmersedBoundary {
    /// Bodies from `ImmersedBoundaries.<name>`, polygon files under
    /// [`CASE_DIR`]. Cells are classified before returning.
    pub fn new<C: Communicator>(
        input: &Input,
        grid: &mut FiniteVolumeGrid2D,
        comm: &CommContext<C>,
    ) -> Result<Self, FvError> {
        Self::with_case_dir(input, Path::new(CASE_DIR), grid, comm)
    }

    pub fn with_case_dir<C: Communicator>(
        input: &Input,
        case_dir: &Path,
        grid: &mut FiniteVolumeGrid2D,
        comm: &CommContext<C>,
    ) -> Result<Self, FvError> {
        let mut objects = Vec::new();
        let mut collision = CollisionModel::default();
        let mut cut_faces = false;

        match input.child_optional("ImmersedBoundaries") {
            None => main_info!(comm, "No immersed boundaries present."),
            Some(ib_input) => {
                collision = CollisionModel::new(
                    ib_input.get_or("Collisions.stiffness", collision.stiffness)?,
                    ib_input.get_or("Collisions.range", collision.range)?,
                );
                cut_faces = ib_input.get_or("Options.cutFaces", false)?;
                for (name, body) in ib_input.children() {
                    if RESERVED_KEYS.contains(&name.as_str()) {
                        continue;
                    }
                    main_info!(comm, "Initializing immersed boundary object \"{name}\".");
                    let obj = ImmersedBoundaryObject::from_input(&name, objects.len(), &body, case_dir)?;
                    main_info!(
                        comm,
                        "\"{name}\": {} geometry, {} motion.",
                        obj.shape().type_name(),
                        obj.motion().type_name()
                    );
                    objects.push(obj);
                }
            }
        }
        Self::from_objects(objects, collision, cut_faces, grid, comm)
    }

    /// Module over already constructed bodies.
    pub fn from_objects<C: Communicator>(
        objects: Vec<ImmersedBoundaryObject>,
        collision: CollisionModel,
        cut_faces: bool,
        grid: &mut FiniteVolumeGrid2D,
        comm: &CommContext<C>,
    ) -> Result<Self, FvError> {
        let mut zones = ZoneRegistry::new(grid.n_cells());
        let status_zones = CellStatus::ALL.map(|s| zones.add_zone(s.zone_name()));
        let mut ib = Self {
            objects,
            collision,
            cut_faces,
            grid_id: grid.id(),
            zones,
            status_zones,
            status: vec![CellStatus::Fluid.code(); grid.n_cells()],
            buffer: CellGroup::new(),
        };
        ib.update_cells(grid, comm)?;
        Ok(ib)
    }

    fn check_grid(&self, grid: &FiniteVolumeGrid2D) -> Result<(), FvError> {
        if grid.id() == self.grid_id {
            Ok(())
        } else {
            Err(FvError::GridMismatch {
                lhs: "ImmersedBoundary".into(),
                rhs: format!("<grid {}>", grid.id()),
            })
        }
    }

    fn zone(&self, status: CellStatus) -> CellZone {
        self.status_zones[status as usize - 1]
    }

    // ---- update ----

    /// Advance every body's motion by `dt`.
    pub fn update_ib_positions(&mut self, dt: f64) {
        for obj in &mut self.objects {
            obj.update_position(dt);
        }
    }

    /// Move the bodies, then reclassify.
    pub fn update<C: Communicator>(
        &mut self,
        dt: f64,
        grid: &mut FiniteVolumeGrid2D,
        comm: &CommContext<C>,
    ) -> Result<(), FvError> {
        self.update_ib_positions(dt);
        self.update_cells(grid, comm)
    }

    /// Owned cells to treat as buffer (excluded from discretization) on top of
    /// the ghost layer. Reclassifies.
    pub fn set_buffer_cells<C: Communicator>(
        &mut self,
        cells: CellGroup,
        grid: &mut FiniteVolumeGrid2D,
        comm: &CommContext<C>,
    ) -> Result<(), FvError> {
        self.buffer = cells;
        self.update_cells(grid, comm)
    }

    /// Reclassify every cell against the current body positions.
    ///
    /// Zone membership, the exchanged status table, active flags and the
    /// global ordering are all replaced before returning.
    pub fn update_cells<C: Communicator>(
        &mut self,
        grid: &mut FiniteVolumeGrid2D,
        comm: &CommContext<C>,
    ) -> Result<(), FvError> {
        self.check_grid(grid)?;
        let covered_before: Vec<CellGroup> = self
            .objects
            .iter()
            .map(|o| o.ib_cells.iter().chain(o.solid_cells.iter()).collect())
            .collect();

        for obj in &mut self.objects {
            obj.clear_cells();
        }

        let owned: Vec<usize> = grid.local_cells().filter(|c| !self.buffer.contains(*c)).collect();
        for obj in &mut self.objects {
            for &c in &owned {
                let cell = grid.cell(c);
                if !obj.is_in_ib(cell.centroid()) {
                    continue;
                }
                obj.cells.add(c);
                let touches_fluid = cell
                    .interior_links()
                    .iter()
                    .map(|l| l.cell)
                    .chain(cell.diagonal_links().iter().map(|d| d.cell))
                    .any(|n| !obj.is_in_ib(grid.cell(n).centroid()));
                if touches_fluid {
                    obj.ib_cells.add(c);
                } else {
                    obj.solid_cells.add(c);
                }
            }
        }

        let mut status = vec![CellStatus::Buffer.code(); grid.n_cells()];
        for &c in &owned {
            status[c] = CellStatus::Fluid.code();
        }
        for (obj, before) in self.objects.iter_mut().zip(&covered_before) {
            for c in before {
                if status[c] == CellStatus::Fluid.code()
                    && !obj.cells.contains(c)
                    && !self.buffer.contains(c)
                {
                    obj.fresh_cells.add(c);
                }
            }
        }
        for obj in &self.objects {
            for c in &obj.fresh_cells {
                status[c] = CellStatus::FreshlyCleared.code();
            }
        }
        for obj in &self.objects {
            for c in &obj.ib_cells {
                status[c] = CellStatus::Ib.code();
            }
            for c in &obj.solid_cells {
                status[c] = CellStatus::Solid.code();
            }
        }
        for obj in &mut self.objects {
            let fresh: Vec<usize> = obj.fresh_cells.iter().collect();
            for c in fresh {
                if status[c] != CellStatus::FreshlyCleared.code() {
                    obj.fresh_cells.remove(c);
                }
            }
        }
        grid.send_messages(comm, &mut status)?;

        for obj in &mut self.objects {
            let dead: Vec<usize> = obj
                .fresh_cells
                .iter()
                .filter(|&c| {
                    !grid
                        .cell(c)
                        .interior_links()
                        .iter()
                        .any(|l| status[l.cell] == CellStatus::Fluid.code())
                })
                .collect();
            obj.dead_cells.extend(dead);
        }

        let mut table = vec![Some(self.zone(CellStatus::Buffer)); grid.n_cells()];
        for c in grid.local_cells() {
            let s = CellStatus::from_code(status[c]).unwrap_or(CellStatus::Buffer);
            table[c] = Some(self.zone(s));
        }
        self.zones.reassign(table)?;
        self.status = status;

        for c in grid.local_cells().collect::<Vec<_>>() {
            grid.set_active(c, !self.buffer.contains(c))?;
        }
        if self.cut_faces {
            self.cut_faces(grid)?;
        }
        grid.compute_global_ordering(comm)?;

        log::debug!(
            "rank {}: {} fluid, {} ib, {} solid, {} fresh, {} buffer cells",
            grid.rank(),
            self.zones.count(self.zone(CellStatus::Fluid)),
            self.zones.count(self.zone(CellStatus::Ib)),
            self.zones.count(self.zone(CellStatus::Solid)),
            self.zones.count(self.zone(CellStatus::FreshlyCleared)),
            self.zones.count(self.zone(CellStatus::Buffer)),
        );
        Ok(())
    }

    /// Return freshly cleared cells to the fluid zone once the caller has
    /// reconstructed their values.
    pub fn clear_fresh_cells<C: Communicator>(
        &mut self,
        grid: &FiniteVolumeGrid2D,
        comm: &CommContext<C>,
    ) -> Result<(), FvError> {
        self.check_grid(grid)?;
        let fluid = self.zone(CellStatus::Fluid);
        for obj in &mut self.objects {
            for c in &obj.fresh_cells {
                self.zones.assign(c, fluid)?;
                self.status[c] = CellStatus::Fluid.code();
            }
            obj.fresh_cells.clear();
            obj.dead_cells.clear();
        }
        grid.send_messages(comm, &mut self.status)
    }

    /// Scale faces crossed by a body boundary to their open fraction and rebuild link
    /// geometry. Previous scalings are discarded first.
    pub fn cut_faces(&self, grid: &mut FiniteVolumeGrid2D) -> Result<(), FvError> {
        self.check_grid(grid)?;
        grid.reset_face_scales();
        let mut scales = Vec::new();
        for face in grid.faces() {
            let [a, b] = face.nodes();
            let seg = LineSegment2D::new(grid.nodes()[a], grid.nodes()[b]);
            let mut scale = 1.0;
            for obj in &self.objects {
                let crossings = obj.shape().intersections(&seg);
                if crossings.is_empty() {
                    continue;
                }
                let dir = seg.direction();
                let mut pts: Vec<Point2D> = std::iter::once(seg.pt_a)
                    .chain(crossings)
                    .chain(std::iter::once(seg.pt_b))
                    .collect();
                pts.sort_by(|p, q| dot(*p - seg.pt_a, dir).total_cmp(&dot(*q - seg.pt_a, dir)));
                let open: f64 = pts
                    .windows(2)
                    .filter(|w| !obj.is_in_ib(0.5 * (w[0] + w[1])))
                    .map(|w| (w[1] - w[0]).mag())
                    .sum();
                scale *= open / seg.length();
            }
            if scale < 1.0 {
                scales.push((face.id(), scale));
            }
        }
        for (face, scale) in scales {
            grid.scale_face(face, scale)?;
        }
        grid.init_links();
        Ok(())
    }

    // ---- queries ----

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImmersedBoundaryObject> + '_ {
        self.objects.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ImmersedBoundaryObject> + '_ {
        self.objects.iter_mut()
    }

    pub fn collision_model(&self) -> &CollisionModel {
        &self.collision
    }

    pub fn cuts_faces(&self) -> bool {
        self.cut_faces
    }

    pub fn zones(&self) -> &ZoneRegistry {
        &self.zones
    }

    /// Local classification of `cell`; ghosts are always [`CellStatus::Buffer`].
    pub fn cell_status(&self, cell: usize) -> CellStatus {
        self.zones
            .zone_of(cell)
            .and_then(|z| CellStatus::ALL.into_iter().find(|&s| self.zone(s) == z))
            .unwrap_or(CellStatus::Buffer)
    }

    /// Classification of `cell` on its owning rank.
    pub fn owner_status(&self, cell: usize) -> Option<CellStatus> {
        self.status.get(cell).copied().and_then(CellStatus::from_code)
    }

    /// Whether `cell` is covered by a body (IB or solid).
    pub fn is_ib_cell(&self, cell: usize) -> bool {
        matches!(self.cell_status(cell), CellStatus::Ib | CellStatus::Solid)
    }

    pub fn fluid_cells(&self) -> CellGroup {
        self.zones.members(self.zone(CellStatus::Fluid))
    }

    pub fn ib_cells(&self) -> CellGroup {
        self.zones.members(self.zone(CellStatus::Ib))
    }

    pub fn solid_cells(&self) -> CellGroup {
        self.zones.members(self.zone(CellStatus::Solid))
    }

    pub fn fresh_cells(&self) -> CellGroup {
        self.zones.members(self.zone(CellStatus::FreshlyCleared))
    }

    pub fn buffer_cells(&self) -> CellGroup {
        self.zones.members(self.zone(CellStatus::Buffer))
    }

    /// First body containing `pt`.
    pub fn ib_obj(&self, pt: Point2D) -> Option<&ImmersedBoundaryObject> {
        self.objects.iter().find(|o| o.is_in_ib(pt))
    }

    pub fn ib_obj_by_name(&self, name: &str) -> Result<&ImmersedBoundaryObject, FvError> {
        self.objects
            .iter()
            .find(|o| o.name() == name)
            .ok_or_else(|| FvError::UnknownObject(name.to_string()))
    }

    pub fn ib_obj_by_name_mut(&mut self, name: &str) -> Result<&mut ImmersedBoundaryObject, FvError> {
        self.objects
            .iter_mut()
            .find(|o| o.name() == name)
            .ok_or_else(|| FvError::UnknownObject(name.to_string()))
    }

    /// Body whose boundary is closest to `pt`, with the closest boundary point.
    pub fn nearest_intersect(&self, pt: Point2D) -> Option<(&ImmersedBoundaryObject, Point2D)> {
        self.objects
            .iter()
            .map(|o| (o, o.nearest_intersect(pt)))
            .min_by(|a, b| (a.1 - pt).mag_sqr().total_cmp(&(b.1 - pt).mag_sqr()))
    }

    pub fn nearest_ib_obj(&self, pt: Point2D) -> Option<&ImmersedBoundaryObject> {
        self.nearest_intersect(pt).map(|(o, _)| o)
    }

    // ---- coupling ----

    /// Constraint rows for `field` on every IB and solid cell.
    ///
    /// `fixed` pins the cell to the body's reference value. `normal_gradient`
    /// and `symmetry` set an IB cell equal to the mean of its uncovered face
    /// neighbours and pin solid cells to zero.
    pub fn bcs<T: FieldValue>(
        &self,
        grid: &FiniteVolumeGrid2D,
        field: &FiniteVolumeField<T>,
    ) -> Result<Equation<T>, FvError> {
        self.check_grid(grid)?;
        let mut eqn = Equation::new(grid, field)?;
        for obj in &self.objects {
            let bc = obj.boundary_condition(field.name()).ok_or_else(|| FvError::UnknownBoundaryType {
                component: "ImmersedBoundary",
                value: format!("<unspecified> for field `{}` on body `{}`", field.name(), obj.name()),
            })?;
            match bc.kind {
                IbBoundaryType::Fixed => {
                    let value = bc.value.as_value::<T>().ok_or_else(|| FvError::InvalidConfigValue {
                        component: "ImmersedBoundary",
                        key: format!("{}.{}.value", obj.name(), field.name()),
                        value: format!("{:?}", bc.value),
                    })?;
                    for c in obj.ib_cells.iter().chain(obj.solid_cells.iter()) {
                        eqn.add_coeff(c, c, 1.0)?;
                        eqn.add_source(c, value)?;
                    }
                }
                IbBoundaryType::NormalGradient | IbBoundaryType::Symmetry => {
                    for c in &obj.solid_cells {
                        eqn.add_coeff(c, c, 1.0)?;
                    }
                    for c in &obj.ib_cells {
                        let open: Vec<usize> = grid
                            .cell(c)
                            .interior_links()
                            .iter()
                            .map(|l| l.cell)
                            .filter(|&n| grid.global_index(n).is_some() && !obj.is_in_ib(grid.cell(n).centroid()))
                            .collect();
                        eqn.add_coeff(c, c, 1.0)?;
                        for &n in &open {
                            eqn.add_coeff(c, n, -1.0 / open.len() as f64)?;
                        }
                    }
                }
                kind @ (IbBoundaryType::ContactAngle | IbBoundaryType::PartialSlip) => {
                    return Err(FvError::UnknownBoundaryType {
                        component: "ImmersedBoundary",
                        value: format!("{kind} (no constraint rows) for field `{}`", field.name()),
                    });
                }
            }
        }
        Ok(eqn)
    }

    /// Rows pinning `u` on IB and solid cells to the body velocity there.
    pub fn velocity_bcs(
        &self,
        grid: &FiniteVolumeGrid2D,
        u: &VectorFiniteVolumeField,
    ) -> Result<Equation<Vector2D>, FvError> {
        self.check_grid(grid)?;
        let mut eqn = Equation::new(grid, u)?;
        for obj in &self.objects {
            for c in obj.ib_cells.iter().chain(obj.solid_cells.iter()) {
                eqn.add_coeff(c, c, 1.0)?;
                eqn.add_source(c, obj.velocity_at(grid.cell(c).centroid()))?;
            }
        }
        Ok(eqn)
    }

    /// Replace the rows of covered cells in `eqn` by the constraint rows of
    /// [`bcs`](Self::bcs).
    pub fn constrain<T: FieldValue>(
        &self,
        grid: &FiniteVolumeGrid2D,
        eqn: &mut Equation<T>,
        field: &FiniteVolumeField<T>,
    ) -> Result<(), FvError> {
        let rows = self
            .objects
            .iter()
            .flat_map(|o| o.ib_cells.iter().chain(o.solid_cells.iter()))
            .collect::<Vec<_>>();
        eqn.clear_rows(rows);
        eqn.try_add_assign(&self.bcs(grid, field)?)
    }

    /// Direct-forcing source `(u_b − u*) / dt` on covered cells, zero elsewhere.
    pub fn direct_forcing_term(
        &self,
        grid: &FiniteVolumeGrid2D,
        u_star: &VectorFiniteVolumeField,
        dt: f64,
        fb: &mut VectorFiniteVolumeField,
    ) -> Result<(), FvError> {
        self.check_grid(grid)?;
        fb.fill_interior(Vector2D::zero(), 0..grid.n_cells());
        for obj in &self.objects {
            for c in obj.ib_cells.iter().chain(obj.solid_cells.iter()) {
                fb[c] = (obj.velocity_at(grid.cell(c).centroid()) - u_star[c]) / dt;
            }
        }
        Ok(())
    }

    /// Hydrodynamic force on every body by surface-stress integration.
    ///
    /// Pressure and wall shear are sampled bilinearly at the boundary point
    /// nearest each IB cell, gathered on the main rank, ordered by angle about
    /// the body centroid and integrated with the trapezoid rule. The result is
    /// broadcast and the body weight `ρ_b·A·g` added. Force and torque are
    /// stored on each body and returned.
    #[allow(clippy::too_many_arguments)]
    pub fn compute_force<C: Communicator>(
        &mut self,
        grid: &FiniteVolumeGrid2D,
        comm: &CommContext<C>,
        rho: f64,
        mu: f64,
        u: &VectorFiniteVolumeField,
        p: &ScalarFiniteVolumeField,
        g: Vector2D,
    ) -> Result<Vec<Vector2D>, FvError> {
        self.check_grid(grid)?;
        let main = comm.main_proc_no();
        let mut forces = Vec::with_capacity(self.objects.len());
        for obj in &mut self.objects {
            let mut points = Vec::new();
            let mut pressures = Vec::new();
            let mut shears = Vec::new();
            for c in &obj.ib_cells {
                let pt = obj.nearest_intersect(grid.cell(c).centroid());
                let Some(bi) = BilinearInterpolator::new(grid, pt) else {
                    log::warn!("{}: no bilinear stencil at {pt}, sample skipped", obj.name());
                    continue;
                };
                let n = obj.nearest_edge_normal(pt).unit_vec();
                let du_dn = Vector2D::new(dot(bi.grad(u, 0), n), dot(bi.grad(u, 1), n));
                points.push(pt);
                pressures.push(bi.value(p) + rho * dot(pt, g));
                shears.push(mu * dot(du_dn, n.tangent_vec()));
            }

            let points = comm.gatherv(main, &points)?;
            let pressures = comm.gatherv(main, &pressures)?;
            let shears = comm.gatherv(main, &shears)?;

            let mut load = [0.0; 3];
            if comm.is_main_proc() {
                let center = obj.position();
                let mut samples: Vec<StressSample> = points
                    .into_iter()
                    .zip(pressures)
                    .zip(shears)
                    .map(|((point, pressure), shear)| StressSample {
                        point,
                        pressure,
                        shear,
                    })
                    .collect();
                samples.sort_by(|a, b| {
                    (a.point - center)
                        .angle()
                        .total_cmp(&(b.point - center).angle())
                });
                let (mut force, mut torque) = (Vector2D::zero(), 0.0);
                for (i, a) in samples.iter().enumerate() {
                    let b = &samples[(i + 1) % samples.len()];
                    let edge = b.point - a.point;
                    let df = -0.5 * (a.pressure + b.pressure) * edge.normal_vec()
                        + 0.5 * (a.shear + b.shear) * edge;
                    force += df;
                    torque += cross(0.5 * (a.point + b.point) - center, df);
                }
                load = [force.x, force.y, torque];
            }
            let load = comm.broadcast_vec(main, &load)?;
            let force = Vector2D::new(load[0], load[1]) + obj.shape().area() * obj.rho() * g;
            obj.set_force(force);
            obj.set_torque(load[2]);
            forces.push(force);
        }
        let max_force = comm.max(forces.iter().map(|f| f.mag()).fold(0.0, f64::max))?;
        main_info!(comm, "max immersed boundary force = {max_force:.6e}");
        Ok(forces)
    }

    /// Force on every body from the volumetric forcing residual,
    /// `−Σ ρ·f_b·V` over its covered cells, summed over ranks. Bodies are not
    /// modified.
    pub fn forcing_residual_force<C: Communicator>(
        &self,
        grid: &FiniteVolumeGrid2D,
        comm: &CommContext<C>,
        rho: &ScalarFiniteVolumeField,
        fb: &VectorFiniteVolumeField,
    ) -> Result<Vec<Vector2D>, FvError> {
        self.check_grid(grid)?;
        let local: Vec<Vector2D> = self
            .objects
            .iter()
            .map(|obj| {
                obj.ib_cells
                    .iter()
                    .chain(obj.solid_cells.iter())
                    .map(|c| -rho[c] * grid.cell(c).volume() * fb[c])
                    .sum()
            })
            .collect();
        comm.sum_vector(&local)
    }

    /// Add pairwise and wall collision forces to every body.
    pub fn apply_collision_forces<C: Communicator>(
        &mut self,
        grid: &FiniteVolumeGrid2D,
        comm: &CommContext<C>,
    ) -> Result<(), FvError> {
        let (lo, hi) = grid.global_bounds(comm)?;
        let forces: Vec<Vector2D> = self
            .objects
            .iter()
            .map(|p| {
                self.objects
                    .iter()
                    .map(|q| self.collision.force(p, q))
                    .sum::<Vector2D>()
                    + self.collision.wall_force(p, lo, hi)
            })
            .collect();
        for (obj, f) in self.objects.iter_mut().zip(forces) {
            obj.apply_force(f);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::geometry::Shape2D;
    use crate::topology::PartitionedMesh;
    use serde_json::json;

    fn setup(n: usize) -> (FiniteVolumeGrid2D, CommContext<NoComm>) {
        let comm = CommContext::new(NoComm);
        let h = 1.0 / n as f64;
        let mesh = PartitionedMesh::rectilinear(n, n, h, h);
        (FiniteVolumeGrid2D::from_partition(&mesh, &comm).unwrap(), comm)
    }

    fn disk_input() -> Input {
        Input::from_value(json!({
            "ImmersedBoundaries": {
                "Collisions": { "stiffness": 0.5 },
                "disk": {
                    "geometry": { "type": "circle", "center": [0.5, 0.5], "radius": 0.3 },
                    "motion": { "type": "translating", "velocity": [0.1, 0.0] },
                    "u": { "type": "fixed", "value": [0.0, 0.0] },
                    "p": { "type": "normal_gradient", "value": 0 }
                }
            }
        }))
    }

    #[test]
    fn missing_section_means_no_bodies() {
        let (mut g, comm) = setup(4);
        let ib = ImmersedBoundary::new(&Input::from_value(json!({})), &mut g, &comm).unwrap();
        assert!(ib.is_empty());
        assert_eq!(ib.fluid_cells().len(), 16);
    }

    #[test]
    fn reserved_keys_are_not_bodies() {
        let (mut g, comm) = setup(10);
        let ib = ImmersedBoundary::new(&disk_input(), &mut g, &comm).unwrap();
        assert_eq!(ib.len(), 1);
        assert_eq!(ib.collision_model().stiffness, 0.5);
        assert_eq!(ib.collision_model().range, 0.0);
        assert!(ib.ib_obj_by_name("Collisions").is_err());
        assert!(ib.ib_obj(Point2D::new(0.5, 0.5)).is_some());
        assert!(ib.ib_obj(Point2D::new(0.05, 0.05)).is_none());
    }

    #[test]
    fn inner_cells_are_solid_and_rim_cells_ib() {
        let (mut g, comm) = setup(10);
        let ib = ImmersedBoundary::new(&disk_input(), &mut g, &comm).unwrap();
        // the 3x3 block around (0.45, 0.45) lies inside r = 0.3
        let centre = 4 * 10 + 4;
        assert_eq!(ib.cell_status(centre), CellStatus::Solid);
        // centroid (0.25, 0.45) is inside, its left neighbour (0.15, 0.45) is not
        let rim = 4 * 10 + 2;
        assert_eq!(ib.cell_status(rim), CellStatus::Ib);
        assert!(ib.is_ib_cell(rim));
        assert_eq!(ib.cell_status(0), CellStatus::Fluid);
        let total = ib.fluid_cells().len() + ib.ib_cells().len() + ib.solid_cells().len();
        assert_eq!(total, 100);
    }

    #[test]
    fn moving_body_leaves_fresh_cells() {
        let (mut g, comm) = setup(10);
        let mut ib = ImmersedBoundary::new(&disk_input(), &mut g, &comm).unwrap();
        ib.update(1.0, &mut g, &comm).unwrap();
        let fresh = ib.fresh_cells();
        assert!(!fresh.is_empty());
        for c in &fresh {
            assert!(!ib.iter().any(|o| o.is_in_ib(g.cell(c).centroid())));
        }
        ib.clear_fresh_cells(&g, &comm).unwrap();
        assert!(ib.fresh_cells().is_empty());
    }

    #[test]
    fn fixed_rows_pin_covered_cells() {
        let (mut g, comm) = setup(10);
        let ib = ImmersedBoundary::new(&disk_input(), &mut g, &comm).unwrap();
        let u = VectorFiniteVolumeField::new(&g, "u");
        let eqn = ib.velocity_bcs(&g, &u).unwrap();
        let c = 4 * 10 + 4;
        assert_eq!(eqn.coeff(c, c, 0).unwrap(), 1.0);
        assert_eq!(eqn.source(c).unwrap(), Vector2D::new(0.1, 0.0));
        assert_eq!(ib.bcs(&g, &u).unwrap().source(c).unwrap(), Vector2D::zero());

        let p = ScalarFiniteVolumeField::new(&g, "missing");
        assert!(matches!(
            ib.bcs(&g, &p),
            Err(FvError::UnknownBoundaryType { .. })
        ));
    }

    #[test]
    fn pressure_correction_uses_the_pressure_condition() {
        let (mut g, comm) = setup(10);
        let ib = ImmersedBoundary::new(&disk_input(), &mut g, &comm).unwrap();
        let p_corr = ScalarFiniteVolumeField::new(&g, "pCorr");
        let eqn = ib.bcs(&g, &p_corr).unwrap();
        // only the left neighbour of the rim cell is uncovered
        let rim = 4 * 10 + 2;
        assert_eq!(eqn.coeff(rim, rim, 0).unwrap(), 1.0);
        assert_eq!(eqn.coeff(rim, rim - 1, 0).unwrap(), -1.0);
        assert_eq!(eqn.coeff(rim, rim + 1, 0).unwrap(), 0.0);
        assert!(ib.bcs(&g, &ScalarFiniteVolumeField::new(&g, "dp")).is_ok());
    }

    #[test]
    fn cut_faces_shrink_crossed_faces() {
        let (mut g, comm) = setup(4);
        let body = ImmersedBoundaryObject::new("sq", 0, Shape2D::centered_box(Point2D::new(0.5, 0.5), 0.25, 2.0));
        let ib = ImmersedBoundary::from_objects(vec![body], CollisionModel::default(), true, &mut g, &comm)
            .unwrap();
        assert!(ib.cuts_faces());
        // horizontal faces spanning x in [0.25, 0.5] are half covered
        let cut = g
            .faces()
            .iter()
            .find(|f| {
                let [a, b] = f.nodes();
                let (pa, pb) = (g.nodes()[a], g.nodes()[b]);
                (pa.y - pb.y).abs() < 1e-12 && pa.x.min(pb.x) == 0.25 && pa.y == 0.5
            })
            .unwrap();
        assert!((cut.scale() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn collision_forces_accumulate() {
        let (mut g, comm) = setup(4);
        let a = ImmersedBoundaryObject::new("a", 0, Shape2D::circle(Point2D::new(0.45, 0.5), 0.1));
        let b = ImmersedBoundaryObject::new("b", 1, Shape2D::circle(Point2D::new(0.55, 0.5), 0.1));
        let mut ib =
            ImmersedBoundary::from_objects(vec![a, b], CollisionModel::new(1.0, 0.0), false, &mut g, &comm)
                .unwrap();
        ib.apply_collision_forces(&g, &comm).unwrap();
        let fa = ib.ib_obj_by_name("a").unwrap().force();
        let fb = ib.ib_obj_by_name("b").unwrap().force();
        assert!(fa.x < 0.0 && fb.x > 0.0);
        assert!((fa + fb).mag() < 1e-12);
    }
}
