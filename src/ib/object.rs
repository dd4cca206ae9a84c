//! A single immersed body.

use crate::config::Input;
use crate::field::FieldValue;
use crate::geometry::{LineSegment2D, Point2D, Polygon, Shape2D, Vector2D};
use crate::ib::motion::{BodyLoad, Motion};
use crate::mesh_error::FvError;
use crate::topology::CellGroup;
use hashbrown::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Condition a body imposes on a field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IbBoundaryType {
    Fixed,
    NormalGradient,
    Symmetry,
    ContactAngle,
    PartialSlip,
}

impl FromStr for IbBoundaryType {
    type Err = FvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(IbBoundaryType::Fixed),
            "normal_gradient" => Ok(IbBoundaryType::NormalGradient),
            "symmetry" => Ok(IbBoundaryType::Symmetry),
            "contact_angle" => Ok(IbBoundaryType::ContactAngle),
            "partial_slip" => Ok(IbBoundaryType::PartialSlip),
            other => Err(FvError::UnknownBoundaryType {
                component: "ImmersedBoundary",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for IbBoundaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IbBoundaryType::Fixed => "fixed",
            IbBoundaryType::NormalGradient => "normal_gradient",
            IbBoundaryType::Symmetry => "symmetry",
            IbBoundaryType::ContactAngle => "contact_angle",
            IbBoundaryType::PartialSlip => "partial_slip",
        })
    }
}

/// Reference value as given in the input: a number or a vector.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum IbRefValue {
    Scalar(f64),
    Vector(Vector2D),
}

impl IbRefValue {
    fn from_input(input: &Input, key: &str) -> Result<Self, FvError> {
        match input.get_optional::<f64>(key) {
            Ok(Some(s)) => Ok(IbRefValue::Scalar(s)),
            Ok(None) => Ok(IbRefValue::Scalar(0.0)),
            Err(_) => input.get::<Vector2D>(key).map(IbRefValue::Vector),
        }
    }

    /// As a field value. A scalar fills every component of a vector; a vector
    /// cannot stand in for a scalar.
    pub fn as_value<T: FieldValue>(self) -> Option<T> {
        let mut out = T::default();
        match self {
            IbRefValue::Scalar(s) => {
                for c in 0..T::N_COMPONENTS {
                    out.set_component(c, s);
                }
            }
            IbRefValue::Vector(v) if T::N_COMPONENTS == 2 => {
                out.set_component(0, v.x);
                out.set_component(1, v.y);
            }
            IbRefValue::Vector(_) => return None,
        }
        Some(out)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IbBoundaryCondition {
    pub kind: IbBoundaryType,
    pub value: IbRefValue,
}

/// Input keys of a body that are not field boundary conditions.
const RESERVED_KEYS: [&str; 4] = ["geometry", "interpolation", "motion", "properties"];

/// Pressure-correction fields that take the boundary type of `p`.
pub const PRESSURE_CORRECTION_FIELDS: [&str; 2] = ["pCorr", "dp"];

/// A solid body with its shape, motion, per-field conditions and the cells it
/// currently covers on this rank.
#[derive(Clone, Debug)]
pub struct ImmersedBoundaryObject {
    name: String,
    id: usize,
    shape: Shape2D,
    motion: Motion,
    rho: f64,
    bcs: HashMap<String, IbBoundaryCondition>,
    force: Vector2D,
    torque: f64,
    pub(crate) cells: CellGroup,
    pub(crate) ib_cells: CellGroup,
    pub(crate) solid_cells: CellGroup,
    pub(crate) fresh_cells: CellGroup,
    pub(crate) dead_cells: CellGroup,
}

impl ImmersedBoundaryObject {
    pub fn new(name: &str, id: usize, shape: Shape2D) -> Self {
        Self {
            name: name.to_string(),
            id,
            shape,
            motion: Motion::None,
            rho: 0.0,
            bcs: HashMap::new(),
            force: Vector2D::zero(),
            torque: 0.0,
            cells: CellGroup::new(),
            ib_cells: CellGroup::new(),
            solid_cells: CellGroup::new(),
            fresh_cells: CellGroup::new(),
            dead_cells: CellGroup::new(),
        }
    }

    /// Build a body from its `ImmersedBoundaries.<name>` subtree. Relative
    /// polygon file paths resolve against `case_dir`.
    pub fn from_input(name: &str, id: usize, input: &Input, case_dir: &Path) -> Result<Self, FvError> {
        let mut shape = read_shape(input, case_dir)?;

        if let Some(factor) = input.get_optional::<f64>("geometry.scale")? {
            log::info!("Scaling \"{name}\" by a factor of {factor}.");
            shape.scale(factor);
        }
        if let Some(degrees) = input.get_optional::<f64>("geometry.rotate")? {
            log::info!("Rotating \"{name}\" by an angle of {degrees} degrees.");
            shape.rotate(degrees.to_radians());
        }

        let mut obj = Self::new(name, id, shape);
        obj.rho = input.get_or("properties.rho", 0.0)?;
        obj.motion = Motion::from_input(input, obj.shape.centroid())?;

        for (field, sub) in input.children() {
            if RESERVED_KEYS.contains(&field.as_str()) {
                continue;
            }
            let kind: IbBoundaryType = sub.get::<String>("type")?.parse()?;
            let value = match kind {
                IbBoundaryType::PartialSlip => IbRefValue::Scalar(sub.get_or("lambda", 0.0)?),
                _ => IbRefValue::from_input(&sub, "value")?,
            };
            log::debug!("{name}: boundary type \"{kind}\" for field \"{field}\"");
            obj.bcs.insert(field, IbBoundaryCondition { kind, value });
        }
        // corrections are homogeneous, so only the type carries over
        if let Some(p) = obj.bcs.get("p").map(|bc| bc.kind) {
            for field in PRESSURE_CORRECTION_FIELDS {
                obj.bcs.entry(field.to_string()).or_insert(IbBoundaryCondition {
                    kind: p,
                    value: IbRefValue::Scalar(0.0),
                });
            }
        }
        Ok(obj)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn shape(&self) -> &Shape2D {
        &self.shape
    }

    pub fn shape_mut(&mut self) -> &mut Shape2D {
        &mut self.shape
    }

    pub fn motion(&self) -> &Motion {
        &self.motion
    }

    pub fn set_motion(&mut self, motion: Motion) {
        self.motion = motion;
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }

    pub fn set_rho(&mut self, rho: f64) {
        self.rho = rho;
    }

    pub fn position(&self) -> Point2D {
        self.shape.centroid()
    }

    pub fn mass(&self) -> f64 {
        self.rho * self.shape.area()
    }

    pub fn force(&self) -> Vector2D {
        self.force
    }

    pub fn torque(&self) -> f64 {
        self.torque
    }

    /// Replace the hydrodynamic force of this step.
    pub fn set_force(&mut self, force: Vector2D) {
        self.force = force;
    }

    /// Add to the force of this step.
    pub fn apply_force(&mut self, force: Vector2D) {
        self.force += force;
    }

    pub fn set_torque(&mut self, torque: f64) {
        self.torque = torque;
    }

    pub fn boundary_condition(&self, field: &str) -> Option<IbBoundaryCondition> {
        self.bcs.get(field).copied()
    }

    pub fn set_boundary_condition(&mut self, field: &str, kind: IbBoundaryType, value: IbRefValue) {
        self.bcs.insert(field.to_string(), IbBoundaryCondition { kind, value });
    }

    // ---- geometry ----

    pub fn is_in_ib(&self, pt: Point2D) -> bool {
        self.shape.is_inside(pt)
    }

    pub fn nearest_intersect(&self, pt: Point2D) -> Point2D {
        self.shape.nearest_intersect(pt)
    }

    pub fn nearest_edge(&self, pt: Point2D) -> LineSegment2D {
        self.shape.nearest_edge(pt)
    }

    pub fn nearest_edge_normal(&self, pt: Point2D) -> Vector2D {
        self.shape.nearest_edge_normal(pt)
    }

    // ---- motion ----

    pub fn velocity(&self) -> Vector2D {
        self.motion.velocity()
    }

    pub fn velocity_at(&self, pt: Point2D) -> Vector2D {
        self.motion.velocity_at(pt)
    }

    pub fn acceleration(&self) -> Vector2D {
        self.motion.acceleration()
    }

    pub fn acceleration_at(&self, pt: Point2D) -> Vector2D {
        self.motion.acceleration_at(pt)
    }

    /// Advance the motion law by `dt`, moving the shape.
    pub fn update_position(&mut self, dt: f64) {
        let load = BodyLoad {
            force: self.force,
            torque: self.torque,
            density: self.rho,
        };
        self.motion.update(dt, &mut self.shape, load);
    }

    // ---- cells ----

    /// Cells whose centroids lie inside the body.
    pub fn cells(&self) -> &CellGroup {
        &self.cells
    }

    pub fn ib_cells(&self) -> &CellGroup {
        &self.ib_cells
    }

    pub fn solid_cells(&self) -> &CellGroup {
        &self.solid_cells
    }

    pub fn fresh_cells(&self) -> &CellGroup {
        &self.fresh_cells
    }

    /// Freshly cleared cells with no fluid face neighbour to reconstruct from.
    pub fn dead_cells(&self) -> &CellGroup {
        &self.dead_cells
    }

    pub(crate) fn clear_cells(&mut self) {
        self.cells.clear();
        self.ib_cells.clear();
        self.solid_cells.clear();
        self.fresh_cells.clear();
        self.dead_cells.clear();
    }
}

fn read_shape(input: &Input, case_dir: &Path) -> Result<Shape2D, FvError> {
    let kind: String = input.get("geometry.type")?;
    let center: Point2D = input.get("geometry.center")?;
    match kind.as_str() {
        "circle" => Ok(Shape2D::circle(center, input.get("geometry.radius")?)),
        "box" => Ok(Shape2D::centered_box(
            center,
            input.get("geometry.width")?,
            input.get("geometry.height")?,
        )),
        "polygon" => {
            let file: String = input.get("geometry.file")?;
            let path = case_dir.join(&file);
            log::info!("Reading polygon vertices from \"{}\".", path.display());
            let mut pgn = read_polygon_file(&path)?;
            let delta = center - pgn.centroid();
            pgn.translate(delta);
            Ok(Shape2D::Polygon(pgn))
        }
        other => Err(FvError::UnknownGeometry(other.to_string())),
    }
}

/// Whitespace separated `x y` pairs until end of file.
pub fn read_polygon_file(path: &Path) -> Result<Polygon, FvError> {
    let file_err = |reason: String| FvError::GeometryFile {
        path: path.display().to_string(),
        reason,
    };
    let text = std::fs::read_to_string(path).map_err(|e| file_err(e.to_string()))?;
    let coords = text
        .split_whitespace()
        .map(|tok| tok.parse::<f64>().map_err(|e| file_err(format!("{tok:?}: {e}"))))
        .collect::<Result<Vec<_>, _>>()?;
    if coords.len() % 2 != 0 {
        return Err(file_err("odd number of coordinates".into()));
    }
    if coords.len() < 6 {
        return Err(file_err("a polygon needs at least three vertices".into()));
    }
    Ok(Polygon::new(
        coords.chunks_exact(2).map(|xy| Point2D::new(xy[0], xy[1])),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn disk() -> Input {
        Input::from_value(json!({
            "geometry": { "type": "circle", "center": [0.5, 0.5], "radius": 0.1, "scale": 2.0 },
            "properties": { "rho": 3.0 },
            "u": { "type": "fixed", "value": "(1, 0)" },
            "p": { "type": "normal_gradient", "value": 0 },
            "gamma": { "type": "partial_slip", "lambda": 0.5 }
        }))
    }

    #[test]
    fn body_from_input() {
        let obj = ImmersedBoundaryObject::from_input("disk", 0, &disk(), Path::new(".")).unwrap();
        assert_eq!(obj.shape(), &Shape2D::circle(Point2D::new(0.5, 0.5), 0.2));
        assert_eq!(obj.rho(), 3.0);
        assert_eq!(obj.motion(), &Motion::None);
        let u = obj.boundary_condition("u").unwrap();
        assert_eq!(u.kind, IbBoundaryType::Fixed);
        assert_eq!(u.value.as_value::<Vector2D>(), Some(Vector2D::new(1.0, 0.0)));
        assert_eq!(u.value.as_value::<f64>(), None);
        assert_eq!(
            obj.boundary_condition("gamma").unwrap().value,
            IbRefValue::Scalar(0.5)
        );
    }

    #[test]
    fn pressure_corrections_follow_the_pressure_type() {
        let obj = ImmersedBoundaryObject::from_input("disk", 0, &disk(), Path::new(".")).unwrap();
        for field in ["pCorr", "dp"] {
            let bc = obj.boundary_condition(field).unwrap();
            assert_eq!(bc.kind, IbBoundaryType::NormalGradient);
            assert_eq!(bc.value, IbRefValue::Scalar(0.0));
        }

        let explicit = Input::from_value(json!({
            "geometry": { "type": "circle", "center": [0, 0], "radius": 1 },
            "p": { "type": "fixed", "value": 2.0 },
            "dp": { "type": "normal_gradient", "value": 0 }
        }));
        let obj = ImmersedBoundaryObject::from_input("c", 0, &explicit, Path::new(".")).unwrap();
        assert_eq!(obj.boundary_condition("pCorr").unwrap().kind, IbBoundaryType::Fixed);
        assert_eq!(obj.boundary_condition("dp").unwrap().kind, IbBoundaryType::NormalGradient);

        let no_pressure = Input::from_value(json!({
            "geometry": { "type": "circle", "center": [0, 0], "radius": 1 }
        }));
        let obj = ImmersedBoundaryObject::from_input("c", 0, &no_pressure, Path::new(".")).unwrap();
        assert!(obj.boundary_condition("pCorr").is_none());
    }

    #[test]
    fn unknown_geometry_and_boundary_types_fail() {
        let bad = Input::from_value(json!({ "geometry": { "type": "ellipse", "center": [0, 0] } }));
        assert_eq!(
            ImmersedBoundaryObject::from_input("e", 0, &bad, Path::new(".")).unwrap_err(),
            FvError::UnknownGeometry("ellipse".into())
        );
        let bad = Input::from_value(json!({
            "geometry": { "type": "circle", "center": [0, 0], "radius": 1 },
            "u": { "type": "sticky" }
        }));
        assert!(matches!(
            ImmersedBoundaryObject::from_input("c", 0, &bad, Path::new(".")),
            Err(FvError::UnknownBoundaryType { .. })
        ));
    }

    #[test]
    fn polygon_file_is_recentred() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("tri.dat")).unwrap();
        writeln!(f, "0 0\n3 0\n0 3").unwrap();
        let input = Input::from_value(json!({
            "geometry": { "type": "polygon", "center": [10, 10], "file": "tri.dat" }
        }));
        let obj = ImmersedBoundaryObject::from_input("tri", 0, &input, dir.path()).unwrap();
        assert!((obj.position() - Point2D::new(10.0, 10.0)).mag() < 1e-12);
        assert!((obj.shape().area() - 4.5).abs() < 1e-12);

        let missing = Input::from_value(json!({
            "geometry": { "type": "polygon", "center": [0, 0], "file": "nope.dat" }
        }));
        assert!(matches!(
            ImmersedBoundaryObject::from_input("x", 0, &missing, dir.path()),
            Err(FvError::GeometryFile { .. })
        ));
    }
}
