//! Kinematic laws for immersed bodies.

use crate::config::Input;
use crate::geometry::{Point2D, Shape2D, Vector2D};
use crate::mesh_error::FvError;
use std::f64::consts::PI;

/// Loads acting on a body during one step.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BodyLoad {
    pub force: Vector2D,
    pub torque: f64,
    /// Body density; mass and moment of inertia follow from the shape.
    pub density: f64,
}

/// How a body moves. Sampled at the current simulation time, which each law
/// tracks itself.
#[derive(Clone, Debug, PartialEq)]
pub enum Motion {
    None,
    /// `v(t) = v₀ + a·t`.
    Translating {
        velocity: Vector2D,
        acceleration: Vector2D,
    },
    /// Centroid at `origin + A ∘ sin(2π f t + φ)`, per component.
    Oscillating {
        origin: Point2D,
        frequency: Vector2D,
        amplitude: Vector2D,
        phase: Vector2D,
        time: f64,
    },
    /// Rigid motion driven by the accumulated force and torque.
    SolidBody {
        center: Point2D,
        velocity: Vector2D,
        acceleration: Vector2D,
        omega: f64,
        alpha: f64,
    },
}

impl Motion {
    /// Law named by `motion.type` (default `none`) in a body's input tree.
    pub fn from_input(input: &Input, center: Point2D) -> Result<Self, FvError> {
        let kind: String = input.get_or("motion.type", "none".to_string())?;
        match kind.as_str() {
            "none" => Ok(Motion::None),
            "translating" => Ok(Motion::Translating {
                velocity: input.get("motion.velocity")?,
                acceleration: input.get_or("motion.acceleration", Vector2D::zero())?,
            }),
            "oscillating" => Ok(Motion::Oscillating {
                origin: center,
                frequency: input.get("motion.frequency")?,
                amplitude: input.get("motion.amplitude")?,
                phase: input.get_or("motion.phase", Vector2D::zero())?,
                time: 0.0,
            }),
            "solidBody" | "solid-body" => Ok(Motion::SolidBody {
                center,
                velocity: input.get_or("motion.velocity", Vector2D::zero())?,
                acceleration: Vector2D::zero(),
                omega: input.get_or("motion.omega", 0.0)?,
                alpha: 0.0,
            }),
            other => Err(FvError::UnknownMotion(other.to_string())),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Motion::None => "none",
            Motion::Translating { .. } => "translating",
            Motion::Oscillating { .. } => "oscillating",
            Motion::SolidBody { .. } => "solid-body",
        }
    }

    fn oscillation_phase(frequency: Vector2D, phase: Vector2D, time: f64) -> Vector2D {
        Vector2D::new(
            2.0 * PI * frequency.x * time + phase.x,
            2.0 * PI * frequency.y * time + phase.y,
        )
    }

    /// Centroid velocity.
    pub fn velocity(&self) -> Vector2D {
        match *self {
            Motion::None => Vector2D::zero(),
            Motion::Translating { velocity, .. } | Motion::SolidBody { velocity, .. } => velocity,
            Motion::Oscillating {
                frequency,
                amplitude,
                phase,
                time,
                ..
            } => {
                let arg = Self::oscillation_phase(frequency, phase, time);
                let w = 2.0 * PI * frequency;
                Vector2D::new(
                    amplitude.x * w.x * arg.x.cos(),
                    amplitude.y * w.y * arg.y.cos(),
                )
            }
        }
    }

    /// Velocity of the material point at `pt`, including rotation.
    pub fn velocity_at(&self, pt: Point2D) -> Vector2D {
        match *self {
            Motion::SolidBody {
                center,
                velocity,
                omega,
                ..
            } => velocity + omega * (pt - center).tangent_vec(),
            _ => self.velocity(),
        }
    }

    /// Centroid acceleration.
    pub fn acceleration(&self) -> Vector2D {
        match *self {
            Motion::None => Vector2D::zero(),
            Motion::Translating { acceleration, .. } | Motion::SolidBody { acceleration, .. } => {
                acceleration
            }
            Motion::Oscillating {
                frequency,
                amplitude,
                phase,
                time,
                ..
            } => {
                let arg = Self::oscillation_phase(frequency, phase, time);
                let w = 2.0 * PI * frequency;
                Vector2D::new(
                    -amplitude.x * w.x * w.x * arg.x.sin(),
                    -amplitude.y * w.y * w.y * arg.y.sin(),
                )
            }
        }
    }

    /// Acceleration of the material point at `pt`, including the tangential
    /// and centripetal parts of rotation.
    pub fn acceleration_at(&self, pt: Point2D) -> Vector2D {
        match *self {
            Motion::SolidBody {
                center,
                acceleration,
                omega,
                alpha,
                ..
            } => {
                let r = pt - center;
                acceleration + alpha * r.tangent_vec() - omega * omega * r
            }
            _ => self.acceleration(),
        }
    }

    /// Advance one step of `dt` and move `shape` accordingly.
    pub fn update(&mut self, dt: f64, shape: &mut Shape2D, load: BodyLoad) {
        match self {
            Motion::None => {}
            Motion::Translating {
                velocity,
                acceleration,
            } => {
                shape.translate(*velocity * dt + 0.5 * dt * dt * *acceleration);
                *velocity += *acceleration * dt;
            }
            Motion::Oscillating {
                origin,
                frequency,
                amplitude,
                phase,
                time,
            } => {
                *time += dt;
                let arg = Self::oscillation_phase(*frequency, *phase, *time);
                let offset = Vector2D::new(amplitude.x * arg.x.sin(), amplitude.y * arg.y.sin());
                shape.move_to(*origin + offset);
            }
            Motion::SolidBody {
                center,
                velocity,
                acceleration,
                omega,
                alpha,
            } => {
                let mass = load.density * shape.area();
                let inertia = load.density * shape.polar_moment();
                *acceleration = if mass > 0.0 {
                    load.force / mass
                } else {
                    Vector2D::zero()
                };
                *alpha = if inertia > 0.0 { load.torque / inertia } else { 0.0 };
                *velocity += *acceleration * dt;
                *omega += *alpha * dt;
                shape.translate(*velocity * dt);
                shape.rotate(*omega * dt);
                *center = shape.centroid();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(motion: serde_json::Value) -> Input {
        Input::from_value(json!({ "motion": motion }))
    }

    #[test]
    fn absent_motion_is_static() {
        let m = Motion::from_input(&Input::from_value(json!({})), Point2D::zero()).unwrap();
        assert_eq!(m, Motion::None);
        assert_eq!(m.velocity_at(Point2D::new(1.0, 1.0)), Vector2D::zero());
        assert_eq!(m.acceleration(), Vector2D::zero());
    }

    #[test]
    fn unknown_motion_is_rejected() {
        let err = Motion::from_input(&body(json!({ "type": "spinning" })), Point2D::zero());
        assert_eq!(err, Err(FvError::UnknownMotion("spinning".into())));
    }

    #[test]
    fn translating_body_moves_kinematically() {
        let mut m = Motion::from_input(
            &body(json!({ "type": "translating", "velocity": [1.0, 0.0], "acceleration": [0.0, 2.0] })),
            Point2D::zero(),
        )
        .unwrap();
        let mut shape = Shape2D::circle(Point2D::zero(), 0.1);
        m.update(0.5, &mut shape, BodyLoad::default());
        assert!((shape.centroid() - Point2D::new(0.5, 0.25)).mag() < 1e-12);
        assert!((m.velocity() - Vector2D::new(1.0, 1.0)).mag() < 1e-12);
    }

    #[test]
    fn oscillation_follows_sine() {
        let mut m = Motion::from_input(
            &body(json!({ "type": "oscillating", "frequency": [1.0, 0.0], "amplitude": [0.2, 0.0] })),
            Point2D::new(1.0, 1.0),
        )
        .unwrap();
        let mut shape = Shape2D::circle(Point2D::new(1.0, 1.0), 0.1);
        m.update(0.25, &mut shape, BodyLoad::default());
        assert!((shape.centroid() - Point2D::new(1.2, 1.0)).mag() < 1e-12);
        assert!(m.velocity().mag() < 1e-12);
        assert!((m.acceleration().x + 0.2 * (2.0 * PI).powi(2)).abs() < 1e-9);
    }

    #[test]
    fn solid_body_integrates_force_and_spin() {
        let mut m = Motion::from_input(&body(json!({ "type": "solidBody" })), Point2D::zero()).unwrap();
        let mut shape = Shape2D::circle(Point2D::zero(), 1.0);
        let load = BodyLoad {
            force: Vector2D::new(PI, 0.0),
            torque: 0.0,
            density: 1.0,
        };
        m.update(1.0, &mut shape, load);
        assert!((m.velocity() - Vector2D::new(1.0, 0.0)).mag() < 1e-12);
        assert!((shape.centroid() - Point2D::new(1.0, 0.0)).mag() < 1e-12);

        let spinning = Motion::SolidBody {
            center: Point2D::zero(),
            velocity: Vector2D::zero(),
            acceleration: Vector2D::zero(),
            omega: 2.0,
            alpha: 0.0,
        };
        let v = spinning.velocity_at(Point2D::new(1.0, 0.0));
        assert!((v - Vector2D::new(0.0, 2.0)).mag() < 1e-12);
        let a = spinning.acceleration_at(Point2D::new(1.0, 0.0));
        assert!((a - Vector2D::new(-4.0, 0.0)).mag() < 1e-12);
    }
}
