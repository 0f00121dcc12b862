//! N-body gravitation and numerical integration.

use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use nalgebra::{Matrix3, Vector3};

use crate::bodies::CelestialBody;
use crate::constants::{AU_KM, GRAVITATIONAL_CONSTANT};
use crate::error::{Error, Result};

/// Numerical integration schemes the engine recognizes.
///
/// Only [`IntegrationMethod::Rk4`] is implemented; the other two are
/// accepted by the configuration surface but rejected at integration time.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum IntegrationMethod {
    #[default]
    Rk4,
    Euler,
    Verlet,
}

impl fmt::Display for IntegrationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IntegrationMethod::Rk4 => "rk4",
            IntegrationMethod::Euler => "euler",
            IntegrationMethod::Verlet => "verlet",
        };
        write!(f, "{name}")
    }
}

impl FromStr for IntegrationMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rk4" => Ok(IntegrationMethod::Rk4),
            "euler" => Ok(IntegrationMethod::Euler),
            "verlet" => Ok(IntegrationMethod::Verlet),
            other => Err(Error::Configuration(format!(
                "unsupported integration method `{other}`, expected one of rk4, euler, verlet"
            ))),
        }
    }
}

/// Pairwise gravity, orbital-energy utilities, and the N-body integrator.
#[derive(Clone, Debug, Default)]
pub struct PhysicsEngine {
    method: IntegrationMethod,
}

impl PhysicsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn integration_method(&self) -> IntegrationMethod {
        self.method
    }

    pub fn set_integration_method(&mut self, method: &str) -> Result<()> {
        self.method = method.parse()?;
        Ok(())
    }

    /// Gravitational acceleration (`m/s^2`) exerted on `target` by
    /// `source`, pointing from target to source.
    pub fn gravitational_acceleration(
        &self,
        target: &CelestialBody,
        source: &CelestialBody,
    ) -> Result<Vector3<f64>> {
        acceleration_between(target.position(), source.position(), source.mass())
    }

    /// Sum of gravitational accelerations (`m/s^2`) on `bodies[target]`
    /// from every other body.
    pub fn total_acceleration(
        &self,
        target: usize,
        bodies: &[CelestialBody],
    ) -> Result<Vector3<f64>> {
        let mut total = Vector3::zeros();
        for (i, other) in bodies.iter().enumerate() {
            if i != target {
                total += self.gravitational_acceleration(&bodies[target], other)?;
            }
        }
        Ok(total)
    }

    /// Advance every body one step with the configured method.
    pub fn step(&self, bodies: &mut [CelestialBody], dt_seconds: f64) -> Result<()> {
        match self.method {
            IntegrationMethod::Rk4 => self.integrate_motion_rk4(bodies, dt_seconds),
            method => Err(Error::Configuration(format!(
                "integration method `{method}` is accepted but not implemented; use rk4"
            ))),
        }
    }

    /// Classic four-stage Runge-Kutta over the joint (position, velocity)
    /// state of all bodies. Each stage recomputes every pairwise
    /// acceleration at the stage-advanced positions, so one step costs
    /// four O(N^2) force passes.
    pub fn integrate_motion_rk4(&self, bodies: &mut [CelestialBody], dt_seconds: f64) -> Result<()> {
        let dt = dt_seconds;
        let masses: Vec<f64> = bodies.iter().map(CelestialBody::mass).collect();
        let p0: Vec<Vector3<f64>> = bodies.iter().map(CelestialBody::position).collect();
        let v0: Vec<Vector3<f64>> = bodies.iter().map(CelestialBody::velocity).collect();
        let n = bodies.len();

        let a1 = accelerations_km(&p0, &masses)?;

        let p2: Vec<_> = (0..n).map(|i| p0[i] + 0.5 * dt * v0[i]).collect();
        let v2: Vec<_> = (0..n).map(|i| v0[i] + 0.5 * dt * a1[i]).collect();
        let a2 = accelerations_km(&p2, &masses)?;

        let p3: Vec<_> = (0..n).map(|i| p0[i] + 0.5 * dt * v2[i]).collect();
        let v3: Vec<_> = (0..n).map(|i| v0[i] + 0.5 * dt * a2[i]).collect();
        let a3 = accelerations_km(&p3, &masses)?;

        let p4: Vec<_> = (0..n).map(|i| p0[i] + dt * v3[i]).collect();
        let v4: Vec<_> = (0..n).map(|i| v0[i] + dt * a3[i]).collect();
        let a4 = accelerations_km(&p4, &masses)?;

        for (i, body) in bodies.iter_mut().enumerate() {
            let position = p0[i] + dt / 6.0 * (v0[i] + 2.0 * v2[i] + 2.0 * v3[i] + v4[i]);
            let velocity = v0[i] + dt / 6.0 * (a1[i] + 2.0 * a2[i] + 2.0 * a3[i] + a4[i]);
            body.set_state(position, velocity);
        }
        Ok(())
    }

    /// Circular orbital speed (`km/s`) at `position_km` around a central
    /// body of `central_mass` kilograms.
    pub fn circular_orbital_velocity(&self, position_km: &Vector3<f64>, central_mass: f64) -> f64 {
        let r = position_km.norm() * 1000.0;
        libm::sqrt(GRAVITATIONAL_CONSTANT * central_mass / r) / 1000.0
    }

    /// Escape speed (`km/s`) at `position_km`.
    pub fn escape_velocity(&self, position_km: &Vector3<f64>, central_mass: f64) -> f64 {
        let r = position_km.norm() * 1000.0;
        libm::sqrt(2.0 * GRAVITATIONAL_CONSTANT * central_mass / r) / 1000.0
    }

    /// Orbital energy of `body` about a central mass (`J`): kinetic plus
    /// gravitational potential.
    pub fn orbital_energy(&self, body: &CelestialBody, central_mass: f64) -> f64 {
        let r = body.position().norm() * 1000.0;
        let potential = -GRAVITATIONAL_CONSTANT * body.mass() * central_mass / r;
        body.kinetic_energy() + potential
    }

    /// Hill-sphere radius (`km`) of a body of `body_mass` orbiting
    /// `central_mass` at `semi_major_axis_au`.
    pub fn hill_sphere_radius(
        &self,
        body_mass: f64,
        central_mass: f64,
        semi_major_axis_au: f64,
    ) -> f64 {
        let a_km = semi_major_axis_au * AU_KM;
        a_km * libm::cbrt(body_mass / (3.0 * central_mass))
    }

    /// Tidal-force gradient tensor (`s^-2`) exerted on `target` by
    /// `source`: `-(GM/r^3) (3 r^ r^T - I)`. Co-located bodies yield the
    /// zero tensor.
    pub fn tidal_force_gradient(
        &self,
        target: &CelestialBody,
        source: &CelestialBody,
    ) -> Matrix3<f64> {
        let r_vec = (source.position() - target.position()) * 1000.0;
        let r = r_vec.norm();
        if r == 0.0 {
            return Matrix3::zeros();
        }

        let unit = r_vec / r;
        let outer = unit * unit.transpose();
        -(GRAVITATIONAL_CONSTANT * source.mass() / r.powi(3))
            * (3.0 * outer - Matrix3::identity())
    }

    /// Total mechanical energy of a body set (`J`): kinetic sum plus
    /// potential over all unordered pairs.
    pub fn system_total_energy(&self, bodies: &[CelestialBody]) -> f64 {
        let kinetic: f64 = bodies.iter().map(CelestialBody::kinetic_energy).sum();

        let potential: f64 = bodies
            .iter()
            .tuple_combinations()
            .map(|(a, b)| {
                let r = a.distance_to(b) * 1000.0;
                if r > 0.0 {
                    -GRAVITATIONAL_CONSTANT * a.mass() * b.mass() / r
                } else {
                    0.0
                }
            })
            .sum();

        kinetic + potential
    }

    /// Total angular momentum of a body set (`kg m^2/s`).
    pub fn system_angular_momentum(&self, bodies: &[CelestialBody]) -> Vector3<f64> {
        bodies
            .iter()
            .map(|body| (body.position() * 1000.0).cross(&body.momentum()))
            .sum()
    }
}

fn acceleration_between(
    target_km: Vector3<f64>,
    source_km: Vector3<f64>,
    source_mass: f64,
) -> Result<Vector3<f64>> {
    let r_vec = (source_km - target_km) * 1000.0;
    let r = r_vec.norm();
    if r == 0.0 {
        return Err(Error::DegenerateGeometry(
            "gravity is undefined for bodies at zero separation".into(),
        ));
    }
    Ok(GRAVITATIONAL_CONSTANT * source_mass / (r * r) * (r_vec / r))
}

/// Accelerations in `km/s^2` for a position snapshot, one entry per body.
fn accelerations_km(positions: &[Vector3<f64>], masses: &[f64]) -> Result<Vec<Vector3<f64>>> {
    let n = positions.len();
    let mut result = vec![Vector3::zeros(); n];
    for i in 0..n {
        for j in 0..n {
            if i != j {
                result[i] += acceleration_between(positions[i], positions[j], masses[j])?;
            }
        }
        result[i] /= 1000.0;
    }
    Ok(result)
}
