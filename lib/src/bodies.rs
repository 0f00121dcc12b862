//! Definitions of celestial bodies.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::constants::{GRAVITATIONAL_CONSTANT, SOLAR_MASS_KG};
use crate::error::{Error, Result};
use crate::kepler::{OrbitCalculator, OrbitalElements};

fn validate_mass(mass: f64) -> Result<f64> {
    if mass <= 0.0 {
        return Err(Error::Validation(format!(
            "mass must be positive, got {mass}"
        )));
    }
    Ok(mass)
}

fn validate_radius(radius: f64) -> Result<f64> {
    if radius <= 0.0 {
        return Err(Error::Validation(format!(
            "radius must be positive, got {radius}"
        )));
    }
    Ok(radius)
}

/// The central star, fixed at the system origin.
///
/// Position and velocity are always zero; the struct stores no kinematic
/// state at all.
#[derive(Clone, Debug, PartialEq)]
pub struct Sun {
    name: String,
    /// Mass (`kg`)
    mass: f64,
    /// Mean radius (`km`)
    radius: f64,
    /// Surface temperature (`K`)
    temperature: f64,
    /// Luminosity (`W`)
    luminosity: f64,
}

impl Sun {
    pub fn new(
        name: impl Into<String>,
        mass: f64,
        radius: f64,
        temperature: f64,
        luminosity: f64,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            mass: validate_mass(mass)?,
            radius: validate_radius(radius)?,
            temperature,
            luminosity,
        })
    }

    /// Sol with its conventional physical parameters.
    pub fn sol() -> Self {
        Self {
            name: "Sun".into(),
            mass: SOLAR_MASS_KG,
            radius: 695_700.0,
            temperature: 5778.0,
            luminosity: 3.828e26,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn luminosity(&self) -> f64 {
        self.luminosity
    }

    /// Display color from the surface temperature, banded by spectral
    /// class.
    pub fn color(&self) -> [f64; 3] {
        if self.temperature < 3500.0 {
            [1.0, 0.3, 0.0]
        } else if self.temperature < 5000.0 {
            [1.0, 0.7, 0.4]
        } else if self.temperature < 6000.0 {
            [1.0, 1.0, 0.8]
        } else if self.temperature < 7500.0 {
            [1.0, 1.0, 1.0]
        } else {
            [0.8, 0.9, 1.0]
        }
    }

    /// Escape velocity at the photosphere (`km/s`).
    pub fn surface_escape_velocity(&self) -> f64 {
        let radius_m = self.radius * 1000.0;
        libm::sqrt(2.0 * GRAVITATIONAL_CONSTANT * self.mass / radius_m) / 1000.0
    }

    pub fn to_record(&self) -> SunRecord {
        SunRecord {
            name: self.name.clone(),
            mass: self.mass,
            radius: self.radius,
            temperature: self.temperature,
            luminosity: self.luminosity,
        }
    }

    pub fn from_record(record: SunRecord) -> Result<Self> {
        Self::new(
            record.name,
            record.mass,
            record.radius,
            record.temperature,
            record.luminosity,
        )
    }
}

/// A planet on a Keplerian orbit around the central star.
///
/// Position and velocity are derived state: they are recomputed from the
/// orbital elements on every [`Planet::update_position`] call and never
/// persisted as independent truth.
#[derive(Clone, Debug, PartialEq)]
pub struct Planet {
    name: String,
    /// Mass (`kg`)
    mass: f64,
    /// Mean radius (`km`)
    radius: f64,
    /// Display color, RGB in `[0, 1]`
    color: [f64; 3],
    /// Sidereal rotation period (`hours`, negative for retrograde spin)
    rotation_period: f64,
    /// Axial tilt (`deg`)
    axial_tilt: f64,
    elements: OrbitalElements,
    position: Vector3<f64>,
    velocity: Vector3<f64>,
    current_julian_date: f64,
}

impl Planet {
    pub fn new(
        name: impl Into<String>,
        mass: f64,
        radius: f64,
        elements: OrbitalElements,
        color: [f64; 3],
        rotation_period: f64,
        axial_tilt: f64,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            mass: validate_mass(mass)?,
            radius: validate_radius(radius)?,
            color,
            rotation_period,
            axial_tilt,
            elements,
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            current_julian_date: elements.epoch(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn color(&self) -> [f64; 3] {
        self.color
    }

    pub fn rotation_period(&self) -> f64 {
        self.rotation_period
    }

    pub fn axial_tilt(&self) -> f64 {
        self.axial_tilt
    }

    pub fn elements(&self) -> &OrbitalElements {
        &self.elements
    }

    /// Heliocentric position (`km`) as of the last update.
    pub fn position(&self) -> Vector3<f64> {
        self.position
    }

    /// Heliocentric velocity (`km/s`) as of the last update.
    pub fn velocity(&self) -> Vector3<f64> {
        self.velocity
    }

    pub fn current_julian_date(&self) -> f64 {
        self.current_julian_date
    }

    /// Refresh position and velocity from the orbital elements at
    /// `julian_date`.
    pub fn update_position(
        &mut self,
        julian_date: f64,
        calculator: &mut OrbitCalculator,
    ) -> Result<()> {
        let (position, velocity) =
            calculator.calculate_position_velocity(&self.elements, julian_date, SOLAR_MASS_KG)?;
        self.position = position;
        self.velocity = velocity;
        self.current_julian_date = julian_date;
        Ok(())
    }

    /// Current spin angle in degrees, from hours elapsed since the orbit
    /// epoch and the rotation period.
    pub fn rotation_angle(&self) -> f64 {
        let elapsed_hours = (self.current_julian_date - self.elements.epoch()) * 24.0;
        (elapsed_hours / self.rotation_period * 360.0).rem_euclid(360.0)
    }

    pub(crate) fn set_state(&mut self, position: Vector3<f64>, velocity: Vector3<f64>) {
        self.position = position;
        self.velocity = velocity;
    }

    pub fn to_record(&self) -> PlanetRecord {
        PlanetRecord {
            name: self.name.clone(),
            mass: self.mass,
            radius: self.radius,
            color: self.color,
            rotation_period: self.rotation_period,
            axial_tilt: self.axial_tilt,
            orbital_elements: self.elements,
        }
    }

    pub fn from_record(record: PlanetRecord) -> Result<Self> {
        Self::new(
            record.name,
            record.mass,
            record.radius,
            record.orbital_elements,
            record.color,
            record.rotation_period,
            record.axial_tilt,
        )
    }
}

/// Closed set of body kinds the model knows how to propagate.
#[derive(Clone, Debug, PartialEq)]
pub enum CelestialBody {
    Sun(Sun),
    Planet(Planet),
}

impl CelestialBody {
    pub fn name(&self) -> &str {
        match self {
            CelestialBody::Sun(sun) => sun.name(),
            CelestialBody::Planet(planet) => planet.name(),
        }
    }

    pub fn mass(&self) -> f64 {
        match self {
            CelestialBody::Sun(sun) => sun.mass(),
            CelestialBody::Planet(planet) => planet.mass(),
        }
    }

    pub fn radius(&self) -> f64 {
        match self {
            CelestialBody::Sun(sun) => sun.radius(),
            CelestialBody::Planet(planet) => planet.radius(),
        }
    }

    /// Heliocentric position (`km`); always the origin for the Sun.
    pub fn position(&self) -> Vector3<f64> {
        match self {
            CelestialBody::Sun(_) => Vector3::zeros(),
            CelestialBody::Planet(planet) => planet.position(),
        }
    }

    /// Heliocentric velocity (`km/s`); always zero for the Sun.
    pub fn velocity(&self) -> Vector3<f64> {
        match self {
            CelestialBody::Sun(_) => Vector3::zeros(),
            CelestialBody::Planet(planet) => planet.velocity(),
        }
    }

    /// Recompute derived state at `julian_date`. The Sun stays pinned at
    /// the origin.
    pub fn update_position(
        &mut self,
        julian_date: f64,
        calculator: &mut OrbitCalculator,
    ) -> Result<()> {
        match self {
            CelestialBody::Sun(_) => Ok(()),
            CelestialBody::Planet(planet) => planet.update_position(julian_date, calculator),
        }
    }

    /// Write integrated state back into the body. The Sun is pinned and
    /// ignores the write.
    pub(crate) fn set_state(&mut self, position: Vector3<f64>, velocity: Vector3<f64>) {
        match self {
            CelestialBody::Sun(_) => {}
            CelestialBody::Planet(planet) => planet.set_state(position, velocity),
        }
    }

    /// Kinetic energy (`J`).
    pub fn kinetic_energy(&self) -> f64 {
        let v_ms = self.velocity() * 1000.0;
        0.5 * self.mass() * v_ms.norm_squared()
    }

    /// Linear momentum (`kg m/s`).
    pub fn momentum(&self) -> Vector3<f64> {
        self.mass() * self.velocity() * 1000.0
    }

    /// Distance to another body (`km`).
    pub fn distance_to(&self, other: &CelestialBody) -> f64 {
        (self.position() - other.position()).norm()
    }
}

/// On-disk record for the central star.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SunRecord {
    pub name: String,
    pub mass: f64,
    pub radius: f64,
    pub temperature: f64,
    pub luminosity: f64,
}

/// Canonical on-disk planet record shared with the data layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanetRecord {
    pub name: String,
    pub mass: f64,
    pub radius: f64,
    pub color: [f64; 3],
    #[serde(default = "default_rotation_period")]
    pub rotation_period: f64,
    #[serde(default)]
    pub axial_tilt: f64,
    pub orbital_elements: OrbitalElements,
}

fn default_rotation_period() -> f64 {
    24.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::J2000_JD;

    fn earth() -> Planet {
        let elements = OrbitalElements::new(
            1.000_002_61,
            0.016_711_23,
            0.000_015_31,
            -11.260_64,
            102.937_68,
            100.464_57,
            J2000_JD,
        )
        .unwrap();
        Planet::new("Earth", 5.972e24, 6371.0, elements, [0.3, 0.7, 1.0], 23.9345, 23.44).unwrap()
    }

    #[test]
    fn rejects_non_positive_mass_and_radius() {
        let elements = OrbitalElements::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0).unwrap();
        assert!(matches!(
            Planet::new("x", 0.0, 1.0, elements, [0.0; 3], 24.0, 0.0),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            Sun::new("x", 1.0e30, -1.0, 5778.0, 3.8e26),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn sun_is_pinned_at_origin() {
        let mut body = CelestialBody::Sun(Sun::sol());
        body.set_state(Vector3::new(1.0, 2.0, 3.0), Vector3::new(4.0, 5.0, 6.0));
        assert_eq!(body.position(), Vector3::zeros());
        assert_eq!(body.velocity(), Vector3::zeros());
    }

    #[test]
    fn planet_update_derives_position_near_one_au() {
        let mut calc = OrbitCalculator::new();
        let mut planet = earth();
        planet.update_position(J2000_JD + 100.0, &mut calc).unwrap();
        let au = planet.position().norm() / crate::constants::AU_KM;
        assert!((au - 1.0).abs() < 0.05, "distance {au} AU");
        // Orbital speed near the circular value for 1 AU.
        assert!((planet.velocity().norm() - 29.78).abs() < 1.0);
    }

    #[test]
    fn sun_color_follows_temperature_bands() {
        let sol = Sun::sol();
        assert_eq!(sol.color(), [1.0, 1.0, 0.8]);
        let dwarf = Sun::new("dwarf", 1.0e29, 1.0e5, 3000.0, 1.0e24).unwrap();
        assert_eq!(dwarf.color(), [1.0, 0.3, 0.0]);
    }

    #[test]
    fn sun_escape_velocity_is_physical() {
        // Sol's surface escape velocity is about 617 km/s.
        let v = Sun::sol().surface_escape_velocity();
        assert!((v - 617.5).abs() < 5.0, "escape velocity {v}");
    }

    #[test]
    fn planet_record_round_trip() {
        let planet = earth();
        let json = serde_json::to_string(&planet.to_record()).unwrap();
        let record: PlanetRecord = serde_json::from_str(&json).unwrap();
        let back = Planet::from_record(record).unwrap();
        assert_eq!(back.name(), planet.name());
        assert!(back.elements().approx_eq(planet.elements(), 1e-10));
        assert_eq!(back.mass(), planet.mass());
        assert_eq!(back.color(), planet.color());
    }

    #[test]
    fn rotation_angle_wraps_daily() {
        let mut calc = OrbitCalculator::new();
        let mut planet = earth();
        planet.update_position(J2000_JD + 1.0, &mut calc).unwrap();
        let angle = planet.rotation_angle();
        // One day is slightly more than one sidereal rotation.
        assert!(angle > 0.0 && angle < 360.0);
    }
}
