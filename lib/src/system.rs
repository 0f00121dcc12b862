//! Aggregate model of one star system.

use std::collections::HashMap;

use itertools::Itertools;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::bodies::{CelestialBody, Planet, PlanetRecord, Sun, SunRecord};
use crate::constants::GRAVITATIONAL_CONSTANT;
use crate::error::{Error, Result};
use crate::kepler::{CacheStats, OrbitCalculator};
use crate::physics::PhysicsEngine;

/// Axis-aligned bounds of the planet positions (`km`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SystemBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub min_z: f64,
    pub max_z: f64,
}

/// On-disk record of a whole system.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemRecord {
    #[serde(default)]
    pub current_date: f64,
    #[serde(default)]
    pub sun: Option<SunRecord>,
    #[serde(default)]
    pub planets: Vec<PlanetRecord>,
}

/// One central star plus a uniquely-named set of orbiting planets.
///
/// Per-tick propagation is pure Keplerian: every planet's state is derived
/// independently from its own elements, with no inter-planet gravity. The
/// N-body integrator touches this model only through the explicit
/// [`SolarSystemModel::apply_perturbation`] pass, and the two motion models
/// are never reconciled automatically.
#[derive(Default)]
pub struct SolarSystemModel {
    sun: Option<Sun>,
    planets: HashMap<String, Planet>,
    current_date: f64,
    calculator: OrbitCalculator,
}

impl SolarSystemModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a body. The Sun slot holds exactly one star and planet names
    /// are unique; a colliding add is an error, never a silent overwrite.
    pub fn add_celestial_body(&mut self, body: CelestialBody) -> Result<()> {
        match body {
            CelestialBody::Sun(sun) => {
                if self.sun.is_some() {
                    return Err(Error::Validation(format!(
                        "a central star is already present, refusing to replace it with '{}'",
                        sun.name()
                    )));
                }
                self.sun = Some(sun);
            }
            CelestialBody::Planet(planet) => {
                if self.planets.contains_key(planet.name()) {
                    return Err(Error::Validation(format!(
                        "planet '{}' already exists",
                        planet.name()
                    )));
                }
                self.planets.insert(planet.name().to_owned(), planet);
            }
        }
        Ok(())
    }

    pub fn sun(&self) -> Option<&Sun> {
        self.sun.as_ref()
    }

    pub fn get_planet(&self, name: &str) -> Option<&Planet> {
        self.planets.get(name)
    }

    pub fn planets(&self) -> impl Iterator<Item = &Planet> {
        self.planets.values()
    }

    pub fn planet_count(&self) -> usize {
        self.planets.len()
    }

    pub fn has_sun(&self) -> bool {
        self.sun.is_some()
    }

    pub fn body_count(&self) -> usize {
        self.planets.len() + usize::from(self.sun.is_some())
    }

    pub fn current_date(&self) -> f64 {
        self.current_date
    }

    /// Recompute every body's derived state at `julian_date`. The Sun
    /// stays pinned at the origin; each planet is propagated independently
    /// from its own elements.
    pub fn update_all_positions(&mut self, julian_date: f64) -> Result<()> {
        self.current_date = julian_date;
        for planet in self.planets.values_mut() {
            planet.update_position(julian_date, &mut self.calculator)?;
        }
        Ok(())
    }

    /// Run one explicit N-body integration step over a snapshot of all
    /// bodies and write the perturbed state back.
    pub fn apply_perturbation(&mut self, engine: &PhysicsEngine, dt_seconds: f64) -> Result<()> {
        let mut bodies = self.all_bodies();
        engine.step(&mut bodies, dt_seconds)?;

        for body in bodies {
            if let CelestialBody::Planet(planet) = body {
                self.planets.insert(planet.name().to_owned(), planet);
            }
        }
        Ok(())
    }

    /// Snapshot of every body, Sun first.
    pub fn all_bodies(&self) -> Vec<CelestialBody> {
        let mut bodies = Vec::with_capacity(self.body_count());
        if let Some(sun) = &self.sun {
            bodies.push(CelestialBody::Sun(sun.clone()));
        }
        bodies.extend(
            self.planets
                .values()
                .map(|planet| CelestialBody::Planet(planet.clone())),
        );
        bodies
    }

    /// Total mechanical energy (`J`): kinetic over all bodies plus
    /// potential over all unordered pairs.
    pub fn get_total_energy(&self) -> f64 {
        let bodies = self.all_bodies();

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

    /// Total angular momentum about the origin (`kg m^2/s`).
    pub fn get_angular_momentum(&self) -> Vector3<f64> {
        self.all_bodies()
            .iter()
            .map(|body| (body.position() * 1000.0).cross(&body.momentum()))
            .sum()
    }

    /// Mass-weighted mean position (`km`).
    pub fn get_center_of_mass(&self) -> Vector3<f64> {
        let mut total_mass = 0.0;
        let mut weighted = Vector3::zeros();
        for body in self.all_bodies() {
            total_mass += body.mass();
            weighted += body.mass() * body.position();
        }
        if total_mass == 0.0 {
            return Vector3::zeros();
        }
        weighted / total_mass
    }

    /// Axis-aligned bounds over the planet positions; zeros when empty.
    pub fn get_system_bounds(&self) -> SystemBounds {
        let mut planets = self.planets.values();
        let Some(first) = planets.next() else {
            return SystemBounds::default();
        };

        let p = first.position();
        let mut bounds = SystemBounds {
            min_x: p.x,
            max_x: p.x,
            min_y: p.y,
            max_y: p.y,
            min_z: p.z,
            max_z: p.z,
        };
        for planet in planets {
            let p = planet.position();
            bounds.min_x = bounds.min_x.min(p.x);
            bounds.max_x = bounds.max_x.max(p.x);
            bounds.min_y = bounds.min_y.min(p.y);
            bounds.max_y = bounds.max_y.max(p.y);
            bounds.min_z = bounds.min_z.min(p.z);
            bounds.max_z = bounds.max_z.max(p.z);
        }
        bounds
    }

    /// Counters of the shared orbit cache.
    pub fn orbit_cache_stats(&self) -> CacheStats {
        self.calculator.cache_stats()
    }

    /// Remove every body and reset the clock.
    pub fn clear(&mut self) {
        self.sun = None;
        self.planets.clear();
        self.current_date = 0.0;
        self.calculator.clear_cache();
    }

    pub fn to_record(&self) -> SystemRecord {
        SystemRecord {
            current_date: self.current_date,
            sun: self.sun.as_ref().map(Sun::to_record),
            planets: self.planets.values().map(Planet::to_record).collect(),
        }
    }

    pub fn from_record(record: SystemRecord) -> Result<Self> {
        let mut model = Self::new();
        model.current_date = record.current_date;
        if let Some(sun) = record.sun {
            model.add_celestial_body(CelestialBody::Sun(Sun::from_record(sun)?))?;
        }
        for planet in record.planets {
            model.add_celestial_body(CelestialBody::Planet(Planet::from_record(planet)?))?;
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{AU_KM, J2000_JD};
    use crate::kepler::OrbitalElements;

    fn planet(name: &str, a: f64, mass: f64) -> Planet {
        let elements = OrbitalElements::new(a, 0.0167, 1.5, 40.0, 100.0, 30.0, J2000_JD).unwrap();
        Planet::new(name, mass, 6000.0, elements, [0.5, 0.5, 0.5], 24.0, 0.0).unwrap()
    }

    fn small_system() -> SolarSystemModel {
        let mut model = SolarSystemModel::new();
        model
            .add_celestial_body(CelestialBody::Sun(Sun::sol()))
            .unwrap();
        model
            .add_celestial_body(CelestialBody::Planet(planet("Earth", 1.0, 5.972e24)))
            .unwrap();
        model
            .add_celestial_body(CelestialBody::Planet(planet("Mars", 1.524, 6.417e23)))
            .unwrap();
        model
    }

    #[test]
    fn duplicate_planet_name_is_rejected() {
        let mut model = small_system();
        let result = model.add_celestial_body(CelestialBody::Planet(planet("Earth", 2.0, 1.0e24)));
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(model.planet_count(), 2);
    }

    #[test]
    fn second_sun_is_rejected() {
        let mut model = small_system();
        let result = model.add_celestial_body(CelestialBody::Sun(Sun::sol()));
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn update_propagates_every_planet() {
        let mut model = small_system();
        model.update_all_positions(J2000_JD + 50.0).unwrap();

        assert_eq!(model.current_date(), J2000_JD + 50.0);
        let earth_au = model.get_planet("Earth").unwrap().position().norm() / AU_KM;
        let mars_au = model.get_planet("Mars").unwrap().position().norm() / AU_KM;
        assert!((earth_au - 1.0).abs() < 0.05);
        assert!((mars_au - 1.524).abs() < 0.05);
    }

    #[test]
    fn center_of_mass_stays_near_the_sun() {
        let mut model = small_system();
        model.update_all_positions(J2000_JD + 10.0).unwrap();
        let com = model.get_center_of_mass();
        // The Sun dominates the mass budget, so the barycenter sits well
        // inside one solar radius of the origin here.
        assert!(com.norm() < 1000.0, "COM at {} km", com.norm());
    }

    #[test]
    fn aggregate_energy_is_negative_for_bound_system() {
        let mut model = small_system();
        model.update_all_positions(J2000_JD).unwrap();
        assert!(model.get_total_energy() < 0.0);
        assert!(model.get_angular_momentum().norm() > 0.0);
    }

    #[test]
    fn bounds_cover_planet_positions() {
        let mut model = small_system();
        model.update_all_positions(J2000_JD).unwrap();
        let bounds = model.get_system_bounds();
        assert!(bounds.max_x > bounds.min_x);

        let empty = SolarSystemModel::new();
        assert_eq!(empty.get_system_bounds(), SystemBounds::default());
    }

    #[test]
    fn perturbation_pass_moves_planets() {
        let mut model = small_system();
        model.update_all_positions(J2000_JD).unwrap();
        let before = model.get_planet("Earth").unwrap().position();

        let engine = PhysicsEngine::new();
        model.apply_perturbation(&engine, 86_400.0).unwrap();

        let after = model.get_planet("Earth").unwrap().position();
        let moved = (after - before).norm();
        // One day of orbital motion covers roughly 2.6 million km.
        assert!(moved > 1.0e6, "moved {moved} km");
    }

    #[test]
    fn clear_returns_to_empty() {
        let mut model = small_system();
        model.update_all_positions(J2000_JD).unwrap();
        model.clear();
        assert_eq!(model.body_count(), 0);
        assert!(!model.has_sun());
        assert_eq!(model.current_date(), 0.0);
    }

    #[test]
    fn record_round_trip_preserves_the_system() {
        let mut model = small_system();
        model.update_all_positions(J2000_JD + 5.0).unwrap();

        let json = serde_json::to_string(&model.to_record()).unwrap();
        let record: SystemRecord = serde_json::from_str(&json).unwrap();
        let back = SolarSystemModel::from_record(record).unwrap();

        assert_eq!(back.planet_count(), 2);
        assert!(back.has_sun());
        assert!(back
            .get_planet("Mars")
            .unwrap()
            .elements()
            .approx_eq(model.get_planet("Mars").unwrap().elements(), 1e-10));
    }
}
