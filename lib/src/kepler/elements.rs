//! Keplerian orbital elements and the Kepler-equation solver.

use serde::{Deserialize, Serialize};

use crate::constants::GM_SUN_AU3_DAY2;
use crate::error::{Error, Result};

/// Hard cap on Newton-Raphson iterations in [`solve_kepler`].
pub const KEPLER_MAX_ITERATIONS: u32 = 50;
/// Convergence tolerance on the eccentric-anomaly step (radians).
pub const KEPLER_TOLERANCE: f64 = 1e-12;

/// A validated set of classical Keplerian orbital elements for an
/// elliptical, Sun-centered orbit.
///
/// Angles are stored in degrees and normalized to `[0, 360)` at
/// construction; the set is immutable afterwards. Construction fails if the
/// semi-major axis is non-positive or the eccentricity falls outside
/// `[0, 1)`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ElementsRecord")]
pub struct OrbitalElements {
    /// Semi-major axis (`AU`).
    semi_major_axis: f64,
    /// Eccentricity (dimensionless).
    eccentricity: f64,
    /// Inclination (`deg`).
    inclination: f64,
    /// Longitude of the ascending node (`deg`).
    longitude_of_ascending_node: f64,
    /// Argument of perihelion (`deg`).
    argument_of_perihelion: f64,
    /// Mean anomaly at epoch (`deg`).
    mean_anomaly_at_epoch: f64,
    /// Epoch (Julian date).
    epoch: f64,
}

/// Raw on-disk shape of [`OrbitalElements`]; deserialization routes through
/// this so every decoded value passes the same validation as
/// [`OrbitalElements::new`].
#[derive(Copy, Clone, Debug, Deserialize)]
pub struct ElementsRecord {
    pub semi_major_axis: f64,
    pub eccentricity: f64,
    pub inclination: f64,
    pub longitude_of_ascending_node: f64,
    pub argument_of_perihelion: f64,
    pub mean_anomaly_at_epoch: f64,
    pub epoch: f64,
}

impl TryFrom<ElementsRecord> for OrbitalElements {
    type Error = Error;

    fn try_from(record: ElementsRecord) -> Result<Self> {
        OrbitalElements::new(
            record.semi_major_axis,
            record.eccentricity,
            record.inclination,
            record.longitude_of_ascending_node,
            record.argument_of_perihelion,
            record.mean_anomaly_at_epoch,
            record.epoch,
        )
    }
}

impl OrbitalElements {
    pub fn new(
        semi_major_axis: f64,
        eccentricity: f64,
        inclination: f64,
        longitude_of_ascending_node: f64,
        argument_of_perihelion: f64,
        mean_anomaly_at_epoch: f64,
        epoch: f64,
    ) -> Result<Self> {
        if semi_major_axis <= 0.0 {
            return Err(Error::Validation(format!(
                "semi-major axis must be positive, got {semi_major_axis}"
            )));
        }
        if !(0.0..1.0).contains(&eccentricity) {
            return Err(Error::Validation(format!(
                "eccentricity must be in [0, 1) for an elliptical orbit, got {eccentricity}"
            )));
        }

        Ok(Self {
            semi_major_axis,
            eccentricity,
            inclination: normalize_degrees(inclination),
            longitude_of_ascending_node: normalize_degrees(longitude_of_ascending_node),
            argument_of_perihelion: normalize_degrees(argument_of_perihelion),
            mean_anomaly_at_epoch: normalize_degrees(mean_anomaly_at_epoch),
            epoch,
        })
    }

    pub fn semi_major_axis(&self) -> f64 {
        self.semi_major_axis
    }

    pub fn eccentricity(&self) -> f64 {
        self.eccentricity
    }

    pub fn inclination(&self) -> f64 {
        self.inclination
    }

    pub fn longitude_of_ascending_node(&self) -> f64 {
        self.longitude_of_ascending_node
    }

    pub fn argument_of_perihelion(&self) -> f64 {
        self.argument_of_perihelion
    }

    pub fn mean_anomaly_at_epoch(&self) -> f64 {
        self.mean_anomaly_at_epoch
    }

    pub fn epoch(&self) -> f64 {
        self.epoch
    }

    /// Orbital period in days, from Kepler's third law with the solar
    /// gravitational parameter in `AU^3/day^2`.
    pub fn orbital_period(&self) -> f64 {
        let a3 = self.semi_major_axis.powi(3);
        libm::sqrt(4.0 * std::f64::consts::PI.powi(2) * a3 / GM_SUN_AU3_DAY2)
    }

    /// Perihelion distance (`AU`).
    pub fn perihelion_distance(&self) -> f64 {
        self.semi_major_axis * (1.0 - self.eccentricity)
    }

    /// Aphelion distance (`AU`).
    pub fn aphelion_distance(&self) -> f64 {
        self.semi_major_axis * (1.0 + self.eccentricity)
    }

    /// Component-wise comparison within `tol`.
    pub fn approx_eq(&self, other: &Self, tol: f64) -> bool {
        (self.semi_major_axis - other.semi_major_axis).abs() < tol
            && (self.eccentricity - other.eccentricity).abs() < tol
            && (self.inclination - other.inclination).abs() < tol
            && (self.longitude_of_ascending_node - other.longitude_of_ascending_node).abs() < tol
            && (self.argument_of_perihelion - other.argument_of_perihelion).abs() < tol
            && (self.mean_anomaly_at_epoch - other.mean_anomaly_at_epoch).abs() < tol
            && (self.epoch - other.epoch).abs() < tol
    }
}

/// Normalize an angle in degrees to `[0, 360)`.
pub fn normalize_degrees(angle: f64) -> f64 {
    angle.rem_euclid(360.0)
}

/// Solve Kepler's equation `M = E - e sin E` for the eccentric anomaly,
/// by Newton-Raphson starting from `E0 = M`.
pub fn solve_kepler(mean_anomaly: f64, eccentricity: f64) -> Result<f64> {
    if !(0.0..1.0).contains(&eccentricity) {
        return Err(Error::Validation(format!(
            "eccentricity must be in [0, 1), got {eccentricity}"
        )));
    }

    let mut ea = mean_anomaly;
    for _ in 0..KEPLER_MAX_ITERATIONS {
        let f = ea - eccentricity * libm::sin(ea) - mean_anomaly;
        let fp = 1.0 - eccentricity * libm::cos(ea);
        if fp.abs() < 1e-15 {
            return Err(Error::NumericDivergence(format!(
                "Kepler derivative collapsed near E = {ea}"
            )));
        }

        let delta = f / fp;
        ea -= delta;

        if delta.abs() < KEPLER_TOLERANCE {
            return Ok(ea);
        }
    }

    Err(Error::NumericDivergence(format!(
        "Kepler solve did not converge within {KEPLER_MAX_ITERATIONS} iterations \
         (M = {mean_anomaly}, e = {eccentricity})"
    )))
}

/// True anomaly from eccentric anomaly.
pub fn true_anomaly(eccentric_anomaly: f64, eccentricity: f64) -> f64 {
    let cos_e = libm::cos(eccentric_anomaly);
    let sin_e = libm::sin(eccentric_anomaly);
    libm::atan2(
        libm::sqrt(1.0 - eccentricity.powi(2)) * sin_e,
        cos_e - eccentricity,
    )
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::error::Error;

    fn earth_elements() -> OrbitalElements {
        OrbitalElements::new(1.000_002_61, 0.016_711_23, 0.0, -11.260_64, 102.937_68, 100.464_57, 2_451_545.0)
            .unwrap()
    }

    #[test]
    fn rejects_non_positive_semi_major_axis() {
        let result = OrbitalElements::new(0.0, 0.1, 0.0, 0.0, 0.0, 0.0, 2_451_545.0);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn rejects_hyperbolic_eccentricity() {
        let result = OrbitalElements::new(1.0, 1.2, 0.0, 0.0, 0.0, 0.0, 2_451_545.0);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn normalizes_angles_at_construction() {
        let elements = OrbitalElements::new(1.0, 0.0, 0.0, -11.260_64, 370.0, -10.0, 0.0).unwrap();
        assert!((elements.longitude_of_ascending_node() - 348.739_36).abs() < 1e-9);
        assert!((elements.argument_of_perihelion() - 10.0).abs() < 1e-12);
        assert!((elements.mean_anomaly_at_epoch() - 350.0).abs() < 1e-12);
    }

    #[test]
    fn period_and_apsis_invariants() {
        let elements = earth_elements();
        assert!(elements.orbital_period() > 0.0);
        assert!(elements.perihelion_distance() <= elements.aphelion_distance());
        // Earth's period comes out within a day of a year.
        assert!((elements.orbital_period() - 365.25).abs() < 1.0);
    }

    #[test]
    fn kepler_circular_orbit_is_identity() {
        let m = PI / 4.0;
        let ea = solve_kepler(m, 0.0).unwrap();
        assert!((ea - m).abs() < 1e-12);
        assert!((true_anomaly(ea, 0.0) - m).abs() < 1e-12);
    }

    #[test]
    fn kepler_residual_over_sampled_orbits() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..1000 {
            let m = rng.gen_range(0.0..2.0 * PI);
            let e = rng.gen_range(0.0..=0.9);
            let ea = solve_kepler(m, e).unwrap();
            let residual = ea - e * libm::sin(ea) - m;
            assert!(
                residual.abs() < 1e-10,
                "residual {residual} for M = {m}, e = {e}"
            );
        }
    }

    #[test]
    fn solver_rejects_parabolic_input() {
        assert!(matches!(solve_kepler(1.0, 1.0), Err(Error::Validation(_))));
    }

    #[test]
    fn record_round_trip_preserves_elements() {
        let elements = earth_elements();
        let json = serde_json::to_string(&elements).unwrap();
        let back: OrbitalElements = serde_json::from_str(&json).unwrap();
        assert!(elements.approx_eq(&back, 1e-10));
    }

    #[test]
    fn deserialization_revalidates() {
        let json = r#"{
            "semi_major_axis": 1.0,
            "eccentricity": 1.5,
            "inclination": 0.0,
            "longitude_of_ascending_node": 0.0,
            "argument_of_perihelion": 0.0,
            "mean_anomaly_at_epoch": 0.0,
            "epoch": 0.0
        }"#;
        assert!(serde_json::from_str::<OrbitalElements>(json).is_err());
    }
}
