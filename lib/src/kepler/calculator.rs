//! Orbit propagation with a bounded result cache.

use std::collections::HashMap;
use std::f64::consts::TAU;

use nalgebra::{Matrix3, Vector3};
use ordered_float::OrderedFloat;
use serde::Serialize;
use tracing::trace;

use crate::constants::{AU_KM, GRAVITATIONAL_CONSTANT, SECONDS_PER_DAY};
use crate::error::{Error, Result};

use super::elements::{solve_kepler, true_anomaly, OrbitalElements};

/// Julian dates are bucketed to this precision when forming cache keys.
const CACHE_KEY_PRECISION_DAYS: f64 = 0.1;
/// A hit additionally requires the cached Julian date to fall within this
/// window of the request; a stale entry in the bucket is evicted.
const CACHE_TIME_TOLERANCE_DAYS: f64 = 0.01;
const DEFAULT_CACHE_CAPACITY: usize = 1000;
/// Below this, an eccentricity or inclination is treated as zero when
/// recovering elements from a state vector.
const STATE_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    elements: [OrderedFloat<f64>; 7],
    julian_date_bucket: OrderedFloat<f64>,
    central_mass: OrderedFloat<f64>,
}

impl CacheKey {
    fn new(elements: &OrbitalElements, julian_date: f64, central_mass: f64) -> Self {
        let bucket = libm::round(julian_date / CACHE_KEY_PRECISION_DAYS) * CACHE_KEY_PRECISION_DAYS;
        Self {
            elements: [
                OrderedFloat(elements.semi_major_axis()),
                OrderedFloat(elements.eccentricity()),
                OrderedFloat(elements.inclination()),
                OrderedFloat(elements.longitude_of_ascending_node()),
                OrderedFloat(elements.argument_of_perihelion()),
                OrderedFloat(elements.mean_anomaly_at_epoch()),
                OrderedFloat(elements.epoch()),
            ],
            julian_date_bucket: OrderedFloat(bucket),
            central_mass: OrderedFloat(central_mass),
        }
    }
}

#[derive(Clone, Debug)]
struct CacheEntry {
    julian_date: f64,
    position: Vector3<f64>,
    velocity: Vector3<f64>,
    access_count: u32,
    inserted_at: u64,
}

/// Snapshot of the orbit cache counters.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate_percent: f64,
    pub size: usize,
    pub capacity: usize,
}

/// Summary of an orbit's derived geometry.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct OrbitInfo {
    pub period_days: f64,
    pub period_years: f64,
    pub aphelion_au: f64,
    pub perihelion_au: f64,
    pub semi_major_axis_au: f64,
    pub eccentricity: f64,
    pub inclination_deg: f64,
    pub longitude_ascending_node_deg: f64,
    pub argument_perihelion_deg: f64,
}

/// Converts orbital elements plus time into heliocentric state vectors, and
/// back, memoizing recent results.
///
/// The cache counters are plain per-instance state; concurrent use requires
/// external synchronization or one calculator per worker.
pub struct OrbitCalculator {
    cache: HashMap<CacheKey, CacheEntry>,
    capacity: usize,
    hits: u64,
    misses: u64,
    sequence: u64,
}

impl Default for OrbitCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl OrbitCalculator {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
            capacity: DEFAULT_CACHE_CAPACITY,
            hits: 0,
            misses: 0,
            sequence: 0,
        }
    }

    /// Heliocentric position (`km`) and velocity (`km/s`) of a body with
    /// the given elements at `julian_date`, orbiting a central body of
    /// `central_mass` kilograms.
    pub fn calculate_position_velocity(
        &mut self,
        elements: &OrbitalElements,
        julian_date: f64,
        central_mass: f64,
    ) -> Result<(Vector3<f64>, Vector3<f64>)> {
        let key = CacheKey::new(elements, julian_date, central_mass);

        if let Some(entry) = self.cache.get(&key) {
            if (entry.julian_date - julian_date).abs() <= CACHE_TIME_TOLERANCE_DAYS {
                self.hits += 1;
                return Ok((entry.position, entry.velocity));
            }
            trace!(julian_date, "evicting stale orbit cache entry");
            self.cache.remove(&key);
        }

        self.misses += 1;
        let (position, velocity) = compute_state(elements, julian_date, central_mass)?;
        self.insert(key, julian_date, position, velocity);
        Ok((position, velocity))
    }

    fn insert(&mut self, key: CacheKey, julian_date: f64, position: Vector3<f64>, velocity: Vector3<f64>) {
        if self.cache.len() >= self.capacity {
            self.evict_least_accessed();
        }
        self.sequence += 1;
        self.cache.insert(
            key,
            CacheEntry {
                julian_date,
                position,
                velocity,
                access_count: 1,
                inserted_at: self.sequence,
            },
        );
    }

    // Access counts are written once at insertion and never bumped on a
    // hit, so the minimum-count entry is always the oldest insertion and
    // eviction is FIFO in practice.
    fn evict_least_accessed(&mut self) {
        let victim = self
            .cache
            .iter()
            .min_by_key(|(_, entry)| (entry.access_count, entry.inserted_at))
            .map(|(key, _)| key.clone());
        if let Some(key) = victim {
            trace!("orbit cache full, evicting least-accessed entry");
            self.cache.remove(&key);
        }
    }

    /// Recover orbital elements from an instantaneous state vector.
    ///
    /// Degenerate orientations fall back to documented defaults instead of
    /// failing: zero inclination leaves the ascending node undefined, so the
    /// node longitude is reported as 0; zero eccentricity likewise pins the
    /// argument of perihelion to 0. The returned elements carry `epoch = 0`
    /// since an instantaneous state fixes no epoch of its own.
    pub fn orbital_elements_from_state(
        &self,
        position_km: &Vector3<f64>,
        velocity_km_s: &Vector3<f64>,
        central_mass: f64,
    ) -> Result<OrbitalElements> {
        let r = position_km * 1000.0;
        let v = velocity_km_s * 1000.0;
        let mu = GRAVITATIONAL_CONSTANT * central_mass;

        let r_mag = r.norm();
        if r_mag == 0.0 {
            return Err(Error::DegenerateGeometry(
                "state vector with zero radius has no orbit".into(),
            ));
        }
        let v_mag = v.norm();

        let h_vec = r.cross(&v);
        let h_mag = h_vec.norm();

        let e_vec = v.cross(&h_vec) / mu - r / r_mag;
        let e_mag = e_vec.norm();

        let a = 1.0 / (2.0 / r_mag - v_mag.powi(2) / mu);

        let inclination = if h_mag > 0.0 {
            libm::acos((h_vec.z / h_mag).clamp(-1.0, 1.0))
        } else {
            0.0
        };

        let equatorial = inclination.abs() < STATE_TOLERANCE;
        let circular = e_mag < STATE_TOLERANCE;

        let n_vec = Vector3::new(0.0, 0.0, 1.0).cross(&h_vec);
        let n_mag = n_vec.norm();

        let lan = if equatorial || n_mag == 0.0 {
            0.0
        } else {
            let mut lan = libm::acos((n_vec.x / n_mag).clamp(-1.0, 1.0));
            if n_vec.y < 0.0 {
                lan = TAU - lan;
            }
            lan
        };

        let argpe = if equatorial || circular {
            0.0
        } else {
            let mut argpe = libm::acos((n_vec.dot(&e_vec) / (n_mag * e_mag)).clamp(-1.0, 1.0));
            if e_vec.z < 0.0 {
                argpe = TAU - argpe;
            }
            argpe
        };

        let nu = if circular {
            0.0
        } else {
            let mut nu = libm::acos((e_vec.dot(&r) / (e_mag * r_mag)).clamp(-1.0, 1.0));
            if r.dot(&v) < 0.0 {
                nu = TAU - nu;
            }
            nu
        };

        let ea = 2.0 * libm::atan(libm::sqrt((1.0 - e_mag) / (1.0 + e_mag)) * libm::tan(nu / 2.0));
        let mean_anomaly = ea - e_mag * libm::sin(ea);

        OrbitalElements::new(
            a / (AU_KM * 1000.0),
            e_mag,
            inclination.to_degrees(),
            lan.to_degrees(),
            argpe.to_degrees(),
            mean_anomaly.to_degrees(),
            0.0,
        )
    }

    /// Orbital period in days around a central body of `central_mass` kg.
    pub fn orbital_period(&self, elements: &OrbitalElements, central_mass: f64) -> f64 {
        let a_m = elements.semi_major_axis() * AU_KM * 1000.0;
        let mu = GRAVITATIONAL_CONSTANT * central_mass;
        TAU * libm::sqrt(a_m.powi(3) / mu) / SECONDS_PER_DAY
    }

    /// Aphelion and perihelion distances (`AU`).
    pub fn aphelion_perihelion(&self, elements: &OrbitalElements) -> (f64, f64) {
        (elements.aphelion_distance(), elements.perihelion_distance())
    }

    pub fn orbit_info(&self, elements: &OrbitalElements) -> OrbitInfo {
        let period = elements.orbital_period();
        OrbitInfo {
            period_days: period,
            period_years: period / 365.25,
            aphelion_au: elements.aphelion_distance(),
            perihelion_au: elements.perihelion_distance(),
            semi_major_axis_au: elements.semi_major_axis(),
            eccentricity: elements.eccentricity(),
            inclination_deg: elements.inclination(),
            longitude_ascending_node_deg: elements.longitude_of_ascending_node(),
            argument_perihelion_deg: elements.argument_of_perihelion(),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        let lookups = self.hits + self.misses;
        let hit_rate_percent = if lookups > 0 {
            100.0 * self.hits as f64 / lookups as f64
        } else {
            0.0
        };
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            hit_rate_percent,
            size: self.cache.len(),
            capacity: self.capacity,
        }
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.hits = 0;
        self.misses = 0;
    }

    /// Change the entry bound, evicting down if already above it.
    pub fn set_cache_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.cache.len() > self.capacity {
            self.evict_least_accessed();
        }
    }
}

/// Full Kepler pipeline: mean anomaly, eccentric anomaly, true anomaly,
/// orbital-plane state, then rotation into the heliocentric frame.
fn compute_state(
    elements: &OrbitalElements,
    julian_date: f64,
    central_mass: f64,
) -> Result<(Vector3<f64>, Vector3<f64>)> {
    let time_since_epoch = julian_date - elements.epoch();

    let a_m = elements.semi_major_axis() * AU_KM * 1000.0;
    let mu = GRAVITATIONAL_CONSTANT * central_mass;

    // Mean motion in rad/day.
    let mean_motion = libm::sqrt(mu / a_m.powi(3)) * SECONDS_PER_DAY;
    let mean_anomaly =
        (elements.mean_anomaly_at_epoch().to_radians() + mean_motion * time_since_epoch).rem_euclid(TAU);

    let e = elements.eccentricity();
    let ea = solve_kepler(mean_anomaly, e)?;
    let nu = true_anomaly(ea, e);

    let a_km = elements.semi_major_axis() * AU_KM;
    let p = 1.0 - e.powi(2);
    let radius_km = a_km * p / (1.0 + e * libm::cos(nu));

    let plane_position = Vector3::new(
        radius_km * libm::cos(nu),
        radius_km * libm::sin(nu),
        0.0,
    );

    // Velocity from the angular-momentum decomposition: radial component
    // (mu/h) e sin(nu), transverse component h/r.
    let h = libm::sqrt(mu * a_m * p);
    let r_m = radius_km * 1000.0;
    let v_r = mu / h * e * libm::sin(nu);
    let v_t = h / r_m;
    let plane_velocity = Vector3::new(
        (v_r * libm::cos(nu) - v_t * libm::sin(nu)) / 1000.0,
        (v_r * libm::sin(nu) + v_t * libm::cos(nu)) / 1000.0,
        0.0,
    );

    let rot = perifocal_to_heliocentric(elements);
    Ok((rot * plane_position, rot * plane_velocity))
}

/// Rotation from the orbital plane into the heliocentric frame: the 3-2-3
/// Euler composition over (ascending node, inclination, perihelion
/// argument).
fn perifocal_to_heliocentric(elements: &OrbitalElements) -> Matrix3<f64> {
    let i = elements.inclination().to_radians();
    let lan = elements.longitude_of_ascending_node().to_radians();
    let w = elements.argument_of_perihelion().to_radians();

    let (sin_lan, cos_lan) = (libm::sin(lan), libm::cos(lan));
    let (sin_i, cos_i) = (libm::sin(i), libm::cos(i));
    let (sin_w, cos_w) = (libm::sin(w), libm::cos(w));

    Matrix3::new(
        cos_lan * cos_w - sin_lan * sin_w * cos_i,
        -cos_lan * sin_w - sin_lan * cos_w * cos_i,
        sin_lan * sin_i,
        sin_lan * cos_w + cos_lan * sin_w * cos_i,
        -sin_lan * sin_w + cos_lan * cos_w * cos_i,
        -cos_lan * sin_i,
        sin_w * sin_i,
        cos_w * sin_i,
        cos_i,
    )
}
