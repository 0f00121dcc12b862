#![warn(clippy::unwrap_used, clippy::pedantic)]
#![allow(
    clippy::cast_lossless,
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc,
    clippy::too_many_lines
)]
//! Headless demo driver: builds the default eight-planet system, runs a
//! simulated year of Keplerian ticking, and culls against a demo camera.

use std::{collections::HashMap, env, fs};

use color_eyre::eyre::{eyre, Result, WrapErr};
use nalgebra::Vector3;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use astrosim::{
    bodies::{CelestialBody, Planet, Sun},
    constants::{AU_KM, J2000_JD},
    frustum::{CameraParams, FrustumCuller},
    kepler::OrbitalElements,
    physics::PhysicsEngine,
    system::{SolarSystemModel, SystemRecord},
    time::TimeManager,
};

/// Default J2000 osculating elements and physical data for the eight
/// planets: name, mass (kg), radius (km), color, rotation period (h),
/// axial tilt (deg), then (a, e, i, lan, argpe, m0).
#[allow(clippy::type_complexity)]
const PLANETS: [(&str, f64, f64, [f64; 3], f64, f64, [f64; 6]); 8] = [
    ("Mercury", 3.301e23, 2439.7, [0.7, 0.7, 0.7], 1407.6, 0.034,
     [0.387_098, 0.205_630, 7.005, 48.331, 29.124, 174.796]),
    ("Venus", 4.867e24, 6051.8, [1.0, 0.8, 0.4], -5832.5, 177.4,
     [0.723_332, 0.006_772, 3.394_58, 76.680, 54.884, 50.115]),
    ("Earth", 5.972e24, 6371.0, [0.3, 0.7, 1.0], 23.9345, 23.44,
     [1.000_002_61, 0.016_711_23, 0.000_015_31, -11.260_64, 102.937_68, 100.464_57]),
    ("Mars", 6.417e23, 3389.5, [0.8, 0.3, 0.1], 24.6229, 25.19,
     [1.523_710_34, 0.093_394_10, 1.849_691_42, 49.559_538_91, 286.502_108_65, 19.387]),
    ("Jupiter", 1.898e27, 69_911.0, [0.9, 0.7, 0.4], 9.9259, 3.13,
     [5.202_887, 0.048_386_24, 1.304_396_95, 100.473_909_09, 273.867_408_40, 20.020]),
    ("Saturn", 5.683e26, 58_232.0, [0.9, 0.9, 0.6], 10.656, 26.73,
     [9.536_675_94, 0.053_861_79, 2.485_991_87, 113.662_424_48, 339.391_647, 317.020]),
    ("Uranus", 8.681e25, 25_362.0, [0.4, 0.8, 0.9], -17.2417, 97.77,
     [19.189_164_64, 0.047_257_44, 0.772_637_83, 74.016_925_03, 96.998_56, 142.238]),
    ("Neptune", 1.024e26, 24_622.0, [0.2, 0.3, 0.8], 16.1187, 28.32,
     [30.069_922_76, 0.008_590_48, 1.770_043_47, 131.784_225_74, 276.336_4, 260.813]),
];

fn default_system() -> Result<SolarSystemModel> {
    let mut model = SolarSystemModel::new();
    model.add_celestial_body(CelestialBody::Sun(Sun::sol()))?;

    for (name, mass, radius, color, rotation, tilt, el) in PLANETS {
        let elements = OrbitalElements::new(el[0], el[1], el[2], el[3], el[4], el[5], J2000_JD)?;
        let planet = Planet::new(name, mass, radius, elements, color, rotation, tilt)?;
        model.add_celestial_body(CelestialBody::Planet(planet))?;
    }
    Ok(model)
}

fn load_system(path: &str) -> Result<SolarSystemModel> {
    let raw = fs::read_to_string(path).wrap_err_with(|| format!("reading {path}"))?;
    let record: SystemRecord =
        serde_json::from_str(&raw).wrap_err_with(|| format!("parsing {path}"))?;
    Ok(SolarSystemModel::from_record(record)?)
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let mut model = match env::args().nth(1) {
        Some(path) => load_system(&path)?,
        None => default_system()?,
    };
    info!(
        planets = model.planet_count(),
        has_sun = model.has_sun(),
        "system loaded"
    );

    let mut culler = FrustumCuller::new();
    for planet in model.planets() {
        culler.register_object(planet.name(), Vector3::zeros(), planet.radius());
    }

    // Demo camera above the ecliptic, wide enough to reach Neptune.
    let camera = CameraParams {
        position: Vector3::new(0.0, -3.0 * AU_KM, 1.0 * AU_KM),
        center: Vector3::zeros(),
        fov: 60.0,
        aspect_ratio: 16.0 / 9.0,
        near: 0.01 * AU_KM,
        far: 40.0 * AU_KM,
        up: Vector3::new(0.0, 0.0, 1.0),
    };
    culler.update_frustum(&camera);

    let mut time = TimeManager::at_julian_date(J2000_JD);
    time.set_time_scale_preset("day")?;

    // One simulated year at one day per wall-clock second.
    for _ in 0..365 {
        time.update(1.0);
        model.update_all_positions(time.current_julian_date())?;

        let positions: HashMap<String, Vector3<f64>> = model
            .planets()
            .map(|planet| (planet.name().to_owned(), planet.position()))
            .collect();
        let visible = culler.cull_objects(&positions);
        tracing::debug!(julian_date = time.current_julian_date(), visible = visible.len());
    }

    for planet in model.planets() {
        let position = planet.position();
        info!(
            name = planet.name(),
            distance_au = position.norm() / AU_KM,
            "final heliocentric position"
        );
    }

    // One explicit N-body day on top of the Keplerian year.
    let engine = PhysicsEngine::new();
    let energy_before = model.get_total_energy();
    model.apply_perturbation(&engine, 86_400.0)?;
    let energy_after = model.get_total_energy();
    info!(
        energy_before,
        energy_after,
        relative_change = ((energy_after - energy_before) / energy_before).abs(),
        "perturbation pass"
    );

    let cache = model.orbit_cache_stats();
    info!(
        hits = cache.hits,
        misses = cache.misses,
        hit_rate_percent = cache.hit_rate_percent,
        "orbit cache"
    );

    let stats = culler.stats();
    info!(
        frames = stats.frame_count,
        checked = stats.total_checked,
        culled = stats.total_culled,
        average_cull_ratio = stats.average_cull_ratio,
        "culling"
    );

    if model.planet_count() == 0 {
        return Err(eyre!("system contained no planets"));
    }
    Ok(())
}
