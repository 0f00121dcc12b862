//! Keplerian orbits: element representation and cached propagation.

pub mod calculator;
pub mod elements;

pub use calculator::{CacheStats, OrbitCalculator, OrbitInfo};
pub use elements::{solve_kepler, true_anomaly, OrbitalElements};
