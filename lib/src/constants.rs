//! Physical and astronomical constants shared across the crate.

/// Newtonian gravitational constant (`m^3 kg^-1 s^-2`)
pub const GRAVITATIONAL_CONSTANT: f64 = 6.674_30e-11;

/// Astronomical unit in kilometers
pub const AU_KM: f64 = 149_597_870.7;

/// Mass of the Sun (`kg`)
pub const SOLAR_MASS_KG: f64 = 1.989e30;

/// Julian date of the J2000.0 epoch
pub const J2000_JD: f64 = 2_451_545.0;

/// Seconds per day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Days per Julian century
pub const DAYS_PER_JULIAN_CENTURY: f64 = 36_525.0;

/// Solar gravitational parameter in `AU^3/day^2`
pub const GM_SUN_AU3_DAY2: f64 = 2.959_122_082_855_911e-4;
