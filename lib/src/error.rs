//! Error taxonomy for the simulation core.

use thiserror::Error;

/// Result type for simulation operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the simulation core.
///
/// Validation happens at construction, so no component ever holds invalid
/// orbital elements; numeric failures are raised to the caller rather than
/// masked by a best-effort guess.
#[derive(Error, Debug)]
pub enum Error {
    /// A parameter failed its construction-time check.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An iterative solve exhausted its iteration cap or its derivative
    /// term collapsed.
    #[error("numeric divergence: {0}")]
    NumericDivergence(String),

    /// Geometry with no defined answer, e.g. gravity at zero separation.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// An unsupported option was requested.
    #[error("configuration error: {0}")]
    Configuration(String),
}
