//! Error types
//!
//! Two failure classes exist. `ConfigError` is fatal: it is raised while a
//! run is being set up (bad dimensions, unparsable specs, a factory that
//! cannot build its function) and nothing is computed. `FitError` is local
//! to one voxel: the engine logs it and leaves that voxel at zero.

use thiserror::Error;

/// Result type for setup/configuration steps
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for a single voxel evaluation
pub type FitResult<T> = Result<T, FitError>;

/// Fatal errors raised before any voxel is processed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Two things that must agree in length do not
    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Two volumes that must share a grid do not
    #[error("Sampling mismatch: {0}")]
    SamplingMismatch(String),

    /// A selection or mode string could not be parsed
    #[error("Invalid specification: {0}")]
    InvalidSpec(String),

    /// A numeric parameter is out of range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The worker pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

/// Per-voxel numerical failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    /// The linear system is singular or too ill-conditioned to trust
    #[error("Singular or ill-conditioned system")]
    Singular,

    /// A NaN or infinite value showed up in the computation
    #[error("Non-finite value encountered")]
    NonFinite,

    /// An iterative method ran out of iterations
    #[error("No convergence after {iterations} iterations")]
    NotConverged { iterations: usize },

    /// The input vector cannot be fitted (e.g. wrong length, no signal)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The minimizer itself reported an error
    #[error("Optimizer error: {0}")]
    Optimizer(String),
}

/// Either class, for calls that may fail on setup or on the numbers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fit(#[from] FitError),
}

impl ConfigError {
    /// Shorthand for a dimension check
    pub fn check_dim(what: &'static str, expected: usize, actual: usize) -> ConfigResult<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(ConfigError::DimensionMismatch { what, expected, actual })
        }
    }
}
