//! Numerical solvers used by the per-voxel fitters
//!
//! This module provides:
//! - Simplex: derivative-free Nelder-Mead with parameter scaling and bounds
//! - Linear: ordinary, weighted, and two-pass log-weighted least squares
//! - Deconv: (damped) Richardson-Lucy deconvolution
//!
//! Solvers never panic on bad numbers; they return `FitError` so the calling
//! `VectFunction` can give up on just that voxel.

pub mod simplex;
pub mod linear;
pub mod deconv;

pub use simplex::{Bounds, ParamScaling, Simplex, SimplexParams, SimplexResult};
pub use linear::{solve_lls, solve_log_wlls, solve_wlls, LinearSolver, RCOND};
pub use deconv::{RichardsonLucy, RichardsonLucyParams};
