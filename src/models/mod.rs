//! Reference per-voxel models built on the solver and peak primitives
//!
//! - `exp_decay`: mono-exponential fit (LLS, WLLS, NLLS), synthesis, residual
//! - `odf_peaks`: ODF to fixed-length fiber encoding
//! - `deconv`: spherical Richardson-Lucy deconvolution to an ODF

pub mod exp_decay;
pub mod odf_peaks;
pub mod deconv;

pub use exp_decay::*;
pub use odf_peaks::*;
pub use deconv::*;
