//! Volumetric data model
//!
//! - `Sampling`: the voxel grid (dimensions, voxel size, voxel→world affine)
//! - `Sample`: one voxel coordinate
//! - `Volume`: a dense grid with a fixed-length channel vector per voxel
//! - `Mask`: per-voxel labels restricting which voxels get processed
//!
//! Voxels are indexed in Fortran order (x varies fastest), matching the
//! NIfTI convention: `index = i + j*nx + k*nx*ny`.

pub mod sampling;
pub mod data;
pub mod mask;

pub use sampling::{Sample, Sampling};
pub use data::Volume;
pub use mask::Mask;
