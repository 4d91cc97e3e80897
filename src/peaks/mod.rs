//! Peak extraction on the sphere
//!
//! An orientation distribution sampled on a fixed set of directions is
//! reduced to a few dominant axes: strict local maxima over the sampling's
//! neighbor graph, greedy angular clustering, then weighting.

pub mod icosphere;
pub mod sphere;
pub mod finder;
pub mod fibers;

pub use icosphere::*;
pub use sphere::*;
pub use finder::*;
pub use fibers::*;
