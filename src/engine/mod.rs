//! Parallel per-voxel evaluation
//!
//! - `apply_function`: one input volume through a `VectFunction`
//! - `apply_function_local`: the same on the calling thread, for progress
//!   callbacks that cannot cross threads
//! - `apply_binary_function`: two co-registered volumes through a
//!   `BinaryVectFunction`
//!
//! Both ask the factory for one probe instance (to learn the output size and
//! validate dimensions), then one instance per worker. Workers own disjoint
//! voxel ranges of the output, so no locking is needed on the data path.
//! A voxel whose fit fails is logged and left at zero.

pub mod config;
pub mod isolate;
mod partition;
pub mod unary;
pub mod binary;

use crate::error::{ConfigError, ConfigResult};
use crate::function::Part;
use crate::volume::Volume;

pub use config::{EngineConfig, Partition};
pub use isolate::{isolate_voxel, Isolate};
pub use unary::{apply_function, apply_function_local, apply_function_with_progress};
pub use binary::{apply_binary_function, apply_binary_function_with_progress};

/// Result of a volume run
#[derive(Clone, Debug)]
pub struct FitOutput {
    volume: Volume,
    parts: Vec<Part>,
    /// Voxels that passed the mask/validity check
    pub processed: usize,
    /// Processed voxels whose fit failed and were left at zero
    pub failed: usize,
}

impl FitOutput {
    pub(crate) fn new(volume: Volume, parts: Vec<Part>, processed: usize, failed: usize) -> Self {
        Self { volume, parts, processed, failed }
    }

    /// All output channels
    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    pub fn into_volume(self) -> Volume {
        self.volume
    }

    /// Names and channel ranges of the output parts
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// One named part as its own volume
    pub fn part(&self, name: &str) -> ConfigResult<Volume> {
        let (_, range) = self.parts.iter()
            .find(|(n, _)| n == name)
            .ok_or_else(|| ConfigError::InvalidSpec(format!("no output part named '{}'", name)))?;

        let mut volume = self.volume.get_volume(range.clone())?;
        volume.set_model(self.volume.model().map(|m| m.to_string()));
        Ok(volume)
    }
}
