//! Voxel masks

use crate::error::{ConfigError, ConfigResult};
use super::{Sample, Sampling, Volume};

/// Per-voxel labels; a voxel is valid where its label is nonzero
#[derive(Clone, Debug, PartialEq)]
pub struct Mask {
    sampling: Sampling,
    labels: Vec<u8>,
}

impl Mask {
    /// Wrap a label array (nx * ny * nz, Fortran order)
    pub fn new(sampling: Sampling, labels: Vec<u8>) -> ConfigResult<Self> {
        ConfigError::check_dim("mask labels", sampling.size(), labels.len())?;
        Ok(Self { sampling, labels })
    }

    /// Mask that accepts every voxel
    pub fn full(sampling: Sampling) -> Self {
        let labels = vec![1; sampling.size()];
        Self { sampling, labels }
    }

    /// Mask from the first channel of a volume, nonzero where `|v| > threshold`
    pub fn from_volume(volume: &Volume, threshold: f64) -> Self {
        let labels = (0..volume.sampling().size())
            .map(|idx| u8::from(volume.voxel(idx)[0].abs() > threshold))
            .collect();
        Self { sampling: volume.sampling().clone(), labels }
    }

    #[inline]
    pub fn sampling(&self) -> &Sampling {
        &self.sampling
    }

    #[inline]
    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    #[inline]
    pub fn get(&self, s: Sample) -> u8 {
        self.labels[self.sampling.index(s)]
    }

    #[inline]
    pub fn valid(&self, s: Sample) -> bool {
        self.get(s) > 0
    }

    #[inline]
    pub fn valid_index(&self, idx: usize) -> bool {
        self.labels[idx] > 0
    }

    /// Number of valid voxels
    pub fn count(&self) -> usize {
        self.labels.iter().filter(|&&l| l > 0).count()
    }
}
