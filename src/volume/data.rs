//! Multi-channel volumes

use std::ops::Range;

use crate::error::{ConfigError, ConfigResult};
use super::{Mask, Sample, Sampling};

/// Dense grid of channel vectors
///
/// Storage is voxel-major: the `dim` channels of voxel `idx` occupy
/// `data[idx*dim .. (idx+1)*dim]`. This keeps every voxel's vector
/// contiguous so disjoint voxel ranges map to disjoint slices.
#[derive(Clone, Debug, PartialEq)]
pub struct Volume {
    sampling: Sampling,
    dim: usize,
    data: Vec<f64>,
    /// Optional tag naming the model the channels encode (e.g. "expdecay")
    model: Option<String>,
}

impl Volume {
    /// Zero-filled volume
    pub fn new(sampling: Sampling, dim: usize) -> Self {
        let data = vec![0.0; sampling.size() * dim];
        Self { sampling, dim, data, model: None }
    }

    /// Wrap voxel-major data
    pub fn from_data(sampling: Sampling, dim: usize, data: Vec<f64>) -> ConfigResult<Self> {
        ConfigError::check_dim("volume data", sampling.size() * dim, data.len())?;
        Ok(Self { sampling, dim, data, model: None })
    }

    /// Build from one flat array per channel, each nx * ny * nz in Fortran order
    pub fn from_channels(sampling: Sampling, channels: &[Vec<f64>]) -> ConfigResult<Self> {
        let n_total = sampling.size();
        for channel in channels {
            ConfigError::check_dim("volume channel", n_total, channel.len())?;
        }

        let dim = channels.len();
        let mut data = vec![0.0; n_total * dim];
        for (c, channel) in channels.iter().enumerate() {
            for (v, &value) in channel.iter().enumerate() {
                data[v * dim + c] = value;
            }
        }

        Ok(Self { sampling, dim, data, model: None })
    }

    /// Build from a channel-major flat array (channel c at `c*n .. (c+1)*n`)
    pub fn from_planar(sampling: Sampling, dim: usize, planar: &[f64]) -> ConfigResult<Self> {
        let n_total = sampling.size();
        ConfigError::check_dim("planar data", n_total * dim, planar.len())?;
        let mut data = vec![0.0; n_total * dim];
        for c in 0..dim {
            for v in 0..n_total {
                data[v * dim + c] = planar[c * n_total + v];
            }
        }
        Ok(Self { sampling, dim, data, model: None })
    }

    #[inline]
    pub fn sampling(&self) -> &Sampling {
        &self.sampling
    }

    /// Channels per voxel
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn set_model(&mut self, model: Option<String>) {
        self.model = model;
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[inline]
    pub fn get(&self, s: Sample, channel: usize) -> f64 {
        self.data[self.sampling.index(s) * self.dim + channel]
    }

    #[inline]
    pub fn set(&mut self, s: Sample, channel: usize, value: f64) {
        let idx = self.sampling.index(s) * self.dim + channel;
        self.data[idx] = value;
    }

    /// Channel vector of the voxel at a linear index
    #[inline]
    pub fn voxel(&self, idx: usize) -> &[f64] {
        &self.data[idx * self.dim..(idx + 1) * self.dim]
    }

    #[inline]
    pub fn voxel_mut(&mut self, idx: usize) -> &mut [f64] {
        &mut self.data[idx * self.dim..(idx + 1) * self.dim]
    }

    /// Channel vector at a sample
    pub fn get_vect(&self, s: Sample) -> &[f64] {
        self.voxel(self.sampling.index(s))
    }

    pub fn set_vect(&mut self, s: Sample, values: &[f64]) {
        let idx = self.sampling.index(s);
        self.voxel_mut(idx).copy_from_slice(values);
    }

    /// A voxel is processed if the mask (when present) accepts it and every
    /// channel holds a finite value
    pub fn valid(&self, s: Sample, mask: Option<&Mask>) -> bool {
        self.valid_index(self.sampling.index(s), mask)
    }

    #[inline]
    pub fn valid_index(&self, idx: usize, mask: Option<&Mask>) -> bool {
        if let Some(mask) = mask {
            if !mask.valid_index(idx) {
                return false;
            }
        }
        self.voxel(idx).iter().all(|v| v.is_finite())
    }

    /// Zero-filled volume on the same grid with a different channel count
    pub fn proto(&self, dim: usize) -> Volume {
        Volume::new(self.sampling.clone(), dim)
    }

    /// Copy out a range of channels as a new volume
    pub fn get_volume(&self, channels: Range<usize>) -> ConfigResult<Volume> {
        if channels.start > channels.end || channels.end > self.dim {
            return Err(ConfigError::InvalidParameter(format!(
                "channel range {:?} outside 0..{}", channels, self.dim
            )));
        }

        let dim = channels.len();
        let mut out = self.proto(dim);
        for v in 0..self.sampling.size() {
            out.voxel_mut(v).copy_from_slice(&self.voxel(v)[channels.clone()]);
        }
        Ok(out)
    }

    /// Write another volume's channels starting at channel `start`
    pub fn set_volume(&mut self, start: usize, other: &Volume) -> ConfigResult<()> {
        if !self.sampling.same_grid(other.sampling()) {
            return Err(ConfigError::SamplingMismatch(format!(
                "{:?} vs {:?}", self.sampling.dims(), other.sampling().dims()
            )));
        }
        if start + other.dim() > self.dim {
            return Err(ConfigError::InvalidParameter(format!(
                "channels {}..{} outside 0..{}", start, start + other.dim(), self.dim
            )));
        }

        for v in 0..self.sampling.size() {
            let src = other.voxel(v);
            self.voxel_mut(v)[start..start + src.len()].copy_from_slice(src);
        }
        Ok(())
    }

    /// One channel as a flat nx * ny * nz array (Fortran order)
    pub fn channel(&self, c: usize) -> Vec<f64> {
        (0..self.sampling.size()).map(|v| self.data[v * self.dim + c]).collect()
    }

    /// All channels, channel-major (inverse of `from_planar`)
    pub fn to_planar(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.data.len());
        for c in 0..self.dim {
            out.extend(self.channel(c));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(nx: usize, ny: usize, nz: usize, dim: usize) -> Volume {
        let sampling = Sampling::new(nx, ny, nz);
        let data = (0..sampling.size() * dim).map(|v| v as f64).collect();
        Volume::from_data(sampling, dim, data).unwrap()
    }

    #[test]
    fn test_get_set() {
        let mut volume = Volume::new(Sampling::new(2, 2, 2), 3);
        let s = Sample::new(1, 0, 1);
        volume.set(s, 2, 4.5);
        assert_eq!(volume.get(s, 2), 4.5);
        assert_eq!(volume.get_vect(s), &[0.0, 0.0, 4.5]);
    }

    #[test]
    fn test_from_channels_interleaves() {
        let sampling = Sampling::new(2, 1, 1);
        let volume = Volume::from_channels(sampling, &[vec![1.0, 2.0], vec![10.0, 20.0]]).unwrap();
        assert_eq!(volume.dim(), 2);
        assert_eq!(volume.data(), &[1.0, 10.0, 2.0, 20.0]);
        assert_eq!(volume.channel(1), vec![10.0, 20.0]);
    }

    #[test]
    fn test_planar_roundtrip() {
        let volume = ramp(3, 2, 1, 4);
        let planar = volume.to_planar();
        let back = Volume::from_planar(volume.sampling().clone(), 4, &planar).unwrap();
        assert_eq!(back, volume);
    }

    #[test]
    fn test_valid_respects_mask_and_nan() {
        let sampling = Sampling::new(3, 1, 1);
        let volume = Volume::from_data(sampling.clone(), 1, vec![1.0, f64::NAN, 1.0]).unwrap();
        let mask = Mask::new(sampling, vec![1, 1, 0]).unwrap();

        assert!(volume.valid(Sample::new(0, 0, 0), None));
        assert!(!volume.valid(Sample::new(1, 0, 0), None));
        assert!(volume.valid(Sample::new(2, 0, 0), None));
        assert!(!volume.valid(Sample::new(2, 0, 0), Some(&mask)));
    }

    #[test]
    fn test_get_and_set_volume() {
        let volume = ramp(2, 2, 1, 4);
        let middle = volume.get_volume(1..3).unwrap();
        assert_eq!(middle.dim(), 2);
        assert_eq!(middle.voxel(1), &[5.0, 6.0]);

        let mut target = volume.proto(4);
        target.set_volume(2, &middle).unwrap();
        assert_eq!(target.voxel(1), &[0.0, 0.0, 5.0, 6.0]);

        assert!(volume.get_volume(3..5).is_err());
        assert!(target.set_volume(3, &middle).is_err());
    }

    #[test]
    fn test_from_data_wrong_length() {
        let err = Volume::from_data(Sampling::new(2, 2, 2), 2, vec![0.0; 15]).unwrap_err();
        assert!(matches!(err, ConfigError::DimensionMismatch { expected: 16, actual: 15, .. }));
    }
}
