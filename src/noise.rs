//! Synthetic noise for simulated acquisitions
//!
//! Randomness always comes from a caller-supplied RNG so runs can be
//! reproduced from a seed.

use std::str::FromStr;

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{ConfigError, ConfigResult};
use crate::volume::Volume;

/// Noise model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NoiseType {
    /// s + n
    #[default]
    Gaussian,
    /// |s + n1 + i n2|, the magnitude of complex Gaussian noise
    Rician,
}

impl FromStr for NoiseType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gaussian" | "normal" => Ok(NoiseType::Gaussian),
            "rician" | "rice" => Ok(NoiseType::Rician),
            _ => Err(ConfigError::InvalidSpec(format!("unknown noise type '{}'", s))),
        }
    }
}

fn normal(sigma: f64) -> ConfigResult<Normal<f64>> {
    if !(sigma >= 0.0) || !sigma.is_finite() {
        return Err(ConfigError::InvalidParameter(format!("noise sigma must be >= 0, got {}", sigma)));
    }
    Normal::new(0.0, sigma).map_err(|e| ConfigError::InvalidParameter(e.to_string()))
}

/// Corrupt a signal vector in place
pub fn add_noise_vect<R: Rng + ?Sized>(
    values: &mut [f64],
    sigma: f64,
    noise_type: NoiseType,
    rng: &mut R,
) -> ConfigResult<()> {
    let dist = normal(sigma)?;
    match noise_type {
        NoiseType::Gaussian => {
            for v in values.iter_mut() {
                *v += dist.sample(rng);
            }
        }
        NoiseType::Rician => {
            for v in values.iter_mut() {
                let re = *v + dist.sample(rng);
                let im = dist.sample(rng);
                *v = (re * re + im * im).sqrt();
            }
        }
    }
    Ok(())
}

/// Noisy copy of a volume; every voxel and channel is corrupted
pub fn add_noise<R: Rng + ?Sized>(
    volume: &Volume,
    sigma: f64,
    noise_type: NoiseType,
    rng: &mut R,
) -> ConfigResult<Volume> {
    let mut out = volume.clone();
    add_noise_vect(out.data_mut(), sigma, noise_type, rng)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::Sampling;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_gaussian_statistics() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut values = vec![10.0; 20000];
        add_noise_vect(&mut values, 2.0, NoiseType::Gaussian, &mut rng).unwrap();

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        assert!((mean - 10.0).abs() < 0.1, "mean {}", mean);
        assert!((var.sqrt() - 2.0).abs() < 0.1, "std {}", var.sqrt());
    }

    #[test]
    fn test_rician_is_nonnegative_and_biased() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut values = vec![0.0; 5000];
        add_noise_vect(&mut values, 1.0, NoiseType::Rician, &mut rng).unwrap();
        assert!(values.iter().all(|&v| v >= 0.0));
        // Rayleigh mean for zero signal is sigma * sqrt(pi / 2)
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        assert!((mean - (std::f64::consts::PI / 2.0).sqrt()).abs() < 0.05, "mean {}", mean);
    }

    #[test]
    fn test_volume_noise_is_reproducible() {
        let vol = Volume::new(Sampling::new(4, 3, 2), 3);
        let a = add_noise(&vol, 0.5, NoiseType::Gaussian, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = add_noise(&vol, 0.5, NoiseType::Gaussian, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a.data(), b.data());
        assert_ne!(a.data(), vol.data());
        assert_eq!(a.sampling(), vol.sampling());
    }

    #[test]
    fn test_invalid_sigma_and_type() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(add_noise_vect(&mut [1.0], -1.0, NoiseType::Gaussian, &mut rng).is_err());
        assert!(add_noise_vect(&mut [1.0], f64::NAN, NoiseType::Rician, &mut rng).is_err());
        assert!("poisson".parse::<NoiseType>().is_err());
        assert_eq!("Rician".parse::<NoiseType>().unwrap(), NoiseType::Rician);
    }
}
