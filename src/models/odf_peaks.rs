//! ODF → fibers as a per-voxel function

use std::sync::Arc;

use crate::error::{ConfigResult, FitResult};
use crate::function::{Part, VectFunction};
use crate::peaks::{Fibers, PeakFinder, PeakParams, SphereSampling, FIBER_STRIDE};

pub const FIBERS_MODEL: &str = "fibers";

/// Extracts up to `comps` peaks from an ODF sampled on `sphere`
///
/// Output is `comps` slots of [weight, x, y, z]; missing peaks are zero.
#[derive(Clone, Debug)]
pub struct OdfPeaks {
    finder: PeakFinder,
}

impl OdfPeaks {
    pub fn new(sphere: Arc<SphereSampling>, params: PeakParams) -> ConfigResult<Self> {
        Ok(Self { finder: PeakFinder::new(sphere, params)? })
    }

    pub fn finder(&self) -> &PeakFinder {
        &self.finder
    }
}

impl VectFunction for OdfPeaks {
    fn dim_in(&self) -> usize {
        self.finder.sphere().size()
    }

    fn dim_out(&self) -> usize {
        Fibers::dim(self.finder.params().comps)
    }

    fn apply(&mut self, input: &[f64], output: &mut [f64]) -> FitResult<()> {
        let peaks = self.finder.find(input)?;
        Fibers::new(self.finder.params().comps, peaks).encode(output);
        Ok(())
    }

    fn parts(&self) -> Vec<Part> {
        (0..self.finder.params().comps)
            .map(|k| (format!("peak{}", k), k * FIBER_STRIDE..(k + 1) * FIBER_STRIDE))
            .collect()
    }

    fn model(&self) -> Option<String> {
        Some(FIBERS_MODEL.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{apply_function, EngineConfig};
    use crate::volume::{Sample, Sampling, Volume};

    fn odf_along(sphere: &SphereSampling, axis: [f64; 3]) -> Vec<f64> {
        sphere.dirs().iter()
            .map(|d| {
                let c = d[0] * axis[0] + d[1] * axis[1] + d[2] * axis[2];
                (-15.0 * (1.0 - c * c)).exp()
            })
            .collect()
    }

    #[test]
    fn test_encodes_single_peak() {
        let sphere = Arc::new(SphereSampling::icosphere(2));
        let axis = sphere.dir(3);
        let odf = odf_along(&sphere, axis);

        let params = PeakParams { comps: 2, thresh: 0.2, ..Default::default() };
        let mut peaks = OdfPeaks::new(sphere, params).unwrap();
        assert_eq!(peaks.dim_out(), 8);
        let out = peaks.eval(&odf).unwrap();

        assert!((out[0] - 1.0).abs() < 1e-12);
        let dot = out[1] * axis[0] + out[2] * axis[1] + out[3] * axis[2];
        assert!((dot.abs() - 1.0).abs() < 1e-12);
        assert_eq!(&out[4..], &[0.0; 4]);
    }

    #[test]
    fn test_volume_of_odfs() {
        let sphere = Arc::new(SphereSampling::icosphere(2));
        let sampling = Sampling::new(3, 2, 2);
        let mut odfs = Volume::new(sampling.clone(), sphere.size());
        for (n, s) in sampling.iter().enumerate() {
            odfs.set_vect(s, &odf_along(&sphere, sphere.dir(n)));
        }

        let params = PeakParams { comps: 1, thresh: 0.2, ..Default::default() };
        let factory = || OdfPeaks::new(sphere.clone(), params.clone());
        let config = EngineConfig::default().with_threads(3);
        let out = apply_function(&odfs, None, &factory, &config).unwrap();

        assert_eq!(out.failed, 0);
        assert_eq!(out.volume().model(), Some(FIBERS_MODEL));
        let peak0 = out.part("peak0").unwrap();
        let s = Sample::new(2, 1, 1);
        let n = sampling.index(s);
        let v = peak0.get_vect(s);
        let d = sphere.dir(n);
        assert!((v[1] * d[0] + v[2] * d[1] + v[3] * d[2]).abs() > 1.0 - 1e-12);
    }
}
