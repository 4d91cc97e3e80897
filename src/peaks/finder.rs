//! Discrete peak extraction from a sampled orientation distribution

use std::str::FromStr;
use std::sync::Arc;

use crate::error::{ConfigError, ConfigResult, FitError, FitResult};
use super::sphere::{axial_angle_deg, SphereSampling};

/// How the weight of an accepted peak is computed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PeakMode {
    /// ODF value at the peak sample
    #[default]
    Peak,
    /// Mean ODF value over the samples nearest to this peak
    Lobe,
}

impl FromStr for PeakMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "peak" | "max" => Ok(PeakMode::Peak),
            "lobe" | "mean" => Ok(PeakMode::Lobe),
            _ => Err(ConfigError::InvalidSpec(format!("unknown peak mode '{}'", s))),
        }
    }
}

/// Parameters for peak extraction
#[derive(Clone, Debug, PartialEq)]
pub struct PeakParams {
    /// Maximum number of peaks kept
    pub comps: usize,
    /// Minimum ODF value for a candidate (absolute)
    pub thresh: f64,
    /// Minimum axial separation between peaks, degrees
    pub cluster: f64,
    pub mode: PeakMode,
    /// Rescale weights so they sum to the ODF total
    pub match_sum: bool,
    /// Multiply weights by the generalized fractional anisotropy
    pub gfa: bool,
}

impl Default for PeakParams {
    fn default() -> Self {
        Self {
            comps: 3,
            thresh: 0.0,
            cluster: 25.0,
            mode: PeakMode::Peak,
            match_sum: false,
            gfa: false,
        }
    }
}

impl PeakParams {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.comps == 0 {
            return Err(ConfigError::InvalidParameter("comps must be positive".to_string()));
        }
        if !self.thresh.is_finite() {
            return Err(ConfigError::InvalidParameter("thresh must be finite".to_string()));
        }
        if !(0.0..=90.0).contains(&self.cluster) {
            return Err(ConfigError::InvalidParameter(format!(
                "cluster angle must be in [0, 90] degrees, got {}", self.cluster
            )));
        }
        Ok(())
    }
}

/// One extracted peak
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Peak {
    pub dir: [f64; 3],
    pub weight: f64,
}

/// Generalized fractional anisotropy, std(odf) / rms(odf)
pub fn gfa(odf: &[f64]) -> f64 {
    let n = odf.len() as f64;
    if odf.is_empty() {
        return 0.0;
    }
    let mean = odf.iter().sum::<f64>() / n;
    let sq = odf.iter().map(|v| v * v).sum::<f64>();
    if sq <= 0.0 {
        return 0.0;
    }
    let var = odf.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>();
    (var / sq).sqrt()
}

/// Peak finder over a fixed sphere sampling
///
/// The sampling is shared read-only, so cloning a finder for another worker
/// only bumps a reference count.
#[derive(Clone, Debug)]
pub struct PeakFinder {
    sphere: Arc<SphereSampling>,
    params: PeakParams,
}

impl PeakFinder {
    pub fn new(sphere: Arc<SphereSampling>, params: PeakParams) -> ConfigResult<Self> {
        params.validate()?;
        Ok(Self { sphere, params })
    }

    pub fn sphere(&self) -> &SphereSampling {
        &self.sphere
    }

    pub fn params(&self) -> &PeakParams {
        &self.params
    }

    /// Sample indices that are strict local maxima above the threshold
    fn local_maxima(&self, odf: &[f64]) -> Vec<usize> {
        (0..odf.len())
            .filter(|&i| {
                let v = odf[i];
                v > self.params.thresh
                    && self.sphere.neighbors(i).iter().all(|&j| v > odf[j])
            })
            .collect()
    }

    /// Extract up to `comps` peaks, descending by weight
    ///
    /// # Arguments
    /// * `odf` - One value per sphere direction
    ///
    /// # Returns
    /// Peaks sorted by weight; empty when nothing exceeds the threshold
    pub fn find(&self, odf: &[f64]) -> FitResult<Vec<Peak>> {
        if odf.len() != self.sphere.size() {
            return Err(FitError::InvalidInput(format!(
                "odf has {} values, sphere has {} directions", odf.len(), self.sphere.size()
            )));
        }
        if odf.iter().any(|v| !v.is_finite()) {
            return Err(FitError::NonFinite);
        }

        let mut candidates = self.local_maxima(odf);
        candidates.sort_by(|&a, &b| odf[b].total_cmp(&odf[a]).then(a.cmp(&b)));

        // Greedy agglomeration: a lower maximum within `cluster` of an
        // accepted one is absorbed by it
        let mut accepted: Vec<usize> = Vec::with_capacity(self.params.comps);
        for idx in candidates {
            if accepted.len() == self.params.comps {
                break;
            }
            let dir = self.sphere.dir(idx);
            let distinct = accepted.iter()
                .all(|&a| axial_angle_deg(&dir, &self.sphere.dir(a)) > self.params.cluster);
            if distinct {
                accepted.push(idx);
            }
        }

        if accepted.is_empty() {
            return Ok(Vec::new());
        }

        let mut weights: Vec<f64> = match self.params.mode {
            PeakMode::Peak => accepted.iter().map(|&i| odf[i]).collect(),
            PeakMode::Lobe => self.lobe_means(odf, &accepted),
        };

        if self.params.match_sum {
            let total: f64 = odf.iter().sum();
            let wsum: f64 = weights.iter().sum();
            if wsum > 0.0 {
                let scale = total / wsum;
                weights.iter_mut().for_each(|w| *w *= scale);
            }
        }

        if self.params.gfa {
            let g = gfa(odf);
            weights.iter_mut().for_each(|w| *w *= g);
        }

        let mut peaks: Vec<Peak> = accepted.iter().zip(weights)
            .map(|(&i, weight)| Peak { dir: self.sphere.dir(i), weight })
            .collect();
        peaks.sort_by(|a, b| b.weight.total_cmp(&a.weight));

        Ok(peaks)
    }

    /// Mean ODF over each accepted peak's lobe
    fn lobe_means(&self, odf: &[f64], accepted: &[usize]) -> Vec<f64> {
        let mut sums = vec![0.0; accepted.len()];
        let mut counts = vec![0usize; accepted.len()];

        for (i, &value) in odf.iter().enumerate() {
            let dir = self.sphere.dir(i);
            let mut best = 0;
            let mut best_angle = f64::INFINITY;
            for (n, &a) in accepted.iter().enumerate() {
                let angle = axial_angle_deg(&dir, &self.sphere.dir(a));
                if angle < best_angle {
                    best_angle = angle;
                    best = n;
                }
            }
            sums[best] += value;
            counts[best] += 1;
        }

        sums.iter().zip(&counts)
            .map(|(&s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
            .collect()
    }
}
