//! Richardson-Lucy deconvolution
//!
//! Recovers a non-negative x from s ≈ Hx with the multiplicative update
//!
//!   x ← x ⊙ (Hᵀ(s ⊘ Hx)) ⊘ (Hᵀ1)
//!
//! With damping λ ∈ (0, 1] the update factor f becomes 1 + λ(f - 1), which
//! is ≥ 1 - λ ≥ 0, so every iterate stays non-negative. Each iteration reads
//! the previous iterate and writes a separate buffer.

use nalgebra::{DMatrix, DVector};

use crate::error::{ConfigError, ConfigResult, FitError, FitResult};

/// Parameters for Richardson-Lucy iterations
#[derive(Clone, Debug, PartialEq)]
pub struct RichardsonLucyParams {
    /// Number of iterations
    pub iterations: usize,
    /// Update damping in (0, 1]; 1 is the classic algorithm
    pub damping: f64,
}

impl Default for RichardsonLucyParams {
    fn default() -> Self {
        Self {
            iterations: 200,
            damping: 1.0,
        }
    }
}

/// Richardson-Lucy solver for a fixed forward matrix
#[derive(Clone, Debug)]
pub struct RichardsonLucy {
    forward: DMatrix<f64>,
    col_sums: Vec<f64>,
    params: RichardsonLucyParams,
}

impl RichardsonLucy {
    /// # Arguments
    /// * `forward` - Non-negative forward matrix H (signals x unknowns)
    /// * `params` - Iteration count and damping
    pub fn new(forward: DMatrix<f64>, params: RichardsonLucyParams) -> ConfigResult<Self> {
        if params.iterations == 0 {
            return Err(ConfigError::InvalidParameter("iterations must be positive".to_string()));
        }
        if !(params.damping > 0.0 && params.damping <= 1.0) {
            return Err(ConfigError::InvalidParameter(format!(
                "damping must be in (0, 1], got {}", params.damping
            )));
        }
        if forward.iter().any(|&h| !h.is_finite() || h < 0.0) {
            return Err(ConfigError::InvalidParameter(
                "forward matrix must be finite and non-negative".to_string()
            ));
        }

        let col_sums = forward.column_iter().map(|c| c.sum()).collect();
        Ok(Self { forward, col_sums, params })
    }

    /// Number of measurements
    pub fn dim_signal(&self) -> usize {
        self.forward.nrows()
    }

    /// Number of unknowns
    pub fn dim_solution(&self) -> usize {
        self.forward.ncols()
    }

    pub fn forward(&self) -> &DMatrix<f64> {
        &self.forward
    }

    /// Deconvolve one signal; negative samples are clamped to zero
    pub fn solve(&self, signal: &[f64]) -> FitResult<Vec<f64>> {
        let m = self.dim_signal();
        let n = self.dim_solution();
        if signal.len() != m {
            return Err(FitError::InvalidInput(format!("expected {} values, got {}", m, signal.len())));
        }
        if signal.iter().any(|s| !s.is_finite()) {
            return Err(FitError::NonFinite);
        }

        let s = DVector::from_iterator(m, signal.iter().map(|&v| v.max(0.0)));
        let total_h: f64 = self.col_sums.iter().sum();
        if s.sum() <= 0.0 || total_h <= 0.0 {
            return Ok(vec![0.0; n]);
        }

        // Flat start with the right overall energy
        let start = s.sum() / total_h;
        let mut current = DVector::from_element(n, start);
        let mut next = DVector::zeros(n);
        let mut ratio = DVector::zeros(m);
        let damping = self.params.damping;

        for _ in 0..self.params.iterations {
            let predicted = &self.forward * &current;
            for i in 0..m {
                ratio[i] = if predicted[i] > f64::MIN_POSITIVE { s[i] / predicted[i] } else { 0.0 };
            }
            let back = self.forward.tr_mul(&ratio);

            for j in 0..n {
                next[j] = if self.col_sums[j] > 0.0 {
                    let factor = back[j] / self.col_sums[j];
                    current[j] * (1.0 + damping * (factor - 1.0))
                } else {
                    0.0
                };
            }
            std::mem::swap(&mut current, &mut next);
        }

        if current.iter().any(|v| !v.is_finite()) {
            return Err(FitError::NonFinite);
        }
        Ok(current.iter().copied().collect())
    }
}
