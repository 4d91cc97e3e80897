//! Mono-exponential decay, s(x) = alpha * exp(-beta * x)
//!
//! `x` is the acquisition variable (b-value, echo time, ...). The linear
//! methods fit log s = log alpha - beta x; the nonlinear method refines
//! the weighted linear estimate with a bounded simplex search on the
//! signal itself.

use std::str::FromStr;
use std::sync::Arc;

use nalgebra::DMatrix;

use crate::error::{ConfigError, ConfigResult, FitError, FitResult};
use crate::function::{BinaryVectFunction, Part, VectFunction};
use crate::solvers::{solve_lls, solve_log_wlls, Bounds, ParamScaling, Simplex, SimplexParams};

pub const EXP_DECAY_MODEL: &str = "expdecay";

/// Fitting method
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DecayMethod {
    /// Unweighted log-linear least squares
    Lls,
    /// Log-linear least squares reweighted by the predicted signal
    #[default]
    Wlls,
    /// Simplex on squared signal residuals, seeded by WLLS
    Nlls,
}

impl FromStr for DecayMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lls" => Ok(DecayMethod::Lls),
            "wlls" => Ok(DecayMethod::Wlls),
            "nlls" => Ok(DecayMethod::Nlls),
            _ => Err(ConfigError::InvalidSpec(format!("unknown decay fitting method '{}'", s))),
        }
    }
}

/// Parameters for exponential decay fitting
#[derive(Clone, Debug, PartialEq)]
pub struct ExpDecayParams {
    pub method: DecayMethod,
    /// Weighted passes for WLLS (first pass is unweighted)
    pub passes: usize,
    /// Signal values below this are clamped before taking logs
    pub floor: f64,
    pub simplex: SimplexParams,
}

impl Default for ExpDecayParams {
    fn default() -> Self {
        Self {
            method: DecayMethod::Wlls,
            passes: 2,
            floor: 1e-6,
            simplex: SimplexParams::default(),
        }
    }
}

/// Per-voxel decay fit: signal at `xs` → [alpha, beta]
#[derive(Clone, Debug)]
pub struct ExpDecayFit {
    xs: Arc<Vec<f64>>,
    design: Arc<DMatrix<f64>>,
    params: ExpDecayParams,
    simplex: Simplex,
    log_signal: Vec<f64>,
}

impl ExpDecayFit {
    /// # Arguments
    /// * `xs` - Acquisition values, one per signal channel
    /// * `params` - Method and numerical settings
    pub fn new(xs: Vec<f64>, params: ExpDecayParams) -> ConfigResult<Self> {
        if xs.iter().any(|x| !x.is_finite()) {
            return Err(ConfigError::InvalidParameter("acquisition values must be finite".to_string()));
        }
        let distinct = xs.iter().any(|&x| (x - xs[0]).abs() > 0.0);
        if xs.len() < 2 || !distinct {
            return Err(ConfigError::InvalidParameter(
                "decay fitting needs at least two distinct acquisition values".to_string()
            ));
        }
        if !(params.floor > 0.0) {
            return Err(ConfigError::InvalidParameter("signal floor must be positive".to_string()));
        }
        if params.passes == 0 {
            return Err(ConfigError::InvalidParameter("passes must be positive".to_string()));
        }

        // log s = [1, -x] . [log alpha, beta]
        let design = DMatrix::from_fn(xs.len(), 2, |i, j| if j == 0 { 1.0 } else { -xs[i] });
        let bounds = Bounds::new(vec![0.0, f64::NEG_INFINITY], vec![f64::INFINITY, f64::INFINITY])?;
        let simplex = Simplex::new(params.simplex.clone())?.with_bounds(bounds);
        let log_signal = vec![0.0; xs.len()];

        Ok(Self {
            xs: Arc::new(xs),
            design: Arc::new(design),
            params,
            simplex,
            log_signal,
        })
    }

    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    pub fn params(&self) -> &ExpDecayParams {
        &self.params
    }

    /// Fit one signal vector, returning (alpha, beta)
    pub fn fit(&mut self, signal: &[f64]) -> FitResult<(f64, f64)> {
        if signal.len() != self.xs.len() {
            return Err(FitError::InvalidInput(format!(
                "expected {} samples, got {}", self.xs.len(), signal.len()
            )));
        }

        let floor = self.params.floor;
        for (l, &s) in self.log_signal.iter_mut().zip(signal) {
            *l = s.max(floor).ln();
        }

        let passes = match self.params.method {
            DecayMethod::Lls => 1,
            _ => self.params.passes,
        };
        let x = if passes == 1 {
            solve_lls(&self.design, &self.log_signal)?
        } else {
            solve_log_wlls(&self.design, &self.log_signal, passes)?
        };
        let (alpha, beta) = (x[0].exp(), x[1]);

        match self.params.method {
            DecayMethod::Nlls => self.refine(signal, alpha, beta),
            _ => Ok((alpha, beta)),
        }
    }

    fn refine(&self, signal: &[f64], alpha: f64, beta: f64) -> FitResult<(f64, f64)> {
        let x_span = self.xs.iter().fold(0.0f64, |m, x| m.max(x.abs()));
        let alpha_scale = alpha.abs().max(self.params.floor);
        let beta_scale = if x_span > 0.0 { 1.0 / x_span } else { 1.0 };
        let scaling = ParamScaling::from_scales(vec![alpha_scale, beta_scale])
            .map_err(|e| FitError::InvalidInput(e.to_string()))?;

        // Residuals relative to the signal energy keep the simplex
        // tolerance independent of the signal scale
        let energy = signal.iter().map(|s| s * s).sum::<f64>().max(f64::MIN_POSITIVE);
        let xs = &self.xs;
        let cost = |p: &[f64]| {
            xs.iter().zip(signal)
                .map(|(&x, &s)| {
                    let r = s - p[0] * (-p[1] * x).exp();
                    r * r
                })
                .sum::<f64>() / energy
        };

        let result = self.simplex.minimize_scaled(&scaling, cost, &[alpha, beta])?;
        Ok((result.x[0], result.x[1]))
    }
}

impl VectFunction for ExpDecayFit {
    fn dim_in(&self) -> usize {
        self.xs.len()
    }

    fn dim_out(&self) -> usize {
        2
    }

    fn apply(&mut self, input: &[f64], output: &mut [f64]) -> FitResult<()> {
        let (alpha, beta) = self.fit(input)?;
        output[0] = alpha;
        output[1] = beta;
        Ok(())
    }

    fn parts(&self) -> Vec<Part> {
        vec![("alpha".to_string(), 0..1), ("beta".to_string(), 1..2)]
    }

    fn model(&self) -> Option<String> {
        Some(EXP_DECAY_MODEL.to_string())
    }
}

/// Evaluate the decay model at fixed `xs`: [alpha, beta] → signal
#[derive(Clone, Debug)]
pub struct ExpDecaySynth {
    xs: Arc<Vec<f64>>,
}

impl ExpDecaySynth {
    pub fn new(xs: Vec<f64>) -> Self {
        Self { xs: Arc::new(xs) }
    }
}

#[inline]
fn decay(alpha: f64, beta: f64, x: f64) -> f64 {
    alpha * (-beta * x).exp()
}

impl VectFunction for ExpDecaySynth {
    fn dim_in(&self) -> usize {
        2
    }

    fn dim_out(&self) -> usize {
        self.xs.len()
    }

    fn apply(&mut self, input: &[f64], output: &mut [f64]) -> FitResult<()> {
        for (o, &x) in output.iter_mut().zip(self.xs.iter()) {
            *o = decay(input[0], input[1], x);
        }
        Ok(())
    }
}

/// Root-mean-square residual between a signal and fitted [alpha, beta]
#[derive(Clone, Debug)]
pub struct ExpDecayResidual {
    xs: Arc<Vec<f64>>,
}

impl ExpDecayResidual {
    pub fn new(xs: Vec<f64>) -> Self {
        Self { xs: Arc::new(xs) }
    }
}

impl BinaryVectFunction for ExpDecayResidual {
    fn dim_left(&self) -> usize {
        self.xs.len()
    }

    fn dim_right(&self) -> usize {
        2
    }

    fn dim_out(&self) -> usize {
        1
    }

    fn apply(&mut self, left: &[f64], right: &[f64], output: &mut [f64]) -> FitResult<()> {
        if self.xs.is_empty() {
            return Err(FitError::InvalidInput("no samples".to_string()));
        }
        let sse: f64 = self.xs.iter().zip(left)
            .map(|(&x, &s)| {
                let r = s - decay(right[0], right[1], x);
                r * r
            })
            .sum();
        output[0] = (sse / self.xs.len() as f64).sqrt();
        Ok(())
    }

    fn parts(&self) -> Vec<Part> {
        vec![("rmse".to_string(), 0..1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn xs() -> Vec<f64> {
        (0..=12).map(|i| i as f64 * 250.0).collect()
    }

    fn signal(alpha: f64, beta: f64) -> Vec<f64> {
        xs().iter().map(|&x| decay(alpha, beta, x)).collect()
    }

    #[test]
    fn test_exact_recovery_all_methods() {
        let s = signal(100.0, 1e-3);
        for method in [DecayMethod::Lls, DecayMethod::Wlls, DecayMethod::Nlls] {
            let params = ExpDecayParams { method, ..Default::default() };
            let mut fit = ExpDecayFit::new(xs(), params).unwrap();
            let out = fit.eval(&s).unwrap();
            assert_abs_diff_eq!(out[0], 100.0, epsilon = 1e-3);
            assert_abs_diff_eq!(out[1], 1e-3, epsilon = 1e-7);
        }
    }

    #[test]
    fn test_wlls_beats_lls_under_noise() {
        let (alpha, beta) = (100.0, 1e-3);
        let clean = signal(alpha, beta);
        let noise = Normal::new(0.0, 2.0).unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        let mut lls = ExpDecayFit::new(xs(), ExpDecayParams {
            method: DecayMethod::Lls,
            floor: 1e-3,
            ..Default::default()
        }).unwrap();
        let mut wlls = ExpDecayFit::new(xs(), ExpDecayParams {
            method: DecayMethod::Wlls,
            floor: 1e-3,
            ..Default::default()
        }).unwrap();

        let error = |(a, b): (f64, f64)| ((a - alpha) / alpha).powi(2) + ((b - beta) / beta).powi(2);
        let trials = 200;
        let (mut err_lls, mut err_wlls) = (0.0, 0.0);
        for _ in 0..trials {
            let noisy: Vec<f64> = clean.iter().map(|s| s + noise.sample(&mut rng)).collect();
            err_lls += error(lls.fit(&noisy).unwrap());
            err_wlls += error(wlls.fit(&noisy).unwrap());
        }
        let rmse_lls = (err_lls / trials as f64).sqrt();
        let rmse_wlls = (err_wlls / trials as f64).sqrt();
        assert!(rmse_wlls < rmse_lls, "wlls {} vs lls {}", rmse_wlls, rmse_lls);
    }

    #[test]
    fn test_nlls_keeps_alpha_nonnegative() {
        let noise = Normal::new(0.0, 1.0).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let params = ExpDecayParams { method: DecayMethod::Nlls, ..Default::default() };
        let mut fit = ExpDecayFit::new(xs(), params).unwrap();
        for _ in 0..20 {
            let noisy: Vec<f64> = signal(50.0, 2e-3).iter().map(|s| s + noise.sample(&mut rng)).collect();
            let (a, b) = fit.fit(&noisy).unwrap();
            assert!(a >= 0.0);
            assert!(b.is_finite());
        }
    }

    #[test]
    fn test_nlls_alpha_bound_is_active() {
        // Best unconstrained fit has alpha = -10; the bounded one sits on alpha = 0
        let s: Vec<f64> = signal(10.0, 1e-3).iter().map(|v| -v).collect();
        let params = ExpDecayParams { method: DecayMethod::Nlls, ..Default::default() };
        let mut fit = ExpDecayFit::new(xs(), params).unwrap();
        let (a, b) = fit.fit(&s).unwrap();
        assert!(a >= 0.0 && a < 1e-7, "alpha {}", a);
        assert!(b.is_finite());
    }

    #[test]
    fn test_synth_and_residual() {
        let mut synth = ExpDecaySynth::new(xs());
        let s = synth.eval(&[80.0, 5e-4]).unwrap();
        assert_eq!(s.len(), 13);
        assert_abs_diff_eq!(s[4], 80.0 * (-0.5f64).exp(), epsilon = 1e-12);

        let mut residual = ExpDecayResidual::new(xs());
        assert_abs_diff_eq!(residual.eval(&s, &[80.0, 5e-4]).unwrap()[0], 0.0, epsilon = 1e-12);

        let shifted: Vec<f64> = s.iter().map(|v| v + 3.0).collect();
        assert_abs_diff_eq!(residual.eval(&shifted, &[80.0, 5e-4]).unwrap()[0], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_configuration_errors() {
        assert!(ExpDecayFit::new(vec![1.0], ExpDecayParams::default()).is_err());
        assert!(ExpDecayFit::new(vec![5.0, 5.0, 5.0], ExpDecayParams::default()).is_err());
        let params = ExpDecayParams { floor: 0.0, ..Default::default() };
        assert!(ExpDecayFit::new(xs(), params).is_err());
        assert!("cubic".parse::<DecayMethod>().is_err());
        assert_eq!("NLLS".parse::<DecayMethod>().unwrap(), DecayMethod::Nlls);
    }

    #[test]
    fn test_parts_and_model() {
        let fit = ExpDecayFit::new(xs(), ExpDecayParams::default()).unwrap();
        assert_eq!(fit.model().as_deref(), Some(EXP_DECAY_MODEL));
        assert_eq!(fit.parts()[1], ("beta".to_string(), 1..2));
    }
}
