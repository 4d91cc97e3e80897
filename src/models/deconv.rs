//! Spherical deconvolution of diffusion signals with Richardson-Lucy
//!
//! Each sphere direction u contributes a single-fiber response
//!
//!   s(b, g) = exp(-b (λ⊥ + (λ∥ - λ⊥)(g·u)²))
//!
//! so the forward matrix has one row per diffusion-weighted channel and one
//! column per sphere direction. Signals are divided by the mean baseline
//! before deconvolution; the result is a non-negative ODF on the sphere.

use std::sync::Arc;

use nalgebra::DMatrix;

use crate::error::{ConfigError, ConfigResult, FitError, FitResult};
use crate::function::VectFunction;
use crate::gradients::Gradients;
use crate::peaks::SphereSampling;
use crate::solvers::{RichardsonLucy, RichardsonLucyParams};

pub const ODF_MODEL: &str = "odf";

/// Single-fiber response and solver settings
#[derive(Clone, Debug, PartialEq)]
pub struct SphericalDeconvParams {
    /// Axial diffusivity of the response (mm²/s)
    pub lambda_par: f64,
    /// Radial diffusivity of the response (mm²/s)
    pub lambda_perp: f64,
    pub rl: RichardsonLucyParams,
}

impl Default for SphericalDeconvParams {
    fn default() -> Self {
        Self {
            lambda_par: 1.7e-3,
            lambda_perp: 0.3e-3,
            rl: RichardsonLucyParams::default(),
        }
    }
}

/// Response of a fiber along `axis` to gradient `g` at b-value `b`
#[inline]
pub fn fiber_response(b: f64, g: [f64; 3], axis: [f64; 3], lambda_par: f64, lambda_perp: f64) -> f64 {
    let c = g[0] * axis[0] + g[1] * axis[1] + g[2] * axis[2];
    (-b * (lambda_perp + (lambda_par - lambda_perp) * c * c)).exp()
}

/// Forward matrix for the diffusion-weighted entries of `gradients`
pub fn deconv_kernel(
    gradients: &Gradients,
    sphere: &SphereSampling,
    lambda_par: f64,
    lambda_perp: f64,
) -> DMatrix<f64> {
    let dwi = gradients.dwi_idx();
    DMatrix::from_fn(dwi.len(), sphere.size(), |r, c| {
        let i = dwi[r];
        fiber_response(gradients.bval(i), gradients.bvec(i), sphere.dir(c), lambda_par, lambda_perp)
    })
}

/// Per-voxel ODF estimation: full DWI signal → ODF on `sphere`
#[derive(Clone, Debug)]
pub struct SphericalDeconv {
    solver: Arc<RichardsonLucy>,
    baseline: Arc<Vec<usize>>,
    dwi: Arc<Vec<usize>>,
    dim_in: usize,
    normalized: Vec<f64>,
}

impl SphericalDeconv {
    pub fn new(
        gradients: &Gradients,
        sphere: &SphereSampling,
        params: SphericalDeconvParams,
    ) -> ConfigResult<Self> {
        if !(params.lambda_par > 0.0 && params.lambda_perp >= 0.0 && params.lambda_par >= params.lambda_perp) {
            return Err(ConfigError::InvalidParameter(format!(
                "response needs lambda_par >= lambda_perp >= 0, got {} and {}",
                params.lambda_par, params.lambda_perp
            )));
        }

        let dwi = gradients.dwi_idx();
        if dwi.is_empty() {
            return Err(ConfigError::InvalidParameter("gradients have no diffusion-weighted entries".to_string()));
        }
        let kernel = deconv_kernel(gradients, sphere, params.lambda_par, params.lambda_perp);
        let solver = RichardsonLucy::new(kernel, params.rl)?;

        tracing::debug!("deconvolution kernel {}x{}", solver.dim_signal(), solver.dim_solution());

        Ok(Self {
            solver: Arc::new(solver),
            baseline: Arc::new(gradients.baseline_idx()),
            normalized: vec![0.0; dwi.len()],
            dwi: Arc::new(dwi),
            dim_in: gradients.size(),
        })
    }

    pub fn solver(&self) -> &RichardsonLucy {
        &self.solver
    }
}

impl VectFunction for SphericalDeconv {
    fn dim_in(&self) -> usize {
        self.dim_in
    }

    fn dim_out(&self) -> usize {
        self.solver.dim_solution()
    }

    fn apply(&mut self, input: &[f64], output: &mut [f64]) -> FitResult<()> {
        let b0 = if self.baseline.is_empty() {
            1.0
        } else {
            self.baseline.iter().map(|&i| input[i]).sum::<f64>() / self.baseline.len() as f64
        };
        if !(b0 > 0.0) {
            return Err(FitError::InvalidInput(format!("non-positive baseline {}", b0)));
        }

        for (n, &i) in self.normalized.iter_mut().zip(self.dwi.iter()) {
            *n = input[i] / b0;
        }
        let odf = self.solver.solve(&self.normalized)?;
        output.copy_from_slice(&odf);
        Ok(())
    }

    fn model(&self) -> Option<String> {
        Some(ODF_MODEL.to_string())
    }
}
