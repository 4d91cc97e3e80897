//! Linear least squares
//!
//! Solves min ||Ax - b||² (ordinary) or min Σ wᵢ(aᵢx - bᵢ)² (weighted)
//! through an SVD of the (row-weighted) design. A design whose smallest
//! singular value falls below `RCOND` times the largest is reported as
//! `FitError::Singular` rather than returning a meaningless solution.

use nalgebra::{DMatrix, DVector};

use crate::error::{ConfigError, ConfigResult, FitError, FitResult};

/// Relative singular value cutoff
pub const RCOND: f64 = 1e-10;

/// Ordinary least squares
pub fn solve_lls(a: &DMatrix<f64>, b: &[f64]) -> FitResult<DVector<f64>> {
    if a.nrows() != b.len() {
        return Err(FitError::InvalidInput(format!(
            "design has {} rows, signal has {}", a.nrows(), b.len()
        )));
    }
    svd_solve(a.clone(), DVector::from_column_slice(b))
}

/// Weighted least squares with one non-negative weight per row
pub fn solve_wlls(a: &DMatrix<f64>, b: &[f64], w: &[f64]) -> FitResult<DVector<f64>> {
    if a.nrows() != b.len() || a.nrows() != w.len() {
        return Err(FitError::InvalidInput(format!(
            "design has {} rows, signal {}, weights {}", a.nrows(), b.len(), w.len()
        )));
    }
    if w.iter().any(|wi| !wi.is_finite() || *wi < 0.0) {
        return Err(FitError::NonFinite);
    }

    let mut aw = a.clone();
    let mut bw = DVector::from_column_slice(b);
    for (i, &wi) in w.iter().enumerate() {
        let s = wi.sqrt();
        aw.row_mut(i).scale_mut(s);
        bw[i] *= s;
    }
    svd_solve(aw, bw)
}

/// Weighted fit of a log-linear model, log s = A x
///
/// The first pass is unweighted; each further pass weights row i by the
/// squared signal the previous pass predicts, exp(2 aᵢx). With `passes == 2`
/// this is the classic two-pass WLLS. Weights are taken relative to the
/// largest one, so large log-signals do not overflow.
pub fn solve_log_wlls(a: &DMatrix<f64>, log_signal: &[f64], passes: usize) -> FitResult<DVector<f64>> {
    let mut x = solve_lls(a, log_signal)?;
    for _ in 1..passes {
        let predicted = a * &x;
        let top = predicted.max();
        let weights: Vec<f64> = predicted.iter().map(|&p| (2.0 * (p - top)).exp()).collect();
        x = solve_wlls(a, log_signal, &weights)?;
    }
    Ok(x)
}

fn svd_solve(a: DMatrix<f64>, b: DVector<f64>) -> FitResult<DVector<f64>> {
    if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite);
    }
    if a.nrows() < a.ncols() {
        return Err(FitError::Singular);
    }

    let svd = a.svd(true, true);
    let s_max = svd.singular_values.max();
    let s_min = svd.singular_values.min();
    if !(s_max > 0.0) || s_min <= RCOND * s_max {
        return Err(FitError::Singular);
    }

    let x = svd.solve(&b, 0.0).map_err(|_| FitError::Singular)?;
    if x.iter().any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite);
    }
    Ok(x)
}

/// Ordinary least squares with a fixed design, factored once
///
/// Every voxel of a volume usually shares the same design, so the
/// pseudo-inverse is computed up front and each solve is a matrix-vector
/// product. A rank-deficient design is a configuration error.
#[derive(Clone, Debug)]
pub struct LinearSolver {
    design: DMatrix<f64>,
    pinv: DMatrix<f64>,
}

impl LinearSolver {
    pub fn new(design: DMatrix<f64>) -> ConfigResult<Self> {
        if design.nrows() < design.ncols() || design.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::InvalidParameter(format!(
                "design {}x{} cannot be solved in the least squares sense",
                design.nrows(), design.ncols()
            )));
        }

        let svd = design.clone().svd(true, true);
        let s_max = svd.singular_values.max();
        if !(s_max > 0.0) || svd.singular_values.min() <= RCOND * s_max {
            return Err(ConfigError::InvalidParameter("design matrix is rank deficient".to_string()));
        }
        let pinv = svd.pseudo_inverse(RCOND * s_max)
            .map_err(|e| ConfigError::InvalidParameter(e.to_string()))?;

        Ok(Self { design, pinv })
    }

    pub fn design(&self) -> &DMatrix<f64> {
        &self.design
    }

    /// Least squares solution for one right-hand side
    pub fn solve(&self, b: &[f64]) -> FitResult<DVector<f64>> {
        if b.len() != self.design.nrows() {
            return Err(FitError::InvalidInput(format!(
                "expected {} values, got {}", self.design.nrows(), b.len()
            )));
        }
        let x = &self.pinv * DVector::from_column_slice(b);
        if x.iter().any(|v| !v.is_finite()) {
            return Err(FitError::NonFinite);
        }
        Ok(x)
    }
}
