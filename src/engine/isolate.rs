//! Per-voxel failure isolation

use crate::error::FitResult;
use crate::function::{Part, VectFunction};
use crate::volume::Sample;

/// Run one voxel evaluation, turning failure into a zeroed output
///
/// Returns whether the voxel succeeded. An `Err` or any non-finite output
/// value counts as failure; either is logged with the voxel coordinate.
pub fn isolate_voxel<F>(sample: Option<Sample>, output: &mut [f64], eval: F) -> bool
where
    F: FnOnce(&mut [f64]) -> FitResult<()>,
{
    let at = || sample.map(|s| s.to_string()).unwrap_or_else(|| "?".to_string());
    match eval(output) {
        Ok(()) if output.iter().all(|v| v.is_finite()) => true,
        Ok(()) => {
            tracing::warn!("voxel {} produced non-finite output, zeroed", at());
            output.fill(0.0);
            false
        }
        Err(e) => {
            tracing::warn!("voxel {} failed: {}", at(), e);
            output.fill(0.0);
            false
        }
    }
}

/// Wraps a `VectFunction` so that failures yield zeros instead of errors
pub struct Isolate<F> {
    inner: F,
    failures: usize,
}

impl<F: VectFunction> Isolate<F> {
    pub fn new(inner: F) -> Self {
        Self { inner, failures: 0 }
    }

    /// Evaluate with the voxel coordinate available for logging
    pub fn apply_at(&mut self, sample: Sample, input: &[f64], output: &mut [f64]) -> bool {
        let inner = &mut self.inner;
        let ok = isolate_voxel(Some(sample), output, |out| inner.apply(input, out));
        if !ok {
            self.failures += 1;
        }
        ok
    }

    /// Number of failed evaluations so far
    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn into_inner(self) -> F {
        self.inner
    }
}

impl<F: VectFunction> VectFunction for Isolate<F> {
    fn dim_in(&self) -> usize {
        self.inner.dim_in()
    }

    fn dim_out(&self) -> usize {
        self.inner.dim_out()
    }

    fn apply(&mut self, input: &[f64], output: &mut [f64]) -> FitResult<()> {
        let inner = &mut self.inner;
        if !isolate_voxel(None, output, |out| inner.apply(input, out)) {
            self.failures += 1;
        }
        Ok(())
    }

    fn parts(&self) -> Vec<Part> {
        self.inner.parts()
    }

    fn model(&self) -> Option<String> {
        self.inner.model()
    }
}
