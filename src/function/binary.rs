//! Two-input vector functions
//!
//! Used where a voxel result depends on two co-registered volumes, e.g. a
//! measured signal and the parameters fitted to it.

use crate::error::{ConfigError, ConfigResult, Error, FitResult};
use super::Part;

/// (left, right) → output, per voxel
pub trait BinaryVectFunction: Send {
    fn dim_left(&self) -> usize;

    fn dim_right(&self) -> usize;

    fn dim_out(&self) -> usize;

    /// Callers guarantee all three buffers match the declared dimensions
    fn apply(&mut self, left: &[f64], right: &[f64], output: &mut [f64]) -> FitResult<()>;

    fn parts(&self) -> Vec<Part> {
        Vec::new()
    }

    fn model(&self) -> Option<String> {
        None
    }

    fn check_io(&self, left: usize, right: usize, output: usize) -> ConfigResult<()> {
        ConfigError::check_dim("left input", self.dim_left(), left)?;
        ConfigError::check_dim("right input", self.dim_right(), right)?;
        ConfigError::check_dim("function output", self.dim_out(), output)
    }

    /// Checked evaluation into a freshly allocated output
    fn eval(&mut self, left: &[f64], right: &[f64]) -> Result<Vec<f64>, Error> {
        self.check_io(left.len(), right.len(), self.dim_out())?;
        let mut output = vec![0.0; self.dim_out()];
        self.apply(left, right, &mut output)?;
        Ok(output)
    }
}

impl<F: BinaryVectFunction + ?Sized> BinaryVectFunction for Box<F> {
    fn dim_left(&self) -> usize {
        (**self).dim_left()
    }

    fn dim_right(&self) -> usize {
        (**self).dim_right()
    }

    fn dim_out(&self) -> usize {
        (**self).dim_out()
    }

    fn apply(&mut self, left: &[f64], right: &[f64], output: &mut [f64]) -> FitResult<()> {
        (**self).apply(left, right, output)
    }

    fn parts(&self) -> Vec<Part> {
        (**self).parts()
    }

    fn model(&self) -> Option<String> {
        (**self).model()
    }
}

/// Builds one `BinaryVectFunction` per worker
pub trait BinaryVectFunctionFactory: Sync {
    type Function: BinaryVectFunction;

    fn create(&self) -> ConfigResult<Self::Function>;
}

impl<F, V> BinaryVectFunctionFactory for F
where
    F: Fn() -> ConfigResult<V> + Sync,
    V: BinaryVectFunction,
{
    type Function = V;

    fn create(&self) -> ConfigResult<V> {
        self()
    }
}
