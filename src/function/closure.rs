//! Closure-backed vector functions

use crate::error::FitResult;
use super::VectFunction;

/// `VectFunction` built from a closure and declared dimensions
pub struct FnVect<F> {
    dim_in: usize,
    dim_out: usize,
    f: F,
}

/// Wrap a closure `f(input, output)` as a `VectFunction`
pub fn from_fn<F>(dim_in: usize, dim_out: usize, f: F) -> FnVect<F>
where
    F: FnMut(&[f64], &mut [f64]) -> FitResult<()> + Send,
{
    FnVect { dim_in, dim_out, f }
}

impl<F> VectFunction for FnVect<F>
where
    F: FnMut(&[f64], &mut [f64]) -> FitResult<()> + Send,
{
    fn dim_in(&self) -> usize {
        self.dim_in
    }

    fn dim_out(&self) -> usize {
        self.dim_out
    }

    fn apply(&mut self, input: &[f64], output: &mut [f64]) -> FitResult<()> {
        (self.f)(input, output)
    }
}
