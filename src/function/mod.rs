//! Per-voxel vector functions
//!
//! A `VectFunction` maps one voxel's input vector (`dim_in` values) to an
//! output vector (`dim_out` values). Concrete models implement it; the
//! engine in `crate::engine` runs it over whole volumes.
//!
//! Instances may keep private scratch state (`apply` takes `&mut self`), so
//! the engine never shares one across threads. It asks a
//! `VectFunctionFactory` for a fresh instance per worker instead.

pub mod compose;
pub mod select;
pub mod closure;
pub mod binary;

use std::ops::Range;

use crate::error::{ConfigError, ConfigResult, Error, FitResult};

pub use compose::Compose;
pub use select::Select;
pub use closure::{from_fn, FnVect};
pub use binary::{BinaryVectFunction, BinaryVectFunctionFactory};

/// A named group of output channels, e.g. `("alpha", 0..1)`
pub type Part = (String, Range<usize>);

/// Fixed-size vector to vector transformation
pub trait VectFunction: Send {
    /// Length of the input vector
    fn dim_in(&self) -> usize;

    /// Length of the output vector
    fn dim_out(&self) -> usize;

    /// Write the result for `input` into `output`
    ///
    /// Callers guarantee `input.len() == dim_in()` and
    /// `output.len() == dim_out()`; `output` may hold stale values.
    fn apply(&mut self, input: &[f64], output: &mut [f64]) -> FitResult<()>;

    /// Named channel groups of the output, empty if it is one block
    fn parts(&self) -> Vec<Part> {
        Vec::new()
    }

    /// Model tag attached to output volumes
    fn model(&self) -> Option<String> {
        None
    }

    /// Check buffer lengths against the declared dimensions
    fn check_io(&self, input: usize, output: usize) -> ConfigResult<()> {
        ConfigError::check_dim("function input", self.dim_in(), input)?;
        ConfigError::check_dim("function output", self.dim_out(), output)
    }

    /// Checked evaluation into a freshly allocated output
    fn eval(&mut self, input: &[f64]) -> Result<Vec<f64>, Error> {
        self.check_io(input.len(), self.dim_out())?;
        let mut output = vec![0.0; self.dim_out()];
        self.apply(input, &mut output)?;
        Ok(output)
    }

    /// Checked evaluation into a caller buffer
    fn eval_into(&mut self, input: &[f64], output: &mut [f64]) -> Result<(), Error> {
        self.check_io(input.len(), output.len())?;
        self.apply(input, output)?;
        Ok(())
    }

    /// Apply `self` then `next`
    fn compose<G: VectFunction>(self, next: G) -> ConfigResult<Compose<Self, G>>
    where
        Self: Sized,
    {
        Compose::new(self, next)
    }
}

impl<F: VectFunction + ?Sized> VectFunction for Box<F> {
    fn dim_in(&self) -> usize {
        (**self).dim_in()
    }

    fn dim_out(&self) -> usize {
        (**self).dim_out()
    }

    fn apply(&mut self, input: &[f64], output: &mut [f64]) -> FitResult<()> {
        (**self).apply(input, output)
    }

    fn parts(&self) -> Vec<Part> {
        (**self).parts()
    }

    fn model(&self) -> Option<String> {
        (**self).model()
    }
}

/// Builds one `VectFunction` per worker
///
/// Implementations hold immutable configuration only; whatever mutable
/// state a fitter needs lives in the instance `create` returns.
pub trait VectFunctionFactory: Sync {
    type Function: VectFunction;

    fn create(&self) -> ConfigResult<Self::Function>;
}

impl<F, V> VectFunctionFactory for F
where
    F: Fn() -> ConfigResult<V> + Sync,
    V: VectFunction,
{
    type Function = V;

    fn create(&self) -> ConfigResult<V> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FitError;

    #[test]
    fn test_eval_checks_input_length() {
        let mut f = from_fn(3, 1, |x, y| {
            y[0] = x.iter().sum();
            Ok(())
        });
        assert_eq!(f.eval(&[1.0, 2.0, 3.0]).unwrap(), vec![6.0]);

        let err = f.eval(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::DimensionMismatch { expected: 3, actual: 2, .. })));
    }

    #[test]
    fn test_eval_into_checks_output_length() {
        let mut f = from_fn(2, 2, |x, y| {
            y.copy_from_slice(x);
            Ok(())
        });
        let mut out = vec![0.0; 3];
        let err = f.eval_into(&[1.0, 2.0], &mut out).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::DimensionMismatch { what: "function output", .. })));
    }

    #[test]
    fn test_eval_propagates_fit_error() {
        let mut f = from_fn(1, 1, |_, _| Err(FitError::Singular));
        assert_eq!(f.eval(&[1.0]).unwrap_err(), Error::Fit(FitError::Singular));
    }

    #[test]
    fn test_boxed_function() {
        let mut f: Box<dyn VectFunction> = Box::new(from_fn(1, 2, |x, y| {
            y[0] = x[0];
            y[1] = -x[0];
            Ok(())
        }));
        assert_eq!(f.dim_out(), 2);
        assert_eq!(f.eval(&[3.0]).unwrap(), vec![3.0, -3.0]);
    }

    #[test]
    fn test_closure_factory() {
        let factory = || {
            Ok::<_, ConfigError>(from_fn(1, 1, |x, y| {
                y[0] = 2.0 * x[0];
                Ok(())
            }))
        };
        let mut f = factory.create().unwrap();
        assert_eq!(f.eval(&[2.0]).unwrap(), vec![4.0]);
    }
}
