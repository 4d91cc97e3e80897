//! Function composition

use crate::error::{ConfigError, ConfigResult, FitResult};
use super::{Part, VectFunction};

/// `first` followed by `second`, with a private intermediate buffer
pub struct Compose<F, G> {
    first: F,
    second: G,
    mid: Vec<f64>,
}

impl<F: VectFunction, G: VectFunction> Compose<F, G> {
    pub fn new(first: F, second: G) -> ConfigResult<Self> {
        ConfigError::check_dim("composed function", first.dim_out(), second.dim_in())?;
        let mid = vec![0.0; first.dim_out()];
        Ok(Self { first, second, mid })
    }
}

impl<F: VectFunction, G: VectFunction> VectFunction for Compose<F, G> {
    fn dim_in(&self) -> usize {
        self.first.dim_in()
    }

    fn dim_out(&self) -> usize {
        self.second.dim_out()
    }

    fn apply(&mut self, input: &[f64], output: &mut [f64]) -> FitResult<()> {
        self.first.apply(input, &mut self.mid)?;
        self.second.apply(&self.mid, output)
    }

    fn parts(&self) -> Vec<Part> {
        self.second.parts()
    }

    fn model(&self) -> Option<String> {
        self.second.model()
    }
}
