//! Channel selection

use crate::error::{ConfigError, ConfigResult, FitResult};
use super::VectFunction;

/// Picks a subset of input channels, in the given order
#[derive(Clone, Debug, PartialEq)]
pub struct Select {
    dim_in: usize,
    idx: Vec<usize>,
}

impl Select {
    pub fn new(dim_in: usize, idx: Vec<usize>) -> ConfigResult<Self> {
        if let Some(&bad) = idx.iter().find(|&&i| i >= dim_in) {
            return Err(ConfigError::InvalidParameter(format!(
                "selected channel {} outside 0..{}", bad, dim_in
            )));
        }
        Ok(Self { dim_in, idx })
    }

    pub fn indices(&self) -> &[usize] {
        &self.idx
    }
}

impl VectFunction for Select {
    fn dim_in(&self) -> usize {
        self.dim_in
    }

    fn dim_out(&self) -> usize {
        self.idx.len()
    }

    fn apply(&mut self, input: &[f64], output: &mut [f64]) -> FitResult<()> {
        for (o, &i) in output.iter_mut().zip(&self.idx) {
            *o = input[i];
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select() {
        let mut select = Select::new(5, vec![4, 0, 2]).unwrap();
        assert_eq!(select.dim_out(), 3);
        assert_eq!(select.eval(&[0.0, 1.0, 2.0, 3.0, 4.0]).unwrap(), vec![4.0, 0.0, 2.0]);
    }

    #[test]
    fn test_select_out_of_range() {
        assert!(Select::new(3, vec![0, 3]).is_err());
    }
}
