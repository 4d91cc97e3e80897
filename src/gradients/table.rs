//! b-value / direction tables

use crate::error::{ConfigError, ConfigResult};
use crate::function::Select;
use super::selection::{parse_indices, parse_values};

/// b-values are grouped into shells by rounding to this step (s/mm²)
pub const SHELL_ROUNDING: f64 = 100.0;

/// Diffusion acquisition protocol
#[derive(Clone, Debug, PartialEq)]
pub struct Gradients {
    bvals: Vec<f64>,
    bvecs: Vec<[f64; 3]>,
}

impl Gradients {
    /// Build a table; directions are normalized (zero vectors are kept as is)
    pub fn new(bvals: Vec<f64>, bvecs: Vec<[f64; 3]>) -> ConfigResult<Self> {
        ConfigError::check_dim("gradient directions", bvals.len(), bvecs.len())?;
        if let Some(b) = bvals.iter().find(|b| !b.is_finite() || **b < 0.0) {
            return Err(ConfigError::InvalidParameter(format!("invalid b-value {}", b)));
        }

        let bvecs = bvecs.into_iter()
            .map(|v| {
                let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
                if norm > 1e-10 {
                    [v[0] / norm, v[1] / norm, v[2] / norm]
                } else {
                    [0.0, 0.0, 0.0]
                }
            })
            .collect();

        Ok(Self { bvals, bvecs })
    }

    /// Number of entries (DWI channels)
    #[inline]
    pub fn size(&self) -> usize {
        self.bvals.len()
    }

    #[inline]
    pub fn bval(&self, i: usize) -> f64 {
        self.bvals[i]
    }

    #[inline]
    pub fn bvec(&self, i: usize) -> [f64; 3] {
        self.bvecs[i]
    }

    pub fn bvals(&self) -> &[f64] {
        &self.bvals
    }

    pub fn bvecs(&self) -> &[[f64; 3]] {
        &self.bvecs
    }

    pub fn copy(&self) -> Gradients {
        self.clone()
    }

    /// Shell (rounded b-value) of entry `i`
    #[inline]
    pub fn shell(&self, i: usize) -> f64 {
        round_shell(self.bvals[i])
    }

    /// Distinct shells in ascending order
    pub fn shells(&self) -> Vec<f64> {
        let mut shells: Vec<f64> = self.bvals.iter().map(|&b| round_shell(b)).collect();
        shells.sort_by(|a, b| a.total_cmp(b));
        shells.dedup();
        shells
    }

    /// Entries acquired without diffusion weighting
    pub fn baseline_idx(&self) -> Vec<usize> {
        (0..self.size()).filter(|&i| self.shell(i) == 0.0).collect()
    }

    /// Diffusion-weighted entries
    pub fn dwi_idx(&self) -> Vec<usize> {
        (0..self.size()).filter(|&i| self.shell(i) != 0.0).collect()
    }

    /// Indices of the entries on the given shell
    pub fn shell_idx(&self, shell: f64) -> Vec<usize> {
        let shell = round_shell(shell);
        (0..self.size()).filter(|&i| self.shell(i) == shell).collect()
    }

    /// Entries at the given indices, in that order
    pub fn select(&self, idx: &[usize]) -> ConfigResult<Gradients> {
        if let Some(&bad) = idx.iter().find(|&&i| i >= self.size()) {
            return Err(ConfigError::InvalidParameter(format!(
                "gradient index {} outside 0..{}", bad, self.size()
            )));
        }
        Ok(Gradients {
            bvals: idx.iter().map(|&i| self.bvals[i]).collect(),
            bvecs: idx.iter().map(|&i| self.bvecs[i]).collect(),
        })
    }

    /// Reduced table plus the function that reduces signal vectors to match
    ///
    /// # Arguments
    /// * `shells` - Keep entries on these shells, e.g. `"0,1000"`
    /// * `which` - Keep only these indices, e.g. `"0-5,9"`
    /// * `exclude` - Drop these indices
    ///
    /// Filters apply in that order and preserve the original ordering.
    pub fn subset(
        &self,
        shells: Option<&str>,
        which: Option<&str>,
        exclude: Option<&str>,
    ) -> ConfigResult<(Gradients, Select)> {
        let mut keep = vec![true; self.size()];

        if let Some(spec) = shells {
            let wanted: Vec<f64> = parse_values(spec)?.into_iter().map(round_shell).collect();
            for (i, k) in keep.iter_mut().enumerate() {
                *k &= wanted.contains(&self.shell(i));
            }
        }

        if let Some(spec) = which {
            let idx = parse_indices(spec, self.size())?;
            for (i, k) in keep.iter_mut().enumerate() {
                *k &= idx.contains(&i);
            }
        }

        if let Some(spec) = exclude {
            for i in parse_indices(spec, self.size())? {
                keep[i] = false;
            }
        }

        let idx: Vec<usize> = (0..self.size()).filter(|&i| keep[i]).collect();
        if idx.is_empty() {
            return Err(ConfigError::InvalidSpec("gradient subset selects no entries".to_string()));
        }

        let subset = self.select(&idx)?;
        let select = Select::new(self.size(), idx)?;
        Ok((subset, select))
    }
}

#[inline]
fn round_shell(b: f64) -> f64 {
    (b / SHELL_ROUNDING).round() * SHELL_ROUNDING
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::VectFunction;

    fn two_shell() -> Gradients {
        let bvals = vec![0.0, 1000.0, 995.0, 2000.0, 5.0, 1010.0, 2005.0];
        let bvecs = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 2.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 1.0],
        ];
        Gradients::new(bvals, bvecs).unwrap()
    }

    #[test]
    fn test_shells_and_baselines() {
        let grads = two_shell();
        assert_eq!(grads.shells(), vec![0.0, 1000.0, 2000.0]);
        assert_eq!(grads.baseline_idx(), vec![0, 4]);
        assert_eq!(grads.dwi_idx(), vec![1, 2, 3, 5, 6]);
        assert_eq!(grads.shell_idx(1000.0), vec![1, 2, 5]);
        assert_eq!(grads.bvec(2), [0.0, 1.0, 0.0]);
        let v = grads.bvec(5);
        assert!((v[0] - 0.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_new_validates() {
        assert!(Gradients::new(vec![0.0, 1000.0], vec![[1.0, 0.0, 0.0]]).is_err());
        assert!(Gradients::new(vec![-5.0], vec![[1.0, 0.0, 0.0]]).is_err());
    }

    #[test]
    fn test_subset_roundtrip() {
        let grads = two_shell();
        let signal = vec![10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0];

        let (subset, mut select) = grads.subset(Some("0,1000"), None, Some("4")).unwrap();
        let expected_idx = vec![0, 1, 2, 5];
        assert_eq!(select.indices(), expected_idx.as_slice());
        assert_eq!(subset.size(), 4);

        let reduced = select.eval(&signal).unwrap();
        let manual: Vec<f64> = expected_idx.iter().map(|&i| signal[i]).collect();
        assert_eq!(reduced, manual);

        for (n, &i) in expected_idx.iter().enumerate() {
            assert_eq!(subset.bval(n), grads.bval(i));
            assert_eq!(subset.bvec(n), grads.bvec(i));
        }
    }

    #[test]
    fn test_subset_which() {
        let grads = two_shell();
        let (subset, select) = grads.subset(None, Some("1-3,6"), None).unwrap();
        assert_eq!(select.indices(), &[1, 2, 3, 6]);
        assert_eq!(subset.shells(), vec![1000.0, 2000.0]);
    }

    #[test]
    fn test_subset_errors() {
        let grads = two_shell();
        assert!(grads.subset(Some("3000"), None, None).is_err());
        assert!(grads.subset(None, Some("0-9"), None).is_err());
        assert!(grads.subset(None, None, Some("x")).is_err());
    }

    #[test]
    fn test_subset_huge_range_is_rejected() {
        let grads = two_shell();
        let err = grads.subset(None, Some("0-18446744073709551615"), None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSpec(_)));
        assert!(grads.subset(None, None, Some("2-18446744073709551615")).is_err());
    }
}
