//! Two-input volume functions

use crate::error::{ConfigError, ConfigResult};
use crate::function::{BinaryVectFunction, BinaryVectFunctionFactory};
use crate::volume::{Mask, Volume};
use super::isolate::isolate_voxel;
use super::partition::{run_partitioned, Outcome, VoxelWorker};
use super::{EngineConfig, FitOutput};

struct BinaryWorker<'a, F> {
    left: &'a Volume,
    right: &'a Volume,
    mask: Option<&'a Mask>,
    function: F,
}

impl<F: BinaryVectFunction> VoxelWorker for BinaryWorker<'_, F> {
    fn process(&mut self, idx: usize, output: &mut [f64]) -> Outcome {
        if !self.left.valid_index(idx, self.mask) || !self.right.valid_index(idx, None) {
            return Outcome::Skipped;
        }

        let sample = self.left.sampling().sample(idx);
        let (left, right) = (self.left.voxel(idx), self.right.voxel(idx));
        let function = &mut self.function;
        if isolate_voxel(Some(sample), output, |out| function.apply(left, right, out)) {
            Outcome::Done
        } else {
            Outcome::Failed
        }
    }
}

/// Apply a two-input per-voxel function over co-registered volumes
///
/// Both volumes must share the grid; their channel counts must match the
/// function's `dim_left` and `dim_right`. A voxel is processed when the mask
/// accepts it and both inputs are finite.
pub fn apply_binary_function<F>(
    left: &Volume,
    right: &Volume,
    mask: Option<&Mask>,
    factory: &F,
    config: &EngineConfig,
) -> ConfigResult<FitOutput>
where
    F: BinaryVectFunctionFactory,
{
    apply_binary_function_with_progress(left, right, mask, factory, config, |_, _| {})
}

/// Same as `apply_binary_function` with a `(done, total)` progress callback
pub fn apply_binary_function_with_progress<F, P>(
    left: &Volume,
    right: &Volume,
    mask: Option<&Mask>,
    factory: &F,
    config: &EngineConfig,
    progress_callback: P,
) -> ConfigResult<FitOutput>
where
    F: BinaryVectFunctionFactory,
    P: Fn(usize, usize) + Sync,
{
    config.validate()?;
    if !left.sampling().same_grid(right.sampling()) {
        return Err(ConfigError::SamplingMismatch(format!(
            "left {:?} vs right {:?}", left.sampling().dims(), right.sampling().dims()
        )));
    }
    if let Some(mask) = mask {
        if !mask.sampling().same_grid(left.sampling()) {
            return Err(ConfigError::SamplingMismatch(format!(
                "mask {:?} vs input {:?}", mask.sampling().dims(), left.sampling().dims()
            )));
        }
    }

    let probe = factory.create()?;
    ConfigError::check_dim("left input", probe.dim_left(), left.dim())?;
    ConfigError::check_dim("right input", probe.dim_right(), right.dim())?;
    let dim_out = probe.dim_out();
    let parts = probe.parts();
    let model = probe.model();
    drop(probe);

    tracing::info!("evaluating binary function: {} + {} -> {} channels, {} thread(s)",
                   left.dim(), right.dim(), dim_out, config.threads);

    let mut output = left.proto(dim_out);
    let stats = run_partitioned(
        config,
        left.sampling(),
        dim_out,
        output.data_mut(),
        || {
            let function = factory.create()?;
            Ok(BinaryWorker { left, right, mask, function })
        },
        progress_callback,
    )?;

    tracing::info!("evaluated {} voxels, {} failed", stats.processed(), stats.failed());

    output.set_model(model);
    Ok(FitOutput::new(output, parts, stats.processed(), stats.failed()))
}
