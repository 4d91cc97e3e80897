//! Single-input volume functions

use crate::error::{ConfigError, ConfigResult};
use crate::function::{Part, VectFunction, VectFunctionFactory};
use crate::volume::{Mask, Volume};
use super::isolate::Isolate;
use super::partition::{run_partitioned, run_sequential, Outcome, RunStats, VoxelWorker};
use super::{EngineConfig, FitOutput};

struct UnaryWorker<'a, F> {
    input: &'a Volume,
    mask: Option<&'a Mask>,
    function: Isolate<F>,
}

impl<F: VectFunction> VoxelWorker for UnaryWorker<'_, F> {
    fn process(&mut self, idx: usize, output: &mut [f64]) -> Outcome {
        if !self.input.valid_index(idx, self.mask) {
            return Outcome::Skipped;
        }

        let sample = self.input.sampling().sample(idx);
        if self.function.apply_at(sample, self.input.voxel(idx), output) {
            Outcome::Done
        } else {
            Outcome::Failed
        }
    }
}

/// Apply a per-voxel function to every valid voxel of `input`
///
/// # Arguments
/// * `input` - Volume whose channel count must equal the function's `dim_in`
/// * `mask` - Optional mask; `None` processes every voxel with finite input
/// * `factory` - Builds one function instance per worker
/// * `config` - Thread count and partition mode
///
/// # Returns
/// Output volume with the function's `dim_out` channels; skipped and failed
/// voxels are zero
pub fn apply_function<F>(
    input: &Volume,
    mask: Option<&Mask>,
    factory: &F,
    config: &EngineConfig,
) -> ConfigResult<FitOutput>
where
    F: VectFunctionFactory,
{
    apply_function_with_progress(input, mask, factory, config, |_, _| {})
}

/// Same as `apply_function` but calls `progress_callback(done, total)` as
/// voxels complete (possibly from several threads)
pub fn apply_function_with_progress<F, P>(
    input: &Volume,
    mask: Option<&Mask>,
    factory: &F,
    config: &EngineConfig,
    progress_callback: P,
) -> ConfigResult<FitOutput>
where
    F: VectFunctionFactory,
    P: Fn(usize, usize) + Sync,
{
    config.validate()?;
    let plan = Plan::new(input, mask, factory)?;

    let sampling = input.sampling();
    let (nx, ny, nz) = sampling.dims();
    tracing::info!("fitting {}x{}x{} volume: {} -> {} channels, {} thread(s), {} partition",
                   nx, ny, nz, input.dim(), plan.dim_out, config.threads, config.partition);

    let mut output = input.proto(plan.dim_out);
    let stats = run_partitioned(
        config,
        sampling,
        plan.dim_out,
        output.data_mut(),
        || {
            let function = factory.create()?;
            Ok(UnaryWorker { input, mask, function: Isolate::new(function) })
        },
        progress_callback,
    )?;

    Ok(plan.finish(output, &stats))
}

/// `apply_function_with_progress` on the calling thread only
///
/// The callback is never shared between threads, so it may hold
/// thread-bound state such as a JavaScript function.
pub fn apply_function_local<F, P>(
    input: &Volume,
    mask: Option<&Mask>,
    factory: &F,
    progress_callback: P,
) -> ConfigResult<FitOutput>
where
    F: VectFunctionFactory,
    P: FnMut(usize, usize),
{
    let plan = Plan::new(input, mask, factory)?;

    let (nx, ny, nz) = input.sampling().dims();
    tracing::info!("fitting {}x{}x{} volume: {} -> {} channels, calling thread",
                   nx, ny, nz, input.dim(), plan.dim_out);

    let mut output = input.proto(plan.dim_out);
    let mut worker = UnaryWorker { input, mask, function: Isolate::new(factory.create()?) };
    let stats = run_sequential(input.sampling(), plan.dim_out, output.data_mut(), &mut worker, progress_callback);

    Ok(plan.finish(output, &stats))
}

/// What the probe instance tells us about the output
struct Plan {
    dim_out: usize,
    parts: Vec<Part>,
    model: Option<String>,
}

impl Plan {
    fn new<F: VectFunctionFactory>(input: &Volume, mask: Option<&Mask>, factory: &F) -> ConfigResult<Self> {
        if let Some(mask) = mask {
            if !mask.sampling().same_grid(input.sampling()) {
                return Err(ConfigError::SamplingMismatch(format!(
                    "mask {:?} vs input {:?}", mask.sampling().dims(), input.sampling().dims()
                )));
            }
        }

        let probe = factory.create()?;
        ConfigError::check_dim("function input", probe.dim_in(), input.dim())?;
        Ok(Self {
            dim_out: probe.dim_out(),
            parts: probe.parts(),
            model: probe.model(),
        })
    }

    fn finish(self, mut output: Volume, stats: &RunStats) -> FitOutput {
        tracing::info!("fitted {} voxels, {} failed", stats.processed(), stats.failed());
        output.set_model(self.model);
        FitOutput::new(output, self.parts, stats.processed(), stats.failed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Partition;
    use crate::error::FitError;
    use crate::function::from_fn;
    use crate::volume::{Sample, Sampling};

    /// Deterministic, mildly nonlinear test volume
    fn test_volume(nx: usize, ny: usize, nz: usize, dim: usize) -> Volume {
        let sampling = Sampling::new(nx, ny, nz);
        let data = (0..sampling.size() * dim)
            .map(|v| ((v * 37 % 101) as f64 * 0.13).sin() + 1.5)
            .collect();
        Volume::from_data(sampling, dim, data).unwrap()
    }

    fn stats_factory() -> ConfigResult<impl VectFunction> {
        Ok(from_fn(4, 3, |x, y| {
            let sum: f64 = x.iter().sum();
            let sq: f64 = x.iter().map(|v| v * v).sum();
            y[0] = sum;
            y[1] = sq.sqrt();
            y[2] = x[0].ln() * x[3].exp();
            Ok(())
        }))
    }

    #[test]
    fn test_partition_invariance() {
        let input = test_volume(7, 5, 4, 4);
        let mask_labels = (0..input.sampling().size()).map(|v| (v % 3 != 0) as u8).collect();
        let mask = Mask::new(input.sampling().clone(), mask_labels).unwrap();

        let reference = apply_function(&input, Some(&mask), &stats_factory, &EngineConfig::default())
            .unwrap();
        assert_eq!(reference.processed, mask.count());

        for threads in [1, 2, 8] {
            for partition in [Partition::Slice, Partition::Column] {
                let config = EngineConfig { threads, partition };
                let out = apply_function(&input, Some(&mask), &stats_factory, &config).unwrap();
                let same = out.volume().data().iter().zip(reference.volume().data())
                    .all(|(a, b)| a.to_bits() == b.to_bits());
                assert!(same, "output differs with {} threads, {} partition", threads, partition);
            }
        }
    }

    #[test]
    fn test_local_run_matches_pooled() {
        use std::cell::Cell;
        use std::rc::Rc;

        let input = test_volume(7, 5, 4, 4);
        let labels = (0..input.sampling().size()).map(|v| (v % 5 != 0) as u8).collect();
        let mask = Mask::new(input.sampling().clone(), labels).unwrap();
        let pooled = apply_function(&input, Some(&mask), &stats_factory, &EngineConfig::default().with_threads(4))
            .unwrap();

        // Rc is neither Send nor Sync
        let last = Rc::new(Cell::new(0));
        let calls = Rc::new(Cell::new(0));
        let (seen, count) = (last.clone(), calls.clone());
        let local = apply_function_local(&input, Some(&mask), &stats_factory, move |done, total| {
            assert_eq!(total, 140);
            assert!(done > seen.get());
            seen.set(done);
            count.set(count.get() + 1);
        })
        .unwrap();

        assert_eq!(local.volume().data(), pooled.volume().data());
        assert_eq!(local.processed, mask.count());
        assert_eq!(last.get(), 140);
        assert_eq!(calls.get(), 20);
    }

    #[test]
    fn test_local_run_checks_dimensions() {
        let input = test_volume(3, 3, 3, 5);
        let err = apply_function_local(&input, None, &stats_factory, |_, _| {}).unwrap_err();
        assert_eq!(err, ConfigError::DimensionMismatch { what: "function input", expected: 4, actual: 5 });
    }

    #[test]
    fn test_mask_respected() {
        let input = test_volume(4, 4, 2, 4);
        let labels: Vec<u8> = (0..input.sampling().size()).map(|v| (v % 2) as u8).collect();
        let mask = Mask::new(input.sampling().clone(), labels).unwrap();
        let config = EngineConfig::default().with_threads(3);

        let out = apply_function(&input, Some(&mask), &stats_factory, &config).unwrap();
        for s in input.sampling().iter() {
            let values = out.volume().get_vect(s);
            if mask.valid(s) {
                assert!(values[0] > 0.0);
            } else {
                assert_eq!(values, &[0.0, 0.0, 0.0], "masked voxel {} written", s);
            }
        }
    }

    #[test]
    fn test_empty_mask_is_not_an_error() {
        let input = test_volume(3, 3, 3, 4);
        let mask = Mask::new(input.sampling().clone(), vec![0; 27]).unwrap();
        let out = apply_function(&input, Some(&mask), &stats_factory, &EngineConfig::default())
            .unwrap();
        assert_eq!(out.processed, 0);
        assert!(out.volume().data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_nan_input_skipped() {
        let mut input = test_volume(3, 1, 1, 4);
        input.set(Sample::new(1, 0, 0), 2, f64::NAN);
        let out = apply_function(&input, None, &stats_factory, &EngineConfig::default()).unwrap();
        assert_eq!(out.processed, 2);
        assert_eq!(out.volume().get_vect(Sample::new(1, 0, 0)), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_dimension_contract() {
        let input = test_volume(3, 3, 3, 5);
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let counter = &calls;
        let factory = move || {
            Ok::<_, ConfigError>(from_fn(4, 1, move |_, y| {
                counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                y[0] = 1.0;
                Ok(())
            }))
        };

        let err = apply_function(&input, None, &factory, &EngineConfig::default()).unwrap_err();
        assert_eq!(err, ConfigError::DimensionMismatch { what: "function input", expected: 4, actual: 5 });
        assert_eq!(calls.load(std::sync::atomic::Ordering::Relaxed), 0);
    }

    #[test]
    fn test_mask_sampling_mismatch() {
        let input = test_volume(3, 3, 3, 4);
        let mask = Mask::full(Sampling::new(3, 3, 2));
        let err = apply_function(&input, Some(&mask), &stats_factory, &EngineConfig::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::SamplingMismatch(_)));
    }

    #[test]
    fn test_factory_failure_is_fatal() {
        let input = test_volume(3, 3, 3, 4);
        let factory = || -> ConfigResult<crate::function::Select> {
            Err(ConfigError::InvalidSpec("bad model".to_string()))
        };
        let config = EngineConfig::default().with_threads(4);
        let err = apply_function(&input, None, &factory, &config).unwrap_err();
        assert_eq!(err, ConfigError::InvalidSpec("bad model".to_string()));
    }

    #[test]
    fn test_failure_isolation() {
        let mut input = test_volume(6, 5, 3, 4);
        let bad = Sample::new(2, 3, 1);
        input.set_vect(bad, &[0.0, 0.0, 0.0, 0.0]);

        let factory = || {
            Ok::<_, ConfigError>(from_fn(4, 2, |x, y| {
                if x.iter().all(|&v| v == 0.0) {
                    return Err(FitError::InvalidInput("all-zero signal".to_string()));
                }
                y[0] = x[0] + x[1];
                y[1] = x[2] * x[3];
                Ok(())
            }))
        };

        for threads in [1, 4] {
            let config = EngineConfig::default().with_threads(threads);
            let out = apply_function(&input, None, &factory, &config).unwrap();
            assert_eq!(out.failed, 1);
            assert_eq!(out.processed, input.sampling().size());

            for s in input.sampling().iter() {
                let x = input.get_vect(s);
                let y = out.volume().get_vect(s);
                if s == bad {
                    assert_eq!(y, &[0.0, 0.0]);
                } else {
                    assert_eq!(y, &[x[0] + x[1], x[2] * x[3]]);
                }
            }
        }
    }

    #[test]
    fn test_factory_called_once_per_worker() {
        let input = test_volume(8, 8, 4, 4);
        let created = std::sync::atomic::AtomicUsize::new(0);
        let factory = || {
            created.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            stats_factory()
        };

        for (threads, partition) in [(1, Partition::Slice), (4, Partition::Slice), (4, Partition::Column)] {
            created.store(0, std::sync::atomic::Ordering::Relaxed);
            let config = EngineConfig { threads, partition };
            apply_function(&input, None, &factory, &config).unwrap();
            // one probe plus one per worker
            assert_eq!(created.load(std::sync::atomic::Ordering::Relaxed), threads + 1);
        }
    }
}
