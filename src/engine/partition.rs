//! Work distribution over the voxel grid

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rayon::ThreadPoolBuilder;

use crate::error::{ConfigError, ConfigResult};
use crate::volume::Sampling;
use super::{EngineConfig, Partition};

/// What happened to one voxel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Rejected by mask or invalid input; output untouched
    Skipped,
    Done,
    Failed,
}

/// Processes single voxels for one worker
pub(crate) trait VoxelWorker {
    fn process(&mut self, idx: usize, output: &mut [f64]) -> Outcome;
}

/// Counters shared by all workers
#[derive(Default)]
pub(crate) struct RunStats {
    pub processed: AtomicUsize,
    pub failed: AtomicUsize,
    done: AtomicUsize,
}

impl RunStats {
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Run `make_worker` workers over the grid, writing into `output`
///
/// `output` is voxel-major with `dim_out` values per voxel. Each worker is
/// built once on the thread that uses it. With one thread everything runs
/// inline on the caller.
pub(crate) fn run_partitioned<W, M, P>(
    config: &EngineConfig,
    sampling: &Sampling,
    dim_out: usize,
    output: &mut [f64],
    make_worker: M,
    progress: P,
) -> ConfigResult<RunStats>
where
    W: VoxelWorker,
    M: Fn() -> ConfigResult<W> + Sync,
    P: Fn(usize, usize) + Sync,
{
    let stats = RunStats::default();
    let total = sampling.size();
    if total == 0 || dim_out == 0 {
        progress(total, total);
        return Ok(stats);
    }

    let report_every = sampling.nx().max(1);

    if config.threads == 1 {
        let mut worker = make_worker()?;
        return Ok(run_sequential(sampling, dim_out, output, &mut worker, progress));
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
        .map_err(|e| ConfigError::ThreadPool(e.to_string()))?;

    let errors: Mutex<Vec<ConfigError>> = Mutex::new(Vec::new());

    match config.partition {
        Partition::Slice => {
            let per_worker = total.div_ceil(config.threads);
            tracing::debug!("slice partition: {} workers x {} voxels", config.threads, per_worker);

            pool.scope(|scope| {
                for (n, chunk) in output.chunks_mut(per_worker * dim_out).enumerate() {
                    let (stats, errors, make_worker, progress) = (&stats, &errors, &make_worker, &progress);
                    scope.spawn(move |_| match make_worker() {
                        Ok(mut worker) => process_range(
                            &mut worker, n * per_worker, chunk, dim_out,
                            stats, report_every, total, &mut |d: usize, t: usize| progress(d, t),
                        ),
                        Err(e) => errors.lock().push(e),
                    });
                }
            });
        }
        Partition::Column => {
            let column = sampling.nx();
            tracing::debug!("column partition: {} workers, {} columns", config.threads, total / column);

            let queue = Mutex::new(output.chunks_mut(column * dim_out).enumerate());
            pool.scope(|scope| {
                for _ in 0..config.threads {
                    let (stats, errors, make_worker, progress, queue) =
                        (&stats, &errors, &make_worker, &progress, &queue);
                    scope.spawn(move |_| {
                        let mut worker = match make_worker() {
                            Ok(worker) => worker,
                            Err(e) => {
                                errors.lock().push(e);
                                return;
                            }
                        };
                        loop {
                            let next = queue.lock().next();
                            let Some((n, chunk)) = next else { break };
                            process_range(
                                &mut worker, n * column, chunk, dim_out,
                                stats, report_every, total, &mut |d: usize, t: usize| progress(d, t),
                            );
                        }
                    });
                }
            });
        }
    }

    if let Some(e) = errors.into_inner().into_iter().next() {
        return Err(e);
    }
    Ok(stats)
}

/// Run one worker over the whole grid on the calling thread
///
/// `progress` need not be `Sync`, so callbacks bound to the caller's thread
/// can be used here.
pub(crate) fn run_sequential<W, P>(
    sampling: &Sampling,
    dim_out: usize,
    output: &mut [f64],
    worker: &mut W,
    mut progress: P,
) -> RunStats
where
    W: VoxelWorker,
    P: FnMut(usize, usize),
{
    let stats = RunStats::default();
    let total = sampling.size();
    if total == 0 || dim_out == 0 {
        progress(total, total);
        return stats;
    }
    process_range(worker, 0, output, dim_out, &stats, sampling.nx().max(1), total, &mut progress);
    stats
}

/// Process the voxels covered by `chunk`, starting at linear index `start`
#[allow(clippy::too_many_arguments)]
fn process_range<W, P>(
    worker: &mut W,
    start: usize,
    chunk: &mut [f64],
    dim_out: usize,
    stats: &RunStats,
    report_every: usize,
    total: usize,
    progress: &mut P,
) where
    W: VoxelWorker,
    P: FnMut(usize, usize),
{
    let mut pending = 0;
    for (offset, out) in chunk.chunks_mut(dim_out).enumerate() {
        match worker.process(start + offset, out) {
            Outcome::Skipped => {}
            Outcome::Done => {
                stats.processed.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Failed => {
                stats.processed.fetch_add(1, Ordering::Relaxed);
                stats.failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        pending += 1;
        if pending == report_every {
            let done = stats.done.fetch_add(pending, Ordering::Relaxed) + pending;
            progress(done, total);
            pending = 0;
        }
    }

    if pending > 0 {
        let done = stats.done.fetch_add(pending, Ordering::Relaxed) + pending;
        progress(done, total);
    }
}
