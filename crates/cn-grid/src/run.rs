use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cn_block::{Block, KernelKind, MultiplyKernel};

use crate::comm::{AbortHandle, CommError, Communicator, LocalComm, LocalWorld};
use crate::config::{CannonConfig, GridShape};
use crate::error::{CannonError, Result};
use crate::init::BlockInitializer;
use crate::source::MatrixSource;
use crate::stepper::CannonStepper;
use crate::topology::{GridCoordinate, ProcessGrid};
use crate::verify::ResultVerifier;

/// Outcome of a successful, verified run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub matrix_dim: usize,
    pub workers: usize,
    pub kernel: KernelKind,
    /// Time between the barriers bracketing the rounds, as seen by rank 0.
    pub elapsed: Duration,
    /// Floating-point operations per second: 2·N³ / elapsed.
    pub flops: f64,
    blocks: Vec<(GridCoordinate, Block)>,
}

impl RunReport {
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    /// `N, elapsed_seconds, flops, workers`
    pub fn csv_line(&self) -> String {
        format!(
            "{}, {:.6}, {:.6}, {}",
            self.matrix_dim,
            self.elapsed_secs(),
            self.flops,
            self.workers
        )
    }

    /// Final C blocks, ordered by rank.
    pub fn blocks(&self) -> &[(GridCoordinate, Block)] {
        &self.blocks
    }

    /// Rebuilds the full N x N product from the workers' C blocks.
    pub fn assemble(&self) -> Block {
        let n = self.matrix_dim;
        let mut data = vec![0.0f32; n * n];
        for (coord, block) in &self.blocks {
            let side = block.side();
            for i in 0..side {
                let start = (coord.row * side + i) * n + coord.col * side;
                data[start..start + side].copy_from_slice(block.row(i));
            }
        }
        Block::from_fn(n, |i, j| data[i * n + j])
    }
}

/// Throughput of an N x N multiply that took `elapsed`.
pub fn flops(matrix_dim: usize, elapsed: Duration) -> f64 {
    let n = matrix_dim as f64;
    2.0 * n * n * n / elapsed.as_secs_f64()
}

struct WorkerOutcome {
    coord: GridCoordinate,
    elapsed: Duration,
    c: Block,
}

fn is_abort(e: &CannonError) -> bool {
    matches!(e, CannonError::Comm(CommError::Aborted))
}

/// Aborts the world if the owning worker thread unwinds.
struct AbortOnPanic(AbortHandle);

impl Drop for AbortOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.abort();
        }
    }
}

fn run_worker(
    shape: GridShape,
    comm: LocalComm,
    kernel: Arc<dyn MultiplyKernel>,
    source: &dyn MatrixSource,
) -> Result<WorkerOutcome> {
    let grid = ProcessGrid::new(shape, comm.rank())?;
    let blocks = BlockInitializer::new(grid).load(source);
    let mut stepper = CannonStepper::new(grid, comm, kernel, blocks)?;
    let elapsed = stepper.run()?;
    let c = stepper.into_c_block()?;
    ResultVerifier::new(grid).verify(&c, source)?;
    Ok(WorkerOutcome {
        coord: grid.coordinate(),
        elapsed,
        c,
    })
}

/// Runs Cannon's algorithm on an in-process world of `config.workers`
/// threads and verifies every worker's result against `source`.
///
/// Any worker failure aborts the whole world. The error returned is the
/// first one by rank that is not a consequence of that abort.
pub fn run(config: &CannonConfig, source: Arc<dyn MatrixSource>) -> Result<RunReport> {
    let shape = config.validate()?;
    if source.matrix_dim() != shape.matrix_dim {
        return Err(CannonError::InvalidConfig(format!(
            "source '{}' is {}x{}, configured matrix dimension is {}",
            source.name(),
            source.matrix_dim(),
            source.matrix_dim(),
            shape.matrix_dim
        )));
    }
    let kernel = cn_block::kernel_for(config.kernel, config.threads)?;
    log::info!(
        "initializing blocks: N={} workers={} grid={}x{} block={} kernel={} source={}",
        shape.matrix_dim,
        shape.workers(),
        shape.dim,
        shape.dim,
        shape.block_side,
        kernel.name(),
        source.name()
    );

    let world = LocalWorld::new(shape.workers());
    let abort = world.abort_handle();
    let source = source.as_ref();

    let outcomes: Vec<Result<WorkerOutcome>> = thread::scope(|s| {
        let mut handles = Vec::with_capacity(shape.workers());
        for comm in world.into_endpoints() {
            let rank = comm.rank();
            let kernel = Arc::clone(&kernel);
            let worker_abort = abort.clone();
            let spawned = thread::Builder::new()
                .name(format!("cn-worker-{}", rank))
                .spawn_scoped(s, move || {
                    let _guard = AbortOnPanic(worker_abort.clone());
                    let outcome = run_worker(shape, comm, kernel, source);
                    if let Err(e) = &outcome {
                        log::error!("rank {} failed: {}", rank, e);
                        worker_abort.abort();
                    }
                    outcome
                });
            match spawned {
                Ok(handle) => handles.push((rank, Some(handle))),
                Err(e) => {
                    abort.abort();
                    log::error!("failed to spawn worker {}: {}", rank, e);
                    handles.push((rank, None));
                }
            }
        }
        handles
            .into_iter()
            .map(|(rank, handle)| match handle {
                Some(h) => h.join().unwrap_or(Err(CannonError::WorkerPanicked(rank))),
                None => Err(CannonError::Other(format!("worker {} was not started", rank))),
            })
            .collect()
    });

    let mut blocks = Vec::with_capacity(outcomes.len());
    let mut elapsed = None;
    let mut first_err = None;
    for outcome in outcomes {
        match outcome {
            Ok(w) => {
                elapsed.get_or_insert(w.elapsed);
                blocks.push((w.coord, w.c));
            }
            Err(e) => {
                let replace = match &first_err {
                    None => true,
                    Some(prev) => is_abort(prev) && !is_abort(&e),
                };
                if replace {
                    first_err = Some(e);
                }
            }
        }
    }
    if let Some(e) = first_err {
        return Err(e);
    }

    let elapsed = elapsed.unwrap_or_default();
    let report = RunReport {
        matrix_dim: shape.matrix_dim,
        workers: shape.workers(),
        kernel: config.kernel,
        elapsed,
        flops: flops(shape.matrix_dim, elapsed),
        blocks,
    };
    log::info!(
        "verified {}x{} product with {} kernel in {:.6}s ({:.3e} flop/s)",
        report.matrix_dim,
        report.matrix_dim,
        report.kernel,
        report.elapsed_secs(),
        report.flops
    );
    Ok(report)
}
