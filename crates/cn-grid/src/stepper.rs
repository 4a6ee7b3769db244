use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cn_block::{Block, MultiplyKernel};

use crate::comm::{Communicator, Tag};
use crate::error::{CannonError, Result};
use crate::init::InitialBlocks;
use crate::topology::{NeighborSet, ProcessGrid};

/// Where a worker is in Cannon's algorithm.
///
/// `Init -> (Compute -> Exchange) x d -> Done`, with the exchange of the
/// final round skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Init,
    Compute { round: usize },
    Exchange { round: usize },
    Done,
}

#[derive(Debug, Clone, Copy)]
enum Shift {
    A = 0,
    B = 1,
}

fn exchange_tag(round: usize, shift: Shift) -> Tag {
    ((round as Tag) << 1) | shift as Tag
}

/// Drives one worker through the d rounds of Cannon's algorithm.
///
/// Owns the worker's blocks and its communicator endpoint. A and B are
/// double-buffered: each exchange receives into the spare buffers and then
/// swaps them in, so an incoming block never aliases one being multiplied.
pub struct CannonStepper<C: Communicator> {
    grid: ProcessGrid,
    neighbors: NeighborSet,
    kernel: Arc<dyn MultiplyKernel>,
    comm: C,
    a: Block,
    b: Block,
    c: Block,
    a_recv: Block,
    b_recv: Block,
    state: StepState,
}

impl<C: Communicator> CannonStepper<C> {
    /// # Errors
    /// Fails if `comm` does not match `grid` (rank or world size), or if a
    /// block's side differs from the grid's block side.
    pub fn new(
        grid: ProcessGrid,
        comm: C,
        kernel: Arc<dyn MultiplyKernel>,
        blocks: InitialBlocks,
    ) -> Result<Self> {
        if comm.rank() != grid.rank() || comm.size() != grid.workers() {
            return Err(CannonError::Other(format!(
                "communicator is rank {} of {}, grid expects rank {} of {}",
                comm.rank(),
                comm.size(),
                grid.rank(),
                grid.workers()
            )));
        }
        let side = grid.block_side();
        let reference = Block::zeros(side);
        for block in [&blocks.a, &blocks.b, &blocks.c] {
            reference.check_side(block)?;
        }
        Ok(CannonStepper {
            neighbors: grid.neighbors(),
            grid,
            kernel,
            comm,
            a: blocks.a,
            b: blocks.b,
            c: blocks.c,
            a_recv: reference.clone(),
            b_recv: reference,
            state: StepState::Init,
        })
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    /// Performs the current state's work and moves to the next state.
    ///
    /// Returns the new state. Calling `step` in `Done` is a no-op.
    pub fn step(&mut self) -> Result<StepState> {
        let dim = self.grid.dim();
        self.state = match self.state {
            StepState::Init => StepState::Compute { round: 0 },
            StepState::Compute { round } => {
                self.kernel
                    .multiply_accumulate(&self.a, &self.b, &mut self.c)?;
                if round + 1 < dim {
                    StepState::Exchange { round }
                } else {
                    StepState::Done
                }
            }
            StepState::Exchange { round } => {
                self.exchange(round)?;
                StepState::Compute { round: round + 1 }
            }
            StepState::Done => StepState::Done,
        };
        Ok(self.state)
    }

    /// Runs every remaining round, bracketed by world-wide barriers.
    ///
    /// Returns the time between the two barriers, which covers the whole
    /// distributed computation rather than this worker's share of it.
    pub fn run(&mut self) -> Result<Duration> {
        self.comm.barrier()?;
        let start = Instant::now();
        while self.step()? != StepState::Done {}
        self.comm.barrier()?;
        let elapsed = start.elapsed();
        log::debug!(
            "rank {} finished {} rounds in {:?}",
            self.grid.rank(),
            self.grid.dim(),
            elapsed
        );
        Ok(elapsed)
    }

    /// Shifts A one step left and B one step up.
    fn exchange(&mut self, round: usize) -> Result<()> {
        let n = self.neighbors;
        let tag_a = exchange_tag(round, Shift::A);
        let tag_b = exchange_tag(round, Shift::B);

        let send_a = self.comm.isend(self.a.as_slice(), n.a_send_to, tag_a)?;
        let send_b = self.comm.isend(self.b.as_slice(), n.b_send_to, tag_b)?;

        self.comm
            .recv(self.a_recv.as_mut_slice(), n.a_recv_from, tag_a)?;
        self.comm
            .recv(self.b_recv.as_mut_slice(), n.b_recv_from, tag_b)?;

        send_a.wait()?;
        send_b.wait()?;

        mem::swap(&mut self.a, &mut self.a_recv);
        mem::swap(&mut self.b, &mut self.b_recv);

        if self.kernel.needs_exchange_barrier() {
            self.comm.barrier()?;
        }
        log::debug!("rank {} completed exchange {}", self.grid.rank(), round);
        Ok(())
    }

    /// Consumes the stepper and returns the C block.
    ///
    /// # Errors
    /// Returns an error if the algorithm has not reached `Done`.
    pub fn into_c_block(self) -> Result<Block> {
        if self.state != StepState::Done {
            return Err(CannonError::Other(format!(
                "rank {} has not finished (state {:?})",
                self.grid.rank(),
                self.state
            )));
        }
        Ok(self.c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{LocalComm, LocalWorld};
    use crate::config::CannonConfig;
    use crate::init::BlockInitializer;
    use crate::source::{MatrixSource, RandomIntegerFixture};
    use cn_block::{KernelKind, SequentialKernel};
    use std::sync::Mutex;
    use std::thread;

    fn stepper(
        n: usize,
        comm: LocalComm,
        kernel: Arc<dyn MultiplyKernel>,
        source: &dyn MatrixSource,
    ) -> CannonStepper<LocalComm> {
        let shape = CannonConfig::new(n, comm.size()).validate().unwrap();
        let grid = ProcessGrid::new(shape, comm.rank()).unwrap();
        let blocks = BlockInitializer::new(grid).load(source);
        CannonStepper::new(grid, comm, kernel, blocks).unwrap()
    }

    /// Runs every rank on its own thread and returns the C blocks by rank.
    fn run_world(
        n: usize,
        workers: usize,
        kernel_for: impl Fn(usize) -> Arc<dyn MultiplyKernel> + Sync,
        source: &dyn MatrixSource,
    ) -> Vec<Block> {
        let endpoints = LocalWorld::new(workers).into_endpoints();
        thread::scope(|s| {
            let handles: Vec<_> = endpoints
                .into_iter()
                .map(|comm| {
                    let kernel = kernel_for(comm.rank());
                    s.spawn(move || {
                        let mut st = stepper(n, comm, kernel, source);
                        st.run().unwrap();
                        st.into_c_block().unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    fn expected_block(n: usize, workers: usize, rank: usize, source: &dyn MatrixSource) -> Block {
        let shape = CannonConfig::new(n, workers).validate().unwrap();
        let grid = ProcessGrid::new(shape, rank).unwrap();
        Block::from_fn(shape.block_side, |i, j| {
            let (r, c) = grid.global_c_index(i, j);
            source.expected(r, c)
        })
    }

    #[test]
    fn test_single_worker_state_sequence() {
        let source = RandomIntegerFixture::new(4, 3);
        let comm = LocalWorld::new(1).into_endpoints().remove(0);
        let mut st = stepper(4, comm, Arc::new(SequentialKernel::new()), &source);

        assert_eq!(st.state(), StepState::Init);
        assert_eq!(st.step().unwrap(), StepState::Compute { round: 0 });
        assert_eq!(st.step().unwrap(), StepState::Done);
        assert_eq!(st.step().unwrap(), StepState::Done);

        // d = 1: no exchange, the result is one direct block multiply.
        let a = Block::from_fn(4, |i, j| source.a(i, j));
        let b = Block::from_fn(4, |i, j| source.b(i, j));
        let mut direct = Block::zeros(4);
        SequentialKernel::new()
            .multiply_accumulate(&a, &b, &mut direct)
            .unwrap();
        assert_eq!(st.into_c_block().unwrap(), direct);
    }

    #[test]
    fn test_state_sequence_3x3() {
        let source = RandomIntegerFixture::new(6, 5);
        let endpoints = LocalWorld::new(9).into_endpoints();
        let states = Mutex::new(Vec::new());
        thread::scope(|s| {
            for comm in endpoints {
                let source = &source;
                let states = &states;
                s.spawn(move || {
                    let rank = comm.rank();
                    let mut st = stepper(6, comm, Arc::new(SequentialKernel::new()), source);
                    let mut seen = vec![st.state()];
                    while st.state() != StepState::Done {
                        seen.push(st.step().unwrap());
                    }
                    states.lock().unwrap().push((rank, seen));
                });
            }
        });

        let expected = vec![
            StepState::Init,
            StepState::Compute { round: 0 },
            StepState::Exchange { round: 0 },
            StepState::Compute { round: 1 },
            StepState::Exchange { round: 1 },
            StepState::Compute { round: 2 },
            StepState::Done,
        ];
        let states = states.into_inner().unwrap();
        assert_eq!(states.len(), 9);
        for (_, seen) in states {
            assert_eq!(seen, expected);
        }
    }

    #[test]
    fn test_into_c_block_before_done() {
        let source = RandomIntegerFixture::new(2, 0);
        let comm = LocalWorld::new(1).into_endpoints().remove(0);
        let st = stepper(2, comm, Arc::new(SequentialKernel::new()), &source);
        assert!(st.into_c_block().is_err());
    }

    #[test]
    fn test_rejects_mismatched_communicator() {
        let shape = CannonConfig::new(4, 4).validate().unwrap();
        let grid = ProcessGrid::new(shape, 1).unwrap();
        let comm = LocalWorld::new(4).into_endpoints().remove(0);
        let blocks = BlockInitializer::new(grid).load(&RandomIntegerFixture::new(4, 0));
        assert!(CannonStepper::new(grid, comm, Arc::new(SequentialKernel::new()), blocks).is_err());
    }

    #[test]
    fn test_rejects_wrong_block_side() {
        let shape = CannonConfig::new(4, 1).validate().unwrap();
        let grid = ProcessGrid::new(shape, 0).unwrap();
        let comm = LocalWorld::new(1).into_endpoints().remove(0);
        let blocks = InitialBlocks {
            a: Block::zeros(4),
            b: Block::zeros(3),
            c: Block::zeros(4),
        };
        assert!(matches!(
            CannonStepper::new(grid, comm, Arc::new(SequentialKernel::new()), blocks),
            Err(CannonError::Block(_))
        ));
    }

    #[test]
    fn test_arbitrary_integer_product() {
        for (n, workers) in [(6, 4), (6, 9), (8, 16), (5, 25)] {
            let source = RandomIntegerFixture::new(n, n as u64 * 31 + workers as u64);
            let blocks = run_world(n, workers, |_| Arc::new(SequentialKernel::new()), &source);
            for (rank, c) in blocks.iter().enumerate() {
                assert_eq!(
                    *c,
                    expected_block(n, workers, rank, &source),
                    "n={} workers={} rank={}",
                    n,
                    workers,
                    rank
                );
            }
        }
    }

    #[test]
    fn test_every_kernel_gives_identical_blocks() {
        let source = RandomIntegerFixture::new(12, 99);
        let reference = run_world(12, 9, |_| Arc::new(SequentialKernel::new()), &source);
        for kind in [KernelKind::Parallel, KernelKind::Offload] {
            let kernel = cn_block::kernel_for(kind, Some(2)).unwrap();
            let got = run_world(12, 9, |_| Arc::clone(&kernel), &source);
            assert_eq!(got, reference, "kernel {}", kind);
        }
    }

    /// Tags each contribution with its k-index: A(r, k) = k and B(k, c) = k.
    #[derive(Debug)]
    struct KIndexSource(usize);

    impl MatrixSource for KIndexSource {
        fn name(&self) -> &str {
            "k-index"
        }
        fn matrix_dim(&self) -> usize {
            self.0
        }
        fn a(&self, _row: usize, col: usize) -> f32 {
            col as f32
        }
        fn b(&self, row: usize, _col: usize) -> f32 {
            row as f32
        }
    }

    /// Records the k-indices each multiply pairs up instead of multiplying.
    #[derive(Debug, Default)]
    struct KRecorder {
        seen: Mutex<Vec<usize>>,
    }

    impl MultiplyKernel for KRecorder {
        fn name(&self) -> &str {
            "k-recorder"
        }

        fn multiply_accumulate(&self, a: &Block, b: &Block, _c: &mut Block) -> cn_block::Result<()> {
            let side = a.side();
            let mut seen = self.seen.lock().unwrap();
            for i in 0..side {
                for t in 0..side {
                    let k_a = a.get(i, t).unwrap() as usize;
                    // Every column of B carries the same k-index for row t.
                    for j in 0..side {
                        assert_eq!(k_a, b.get(t, j).unwrap() as usize, "A and B k-blocks misaligned");
                    }
                    if i == 0 {
                        seen.push(k_a);
                    }
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_k_indices_form_a_bijection() {
        for (n, workers) in [(4, 1), (4, 4), (9, 9), (8, 16)] {
            let recorders: Vec<Arc<KRecorder>> =
                (0..workers).map(|_| Arc::new(KRecorder::default())).collect();
            run_world(
                n,
                workers,
                |rank| Arc::clone(&recorders[rank]) as Arc<dyn MultiplyKernel>,
                &KIndexSource(n),
            );
            for (rank, recorder) in recorders.iter().enumerate() {
                let mut seen = recorder.seen.lock().unwrap().clone();
                seen.sort_unstable();
                assert_eq!(
                    seen,
                    (0..n).collect::<Vec<_>>(),
                    "n={} workers={} rank={}",
                    n,
                    workers,
                    rank
                );
            }
        }
    }

    #[test]
    fn test_exchange_tags_are_distinct() {
        let mut tags: Vec<Tag> = (0..8)
            .flat_map(|r| [exchange_tag(r, Shift::A), exchange_tag(r, Shift::B)])
            .collect();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), 16);
    }
}
