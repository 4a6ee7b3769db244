use rayon::prelude::*;
use rayon::ThreadPool;

use crate::backend::{check_operands, MultiplyKernel};
use crate::block::Block;
use crate::cpu::accumulate_row;
use crate::error::Result;

/// Shared-memory parallel backend.
///
/// Splits the C block into rows and hands them to a rayon pool. Each row is
/// owned by exactly one task, so no cell is ever written concurrently and the
/// per-cell summation order matches `SequentialKernel` bit for bit.
#[derive(Debug)]
pub struct ParallelKernel {
    pool: ThreadPool,
}

impl ParallelKernel {
    /// Create a kernel with its own pool of `threads` workers (`None` means
    /// one per core).
    pub fn new(threads: Option<usize>) -> Result<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("cn-parallel-{}", i));
        if let Some(n) = threads {
            builder = builder.num_threads(n);
        }
        Ok(ParallelKernel {
            pool: builder.build()?,
        })
    }

    /// Number of threads in the pool.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl MultiplyKernel for ParallelKernel {
    fn name(&self) -> &str {
        "parallel"
    }

    fn multiply_accumulate(&self, a: &Block, b: &Block, c: &mut Block) -> Result<()> {
        check_operands(a, b, c)?;
        let n = c.side();
        if n == 0 {
            return Ok(());
        }
        let (a, b) = (a.as_slice(), b.as_slice());
        self.pool.install(|| {
            c.as_mut_slice()
                .par_chunks_mut(n)
                .enumerate()
                .for_each(|(i, c_row)| accumulate_row(&a[i * n..(i + 1) * n], b, c_row));
        });
        Ok(())
    }
}
