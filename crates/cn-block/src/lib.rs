//! `cn-block` - Matrix blocks and pluggable local multiply kernels for cannon-matmul.
//!
//! This crate provides:
//! - A `Block` type: one square, row-major tile of a distributed matrix
//! - A `MultiplyKernel` trait for pluggable multiply-accumulate backends
//! - `SequentialKernel`, `ParallelKernel` (rayon) and `OffloadKernel`
//! - `KernelKind` for selecting a backend from configuration

pub mod backend;
pub mod block;
pub mod cpu;
pub mod error;
pub mod kind;
pub mod offload;

// Re-export primary types at the crate root for convenience.
pub use backend::MultiplyKernel;
pub use block::Block;
pub use cpu::{ParallelKernel, SequentialKernel};
pub use error::{BlockError, Result};
pub use kind::KernelKind;
pub use offload::OffloadKernel;

use std::sync::Arc;

/// Build the kernel selected by `kind`.
///
/// `threads` sizes the thread pool of the parallel and offload backends;
/// `None` lets rayon pick one thread per core. The sequential backend
/// ignores it.
pub fn kernel_for(kind: KernelKind, threads: Option<usize>) -> Result<Arc<dyn MultiplyKernel>> {
    let kernel: Arc<dyn MultiplyKernel> = match kind {
        KernelKind::Sequential => Arc::new(SequentialKernel::new()),
        KernelKind::Parallel => Arc::new(ParallelKernel::new(threads)?),
        KernelKind::Offload => Arc::new(OffloadKernel::new(threads)?),
    };
    log::debug!("built {} kernel", kernel.name());
    Ok(kernel)
}
