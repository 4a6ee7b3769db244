use cn_block::KernelKind;

use crate::error::{CannonError, Result};

/// Matrix side length used when none is configured.
pub const DEFAULT_MATRIX_DIM: usize = 1024;

/// Worker count used when none is configured.
pub const DEFAULT_WORKERS: usize = 4;

/// Runtime configuration for one Cannon run.
///
/// Everything that sizes buffers is supplied here at startup rather than
/// baked in at build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CannonConfig {
    /// Side length N of the square matrices A, B and C.
    pub matrix_dim: usize,
    /// Number of workers P. Must be a perfect square d².
    pub workers: usize,
    /// Local multiply backend.
    pub kernel: KernelKind,
    /// Thread count for the parallel/offload backends (`None` = one per core).
    pub threads: Option<usize>,
}

impl Default for CannonConfig {
    fn default() -> Self {
        CannonConfig {
            matrix_dim: DEFAULT_MATRIX_DIM,
            workers: DEFAULT_WORKERS,
            kernel: KernelKind::default(),
            threads: None,
        }
    }
}

impl CannonConfig {
    pub fn new(matrix_dim: usize, workers: usize) -> Self {
        CannonConfig {
            matrix_dim,
            workers,
            ..Default::default()
        }
    }

    pub fn with_kernel(mut self, kernel: KernelKind) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// Check the configuration and derive the grid geometry.
    ///
    /// Fails with:
    /// - `NotPerfectSquare` if `workers` is not d² for some d >= 1
    /// - `IndivisibleMatrix` if d does not divide `matrix_dim`
    /// - `InvalidConfig` for a zero matrix size or a zero thread count
    pub fn validate(&self) -> Result<GridShape> {
        if self.matrix_dim == 0 {
            return Err(CannonError::InvalidConfig(
                "matrix dimension must be > 0".to_string(),
            ));
        }
        if self.threads == Some(0) {
            return Err(CannonError::InvalidConfig(
                "thread count must be > 0".to_string(),
            ));
        }
        let dim = exact_sqrt(self.workers).ok_or(CannonError::NotPerfectSquare(self.workers))?;
        if self.matrix_dim % dim != 0 {
            return Err(CannonError::IndivisibleMatrix {
                n: self.matrix_dim,
                dim,
            });
        }
        Ok(GridShape {
            matrix_dim: self.matrix_dim,
            dim,
            block_side: self.matrix_dim / dim,
        })
    }
}

/// Validated geometry shared by every worker of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    /// Matrix side length N.
    pub matrix_dim: usize,
    /// Grid dimension d (workers = d²).
    pub dim: usize,
    /// Block side length b = N / d.
    pub block_side: usize,
}

impl GridShape {
    /// Number of workers, d².
    pub fn workers(&self) -> usize {
        self.dim * self.dim
    }
}

/// Returns `Some(d)` if `n == d * d` for some `d >= 1`.
fn exact_sqrt(n: usize) -> Option<usize> {
    if n == 0 {
        return None;
    }
    let mut d = (n as f64).sqrt() as usize;
    // Correct for floating-point rounding on large inputs. A square that
    // overflows usize is larger than n.
    while d.checked_mul(d).map_or(true, |sq| sq > n) {
        d -= 1;
    }
    while (d + 1).checked_mul(d + 1).is_some_and(|sq| sq <= n) {
        d += 1;
    }
    (d * d == n).then_some(d)
}
