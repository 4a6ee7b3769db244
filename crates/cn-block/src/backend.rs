use std::fmt::Debug;

use crate::block::Block;
use crate::error::Result;

/// Trait for pluggable local multiply backends (serial, rayon, offload).
///
/// A kernel computes the block-level product of the current A and B blocks
/// and accumulates it into the C block:
///
///   C[i][j] += sum over k of A[i][k] * B[k][j]
///
/// It is called once per round and must never overwrite C. Output cells are
/// write-disjoint, so a backend may split the i/j loops however it likes as
/// long as each cell's k-reduction has a single owner.
pub trait MultiplyKernel: Send + Sync + Debug {
    /// Returns the name of this backend (e.g., "sequential", "offload").
    fn name(&self) -> &str;

    /// Multiply-accumulate: `c += a @ b`.
    ///
    /// # Errors
    /// Returns an error if the three blocks do not share one side length.
    fn multiply_accumulate(&self, a: &Block, b: &Block, c: &mut Block) -> Result<()>;

    /// Whether the exchange step must end with a global barrier before the
    /// next multiply. Backends that compute out of host-side staging buffers
    /// return true.
    fn needs_exchange_barrier(&self) -> bool {
        false
    }
}

/// Validates that `a`, `b` and `c` all have the same side length.
pub(crate) fn check_operands(a: &Block, b: &Block, c: &Block) -> Result<()> {
    c.check_side(a)?;
    c.check_side(b)
}
