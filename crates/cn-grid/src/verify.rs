use cn_block::Block;

use crate::error::{CannonError, Result};
use crate::source::MatrixSource;
use crate::topology::ProcessGrid;

/// Checks a worker's final C block cell by cell against a reference source.
#[derive(Debug, Clone, Copy)]
pub struct ResultVerifier {
    grid: ProcessGrid,
}

impl ResultVerifier {
    pub fn new(grid: ProcessGrid) -> Self {
        ResultVerifier { grid }
    }

    /// Compares every cell of `c` with `source.expected` at the cell's global
    /// coordinates, using exact equality.
    ///
    /// # Errors
    /// Returns `CannonError::Mismatch` for the first differing cell in
    /// row-major order, carrying its global (row, col).
    pub fn verify(&self, c: &Block, source: &dyn MatrixSource) -> Result<()> {
        let side = self.grid.block_side();
        if c.side() != side {
            return Err(CannonError::Block(cn_block::BlockError::SideMismatch {
                expected: side,
                got: c.side(),
            }));
        }
        for i in 0..side {
            for (j, &got) in c.row(i).iter().enumerate() {
                let (row, col) = self.grid.global_c_index(i, j);
                let expected = source.expected(row, col);
                if got != expected {
                    log::error!(
                        "rank {}: mismatch at ({}, {}): expected {}, got {}",
                        self.grid.rank(),
                        row,
                        col,
                        expected,
                        got
                    );
                    return Err(CannonError::Mismatch {
                        rank: self.grid.rank(),
                        row,
                        col,
                        expected,
                        got,
                    });
                }
            }
        }
        Ok(())
    }
}
