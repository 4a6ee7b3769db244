use cn_block::Block;

use crate::source::MatrixSource;
use crate::topology::ProcessGrid;

/// The three working blocks of one worker, ready for round 0.
#[derive(Debug, Clone)]
pub struct InitialBlocks {
    pub a: Block,
    pub b: Block,
    pub c: Block,
}

/// Loads a worker's pre-skewed A and B blocks.
///
/// For the worker at (row, col) with skew s = (row + col) mod d:
/// - A-block cell (i, j) holds A(row·b + i, s·b + j)
/// - B-block cell (i, j) holds B(s·b + i, col·b + j)
///
/// so that round 0 multiplies matching k-blocks with no special case, and
/// every later shift keeps them matched.
#[derive(Debug, Clone, Copy)]
pub struct BlockInitializer {
    grid: ProcessGrid,
}

impl BlockInitializer {
    pub fn new(grid: ProcessGrid) -> Self {
        BlockInitializer { grid }
    }

    /// Global (row, col) of A-block cell `(i, j)` before any shift.
    pub fn a_index(&self, i: usize, j: usize) -> (usize, usize) {
        let coord = self.grid.coordinate();
        let b = self.grid.block_side();
        let skew = coord.k_block(self.grid.dim(), 0);
        (coord.row * b + i, skew * b + j)
    }

    /// Global (row, col) of B-block cell `(i, j)` before any shift.
    pub fn b_index(&self, i: usize, j: usize) -> (usize, usize) {
        let coord = self.grid.coordinate();
        let b = self.grid.block_side();
        let skew = coord.k_block(self.grid.dim(), 0);
        (skew * b + i, coord.col * b + j)
    }

    pub fn a_block(&self, source: &dyn MatrixSource) -> Block {
        Block::from_fn(self.grid.block_side(), |i, j| {
            let (r, c) = self.a_index(i, j);
            source.a(r, c)
        })
    }

    pub fn b_block(&self, source: &dyn MatrixSource) -> Block {
        Block::from_fn(self.grid.block_side(), |i, j| {
            let (r, c) = self.b_index(i, j);
            source.b(r, c)
        })
    }

    /// Skewed A and B plus a zeroed C accumulator.
    pub fn load(&self, source: &dyn MatrixSource) -> InitialBlocks {
        InitialBlocks {
            a: self.a_block(source),
            b: self.b_block(source),
            c: Block::zeros(self.grid.block_side()),
        }
    }
}
