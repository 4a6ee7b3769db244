pub mod parallel;

pub use parallel::ParallelKernel;

use crate::backend::{check_operands, MultiplyKernel};
use crate::block::Block;
use crate::error::Result;

/// Pure-Rust serial multiply backend.
///
/// A straightforward triple loop, intended as the reference implementation
/// every other backend is checked against.
#[derive(Debug, Clone)]
pub struct SequentialKernel;

impl SequentialKernel {
    pub fn new() -> Self {
        SequentialKernel
    }
}

impl Default for SequentialKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiplyKernel for SequentialKernel {
    fn name(&self) -> &str {
        "sequential"
    }

    fn multiply_accumulate(&self, a: &Block, b: &Block, c: &mut Block) -> Result<()> {
        check_operands(a, b, c)?;
        let n = c.side();
        let (a, b) = (a.as_slice(), b.as_slice());
        for (i, c_row) in c.as_mut_slice().chunks_mut(n.max(1)).enumerate() {
            accumulate_row(&a[i * n..(i + 1) * n], b, c_row);
        }
        Ok(())
    }
}

/// `c_row += a_row @ b` for one output row.
///
/// Loops in i-k-j order so `b` is read row by row; every cell still sees its
/// k terms in ascending order.
pub(crate) fn accumulate_row(a_row: &[f32], b: &[f32], c_row: &mut [f32]) {
    let n = c_row.len();
    for (k, &a_ik) in a_row.iter().enumerate() {
        let b_row = &b[k * n..(k + 1) * n];
        for (c_ij, &b_kj) in c_row.iter_mut().zip(b_row) {
            *c_ij += a_ik * b_kj;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(side: usize, data: &[f32]) -> Block {
        Block::from_vec(side, data.to_vec()).unwrap()
    }

    #[test]
    fn test_identity() {
        let k = SequentialKernel::new();
        let a = block(2, &[1.0, 0.0, 0.0, 1.0]);
        let x = block(2, &[1.0, 2.0, 3.0, 4.0]);
        let mut c = Block::zeros(2);
        k.multiply_accumulate(&a, &x, &mut c).unwrap();
        assert_eq!(c.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_basic() {
        let k = SequentialKernel::new();
        // [1,2;3,4] @ [5,6;7,8] = [19,22;43,50]
        let a = block(2, &[1.0, 2.0, 3.0, 4.0]);
        let b = block(2, &[5.0, 6.0, 7.0, 8.0]);
        let mut c = Block::zeros(2);
        k.multiply_accumulate(&a, &b, &mut c).unwrap();
        assert_eq!(c.as_slice(), &[19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_accumulates_across_calls() {
        let k = SequentialKernel::new();
        let a = block(2, &[1.0, 2.0, 3.0, 4.0]);
        let b = block(2, &[5.0, 6.0, 7.0, 8.0]);
        let mut c = block(2, &[1.0, 1.0, 1.0, 1.0]);
        k.multiply_accumulate(&a, &b, &mut c).unwrap();
        k.multiply_accumulate(&a, &b, &mut c).unwrap();
        assert_eq!(c.as_slice(), &[39.0, 45.0, 87.0, 101.0]);
    }

    #[test]
    fn test_side_mismatch() {
        let k = SequentialKernel::new();
        let mut c = Block::zeros(2);
        assert!(k
            .multiply_accumulate(&Block::zeros(3), &Block::zeros(2), &mut c)
            .is_err());
    }

    #[test]
    fn test_empty_block() {
        let k = SequentialKernel::new();
        let mut c = Block::zeros(0);
        k.multiply_accumulate(&Block::zeros(0), &Block::zeros(0), &mut c)
            .unwrap();
        assert!(c.is_empty());
    }
}
