use std::fmt;

use crate::error::{BlockError, Result};

/// One square tile of a distributed matrix.
///
/// Holds `side * side` contiguous, row-major f32 values. Blocks are sized
/// once at startup and then mutated in place; exchanges replace a block's
/// contents wholesale by swapping it with a receive buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    side: usize,
    data: Vec<f32>,
}

impl Block {
    /// Create a zero-filled block of the given side length.
    pub fn zeros(side: usize) -> Self {
        Block {
            side,
            data: vec![0.0; side * side],
        }
    }

    /// Create a block from row-major data.
    ///
    /// # Errors
    /// Returns an error if `data.len() != side * side`.
    pub fn from_vec(side: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != side * side {
            return Err(BlockError::DataLength {
                side,
                len: data.len(),
            });
        }
        Ok(Block { side, data })
    }

    /// Create a block by evaluating `f(i, j)` for every local cell.
    pub fn from_fn(side: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(side * side);
        for i in 0..side {
            for j in 0..side {
                data.push(f(i, j));
            }
        }
        Block { side, data }
    }

    /// Side length of the block.
    pub fn side(&self) -> usize {
        self.side
    }

    /// Total number of cells (`side * side`).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the block has no cells.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value of cell `(i, j)`, or `None` if it lies outside the block.
    pub fn get(&self, i: usize, j: usize) -> Option<f32> {
        if i >= self.side || j >= self.side {
            return None;
        }
        Some(self.data[i * self.side + j])
    }

    /// Overwrite cell `(i, j)`.
    pub fn set(&mut self, i: usize, j: usize, value: f32) -> Result<()> {
        if i >= self.side || j >= self.side {
            return Err(BlockError::OutOfRange {
                row: i,
                col: j,
                side: self.side,
            });
        }
        self.data[i * self.side + j] = value;
        Ok(())
    }

    /// Row `i` as a slice.
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.side..(i + 1) * self.side]
    }

    /// The row-major data as a slice.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// The row-major data as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Checks that `other` has the same side length as `self`.
    pub fn check_side(&self, other: &Block) -> Result<()> {
        if self.side != other.side {
            return Err(BlockError::SideMismatch {
                expected: self.side,
                got: other.side,
            });
        }
        Ok(())
    }
}

/// Prints the block as a labelled grid of integers, one row per line.
impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " j:")?;
        for j in 0..self.side {
            write!(f, "{:<4}", j)?;
        }
        write!(f, "\ni ")?;
        for _ in 0..self.side {
            write!(f, "----")?;
        }
        for i in 0..self.side {
            write!(f, "\n{}| ", i)?;
            for v in self.row(i) {
                write!(f, "{:03} ", *v as i64)?;
            }
        }
        writeln!(f)
    }
}
