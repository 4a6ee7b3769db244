use crate::config::GridShape;
use crate::error::{CannonError, Result};

/// Position of one worker in the d x d process grid.
///
/// Ranks are numbered row-major: `rank = row * d + col`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCoordinate {
    pub row: usize,
    pub col: usize,
}

impl GridCoordinate {
    pub fn from_rank(rank: usize, dim: usize) -> Self {
        GridCoordinate {
            row: rank / dim,
            col: rank % dim,
        }
    }

    pub fn rank(&self, dim: usize) -> usize {
        self.row * dim + self.col
    }

    /// Index of the k-block this worker holds after `round` shifts:
    /// `(row + col + round) mod d`.
    ///
    /// Round 0 is the initial skew. Each shift moves A one step left and B
    /// one step up, which advances the index by one.
    pub fn k_block(&self, dim: usize, round: usize) -> usize {
        (self.row + self.col + round) % dim
    }
}

/// Ranks a worker exchanges blocks with.
///
/// A travels left along the row, B travels up along the column, both
/// wrapping around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborSet {
    pub a_send_to: usize,
    pub a_recv_from: usize,
    pub b_send_to: usize,
    pub b_recv_from: usize,
}

impl NeighborSet {
    /// Computes the neighbor ranks of `rank` in a grid of dimension `dim`.
    ///
    /// `rank` must be in `[0, dim²)`.
    pub fn of(rank: usize, dim: usize) -> Self {
        let last_row = dim * (dim - 1);
        let a_send_to = if rank % dim == 0 {
            rank + dim - 1
        } else {
            rank - 1
        };
        let a_recv_from = if (rank + 1) % dim == 0 {
            rank + 1 - dim
        } else {
            rank + 1
        };
        let b_send_to = if rank < dim {
            rank + last_row
        } else {
            rank - dim
        };
        let b_recv_from = if rank >= last_row {
            rank - last_row
        } else {
            rank + dim
        };
        NeighborSet {
            a_send_to,
            a_recv_from,
            b_send_to,
            b_recv_from,
        }
    }
}

/// Immutable per-worker view of the run: who am I and how big is the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessGrid {
    shape: GridShape,
    rank: usize,
}

impl ProcessGrid {
    /// # Errors
    /// Returns `RankOutOfRange` if `rank >= shape.workers()`.
    pub fn new(shape: GridShape, rank: usize) -> Result<Self> {
        if rank >= shape.workers() {
            return Err(CannonError::RankOutOfRange {
                rank,
                workers: shape.workers(),
            });
        }
        Ok(ProcessGrid { shape, rank })
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn workers(&self) -> usize {
        self.shape.workers()
    }

    pub fn dim(&self) -> usize {
        self.shape.dim
    }

    pub fn block_side(&self) -> usize {
        self.shape.block_side
    }

    pub fn matrix_dim(&self) -> usize {
        self.shape.matrix_dim
    }

    pub fn coordinate(&self) -> GridCoordinate {
        GridCoordinate::from_rank(self.rank, self.shape.dim)
    }

    pub fn neighbors(&self) -> NeighborSet {
        NeighborSet::of(self.rank, self.shape.dim)
    }

    /// Global (row, col) of local C-block cell `(i, j)`.
    pub fn global_c_index(&self, i: usize, j: usize) -> (usize, usize) {
        let coord = self.coordinate();
        let b = self.shape.block_side;
        (coord.row * b + i, coord.col * b + j)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(dim: usize) -> GridShape {
        GridShape {
            matrix_dim: dim * 2,
            dim,
            block_side: 2,
        }
    }

    #[test]
    fn test_coordinate_roundtrip() {
        for rank in 0..9 {
            let c = GridCoordinate::from_rank(rank, 3);
            assert!(c.row < 3 && c.col < 3);
            assert_eq!(c.rank(3), rank);
        }
        assert_eq!(
            GridCoordinate::from_rank(5, 3),
            GridCoordinate { row: 1, col: 2 }
        );
    }

    #[test]
    fn test_neighbors_3x3() {
        // 0 1 2
        // 3 4 5
        // 6 7 8
        assert_eq!(
            NeighborSet::of(0, 3),
            NeighborSet {
                a_send_to: 2,
                a_recv_from: 1,
                b_send_to: 6,
                b_recv_from: 3,
            }
        );
        assert_eq!(
            NeighborSet::of(4, 3),
            NeighborSet {
                a_send_to: 3,
                a_recv_from: 5,
                b_send_to: 1,
                b_recv_from: 7,
            }
        );
        assert_eq!(
            NeighborSet::of(8, 3),
            NeighborSet {
                a_send_to: 7,
                a_recv_from: 6,
                b_send_to: 5,
                b_recv_from: 2,
            }
        );
    }

    #[test]
    fn test_single_worker_is_own_neighbor() {
        assert_eq!(
            NeighborSet::of(0, 1),
            NeighborSet {
                a_send_to: 0,
                a_recv_from: 0,
                b_send_to: 0,
                b_recv_from: 0,
            }
        );
    }

    #[test]
    fn test_send_and_recv_are_inverse() {
        for dim in 1..=5 {
            for rank in 0..dim * dim {
                let n = NeighborSet::of(rank, dim);
                assert_eq!(NeighborSet::of(n.a_send_to, dim).a_recv_from, rank);
                assert_eq!(NeighborSet::of(n.b_send_to, dim).b_recv_from, rank);
            }
        }
    }

    #[test]
    fn test_shift_cycles_have_length_dim() {
        for dim in 1..=6 {
            for rank in 0..dim * dim {
                let start = GridCoordinate::from_rank(rank, dim);

                let mut a_at = rank;
                let mut b_at = rank;
                for step in 1..=dim {
                    a_at = NeighborSet::of(a_at, dim).a_send_to;
                    b_at = NeighborSet::of(b_at, dim).b_send_to;
                    // A stays in its row, B stays in its column.
                    assert_eq!(GridCoordinate::from_rank(a_at, dim).row, start.row);
                    assert_eq!(GridCoordinate::from_rank(b_at, dim).col, start.col);
                    if step < dim {
                        assert_ne!(a_at, rank);
                        assert_ne!(b_at, rank);
                    }
                }
                assert_eq!(a_at, rank);
                assert_eq!(b_at, rank);
            }
        }
    }

    #[test]
    fn test_process_grid() {
        let grid = ProcessGrid::new(shape(2), 3).unwrap();
        assert_eq!(grid.workers(), 4);
        assert_eq!(grid.coordinate(), GridCoordinate { row: 1, col: 1 });
        assert_eq!(grid.global_c_index(1, 0), (3, 2));
        assert_eq!(grid.neighbors(), NeighborSet::of(3, 2));
    }

    #[test]
    fn test_rank_out_of_range() {
        assert!(matches!(
            ProcessGrid::new(shape(2), 4),
            Err(CannonError::RankOutOfRange { rank: 4, workers: 4 })
        ));
    }

    #[test]
    fn test_k_block() {
        let c = GridCoordinate { row: 1, col: 2 };
        assert_eq!(c.k_block(3, 0), 0);
        assert_eq!(c.k_block(3, 1), 1);
        assert_eq!(c.k_block(3, 2), 2);
        assert_eq!(c.k_block(4, 0), 3);
    }
}
