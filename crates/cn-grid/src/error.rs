use thiserror::Error;

use crate::comm::CommError;

#[derive(Error, Debug)]
pub enum CannonError {
    #[error("worker count {0} is not a perfect square")]
    NotPerfectSquare(usize),
    #[error("matrix dimension {n} is not divisible by grid dimension {dim}")]
    IndivisibleMatrix { n: usize, dim: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("rank {rank} out of range for {workers} workers")]
    RankOutOfRange { rank: usize, workers: usize },
    #[error("communication error: {0}")]
    Comm(#[from] CommError),
    #[error("block error: {0}")]
    Block(#[from] cn_block::BlockError),
    #[error(
        "error computing matrix multiplication on rank {rank}: i={row} j={col} \
         (expected {expected}, got {got})"
    )]
    Mismatch {
        rank: usize,
        row: usize,
        col: usize,
        expected: f32,
        got: f32,
    },
    #[error("worker {0} panicked")]
    WorkerPanicked(usize),
    #[error("{0}")]
    Other(String),
}

impl CannonError {
    /// True for verification mismatches, as opposed to configuration or
    /// communication failures.
    pub fn is_mismatch(&self) -> bool {
        matches!(self, CannonError::Mismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, CannonError>;
