use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlockError {
    #[error("block side mismatch: expected {expected}, got {got}")]
    SideMismatch { expected: usize, got: usize },
    #[error("block data length {len} does not match side {side}")]
    DataLength { side: usize, len: usize },
    #[error("cell ({row}, {col}) out of range for block of side {side}")]
    OutOfRange { row: usize, col: usize, side: usize },
    #[error("unknown kernel kind: {0}")]
    UnknownKernel(String),
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, BlockError>;
