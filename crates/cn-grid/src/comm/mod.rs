//! Point-to-point message passing between the workers of one run.
//!
//! Modelled on MPI: every worker owns an endpoint that knows its rank and
//! the world size, can post non-blocking sends, blocking receives matched
//! by (source, tag), and can enter a world-wide barrier. Communication is
//! assumed reliable; any failure is fatal to the run.

pub mod local;

pub use local::{AbortHandle, LocalComm, LocalWorld};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;

/// Message tag used to tell apart messages between the same pair of ranks.
pub type Tag = u32;

/// How long blocked operations sleep between checks of the abort flag.
pub(crate) const ABORT_POLL: Duration = Duration::from_millis(10);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommError {
    #[error("peer {peer} disconnected")]
    Disconnected { peer: usize },
    #[error("run aborted by another worker")]
    Aborted,
    #[error("invalid peer rank {peer} for world of size {size}")]
    InvalidPeer { peer: usize, size: usize },
    #[error("message length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },
}

/// One worker's endpoint into the world.
pub trait Communicator: Send {
    /// This worker's rank in `[0, size)`.
    fn rank(&self) -> usize;

    /// Number of workers in the world.
    fn size(&self) -> usize;

    /// Blocks until every worker has entered the barrier.
    fn barrier(&self) -> Result<(), CommError>;

    /// Posts a copy of `data` to `dest` and returns immediately.
    ///
    /// The returned request completes once `dest` has matched the message.
    fn isend(&self, data: &[f32], dest: usize, tag: Tag) -> Result<SendRequest, CommError>;

    /// Blocks until a message from `source` with `tag` arrives and copies it
    /// into `buf`, whose length must equal the message length.
    fn recv(&mut self, buf: &mut [f32], source: usize, tag: Tag) -> Result<(), CommError>;

    /// Tears down the whole run: every blocked operation on every worker
    /// fails with `CommError::Aborted`.
    fn abort(&self);
}

/// Completion flag shared by a sender and the message it posted.
#[derive(Debug, Default)]
pub(crate) struct Delivery {
    done: Mutex<bool>,
    cvar: Condvar,
}

impl Delivery {
    pub(crate) fn complete(&self) {
        *self.done.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.cvar.notify_all();
    }

    fn wait(&self, aborted: &AtomicBool) -> Result<(), CommError> {
        let mut done = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        while !*done {
            if aborted.load(Ordering::Acquire) {
                return Err(CommError::Aborted);
            }
            done = self
                .cvar
                .wait_timeout(done, ABORT_POLL)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        Ok(())
    }
}

/// Handle to an in-flight non-blocking send.
#[derive(Debug)]
#[must_use = "a send request must be waited on"]
pub struct SendRequest {
    delivery: Arc<Delivery>,
    aborted: Arc<AtomicBool>,
}

impl SendRequest {
    pub(crate) fn new(delivery: Arc<Delivery>, aborted: Arc<AtomicBool>) -> Self {
        SendRequest { delivery, aborted }
    }

    /// Returns true if the destination has already matched the message.
    pub fn is_complete(&self) -> bool {
        *self
            .delivery
            .done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until the destination has matched the message.
    pub fn wait(self) -> Result<(), CommError> {
        self.delivery.wait(&self.aborted)
    }
}
