use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use crate::comm::{CommError, Communicator, Delivery, SendRequest, Tag, ABORT_POLL};

/// A message in flight between two endpoints.
#[derive(Debug)]
struct Envelope {
    source: usize,
    tag: Tag,
    data: Vec<f32>,
    delivery: Arc<Delivery>,
}

/// Reusable world-wide barrier that can be broken by an abort.
#[derive(Debug)]
struct GenerationBarrier {
    size: usize,
    // (arrived, generation)
    state: Mutex<(usize, u64)>,
    cvar: Condvar,
}

impl GenerationBarrier {
    fn new(size: usize) -> Self {
        GenerationBarrier {
            size,
            state: Mutex::new((0, 0)),
            cvar: Condvar::new(),
        }
    }

    fn wait(&self, aborted: &AtomicBool) -> Result<(), CommError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let generation = state.1;
        state.0 += 1;
        if state.0 == self.size {
            state.0 = 0;
            state.1 = state.1.wrapping_add(1);
            self.cvar.notify_all();
            return Ok(());
        }
        while state.1 == generation {
            if aborted.load(Ordering::Acquire) {
                return Err(CommError::Aborted);
            }
            state = self
                .cvar
                .wait_timeout(state, ABORT_POLL)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Shared {
    aborted: Arc<AtomicBool>,
    barrier: GenerationBarrier,
}

impl Shared {
    fn abort(&self) {
        if !self.aborted.swap(true, Ordering::AcqRel) {
            log::warn!("aborting run");
        }
        self.barrier.cvar.notify_all();
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }
}

/// An in-process world of `size` workers connected by channels.
///
/// Each worker gets one `LocalComm` endpoint, typically moved onto its own
/// thread. No memory is shared between endpoints: every message is a copy.
#[derive(Debug)]
pub struct LocalWorld {
    endpoints: Vec<LocalComm>,
    shared: Arc<Shared>,
}

impl LocalWorld {
    pub fn new(size: usize) -> Self {
        let shared = Arc::new(Shared {
            aborted: Arc::new(AtomicBool::new(false)),
            barrier: GenerationBarrier::new(size),
        });
        let (senders, inboxes): (Vec<Sender<Envelope>>, Vec<Receiver<Envelope>>) =
            (0..size).map(|_| mpsc::channel()).unzip();
        let endpoints = inboxes
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| LocalComm {
                rank,
                size,
                peers: senders.clone(),
                inbox,
                pending: Vec::new(),
                shared: Arc::clone(&shared),
            })
            .collect();
        LocalWorld { endpoints, shared }
    }

    pub fn size(&self) -> usize {
        self.endpoints.len()
    }

    /// A handle that can abort the world after the endpoints are handed out.
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Hands out the endpoints, ordered by rank.
    pub fn into_endpoints(self) -> Vec<LocalComm> {
        self.endpoints
    }
}

/// Aborts a `LocalWorld` from outside any worker.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    shared: Arc<Shared>,
}

impl AbortHandle {
    pub fn abort(&self) {
        self.shared.abort();
    }

    pub fn is_aborted(&self) -> bool {
        self.shared.is_aborted()
    }
}

/// One worker's endpoint in a `LocalWorld`.
#[derive(Debug)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    peers: Vec<Sender<Envelope>>,
    inbox: Receiver<Envelope>,
    // Arrived but not yet matched by a recv.
    pending: Vec<Envelope>,
    shared: Arc<Shared>,
}

impl LocalComm {
    fn check_peer(&self, peer: usize) -> Result<(), CommError> {
        if peer >= self.size {
            return Err(CommError::InvalidPeer {
                peer,
                size: self.size,
            });
        }
        Ok(())
    }

    fn deliver(envelope: Envelope, buf: &mut [f32]) -> Result<(), CommError> {
        if envelope.data.len() != buf.len() {
            return Err(CommError::LengthMismatch {
                expected: buf.len(),
                got: envelope.data.len(),
            });
        }
        buf.copy_from_slice(&envelope.data);
        envelope.delivery.complete();
        Ok(())
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) -> Result<(), CommError> {
        self.shared.barrier.wait(&self.shared.aborted)
    }

    fn isend(&self, data: &[f32], dest: usize, tag: Tag) -> Result<SendRequest, CommError> {
        self.check_peer(dest)?;
        if self.shared.is_aborted() {
            return Err(CommError::Aborted);
        }
        let delivery = Arc::new(Delivery::default());
        let envelope = Envelope {
            source: self.rank,
            tag,
            data: data.to_vec(),
            delivery: Arc::clone(&delivery),
        };
        self.peers[dest]
            .send(envelope)
            .map_err(|_| CommError::Disconnected { peer: dest })?;
        log::trace!("rank {} posted {} values to {} (tag {})", self.rank, data.len(), dest, tag);
        Ok(SendRequest::new(delivery, Arc::clone(&self.shared.aborted)))
    }

    fn recv(&mut self, buf: &mut [f32], source: usize, tag: Tag) -> Result<(), CommError> {
        self.check_peer(source)?;
        if let Some(pos) = self
            .pending
            .iter()
            .position(|e| e.source == source && e.tag == tag)
        {
            let envelope = self.pending.remove(pos);
            return Self::deliver(envelope, buf);
        }
        loop {
            match self.inbox.recv_timeout(ABORT_POLL) {
                Ok(envelope) if envelope.source == source && envelope.tag == tag => {
                    log::trace!("rank {} matched message from {} (tag {})", self.rank, source, tag);
                    return Self::deliver(envelope, buf);
                }
                Ok(envelope) => self.pending.push(envelope),
                Err(RecvTimeoutError::Timeout) => {
                    if self.shared.is_aborted() {
                        return Err(CommError::Aborted);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(CommError::Disconnected { peer: source });
                }
            }
        }
    }

    fn abort(&self) {
        self.shared.abort();
    }
}
