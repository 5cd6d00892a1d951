//! Single-flight gate for consent negotiations.
//!
//! The [`RequestSequencer`] lets at most one consent prompt be open at any
//! time. It issues a single permit through a Tokio semaphore; waiters are
//! served in arrival order. The permit is released when dropped, so every exit
//! path of a negotiation (including cancellation) frees the gate.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, trace};

/// Permission to run one consent negotiation.
///
/// When dropped, the permit is automatically returned to the sequencer.
#[derive(Debug)]
pub struct ConsentPermit {
    ticket: u64,
    _permit: OwnedSemaphorePermit,
}

impl ConsentPermit {
    /// Arrival order of the holder, starting at 1.
    pub const fn ticket(&self) -> u64 {
        self.ticket
    }
}

impl Drop for ConsentPermit {
    fn drop(&mut self) {
        trace!(ticket = self.ticket, "Consent permit released");
    }
}

/// Process-wide mutual exclusion for consent prompts.
#[derive(Debug)]
pub struct RequestSequencer {
    semaphore: Arc<Semaphore>,
    next_ticket: AtomicU64,
    waiting: AtomicUsize,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
            next_ticket: AtomicU64::new(1),
            waiting: AtomicUsize::new(0),
        }
    }

    /// Acquire the gate, waiting behind earlier arrivals.
    pub async fn acquire(&self) -> Result<ConsentPermit, SequencerError> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        self.waiting.fetch_add(1, Ordering::Relaxed);

        let result = Arc::clone(&self.semaphore).acquire_owned().await;
        self.waiting.fetch_sub(1, Ordering::Relaxed);

        let permit = result.map_err(|_| SequencerError::Closed)?;
        debug!(ticket, "Consent permit acquired");
        Ok(ConsentPermit {
            ticket,
            _permit: permit,
        })
    }

    /// Acquire the gate only if it is free right now.
    pub fn try_acquire(&self) -> Option<ConsentPermit> {
        let permit = Arc::clone(&self.semaphore).try_acquire_owned().ok()?;
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        Some(ConsentPermit {
            ticket,
            _permit: permit,
        })
    }

    /// Release a permit explicitly. Equivalent to dropping it.
    pub fn release(&self, permit: ConsentPermit) {
        drop(permit);
    }

    /// Whether a negotiation currently holds the gate.
    pub fn is_held(&self) -> bool {
        self.semaphore.available_permits() == 0
    }

    /// Number of callers waiting for the gate.
    pub fn queued(&self) -> usize {
        self.waiting.load(Ordering::Relaxed)
    }

    /// Refuse further acquisitions; pending waiters fail with [`SequencerError::Closed`].
    pub fn close(&self) {
        self.semaphore.close();
        debug!("Request sequencer closed");
    }
}

impl Default for RequestSequencer {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors from the request sequencer.
#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    /// The semaphore was closed (background context shutting down).
    #[error("Request sequencer has been closed")]
    Closed,
}
