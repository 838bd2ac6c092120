//! Pairs handshake requests with their asynchronous outcomes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::auth::AuthRequest;
use crate::errors::RequestError;

/// What the transport reports back for a handshake request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The request was accepted.  The resulting state change arrives
    /// separately as an authorization state update.
    Ok,
    /// The request failed.
    Error(RequestError),
    /// Anything else; the handshake never expects it.
    Unexpected(String),
}

/// What the session should do about an [`Outcome`].
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Verdict {
    /// Re-run the current authorization state's action.
    Retry(RequestError),
    Done,
}

#[derive(Default)]
pub(crate) struct Correlator {
    next_id: AtomicU64,
    /// request id → request name, for log lines.
    pending: Mutex<HashMap<u64, &'static str>>,
}

impl Correlator {
    pub(crate) fn new() -> Self { Self::default() }

    /// Allocate an id for `request` and remember it until resolved.
    pub(crate) fn register(&self, request: &AuthRequest) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).insert(id, request.name());
        id
    }

    /// Drop a request that never made it out.
    pub(crate) fn forget(&self, id: u64) {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).remove(&id);
    }

    /// Drop every pending request, e.g. when the transport is replaced.
    pub(crate) fn clear(&self) {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub(crate) fn resolve(&self, id: u64, outcome: Outcome) -> Verdict {
        let name = self.pending.lock().unwrap_or_else(PoisonError::into_inner).remove(&id);
        let Some(name) = name else {
            tracing::warn!("[mirror] result for unknown request #{id}: {outcome:?}");
            return Verdict::Done;
        };
        match outcome {
            Outcome::Ok => {
                tracing::debug!("[mirror] {name} #{id} acknowledged");
                Verdict::Done
            }
            Outcome::Error(e) => {
                tracing::warn!("[mirror] {name} #{id} failed: {e}");
                Verdict::Retry(e)
            }
            Outcome::Unexpected(what) => {
                tracing::warn!("[mirror] unexpected response to {name} #{id}: {what}");
                Verdict::Done
            }
        }
    }
}
