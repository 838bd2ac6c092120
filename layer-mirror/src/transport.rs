//! Seams to the transport collaborator.
//!
//! The transport owns the connection and the wire encoding.  It receives
//! handshake requests through [`Transport::send`] and feeds back what the
//! server says through the [`UpdateHandler`] it was created with.

use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::auth::AuthRequest;
use crate::correlator::Outcome;
use crate::errors::{SessionError, TransportError};
use crate::update::Update;
use crate::SessionInner;

// ─── Traits ───────────────────────────────────────────────────────────────────

/// One live client instance of the transport.
pub trait Transport: Send + Sync {
    /// Queue `request`.  Its outcome must later be reported through
    /// [`UpdateHandler::on_result`] with the same `request_id`.
    fn send(&self, request_id: u64, request: AuthRequest) -> Result<(), TransportError>;
}

/// Creates transport instances.
///
/// Called once when the session starts, and again each time the server
/// closes the client while the session is not quitting.
pub trait TransportFactory: Send + Sync {
    fn create(&self, handler: UpdateHandler) -> Result<Arc<dyn Transport>, TransportError>;
}

// ─── UpdateHandler ────────────────────────────────────────────────────────────

/// Inbound half given to a transport.
///
/// Holds the session weakly; once the session is dropped every call is a
/// no-op that reports [`SessionError::Stopped`].
#[derive(Clone)]
pub struct UpdateHandler {
    session: Weak<SessionInner>,
}

impl UpdateHandler {
    pub(crate) fn new(session: &Arc<SessionInner>) -> Self {
        Self { session: Arc::downgrade(session) }
    }

    /// Deliver one inbound update.
    pub fn on_update(&self, update: Update) -> Result<(), SessionError> {
        match self.session.upgrade() {
            Some(s) => s.dispatch(update),
            None    => Err(SessionError::Stopped),
        }
    }

    /// Deliver the outcome of a request previously passed to
    /// [`Transport::send`].
    pub fn on_result(&self, request_id: u64, outcome: Outcome) {
        if let Some(s) = self.session.upgrade() {
            s.on_result(request_id, outcome);
        }
    }
}

// ─── Link ─────────────────────────────────────────────────────────────────────

/// The current transport instance plus the means to replace it.
pub(crate) struct Link {
    current: RwLock<Option<Arc<dyn Transport>>>,
    factory: Arc<dyn TransportFactory>,
    handler: UpdateHandler,
}

impl Link {
    pub(crate) fn new(factory: Arc<dyn TransportFactory>, handler: UpdateHandler) -> Self {
        Self { current: RwLock::new(None), factory, handler }
    }

    /// Create a fresh transport instance, replacing the current one.
    pub(crate) fn connect(&self) -> Result<(), TransportError> {
        let transport = self.factory.create(self.handler.clone())?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(transport);
        Ok(())
    }

    pub(crate) fn send(&self, request_id: u64, request: AuthRequest) -> Result<(), TransportError> {
        let transport = self.current.read().unwrap_or_else(PoisonError::into_inner).clone();
        match transport {
            Some(t) => t.send(request_id, request),
            None    => Err(TransportError::Closed),
        }
    }
}
