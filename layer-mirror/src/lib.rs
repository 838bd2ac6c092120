//! # layer-mirror
//!
//! Client session layer on top of an external transport.
//!
//! ## Features
//! - Authorization handshake driven by server state updates, with pluggable
//!   credential prompt and retry policy
//! - Local mirror of users, basic groups, supergroups, secret chats, chats
//!   and their full-info records, kept current from the update stream
//! - Chat list ordered by the server-assigned order, always consistent with
//!   the chats' stored `order`
//! - Cancellable, time-bounded wait for authorization
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use layer_mirror::{Config, Session, StdinPrompt, TransportFactory};
//! # async fn f(factory: Arc<dyn TransportFactory>) -> Result<(), Box<dyn std::error::Error>> {
//! let session = Session::start(Config::default(), factory, Arc::new(StdinPrompt))?;
//! session.wait_until_authorized(None).await?;
//!
//! for chat in session.store().main_chat_list(20) {
//!     println!("{:>20}  {}", chat.order, chat.title);
//! }
//! # Ok(()) }
//! ```

#![deny(unsafe_code)]

mod correlator;
mod errors;
mod retry;
pub mod auth;
pub mod cache;
pub mod chat_list;
pub mod prompt;
pub mod transport;
pub mod types;
pub mod update;

pub use auth::{AuthRequest, AuthorizationState, Parameters};
pub use cache::{EntityMap, Store};
pub use chat_list::{ChatList, OrderedChat, OrderedChats};
pub use correlator::Outcome;
pub use errors::{ConsistencyError, RequestError, SessionError, TransportError};
pub use prompt::{Prompt, StdinPrompt};
pub use retry::{Backoff, NoRetries, RetryContext, RetryForever, RetryPolicy};
pub use transport::{Transport, TransportFactory, UpdateHandler};
pub use update::Update;

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use auth::{AuthInput, AuthMachine};
use correlator::{Correlator, Verdict};
use transport::Link;
use update::Dispatcher;

// ─── Config ───────────────────────────────────────────────────────────────────

/// Configuration for [`Session::start`].
#[derive(Clone)]
pub struct Config {
    /// Sent in reply to [`AuthorizationState::WaitParameters`].
    pub parameters:     Parameters,
    /// Local database encryption key; empty for none.
    pub encryption_key: Vec<u8>,
    /// What to do when a handshake request fails (default: retry at once).
    pub retry_policy:   Arc<dyn RetryPolicy>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parameters:     Parameters::default(),
            encryption_key: Vec::new(),
            retry_policy:   Arc::new(RetryForever),
        }
    }
}

impl Config {
    /// Default config with [`Parameters::from_env`].
    pub fn from_env() -> Self {
        Self { parameters: Parameters::from_env(), ..Default::default() }
    }
}

// ─── SessionInner ─────────────────────────────────────────────────────────────

pub(crate) struct SessionInner {
    store:      Arc<Store>,
    dispatcher: Dispatcher,
    correlator: Arc<Correlator>,
    authorized: watch::Receiver<bool>,
    quitting:   CancellationToken,
    stopped:    CancellationToken,
    /// First consistency fault seen; once set the session is dead.
    fault:      OnceLock<ConsistencyError>,
}

impl SessionInner {
    pub(crate) fn dispatch(&self, update: Update) -> Result<(), SessionError> {
        if let Some(fault) = self.fault.get() {
            return Err(SessionError::Consistency(fault.clone()));
        }
        if let Err(fault) = self.dispatcher.dispatch(update) {
            tracing::error!("[mirror] {fault}; stopping session");
            let fault = self.fault.get_or_init(|| fault).clone();
            self.stopped.cancel();
            return Err(SessionError::Consistency(fault));
        }
        Ok(())
    }

    pub(crate) fn on_result(&self, request_id: u64, outcome: Outcome) {
        match self.correlator.resolve(request_id, outcome) {
            Verdict::Retry(error) => self.dispatcher.forward_auth(AuthInput::Failed(error)),
            Verdict::Done         => {}
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.stopped.cancel();
    }
}

// ─── Session ──────────────────────────────────────────────────────────────────

/// One client session: the auth task, the mirror, and the current transport.
///
/// Cheap to clone: internally Arc-wrapped.  The auth task stops when the
/// last clone is dropped.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Start a session.  Must be called from within a tokio runtime.
    ///
    /// Creates the first transport through `factory` and spawns the auth
    /// task, which then waits for the server's first authorization state.
    pub fn start(
        config:  Config,
        factory: Arc<dyn TransportFactory>,
        prompt:  Arc<dyn Prompt>,
    ) -> Result<Self, SessionError> {
        let (auth_tx, auth_rx)   = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = watch::channel(false);
        let store      = Arc::new(Store::new());
        let correlator = Arc::new(Correlator::new());
        let quitting   = CancellationToken::new();
        let stopped    = CancellationToken::new();

        let inner = Arc::new(SessionInner {
            store:      Arc::clone(&store),
            dispatcher: Dispatcher::new(store, auth_tx),
            correlator: Arc::clone(&correlator),
            authorized: ready_rx,
            quitting:   quitting.clone(),
            stopped:    stopped.clone(),
            fault:      OnceLock::new(),
        });

        let link = Link::new(factory, UpdateHandler::new(&inner));
        link.connect()?;
        tracing::info!("[mirror] session started");

        let machine = AuthMachine::new(config, prompt, link, correlator, ready_tx, quitting, stopped);
        tokio::spawn(machine.run(auth_rx));

        Ok(Self { inner })
    }

    /// Apply one inbound update.  Also reachable through [`UpdateHandler`].
    ///
    /// Fails only on an internal consistency fault, after which the session
    /// is stopped and every later call fails the same way.
    pub fn dispatch(&self, update: Update) -> Result<(), SessionError> {
        self.inner.dispatch(update)
    }

    /// Report the outcome of a handshake request.
    pub fn on_result(&self, request_id: u64, outcome: Outcome) {
        self.inner.on_result(request_id, outcome);
    }

    /// A handler equivalent to the one given to transports.
    pub fn handler(&self) -> UpdateHandler {
        UpdateHandler::new(&self.inner)
    }

    /// The mirrored state.
    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    /// `true` between the `Ready` state and the next logout / close.
    pub fn is_authorized(&self) -> bool {
        *self.inner.authorized.borrow()
    }

    /// Wait until the handshake reaches `Ready`.
    ///
    /// Returns immediately if already authorized.  Fails with
    /// [`SessionError::Timeout`] after `timeout` and [`SessionError::Stopped`]
    /// if the session stops first.
    ///
    /// Calling [`Session::quit`] also releases waiters with
    /// [`SessionError::Quit`].  That is the only place the quit signal acts
    /// before `Closed`: the handshake itself keeps running, and a later
    /// `Ready` is still applied to [`Session::is_authorized`].
    pub async fn wait_until_authorized(&self, timeout: Option<Duration>) -> Result<(), SessionError> {
        let mut ready = self.inner.authorized.clone();
        let wait = async {
            tokio::select! {
                biased;
                r = ready.wait_for(|ok| *ok) => r.map(|_| ()).map_err(|_| SessionError::Stopped),
                _ = self.inner.stopped.cancelled()  => Err(SessionError::Stopped),
                _ = self.inner.quitting.cancelled() => Err(SessionError::Quit),
            }
        };
        match timeout {
            Some(t) => tokio::time::timeout(t, wait).await.map_err(|_| SessionError::Timeout)?,
            None    => wait.await,
        }
    }

    /// Mark the session as quitting.
    ///
    /// The next `Closed` state ends the session instead of creating a new
    /// client.  Requests already in flight and an open credential prompt are
    /// not interrupted.
    pub fn quit(&self) {
        tracing::info!("[mirror] quitting");
        self.inner.quitting.cancel();
    }

    pub fn is_quitting(&self) -> bool {
        self.inner.quitting.is_cancelled()
    }

    /// `true` once the session stopped, after a consistency fault or a
    /// failed credential prompt.
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.is_cancelled()
    }
}
