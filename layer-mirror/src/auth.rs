//! Authorization handshake.
//!
//! The server drives the handshake: each authorization state update tells the
//! client what it needs next, and the client answers with exactly one
//! request.  All of that happens on a single task that owns the current state,
//! so state updates and error retries are applied strictly in order.
//!
//! ```text
//! WaitParameters → WaitEncryptionKey → WaitPhoneNumber → WaitCode → WaitPassword → Ready
//!                                          LoggingOut → Closing → Closed (→ new client)
//! ```

use std::num::NonZeroU32;
use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::correlator::Correlator;
use crate::errors::RequestError;
use crate::prompt::Prompt;
use crate::retry::{RetryContext, RetryPolicy};
use crate::transport::Link;

// ─── AuthorizationState ───────────────────────────────────────────────────────

/// Authorization state announced by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AuthorizationState {
    WaitParameters,
    WaitEncryptionKey { is_encrypted: bool },
    WaitPhoneNumber,
    WaitCode,
    WaitPassword { password_hint: String },
    /// QR-code login.  Not supported by this client.
    WaitOtherDeviceConfirmation { link: String },
    /// The phone number is not registered.  Not supported by this client.
    WaitRegistration,
    Ready,
    LoggingOut,
    Closing,
    Closed,
}

// ─── Parameters ───────────────────────────────────────────────────────────────

/// Client configuration sent while in [`AuthorizationState::WaitParameters`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Parameters {
    pub use_test_dc:              bool,
    pub database_directory:       String,
    pub use_message_database:     bool,
    pub use_secret_chats:         bool,
    pub api_id:                   i32,
    pub api_hash:                 String,
    pub system_language_code:     String,
    pub device_model:             String,
    pub system_version:           String,
    pub application_version:      String,
    pub enable_storage_optimizer: bool,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            use_test_dc:              false,
            database_directory:       "tdlib".into(),
            use_message_database:     true,
            use_secret_chats:         true,
            api_id:                   0,
            api_hash:                 String::new(),
            system_language_code:     "en".into(),
            device_model:             "Desktop".into(),
            system_version:           "Unknown".into(),
            application_version:      "1.0".into(),
            enable_storage_optimizer: true,
        }
    }
}

impl Parameters {
    /// Defaults, overridden by `API_ID`, `API_HASH` and `DATABASE_DIRECTORY`
    /// from the environment when set.
    pub fn from_env() -> Self {
        let mut p = Self::default();
        if let Some(id) = std::env::var("API_ID").ok().and_then(|v| v.trim().parse().ok()) {
            p.api_id = id;
        }
        if let Ok(hash) = std::env::var("API_HASH") {
            p.api_hash = hash;
        }
        if let Ok(dir) = std::env::var("DATABASE_DIRECTORY") {
            p.database_directory = dir;
        }
        p
    }
}

// ─── AuthRequest ──────────────────────────────────────────────────────────────

/// Outbound handshake request.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AuthRequest {
    SetParameters(Parameters),
    CheckEncryptionKey { encryption_key: Vec<u8> },
    SetPhoneNumber { phone_number: String, allow_flash_call: bool, is_current_phone_number: bool },
    CheckCode { code: String, first_name: String, last_name: String },
    CheckPassword { password: String },
}

impl AuthRequest {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetParameters(_)          => "setTdlibParameters",
            Self::CheckEncryptionKey { .. } => "checkDatabaseEncryptionKey",
            Self::SetPhoneNumber { .. }     => "setAuthenticationPhoneNumber",
            Self::CheckCode { .. }          => "checkAuthenticationCode",
            Self::CheckPassword { .. }      => "checkAuthenticationPassword",
        }
    }
}

// ─── AuthMachine ──────────────────────────────────────────────────────────────

/// Input to the auth task.
#[derive(Debug)]
pub(crate) enum AuthInput {
    State(AuthorizationState),
    /// A handshake request came back with an error.
    Failed(RequestError),
}

pub(crate) struct AuthMachine {
    state:          Option<AuthorizationState>,
    /// Consecutive failures in the current state.
    failures:       u32,
    parameters:     Parameters,
    encryption_key: Vec<u8>,
    retry_policy:   Arc<dyn RetryPolicy>,
    prompt:         Arc<dyn Prompt>,
    link:           Link,
    correlator:     Arc<Correlator>,
    authorized:     watch::Sender<bool>,
    quitting:       CancellationToken,
    stopped:        CancellationToken,
}

impl AuthMachine {
    pub(crate) fn new(
        config:     crate::Config,
        prompt:     Arc<dyn Prompt>,
        link:       Link,
        correlator: Arc<Correlator>,
        authorized: watch::Sender<bool>,
        quitting:   CancellationToken,
        stopped:    CancellationToken,
    ) -> Self {
        Self {
            state:          None,
            failures:       0,
            parameters:     config.parameters,
            encryption_key: config.encryption_key,
            retry_policy:   config.retry_policy,
            prompt,
            link,
            correlator,
            authorized,
            quitting,
            stopped,
        }
    }

    /// Run until the session is dropped or stopped, or until `Closed` is
    /// reached while quitting.
    pub(crate) async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<AuthInput>) {
        let mut preempted = None;
        loop {
            let input = match preempted.take() {
                Some(input) => input,
                None => tokio::select! {
                    biased;
                    _ = self.stopped.cancelled() => break,
                    input = inputs.recv() => match input {
                        Some(input) => input,
                        None        => break,
                    },
                },
            };
            let flow = match input {
                AuthInput::State(state) => {
                    tracing::info!("[mirror] << authorization state {state:?}");
                    self.state    = Some(state);
                    self.failures = 0;
                    self.enter().await.map_continue(|()| None)
                }
                AuthInput::Failed(error) => self.on_failure(error, &mut inputs).await,
            };
            match flow {
                ControlFlow::Continue(next) => preempted = next,
                ControlFlow::Break(())      => break,
            }
        }
        tracing::debug!("[mirror] auth task finished");
    }

    /// Consult the retry policy and re-enter the current state.
    ///
    /// A state change that arrives before the retry is due cancels the retry
    /// and is handed back to [`AuthMachine::run`].
    async fn on_failure(
        &mut self,
        error:  RequestError,
        inputs: &mut mpsc::UnboundedReceiver<AuthInput>,
    ) -> ControlFlow<(), Option<AuthInput>> {
        let Some(state) = self.state.clone() else {
            tracing::warn!("[mirror] handshake error before any authorization state: {error}");
            return ControlFlow::Continue(None);
        };
        let ctx = RetryContext {
            state,
            fail_count: NonZeroU32::MIN.saturating_add(self.failures),
            error,
        };
        self.failures = self.failures.saturating_add(1);

        let delay = match self.retry_policy.should_retry(&ctx) {
            ControlFlow::Continue(delay) => delay,
            ControlFlow::Break(()) => {
                tracing::error!("[mirror] not retrying {:?} after: {}", ctx.state, ctx.error);
                return ControlFlow::Continue(None);
            }
        };
        if !delay.is_zero() {
            tracing::info!("[mirror] retrying {:?} in {delay:?}", ctx.state);
        }

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                biased;
                _ = self.stopped.cancelled() => return ControlFlow::Break(()),
                input = inputs.recv() => match input {
                    Some(AuthInput::State(next)) => {
                        tracing::debug!("[mirror] retry of {:?} dropped, server moved on", ctx.state);
                        return ControlFlow::Continue(Some(AuthInput::State(next)));
                    }
                    Some(AuthInput::Failed(e)) => {
                        tracing::debug!("[mirror] ignoring error while a retry is pending: {e}");
                    }
                    None => return ControlFlow::Break(()),
                },
                _ = &mut sleep => break,
            }
        }
        self.enter().await.map_continue(|()| None)
    }

    /// Perform the action of the current state.
    async fn enter(&mut self) -> ControlFlow<()> {
        let Some(state) = self.state.clone() else { return ControlFlow::Continue(()) };
        match state {
            AuthorizationState::WaitParameters => {
                self.send(AuthRequest::SetParameters(self.parameters.clone()));
            }
            AuthorizationState::WaitEncryptionKey { .. } => {
                self.send(AuthRequest::CheckEncryptionKey { encryption_key: self.encryption_key.clone() });
            }
            AuthorizationState::WaitPhoneNumber => {
                let phone_number = self.ask("Please enter phone number: ".into()).await?;
                self.send(AuthRequest::SetPhoneNumber {
                    phone_number,
                    allow_flash_call:        false,
                    is_current_phone_number: false,
                });
            }
            AuthorizationState::WaitCode => {
                let code = self.ask("Please enter authentication code: ".into()).await?;
                self.send(AuthRequest::CheckCode {
                    code,
                    first_name: String::new(),
                    last_name:  String::new(),
                });
            }
            AuthorizationState::WaitPassword { password_hint } => {
                let label = if password_hint.is_empty() {
                    "Please enter password: ".to_string()
                } else {
                    format!("Please enter password (hint: {password_hint}): ")
                };
                let password = self.ask(label).await?;
                self.send(AuthRequest::CheckPassword { password });
            }
            AuthorizationState::Ready => {
                self.authorized.send_replace(true);
                tracing::info!("[mirror] authorized ✓");
            }
            AuthorizationState::LoggingOut | AuthorizationState::Closing => {
                self.authorized.send_replace(false);
            }
            AuthorizationState::Closed => {
                self.authorized.send_replace(false);
                if self.quitting.is_cancelled() {
                    tracing::info!("[mirror] closed");
                    return ControlFlow::Break(());
                }
                tracing::info!(
                    "[mirror] closed by server, dropping {} pending request(s) and creating a new client …",
                    self.correlator.pending(),
                );
                self.correlator.clear();
                if let Err(e) = self.link.connect() {
                    tracing::error!("[mirror] could not create a new client: {e}");
                }
            }
            AuthorizationState::WaitOtherDeviceConfirmation { .. }
            | AuthorizationState::WaitRegistration => {
                tracing::warn!("[mirror] unsupported authorization state {state:?}");
            }
        }
        ControlFlow::Continue(())
    }

    fn send(&self, request: AuthRequest) {
        let id   = self.correlator.register(&request);
        let name = request.name();
        tracing::debug!("[mirror] >> send {name} #{id}");
        if let Err(e) = self.link.send(id, request) {
            self.correlator.forget(id);
            tracing::error!("[mirror] {name} #{id} not sent: {e}");
        }
    }

    /// Ask for a credential on the blocking pool.
    ///
    /// Without an answer the handshake cannot go on, so a failed prompt
    /// stops the session and releases anyone waiting for authorization.
    async fn ask(&self, label: String) -> ControlFlow<(), String> {
        let prompt = Arc::clone(&self.prompt);
        let error = match tokio::task::spawn_blocking(move || prompt.prompt_string(&label)).await {
            Ok(Ok(answer)) => return ControlFlow::Continue(answer),
            Ok(Err(e))     => e.to_string(),
            Err(e)         => e.to_string(),
        };
        tracing::error!("[mirror] credential prompt failed: {error}; stopping session");
        self.stopped.cancel();
        ControlFlow::Break(())
    }
}
