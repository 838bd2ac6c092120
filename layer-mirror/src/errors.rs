//! Error types for layer-mirror.

use std::time::Duration;
use std::{fmt, io};

// ─── RequestError ─────────────────────────────────────────────────────────────

/// An explicit error response to a handshake request.
///
/// # Example
/// `429 "Too Many Requests: retry after 30"` → `retry_after() == Some(30s)`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestError {
    /// HTTP-like status code.
    pub code:    i32,
    /// Server-provided message, e.g. `PHONE_CODE_INVALID`.
    pub message: String,
}

impl RequestError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    /// Match on the message, with optional wildcard prefix/suffix `'*'`.
    ///
    /// # Examples
    /// - `err.is("PASSWORD_HASH_INVALID")`: exact match
    /// - `err.is("PHONE_CODE_*")`: starts-with match
    /// - `err.is("*_INVALID")`: ends-with match
    pub fn is(&self, pattern: &str) -> bool {
        if let Some(prefix) = pattern.strip_suffix('*') {
            self.message.starts_with(prefix)
        } else if let Some(suffix) = pattern.strip_prefix('*') {
            self.message.ends_with(suffix)
        } else {
            self.message == pattern
        }
    }

    /// Delay requested by the server, for `429 ... retry after N` responses.
    pub fn retry_after(&self) -> Option<Duration> {
        if self.code != 429 {
            return None;
        }
        let idx  = self.message.rfind("retry after ")?;
        let secs = self.message[idx + "retry after ".len()..]
            .split(|c: char| !c.is_ascii_digit())
            .next()?
            .parse::<u64>()
            .ok()?;
        Some(Duration::from_secs(secs))
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RequestError {}

// ─── ConsistencyError ─────────────────────────────────────────────────────────

/// The chat list and the chat records have diverged.
///
/// There is no recovery from this; the owning session stops.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsistencyError {
    /// A chat with a non-zero order had no key in the chat list.
    MissingKey { chat_id: i64, order: u64 },
    /// The key about to be inserted was already present.
    DuplicateKey { chat_id: i64, order: u64 },
}

impl fmt::Display for ConsistencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKey { chat_id, order } =>
                write!(f, "chat list has no key ({order}, {chat_id})"),
            Self::DuplicateKey { chat_id, order } =>
                write!(f, "chat list already has key ({order}, {chat_id})"),
        }
    }
}

impl std::error::Error for ConsistencyError {}

// ─── TransportError ───────────────────────────────────────────────────────────

/// Failure reported by the transport collaborator.
#[derive(Debug)]
pub enum TransportError {
    /// The transport instance is closed and can no longer send.
    Closed,
    /// Network / I/O failure.
    Io(io::Error),
    /// The transport refused the request outright.
    Rejected(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed      => write!(f, "transport closed"),
            Self::Io(e)       => write!(f, "I/O error: {e}"),
            Self::Rejected(s) => write!(f, "request rejected: {s}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _           => None,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self { Self::Io(e) }
}

// ─── SessionError ─────────────────────────────────────────────────────────────

/// The error type returned from [`crate::Session`] methods.
#[derive(Debug)]
pub enum SessionError {
    /// Creating or using the transport failed.
    Transport(TransportError),
    /// Internal consistency fault; the session has stopped.
    Consistency(ConsistencyError),
    /// Waiting for authorization took longer than allowed.
    Timeout,
    /// [`crate::Session::quit`] was called.
    Quit,
    /// The session stopped (fault or shutdown) before the awaited event.
    Stopped,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e)   => write!(f, "{e}"),
            Self::Consistency(e) => write!(f, "internal consistency fault: {e}"),
            Self::Timeout        => write!(f, "timed out waiting for authorization"),
            Self::Quit           => write!(f, "session is quitting"),
            Self::Stopped        => write!(f, "session stopped"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e)   => Some(e),
            Self::Consistency(e) => Some(e),
            _                    => None,
        }
    }
}

impl From<TransportError> for SessionError {
    fn from(e: TransportError) -> Self { Self::Transport(e) }
}

impl From<ConsistencyError> for SessionError {
    fn from(e: ConsistencyError) -> Self { Self::Consistency(e) }
}
