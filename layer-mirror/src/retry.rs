//! Retry policies for failed handshake requests.
//!
//! When a handshake request comes back with an error, the auth task asks the
//! configured [`RetryPolicy`] whether to re-issue the request for the current
//! authorization state, and after how long.

use std::num::NonZeroU32;
use std::ops::ControlFlow;
use std::time::Duration;

use crate::auth::AuthorizationState;
use crate::errors::RequestError;

/// Controls how the auth task reacts when a handshake request fails.
pub trait RetryPolicy: Send + Sync + 'static {
    fn should_retry(&self, ctx: &RetryContext) -> ControlFlow<(), Duration>;
}

/// Context passed to [`RetryPolicy::should_retry`] on each failure.
pub struct RetryContext {
    /// State whose request failed.
    pub state:      AuthorizationState,
    /// Consecutive failures in this state, including this one.
    pub fail_count: NonZeroU32,
    pub error:      RequestError,
}

/// Never retry.
pub struct NoRetries;
impl RetryPolicy for NoRetries {
    fn should_retry(&self, _: &RetryContext) -> ControlFlow<(), Duration> {
        ControlFlow::Break(())
    }
}

/// Re-issue immediately, every time.
///
/// This is the default and trusts the server to eventually accept the
/// request or move to another state.
#[derive(Default)]
pub struct RetryForever;
impl RetryPolicy for RetryForever {
    fn should_retry(&self, _: &RetryContext) -> ControlFlow<(), Duration> {
        ControlFlow::Continue(Duration::ZERO)
    }
}

/// Exponential backoff with an attempt cap.
///
/// A server-requested delay (`retry after N`) takes precedence over the
/// computed one.
pub struct Backoff {
    pub initial:      Duration,
    pub max_delay:    Duration,
    pub max_attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial:      Duration::from_millis(500),
            max_delay:    Duration::from_secs(30),
            max_attempts: 8,
        }
    }
}

impl RetryPolicy for Backoff {
    fn should_retry(&self, ctx: &RetryContext) -> ControlFlow<(), Duration> {
        let n = ctx.fail_count.get();
        if n > self.max_attempts {
            tracing::warn!("[mirror] giving up on {:?} after {} failures", ctx.state, n - 1);
            return ControlFlow::Break(());
        }
        if let Some(d) = ctx.error.retry_after() {
            tracing::info!("[mirror] server asked to wait {d:?} before retrying");
            return ControlFlow::Continue(d);
        }
        let factor = 1u32.checked_shl(n - 1).unwrap_or(u32::MAX);
        let delay  = self.initial.saturating_mul(factor).min(self.max_delay);
        ControlFlow::Continue(delay)
    }
}
