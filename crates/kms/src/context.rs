//! Per-call cancellation and deadlines.
//!
//! Every signer operation takes a [`CallContext`]. Remote calls made on the
//! caller's behalf are raced against the context's cancellation token and
//! deadline, so a caller can always bound wall-clock latency.

use std::future::Future;
use std::time::Duration;

use cloudsign_core::KmsConfig;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{KmsError, KmsResult};

/// Cancellation signal and optional deadline for one operation.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that is never canceled and has no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context whose deadline is `timeout` from now. A timeout too large
    /// to represent leaves the context unbounded.
    pub fn with_timeout(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Self::with_deadline(deadline),
            None => Self::new(),
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Context with `timeout` applied when it is set.
    pub fn with_optional_timeout(timeout: Option<Duration>) -> Self {
        timeout.map(Self::with_timeout).unwrap_or_default()
    }

    /// Context bounded by the configured call timeout, if any.
    ///
    /// The deadline is fixed when the context is built and shared by every
    /// operation run under it. Build a fresh context per operation to bound
    /// each one separately.
    pub fn from_config(config: &KmsConfig) -> Self {
        Self::with_optional_timeout(config.call_timeout())
    }

    /// Replaces the cancellation token, e.g. with a child of a request-scoped token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// A context canceled along with this one, with the same deadline.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline. `None` means unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Fails immediately if the context is already canceled or expired.
    pub fn check(&self, operation: &'static str) -> KmsResult<()> {
        if self.cancel.is_cancelled() {
            return Err(KmsError::Canceled { operation });
        }
        if matches!(self.deadline, Some(deadline) if deadline <= Instant::now()) {
            return Err(KmsError::DeadlineExceeded { operation });
        }
        Ok(())
    }

    /// Runs `fut` unless the context is canceled or its deadline passes first.
    ///
    /// The future is dropped on cancellation, which aborts the underlying call.
    pub async fn run<F, T>(&self, operation: &'static str, fut: F) -> KmsResult<T>
    where
        F: Future<Output = KmsResult<T>>,
    {
        self.check(operation)?;

        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(KmsError::Canceled { operation }),
                res = tokio::time::timeout_at(deadline, fut) => match res {
                    Ok(inner) => inner,
                    Err(_) => Err(KmsError::DeadlineExceeded { operation }),
                },
            },
            None => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(KmsError::Canceled { operation }),
                res = fut => res,
            },
        }
    }
}
