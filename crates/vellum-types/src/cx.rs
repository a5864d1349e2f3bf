//! Cancellation context (`Cx`).
//!
//! A capability-passing context threaded by reference through every
//! operation that can block (store seeks, transaction-status lookups).
//! Long-running code calls [`Cx::checkpoint`] at its cooperative
//! cancellation points; the call fails once the context is cancelled or its
//! deadline has passed.
//!
//! Cloning a `Cx` shares the cancellation flag, so a caller can hold one
//! clone and cancel an operation running against the other.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Why a checkpoint failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterruptKind {
    /// [`Cx::cancel`] was called.
    Cancelled,
    /// The deadline passed.
    DeadlineExpired,
}

impl InterruptKind {
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::DeadlineExpired => "deadline expired",
        }
    }
}

/// Error produced by [`Cx::checkpoint`] once the context is interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted {
    pub kind: InterruptKind,
}

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation interrupted: {}", self.kind.reason())
    }
}

impl std::error::Error for Interrupted {}

/// Cancellation flag plus optional deadline.
#[derive(Debug, Clone, Default)]
pub struct Cx {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cx {
    /// A context that never cancels on its own.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of this context whose deadline is `timeout` from now.
    ///
    /// The cancellation flag stays shared; the tighter of the two deadlines
    /// wins.
    #[must_use]
    pub fn with_deadline(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) => Some(existing.min(candidate)),
            None => Some(candidate),
        };
        Self {
            cancelled: Arc::clone(&self.cancelled),
            deadline,
        }
    }

    /// Request cancellation. Idempotent; observed at the next checkpoint.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested (deadline not considered).
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Cooperative cancellation point.
    pub fn checkpoint(&self) -> Result<(), Interrupted> {
        if self.is_cancelled() {
            return Err(Interrupted {
                kind: InterruptKind::Cancelled,
            });
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Interrupted {
                    kind: InterruptKind::DeadlineExpired,
                });
            }
        }
        Ok(())
    }
}
