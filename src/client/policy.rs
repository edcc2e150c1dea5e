use crate::types::CompletionRequest;
use crate::Error;
use std::time::Duration;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    Retry { delay: Duration },
    /// Retry budget spent on a retryable error.
    GiveUp,
    /// Not retryable at all; hand the error back untouched.
    Surface,
}

/// Fixed-delay retry budget for malformed-request rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// `attempts` counts the attempts made so far, the failed one included.
    ///
    /// Only a malformed-request error on a request with both a system and a user
    /// message is retried; anything else would fail the same way again.
    pub(crate) fn decide(&self, err: &Error, request: &CompletionRequest, attempts: u32) -> Decision {
        if !err.is_malformed_request() || !request.is_structurally_complete() {
            return Decision::Surface;
        }
        if attempts < self.max_attempts {
            Decision::Retry { delay: self.delay }
        } else {
            Decision::GiveUp
        }
    }
}
