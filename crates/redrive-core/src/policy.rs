//! Retry budget.

use redrive_config::DEFAULT_MAX_RETRIES;

/// What to do with a failed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Send the record back to the retry queue.
    Retry,
    /// The retry budget is spent; notify a human.
    Escalate,
}

/// Decide whether a record with `fail_count` failures is retried.
///
/// Retries while `fail_count <= max_retries`.
pub fn decide(fail_count: u32, max_retries: u32) -> Decision {
    if fail_count <= max_retries {
        Decision::Retry
    } else {
        Decision::Escalate
    }
}

/// A fixed retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl RetryPolicy {
    /// Create a policy allowing `max_retries` failures per state.
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// The configured budget.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Decide for the given failure count.
    pub fn decide(&self, fail_count: u32) -> Decision {
        decide(fail_count, self.max_retries)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}
