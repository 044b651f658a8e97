//! Deadline - Per-invocation time budget
//!
//! Every HTTP attempt and every poll sleep observes the same deadline.
//! The engine never cancels remote work; it only stops waiting.

use std::time::{Duration, Instant};

/// Monotonic deadline for one invocation
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `timeout` from now
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    /// Time left, zero once the deadline has passed
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Whether a wait of `duration` fits before the deadline
    pub fn allows(&self, duration: Duration) -> bool {
        self.remaining() >= duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_deadline_is_not_expired() {
        let deadline = Deadline::after(Duration::from_secs(60));
        assert!(!deadline.expired());
        assert!(deadline.allows(Duration::from_secs(1)));
    }

    #[test]
    fn zero_deadline_expires_immediately() {
        let deadline = Deadline::after(Duration::ZERO);
        assert!(deadline.expired());
        assert!(!deadline.allows(Duration::from_millis(1)));
    }
}
