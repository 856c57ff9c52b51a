use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// base, 2×base, 3×base, ...
    Linear,
    /// base, 2×base, 4×base, ...
    Exponential,
}

/// Bounded retry schedule for idempotent calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn linear(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff: Backoff::Linear,
        }
    }

    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff: Backoff::Exponential,
        }
    }

    /// Delay before the next attempt, given how many attempts have failed
    /// so far (1-based). `None` once the budget is spent.
    pub fn delay_after(&self, failed_attempts: u32) -> Option<Duration> {
        if failed_attempts == 0 || failed_attempts >= self.max_attempts {
            return None;
        }
        let factor = match self.backoff {
            Backoff::Linear => failed_attempts,
            Backoff::Exponential => 1u32 << (failed_attempts - 1).min(16),
        };
        Some(self.base_delay * factor)
    }
}
