// ── Reconnection backoff ──

use std::time::Duration;

/// Ceiling on any single reconnect delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Counts consecutive failed connections and yields the delay before the
/// next attempt: `min(base * 2^(attempt - 1), MAX_BACKOFF)`.
#[derive(Debug, Clone)]
pub(crate) struct ReconnectPolicy {
    base: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl ReconnectPolicy {
    pub(crate) fn new(base: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max_attempts,
            attempt: 0,
        }
    }

    pub(crate) fn attempt(&self) -> u32 {
        self.attempt
    }

    pub(crate) fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before attempt number `attempt` (1-based).
    pub(crate) fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
    }

    /// Claim the next attempt, or `None` once the budget is spent.
    pub(crate) fn next_delay(&mut self) -> Option<(u32, Duration)> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        self.attempt += 1;
        Some((self.attempt, self.delay_for(self.attempt)))
    }

    pub(crate) fn reset(&mut self) {
        self.attempt = 0;
    }
}
