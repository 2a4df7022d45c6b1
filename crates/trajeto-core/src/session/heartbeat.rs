// ── Liveness probe ──
//
// Sends a ping every period. The channel is stale once no pong has
// arrived for two full periods.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Close code sent when the heartbeat gives up on the channel.
pub const HEARTBEAT_TIMEOUT_CODE: u16 = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Probe {
    Ping,
    Stale,
}

#[derive(Debug)]
pub(crate) struct HeartbeatMonitor {
    interval: Interval,
    period: Duration,
    last_pong: Instant,
}

impl HeartbeatMonitor {
    pub(crate) fn new(period: Duration) -> Self {
        let now = Instant::now();
        // First tick one period after open, not immediately.
        let mut interval = interval_at(now + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval,
            period,
            last_pong: now,
        }
    }

    pub(crate) async fn tick(&mut self) -> Probe {
        self.interval.tick().await;
        self.check(Instant::now())
    }

    pub(crate) fn acknowledge(&mut self) {
        self.last_pong = Instant::now();
    }

    pub(crate) fn check(&self, now: Instant) -> Probe {
        if now.saturating_duration_since(self.last_pong) >= self.period * 2 {
            Probe::Stale
        } else {
            Probe::Ping
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_secs(30);

    #[tokio::test(start_paused = true)]
    async fn stale_after_two_silent_periods() {
        let started = Instant::now();
        let mut monitor = HeartbeatMonitor::new(PERIOD);

        assert_eq!(monitor.tick().await, Probe::Ping);
        assert!(started.elapsed() >= PERIOD);

        assert_eq!(monitor.tick().await, Probe::Stale);
        let elapsed = started.elapsed();
        assert!(elapsed >= PERIOD * 2 && elapsed < PERIOD * 2 + Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn pong_keeps_the_channel_alive() {
        let mut monitor = HeartbeatMonitor::new(PERIOD);

        assert_eq!(monitor.tick().await, Probe::Ping);
        monitor.acknowledge();
        assert_eq!(monitor.tick().await, Probe::Ping);
        assert_eq!(monitor.tick().await, Probe::Stale);
    }

    #[tokio::test(start_paused = true)]
    async fn check_boundary() {
        let monitor = HeartbeatMonitor::new(PERIOD);
        let opened = monitor.last_pong;
        assert_eq!(monitor.check(opened + PERIOD * 2 - Duration::from_millis(1)), Probe::Ping);
        assert_eq!(monitor.check(opened + PERIOD * 2), Probe::Stale);
    }
}
