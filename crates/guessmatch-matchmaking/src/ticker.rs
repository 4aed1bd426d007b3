//! Fixed-interval tick scheduler for the matchmaking loop.
//!
//! Fires once per interval. A tick that wakes up late does not trigger a
//! burst of catch-up ticks: missed ticks are skipped and the next one is
//! scheduled a full interval from now. Matching work is measured against
//! the interval so slow ticks show up in the logs.

use std::time::{Duration, Instant};

use tokio::time::{self, Instant as TokioInstant};
use tracing::{trace, warn};

/// Configuration for [`TickScheduler`].
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks.
    pub interval: Duration,
    /// Fraction of the interval (0.0–1.0) a tick's work may take before a
    /// warning is logged.
    pub budget_warn_threshold: f64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            budget_warn_threshold: 0.80,
        }
    }
}

impl TickConfig {
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }
}

/// What [`TickScheduler::wait_for_tick`] reports about the tick it fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// Monotonically increasing, starting at 1.
    pub tick: u64,
    /// The tick fired more than 10% of an interval late.
    pub overrun: bool,
    /// Whole intervals missed because of the overrun.
    pub ticks_skipped: u64,
}

/// Fixed-interval scheduler. One per matchmaking loop.
#[derive(Debug)]
pub struct TickScheduler {
    interval: Duration,
    budget_warn_threshold: f64,
    tick_count: u64,
    next_tick: TokioInstant,
    tick_start: Option<Instant>,
    total_overruns: u64,
}

impl TickScheduler {
    /// Creates a scheduler whose first tick fires one interval from now.
    ///
    /// A zero interval is bumped to one millisecond.
    pub fn new(config: TickConfig) -> Self {
        let interval = config.interval.max(Duration::from_millis(1));
        Self {
            interval,
            budget_warn_threshold: config.budget_warn_threshold.clamp(0.0, 1.0),
            tick_count: 0,
            next_tick: TokioInstant::now() + interval,
            tick_start: None,
            total_overruns: 0,
        }
    }

    /// Sleeps until the next tick is due.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let due = self.next_tick;
        time::sleep_until(due).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(due);
        let overrun = late_by > self.interval / 10;
        let mut ticks_skipped = 0;
        if overrun {
            self.total_overruns += 1;
            ticks_skipped = (late_by.as_nanos() / self.interval.as_nanos()) as u64;
            if ticks_skipped > 0 {
                warn!(
                    tick = self.tick_count,
                    skipped = ticks_skipped,
                    late_ms = late_by.as_secs_f64() * 1000.0,
                    "matchmaking tick overrun, skipping ahead"
                );
            }
        }
        self.next_tick = now + self.interval;

        trace!(tick = self.tick_count, overrun, "matchmaking tick");
        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        }
    }

    /// Marks the current tick's work as done and checks it against the
    /// interval. A no-op if no tick is in progress.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();
        let utilization = elapsed.as_secs_f64() / self.interval.as_secs_f64();
        if utilization >= self.budget_warn_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "matchmaking tick close to its interval"
            );
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn total_overruns(&self) -> u64 {
        self.total_overruns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_ticks_every_second() {
        assert_eq!(TickConfig::default().interval, Duration::from_secs(1));
    }

    #[test]
    fn test_new_clamps_zero_interval() {
        let s = TickScheduler::new(TickConfig::with_interval(Duration::ZERO));
        assert_eq!(s.interval(), Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_tick_counts_monotonically() {
        let mut s = TickScheduler::new(TickConfig::with_interval(Duration::from_millis(100)));
        for expected in 1..=4 {
            let info = s.wait_for_tick().await;
            assert_eq!(info.tick, expected);
            assert!(!info.overrun);
            s.record_tick_end();
        }
        assert_eq!(s.tick_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_tick_late_wakeup_skips_missed_ticks() {
        let mut s = TickScheduler::new(TickConfig::with_interval(Duration::from_millis(100)));
        s.wait_for_tick().await;

        // Stall for three and a half intervals before waiting again.
        time::advance(Duration::from_millis(450)).await;
        let info = s.wait_for_tick().await;

        assert_eq!(info.tick, 2);
        assert!(info.overrun);
        assert_eq!(info.ticks_skipped, 3);
        assert_eq!(s.total_overruns(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_tick_end_without_tick_is_noop() {
        let mut s = TickScheduler::new(TickConfig::default());
        s.record_tick_end();
        assert_eq!(s.tick_count(), 0);
    }
}
