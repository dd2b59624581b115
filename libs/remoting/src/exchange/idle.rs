//! Idle-check task driver
//!
//! Heartbeat and reconnect share one shape: on every firing, look at each
//! channel of the owning client and maybe act on it. [`IdleCheckTask`] is
//! that shape; the per-channel decision is an [`IdleCheck`].

use crate::error::Result;
use crate::timer::{Clock, PeriodicJob};
use crate::transport::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};

/// Tick for a check guarding an interval of `interval_ms`.
///
/// `floor_ms` only applies when the division is not positive, so a small
/// positive quotient is kept as is.
pub fn calculate_least_duration(interval_ms: i64, divisor: i64, floor_ms: i64) -> i64 {
    let quotient = if divisor == 0 { 0 } else { interval_ms / divisor };
    if quotient <= 0 {
        floor_ms
    } else {
        quotient
    }
}

/// Source of the channels a task inspects on each firing
pub trait ChannelProvider: Send + Sync {
    fn channels(&self) -> Vec<Arc<dyn Client>>;
}

impl<F> ChannelProvider for F
where
    F: Fn() -> Vec<Arc<dyn Client>> + Send + Sync,
{
    fn channels(&self) -> Vec<Arc<dyn Client>> {
        self()
    }
}

/// Per-channel decision made on every firing
pub trait IdleCheck: Send + Sync {
    fn name(&self) -> &'static str;

    /// Inspect `channel` at clock time `now_ms`; returns whether it acted
    fn check(&self, channel: &dyn Client, now_ms: u64) -> Result<bool>;
}

/// Lock-free counters for one idle-check task
#[derive(Debug, Default)]
pub struct TaskStats {
    runs: AtomicU64,
    channels_checked: AtomicU64,
    actions: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time copy of [`TaskStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskStatsSnapshot {
    pub runs: u64,
    pub channels_checked: u64,
    pub actions: u64,
    pub failures: u64,
}

impl TaskStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn record_run(&self) {
        self.runs.fetch_add(1, Ordering::Release);
    }

    #[inline]
    fn record_checked(&self) {
        self.channels_checked.fetch_add(1, Ordering::Release);
    }

    #[inline]
    fn record_action(&self) {
        self.actions.fetch_add(1, Ordering::Release);
    }

    #[inline]
    fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Release);
    }

    pub fn snapshot(&self) -> TaskStatsSnapshot {
        TaskStatsSnapshot {
            runs: self.runs.load(Ordering::Acquire),
            channels_checked: self.channels_checked.load(Ordering::Acquire),
            actions: self.actions.load(Ordering::Acquire),
            failures: self.failures.load(Ordering::Acquire),
        }
    }
}

/// Periodic job running `check` over every open channel of a provider
pub struct IdleCheckTask<C> {
    check: C,
    provider: Box<dyn ChannelProvider>,
    clock: Arc<dyn Clock>,
    stats: Arc<TaskStats>,
}

impl<C: IdleCheck> IdleCheckTask<C> {
    pub fn new(check: C, provider: Box<dyn ChannelProvider>, clock: Arc<dyn Clock>) -> Self {
        Self {
            check,
            provider,
            clock,
            stats: Arc::new(TaskStats::new()),
        }
    }

    pub fn stats(&self) -> Arc<TaskStats> {
        Arc::clone(&self.stats)
    }

    pub fn check(&self) -> &C {
        &self.check
    }
}

impl<C: IdleCheck> PeriodicJob for IdleCheckTask<C> {
    fn name(&self) -> &str {
        self.check.name()
    }

    fn run_once(&self) {
        self.stats.record_run();
        let now = self.clock.now_ms();

        for channel in self.provider.channels() {
            if channel.is_closed() {
                trace!(task = self.check.name(), remote = ?channel.remote_address(), "Skipping closed channel");
                continue;
            }
            self.stats.record_checked();

            match self.check.check(channel.as_ref(), now) {
                Ok(true) => self.stats.record_action(),
                Ok(false) => {}
                Err(e) => {
                    self.stats.record_failure();
                    warn!(
                        task = self.check.name(),
                        remote = ?channel.remote_address(),
                        error = %e,
                        category = e.category(),
                        "Exception when running idle check on channel"
                    );
                }
            }
        }
    }
}
