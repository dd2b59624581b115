//! Shared idle-check scheduler
//!
//! One wheel serves every exchange client that shares this service. The
//! service also owns the tick policy, so all clients derive their check
//! cadence the same way.

use super::idle::{calculate_least_duration, ChannelProvider, IdleCheck, IdleCheckTask, TaskStats};
use crate::config::TimerSettings;
use crate::error::Result;
use crate::timer::{schedule_periodic, Clock, HashedWheelTimer, PeriodicHandle, PeriodicJob};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Wheel plus tick policy shared by exchange clients
pub struct IdleCheckScheduler {
    timer: HashedWheelTimer,
    settings: TimerSettings,
}

impl IdleCheckScheduler {
    /// Start a scheduler with its own worker thread
    pub fn start(settings: TimerSettings) -> Result<Arc<Self>> {
        settings.validate()?;
        let timer = HashedWheelTimer::start(settings.wheel_config())?;
        info!(
            divisor = settings.check_divisor,
            least_duration_ms = settings.least_duration_ms,
            "Idle-check scheduler started"
        );
        Ok(Arc::new(Self { timer, settings }))
    }

    /// Scheduler driven by `clock` and [`Self::advance`]
    pub fn manual(settings: TimerSettings, clock: Arc<dyn Clock>) -> Result<Arc<Self>> {
        settings.validate()?;
        let timer = HashedWheelTimer::manual(settings.wheel_config(), clock);
        Ok(Arc::new(Self { timer, settings }))
    }

    /// Check tick for a guarded interval
    pub fn least_duration(&self, interval_ms: i64) -> Duration {
        let tick = calculate_least_duration(
            interval_ms,
            self.settings.check_divisor,
            self.settings.least_duration_ms,
        );
        Duration::from_millis(tick.max(0) as u64)
    }

    /// Arm `check` over `provider`, firing every least duration of `interval_ms`
    pub fn arm<C: IdleCheck + 'static>(
        &self,
        check: C,
        provider: Box<dyn ChannelProvider>,
        interval_ms: i64,
    ) -> Result<ArmedTask> {
        let tick = self.least_duration(interval_ms);
        let task = IdleCheckTask::new(check, provider, self.timer.clock());
        let stats = task.stats();
        let name = task.name().to_string();
        let handle = schedule_periodic(&self.timer, Arc::new(task), tick)?;
        debug!(task = %name, interval_ms, tick_ms = tick.as_millis() as u64, "Armed idle check");
        Ok(ArmedTask { handle, stats })
    }

    /// Fire everything due at the clock's current reading
    pub fn advance(&self) -> usize {
        self.timer.advance()
    }

    pub fn timer(&self) -> &HashedWheelTimer {
        &self.timer
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.timer.clock()
    }

    pub fn pending_tasks(&self) -> usize {
        self.timer.pending_timeouts()
    }

    /// Stop the wheel; armed tasks never fire again
    pub fn shutdown(&self) {
        let unprocessed = self.timer.stop();
        info!(unprocessed = unprocessed.len(), "Idle-check scheduler stopped");
    }
}

impl std::fmt::Debug for IdleCheckScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdleCheckScheduler")
            .field("settings", &self.settings)
            .field("pending", &self.pending_tasks())
            .finish()
    }
}

/// A running idle check and its counters
#[derive(Debug, Clone)]
pub struct ArmedTask {
    handle: PeriodicHandle,
    stats: Arc<TaskStats>,
}

impl ArmedTask {
    /// Cancel the task; true only for the call that cancelled it
    pub fn cancel(&self) -> bool {
        self.handle.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }

    pub fn tick(&self) -> Duration {
        self.handle.tick()
    }

    pub fn handle(&self) -> &PeriodicHandle {
        &self.handle
    }

    pub fn stats(&self) -> &TaskStats {
        &self.stats
    }
}
