//! Periodic tasks on a one-shot timer
//!
//! A [`PeriodicJob`] is armed once and re-armed after every run, each time
//! `tick` from *now*, so a late run shifts the schedule instead of
//! accumulating catch-up runs. The [`CancellationToken`] is shared with the
//! owner: once it is cancelled a run performs nothing and does not re-arm,
//! even if the wheel had already selected it.

use super::{Timeout, TimeoutEntry, Timer, TimerError, TimerTask};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{error, warn};

/// Work repeated on every tick of a periodic task
pub trait PeriodicJob: Send + Sync {
    fn name(&self) -> &str;
    fn run_once(&self);
}

/// Cancellation flag observable by both the owner and the task
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true only for the call that flipped the flag
    pub fn cancel(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

struct PeriodicTask {
    job: Arc<dyn PeriodicJob>,
    tick: Duration,
    token: CancellationToken,
    /// Armed timeout. Weak: the entry owns this task, and the wheel owns the entry.
    current: Mutex<Option<Weak<TimeoutEntry>>>,
    runs: AtomicU64,
}

impl PeriodicTask {
    fn set_current(&self, timeout: &Timeout) {
        *self.current.lock() = Some(Arc::downgrade(&timeout.entry));
    }

    fn take_current(&self) -> Option<Timeout> {
        let weak = self.current.lock().take()?;
        weak.upgrade().map(|entry| Timeout { entry })
    }

    fn rearm(&self, timeout: &Timeout) {
        let Some(timer) = timeout.timer() else {
            return;
        };
        if self.token.is_cancelled() || timer.is_stopped() || timeout.is_cancelled() {
            return;
        }
        match timer.new_timeout(timeout.task(), self.tick) {
            Ok(next) => {
                self.set_current(&next);
                // cancel() may have run between the check above and the store
                if self.token.is_cancelled() {
                    next.cancel();
                    self.current.lock().take();
                }
            }
            Err(e) => {
                warn!(job = self.job.name(), error = %e, "Failed to re-arm periodic task");
            }
        }
    }
}

impl TimerTask for PeriodicTask {
    fn run(&self, timeout: &Timeout) {
        if self.token.is_cancelled() {
            return;
        }
        if catch_unwind(AssertUnwindSafe(|| self.job.run_once())).is_err() {
            error!(job = self.job.name(), "Periodic job panicked; re-arming");
        }
        self.runs.fetch_add(1, Ordering::AcqRel);
        self.rearm(timeout);
    }
}

/// Owner's handle to a periodic task
#[derive(Clone)]
pub struct PeriodicHandle {
    task: Arc<PeriodicTask>,
}

impl PeriodicHandle {
    /// Stop the task. Idempotent and safe to race with a firing; returns
    /// true only for the call that actually cancelled it.
    pub fn cancel(&self) -> bool {
        if !self.task.token.cancel() {
            return false;
        }
        if let Some(timeout) = self.task.take_current() {
            timeout.cancel();
        }
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.task.token.is_cancelled()
    }

    pub fn token(&self) -> CancellationToken {
        self.task.token.clone()
    }

    /// Completed runs so far
    pub fn runs(&self) -> u64 {
        self.task.runs.load(Ordering::Acquire)
    }

    pub fn tick(&self) -> Duration {
        self.task.tick
    }

    pub fn name(&self) -> &str {
        self.task.job.name()
    }
}

impl std::fmt::Debug for PeriodicHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicHandle")
            .field("job", &self.name())
            .field("tick", &self.task.tick)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Arm `job` on `timer`, first run after `tick`, then every `tick`
pub fn schedule_periodic(
    timer: &dyn Timer,
    job: Arc<dyn PeriodicJob>,
    tick: Duration,
) -> Result<PeriodicHandle, TimerError> {
    let task = Arc::new(PeriodicTask {
        job,
        tick,
        token: CancellationToken::new(),
        current: Mutex::new(None),
        runs: AtomicU64::new(0),
    });
    let first = timer.new_timeout(task.clone(), tick)?;
    task.set_current(&first);
    Ok(PeriodicHandle { task })
}
