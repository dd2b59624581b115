//! Idle-Check Timer
//!
//! A hashed timing wheel shared by every exchange client in the process.
//! Pending tasks are kept in fixed-size time buckets that a single worker
//! thread advances one tick at a time, so arming and cancelling are O(1) and
//! thousands of connections cost one thread instead of one timer each.
//!
//! Firing resolution is one tick. Heartbeat and reconnect cadences are
//! measured in seconds, so that slack is irrelevant to them.
//!
//! Task bodies run on the worker thread and must stay short: a blocked task
//! delays every other task on the wheel.

pub mod clock;
pub mod periodic;
pub mod wheel;

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use periodic::{schedule_periodic, CancellationToken, PeriodicHandle, PeriodicJob};
pub use wheel::HashedWheelTimer;

use wheel::TimerCore;

/// Timer errors
#[derive(Error, Debug)]
pub enum TimerError {
    /// Timer no longer accepts tasks
    #[error("Timer has been stopped")]
    Stopped,

    /// Outstanding timeout limit reached
    #[error("Too many pending timeouts: {pending} (max {max})")]
    TooManyPending { pending: usize, max: usize },

    /// Worker thread could not be started
    #[error("Failed to start timer worker '{name}': {source}")]
    Spawn {
        name: String,
        source: std::io::Error,
    },
}

/// Something that can be run once by a [`Timer`]
pub trait TimerTask: Send + Sync {
    fn run(&self, timeout: &Timeout);
}

/// Scheduler of one-shot delayed tasks
pub trait Timer: Send + Sync {
    /// Run `task` once after `delay`
    fn new_timeout(&self, task: Arc<dyn TimerTask>, delay: Duration) -> Result<Timeout, TimerError>;

    fn is_stopped(&self) -> bool;

    /// Current reading of the clock driving this timer, in milliseconds
    fn now_ms(&self) -> u64;
}

/// Wheel parameters (immutable after creation)
#[derive(Debug, Clone)]
pub struct WheelConfig {
    pub tick_duration: Duration,
    /// Rounded up to a power of two
    pub ticks_per_wheel: usize,
    /// 0 for unbounded
    pub max_pending_timeouts: usize,
    pub thread_name: String,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_millis(crate::constants::DEFAULT_TICK_DURATION_MS),
            ticks_per_wheel: crate::constants::DEFAULT_TICKS_PER_WHEEL,
            max_pending_timeouts: 0,
            thread_name: crate::constants::DEFAULT_TIMER_THREAD_NAME.to_string(),
        }
    }
}

const STATE_INIT: u8 = 0;
const STATE_CANCELLED: u8 = 1;
const STATE_EXPIRED: u8 = 2;

pub(crate) struct TimeoutEntry {
    task: Arc<dyn TimerTask>,
    /// Milliseconds since the timer started
    deadline_ms: u64,
    state: AtomicU8,
    timer: Weak<TimerCore>,
}

impl TimeoutEntry {
    pub(crate) fn new(task: Arc<dyn TimerTask>, deadline_ms: u64, timer: Weak<TimerCore>) -> Self {
        Self {
            task,
            deadline_ms,
            state: AtomicU8::new(STATE_INIT),
            timer,
        }
    }

    pub(crate) fn deadline_ms(&self) -> u64 {
        self.deadline_ms
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_INIT
    }

    /// Claim the entry for execution; false if it was cancelled first
    pub(crate) fn try_expire(&self) -> bool {
        self.state
            .compare_exchange(STATE_INIT, STATE_EXPIRED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Handle to a task armed on a [`Timer`]
#[derive(Clone)]
pub struct Timeout {
    pub(crate) entry: Arc<TimeoutEntry>,
}

impl Timeout {
    /// Cancel the task. Returns true only for the call that cancelled it;
    /// false if it already fired or was cancelled.
    pub fn cancel(&self) -> bool {
        let cancelled = self
            .entry
            .state
            .compare_exchange(STATE_INIT, STATE_CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if cancelled {
            if let Some(core) = self.entry.timer.upgrade() {
                core.on_cancelled();
            }
        }
        cancelled
    }

    pub fn is_cancelled(&self) -> bool {
        self.entry.state.load(Ordering::Acquire) == STATE_CANCELLED
    }

    pub fn is_expired(&self) -> bool {
        self.entry.state.load(Ordering::Acquire) == STATE_EXPIRED
    }

    /// The timer this timeout was armed on, if it is still alive
    pub fn timer(&self) -> Option<Arc<dyn Timer>> {
        self.entry
            .timer
            .upgrade()
            .map(|core| core as Arc<dyn Timer>)
    }

    pub fn task(&self) -> Arc<dyn TimerTask> {
        Arc::clone(&self.entry.task)
    }

    /// Deadline in milliseconds since the timer started
    pub fn deadline_ms(&self) -> u64 {
        self.entry.deadline_ms
    }
}

impl fmt::Debug for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.entry.state.load(Ordering::Acquire) {
            STATE_CANCELLED => "cancelled",
            STATE_EXPIRED => "expired",
            _ => "pending",
        };
        f.debug_struct("Timeout")
            .field("deadline_ms", &self.entry.deadline_ms)
            .field("state", &state)
            .finish()
    }
}
