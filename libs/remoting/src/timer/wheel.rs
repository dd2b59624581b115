//! Hashed timing wheel with O(1) arm/cancel and bounded per-tick work.
//!
//! Single-level, power-of-two buckets. New timeouts land in a lock-free
//! queue and are moved into their bucket at the start of the next tick, so
//! callers never touch the wheel lock. A timeout fires on the first tick
//! boundary at or after its deadline; delays longer than one revolution
//! carry a remaining-rounds count.

use super::{Clock, SystemClock, Timeout, TimeoutEntry, Timer, TimerError, TimerTask, WheelConfig};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tracing::{debug, error, info};

/// Upper bound on timeouts moved from the queue into buckets per tick
const MAX_TRANSFER_PER_TICK: usize = 100_000;

struct Slot {
    entry: Arc<TimeoutEntry>,
    remaining_rounds: u64,
}

struct WheelState {
    buckets: Vec<Vec<Slot>>,
    /// Next tick to process
    tick: u64,
}

/// Shared state of a wheel, referenced weakly by every [`Timeout`]
pub(crate) struct TimerCore {
    tick_ms: u64,
    mask: u64,
    max_pending: usize,
    clock: Arc<dyn Clock>,
    start_ms: u64,
    wheel: Mutex<WheelState>,
    queue_tx: Sender<Arc<TimeoutEntry>>,
    queue_rx: Receiver<Arc<TimeoutEntry>>,
    pending: AtomicUsize,
    stopped: AtomicBool,
    worker: Mutex<Option<thread::Thread>>,
    self_ref: Weak<TimerCore>,
}

impl TimerCore {
    fn new(config: &WheelConfig, clock: Arc<dyn Clock>) -> Arc<Self> {
        let buckets = config.ticks_per_wheel.max(1).next_power_of_two();
        let (queue_tx, queue_rx) = crossbeam_channel::unbounded();
        let start_ms = clock.now_ms();
        Arc::new_cyclic(|self_ref| Self {
            tick_ms: (config.tick_duration.as_millis() as u64).max(1),
            mask: buckets as u64 - 1,
            max_pending: config.max_pending_timeouts,
            clock,
            start_ms,
            wheel: Mutex::new(WheelState {
                buckets: (0..buckets).map(|_| Vec::new()).collect(),
                tick: 0,
            }),
            queue_tx,
            queue_rx,
            pending: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
            worker: Mutex::new(None),
            self_ref: self_ref.clone(),
        })
    }

    fn elapsed_ms(&self) -> u64 {
        self.clock.now_ms().saturating_sub(self.start_ms)
    }

    pub(crate) fn on_cancelled(&self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }

    /// Time left until the next tick boundary
    fn until_next_tick(&self) -> Duration {
        let next_deadline = (self.wheel.lock().tick + 1) * self.tick_ms;
        Duration::from_millis(next_deadline.saturating_sub(self.elapsed_ms()))
    }

    /// Process every tick whose boundary has passed; returns tasks fired
    fn process_due_ticks(&self) -> usize {
        let mut fired = 0;
        loop {
            if self.stopped.load(Ordering::Acquire) {
                break;
            }
            let expired = {
                let mut wheel = self.wheel.lock();
                let tick_deadline = (wheel.tick + 1) * self.tick_ms;
                if tick_deadline > self.elapsed_ms() {
                    break;
                }
                self.transfer_queued(&mut wheel);
                let expired = self.expire_bucket(&mut wheel);
                wheel.tick += 1;
                expired
            };

            for entry in expired {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                let timeout = Timeout { entry };
                let outcome = catch_unwind(AssertUnwindSafe(|| timeout.entry.task.run(&timeout)));
                if outcome.is_err() {
                    error!(
                        deadline_ms = timeout.deadline_ms(),
                        "Timer task panicked; worker continues"
                    );
                }
                fired += 1;
            }
        }
        fired
    }

    fn transfer_queued(&self, wheel: &mut WheelState) {
        for entry in self.queue_rx.try_iter().take(MAX_TRANSFER_PER_TICK) {
            if !entry.is_pending() {
                continue;
            }
            let calculated = entry.deadline_ms().saturating_sub(1) / self.tick_ms;
            let remaining_rounds = calculated.saturating_sub(wheel.tick) / (self.mask + 1);
            let ticks = calculated.max(wheel.tick);
            let bucket = (ticks & self.mask) as usize;
            wheel.buckets[bucket].push(Slot {
                entry,
                remaining_rounds,
            });
        }
    }

    fn expire_bucket(&self, wheel: &mut WheelState) -> Vec<Arc<TimeoutEntry>> {
        let bucket = (wheel.tick & self.mask) as usize;
        let slots = std::mem::take(&mut wheel.buckets[bucket]);
        let mut expired = Vec::new();
        let mut kept = Vec::with_capacity(slots.len());
        for mut slot in slots {
            if !slot.entry.is_pending() {
                continue;
            }
            if slot.remaining_rounds == 0 {
                if slot.entry.try_expire() {
                    expired.push(slot.entry);
                }
            } else {
                slot.remaining_rounds -= 1;
                kept.push(slot);
            }
        }
        wheel.buckets[bucket] = kept;
        expired
    }

    /// Halt processing and hand back every timeout that never fired
    fn shutdown(&self) -> Vec<Timeout> {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return Vec::new();
        }
        if let Some(worker) = self.worker.lock().as_ref() {
            worker.unpark();
        }

        let mut wheel = self.wheel.lock();
        let mut unprocessed: Vec<Timeout> = wheel
            .buckets
            .iter_mut()
            .flat_map(|bucket| bucket.drain(..))
            .filter(|slot| slot.entry.is_pending())
            .map(|slot| Timeout { entry: slot.entry })
            .collect();
        unprocessed.extend(
            self.queue_rx
                .try_iter()
                .filter(|entry| entry.is_pending())
                .map(|entry| Timeout { entry }),
        );
        unprocessed
    }
}

impl Timer for TimerCore {
    fn new_timeout(&self, task: Arc<dyn TimerTask>, delay: Duration) -> Result<Timeout, TimerError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(TimerError::Stopped);
        }

        let pending = self.pending.fetch_add(1, Ordering::AcqRel) + 1;
        if self.max_pending > 0 && pending > self.max_pending {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(TimerError::TooManyPending {
                pending,
                max: self.max_pending,
            });
        }

        let deadline_ms = self.elapsed_ms() + delay.as_millis() as u64;
        let entry = Arc::new(TimeoutEntry::new(task, deadline_ms, self.self_ref.clone()));
        // Receiver lives in `self`, so the queue cannot be disconnected here.
        let _ = self.queue_tx.send(Arc::clone(&entry));
        Ok(Timeout { entry })
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}

/// The shared idle-check timer.
///
/// Started with [`HashedWheelTimer::start`] it owns a worker thread driven
/// by the system clock. Built with [`HashedWheelTimer::manual`] it has no
/// thread and only moves when [`HashedWheelTimer::advance`] is called.
/// Dropping the timer stops it.
pub struct HashedWheelTimer {
    core: Arc<TimerCore>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: Option<ThreadId>,
}

impl HashedWheelTimer {
    /// Start a wheel on its own worker thread
    pub fn start(config: WheelConfig) -> Result<Self, TimerError> {
        let core = TimerCore::new(&config, Arc::new(SystemClock::new()));
        let worker_core = Arc::clone(&core);
        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || run_worker(worker_core))
            .map_err(|source| TimerError::Spawn {
                name: config.thread_name.clone(),
                source,
            })?;
        *core.worker.lock() = Some(handle.thread().clone());

        info!(
            thread = %config.thread_name,
            tick_ms = core.tick_ms,
            buckets = core.mask + 1,
            "Idle-check timer started"
        );
        Ok(Self {
            worker_id: Some(handle.thread().id()),
            core,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Build a wheel without a worker, driven by `clock` and [`Self::advance`]
    pub fn manual(config: WheelConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            core: TimerCore::new(&config, clock),
            worker: Mutex::new(None),
            worker_id: None,
        }
    }

    /// Fire everything that is due at the clock's current reading.
    ///
    /// Returns the number of tasks run. Tasks re-armed during this call are
    /// picked up on the following tick.
    pub fn advance(&self) -> usize {
        self.core.process_due_ticks()
    }

    /// Stop the wheel; returns timeouts that were armed but never fired
    pub fn stop(&self) -> Vec<Timeout> {
        let unprocessed = self.core.shutdown();
        let on_worker = self.worker_id == Some(thread::current().id());
        if !on_worker {
            if let Some(handle) = self.worker.lock().take() {
                if handle.join().is_err() {
                    error!("Idle-check timer worker exited with a panic");
                }
            }
        }
        debug!(unprocessed = unprocessed.len(), "Idle-check timer stopped");
        unprocessed
    }

    /// Armed timeouts that have neither fired nor been cancelled
    pub fn pending_timeouts(&self) -> usize {
        self.core.pending.load(Ordering::Acquire)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.core.tick_ms)
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.core.clock)
    }
}

impl Timer for HashedWheelTimer {
    fn new_timeout(&self, task: Arc<dyn TimerTask>, delay: Duration) -> Result<Timeout, TimerError> {
        self.core.new_timeout(task, delay)
    }

    fn is_stopped(&self) -> bool {
        self.core.is_stopped()
    }

    fn now_ms(&self) -> u64 {
        self.core.now_ms()
    }
}

impl Drop for HashedWheelTimer {
    fn drop(&mut self) {
        if !self.core.is_stopped() {
            self.stop();
        }
    }
}

fn run_worker(core: Arc<TimerCore>) {
    while !core.is_stopped() {
        let wait = core.until_next_tick();
        if wait.is_zero() {
            core.process_due_ticks();
        } else {
            thread::park_timeout(wait);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::ManualClock;
    use std::sync::atomic::AtomicU64;

    struct Recorder {
        clock: Arc<ManualClock>,
        fired_at: Mutex<Vec<u64>>,
    }

    impl TimerTask for Recorder {
        fn run(&self, _timeout: &Timeout) {
            self.fired_at.lock().push(self.clock.now_ms());
        }
    }

    struct Counter(AtomicU64);

    impl TimerTask for Counter {
        fn run(&self, _timeout: &Timeout) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Panicker;

    impl TimerTask for Panicker {
        fn run(&self, _timeout: &Timeout) {
            panic!("task failure");
        }
    }

    fn manual_wheel(ticks_per_wheel: usize) -> (HashedWheelTimer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let config = WheelConfig {
            tick_duration: Duration::from_millis(100),
            ticks_per_wheel,
            ..Default::default()
        };
        (HashedWheelTimer::manual(config, clock.clone()), clock)
    }

    fn step(timer: &HashedWheelTimer, clock: &ManualClock, ms: u64) -> usize {
        let mut fired = 0;
        for _ in 0..ms / 100 {
            clock.advance(Duration::from_millis(100));
            fired += timer.advance();
        }
        fired
    }

    #[test]
    fn fires_on_first_tick_at_or_after_deadline() {
        let (timer, clock) = manual_wheel(8);
        let recorder = Arc::new(Recorder {
            clock: clock.clone(),
            fired_at: Mutex::new(Vec::new()),
        });
        timer.new_timeout(recorder.clone(), Duration::from_millis(300)).unwrap();
        timer.new_timeout(recorder.clone(), Duration::from_millis(250)).unwrap();

        step(&timer, &clock, 200);
        assert!(recorder.fired_at.lock().is_empty(), "not due yet");
        step(&timer, &clock, 100);
        assert_eq!(*recorder.fired_at.lock(), vec![300, 300]);
    }

    #[test]
    fn cancel_prevents_fire() {
        let (timer, clock) = manual_wheel(8);
        let counter = Arc::new(Counter(AtomicU64::new(0)));
        let timeout = timer.new_timeout(counter.clone(), Duration::from_millis(100)).unwrap();
        assert_eq!(timer.pending_timeouts(), 1);

        assert!(timeout.cancel());
        assert!(!timeout.cancel(), "second cancel is a no-op");
        assert!(timeout.is_cancelled());
        assert_eq!(timer.pending_timeouts(), 0);

        step(&timer, &clock, 500);
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancel_after_fire_is_rejected() {
        let (timer, clock) = manual_wheel(8);
        let counter = Arc::new(Counter(AtomicU64::new(0)));
        let timeout = timer.new_timeout(counter.clone(), Duration::ZERO).unwrap();
        assert_eq!(step(&timer, &clock, 100), 1);
        assert!(timeout.is_expired());
        assert!(!timeout.cancel());
    }

    #[test]
    fn delays_longer_than_one_revolution_wait_their_rounds() {
        // 4 buckets of 100ms: one revolution is 400ms
        let (timer, clock) = manual_wheel(4);
        let recorder = Arc::new(Recorder {
            clock: clock.clone(),
            fired_at: Mutex::new(Vec::new()),
        });
        timer.new_timeout(recorder.clone(), Duration::from_millis(1000)).unwrap();
        step(&timer, &clock, 900);
        assert!(recorder.fired_at.lock().is_empty());
        step(&timer, &clock, 100);
        assert_eq!(*recorder.fired_at.lock(), vec![1000]);
    }

    #[test]
    fn bucket_count_rounds_up_to_power_of_two() {
        let (timer, _clock) = manual_wheel(100);
        assert_eq!(timer.core.mask + 1, 128);
    }

    #[test]
    fn panicking_task_does_not_stop_the_wheel() {
        let (timer, clock) = manual_wheel(8);
        let counter = Arc::new(Counter(AtomicU64::new(0)));
        timer.new_timeout(Arc::new(Panicker), Duration::from_millis(100)).unwrap();
        timer.new_timeout(counter.clone(), Duration::from_millis(100)).unwrap();
        assert_eq!(step(&timer, &clock, 100), 2);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stopped_timer_rejects_and_returns_unprocessed() {
        let (timer, _clock) = manual_wheel(8);
        let counter = Arc::new(Counter(AtomicU64::new(0)));
        let armed = timer.new_timeout(counter.clone(), Duration::from_millis(500)).unwrap();
        let cancelled = timer.new_timeout(counter.clone(), Duration::from_millis(500)).unwrap();
        cancelled.cancel();

        let unprocessed = timer.stop();
        assert_eq!(unprocessed.len(), 1);
        assert_eq!(unprocessed[0].deadline_ms(), armed.deadline_ms());
        assert!(timer.is_stopped());
        assert!(matches!(
            timer.new_timeout(counter, Duration::ZERO),
            Err(TimerError::Stopped)
        ));
    }

    #[test]
    fn pending_limit_is_enforced() {
        let clock = Arc::new(ManualClock::new(0));
        let timer = HashedWheelTimer::manual(
            WheelConfig {
                max_pending_timeouts: 2,
                ..Default::default()
            },
            clock,
        );
        let counter = Arc::new(Counter(AtomicU64::new(0)));
        timer.new_timeout(counter.clone(), Duration::from_secs(1)).unwrap();
        timer.new_timeout(counter.clone(), Duration::from_secs(1)).unwrap();
        match timer.new_timeout(counter, Duration::from_secs(1)) {
            Err(TimerError::TooManyPending { pending, max }) => {
                assert_eq!(pending, 3);
                assert_eq!(max, 2);
            }
            other => panic!("Expected TooManyPending, got {:?}", other),
        }
        assert_eq!(timer.pending_timeouts(), 2);
    }

    #[test]
    fn timeout_exposes_its_timer() {
        let (timer, _clock) = manual_wheel(8);
        let timeout = timer
            .new_timeout(Arc::new(Counter(AtomicU64::new(0))), Duration::from_millis(100))
            .unwrap();
        let owner = timeout.timer().expect("timer alive");
        assert!(!owner.is_stopped());
        drop(owner);
        drop(timer);
        assert!(timeout.timer().is_none());
    }

    #[test]
    fn worker_thread_fires_with_system_clock() {
        let timer = HashedWheelTimer::start(WheelConfig {
            tick_duration: Duration::from_millis(10),
            thread_name: "wheel-test".to_string(),
            ..Default::default()
        })
        .unwrap();
        let counter = Arc::new(Counter(AtomicU64::new(0)));
        timer.new_timeout(counter.clone(), Duration::from_millis(20)).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while counter.0.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        timer.stop();
        assert!(timer.is_stopped());
    }
}
