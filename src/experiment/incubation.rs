//! Blocking waits for incubation periods.
//!
//! Between plate readings the culture sits in a temperature-controlled
//! incubator for a configured wall-clock duration, and the driver simply has
//! nothing to do. [`IncubationWaiter`] polls a clock at a fixed interval
//! (default 5 s), reporting remaining time each tick, and returns once the
//! full duration has elapsed. It never returns early.
//!
//! There is no drift correction: each poll may overshoot the deadline by up
//! to one interval, and the overshoot accumulates across a multi-day run.
//! The incubation biology tolerates far more than that. There is also no
//! cancellation - the only way to abort a wait is to terminate the process.
//!
//! The clock is a trait so tests can drive the wait with a mock instead of
//! wall time, and progress is surfaced through `tracing` plus an optional
//! injected callback.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::info;

/// Default pause between remaining-time checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Source of time for [`IncubationWaiter`].
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Sleep for the given duration.
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock time via `std::time::Instant` and `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Callback invoked once per poll tick with the remaining duration.
pub type ProgressFn = Box<dyn FnMut(Duration) + Send>;

/// Blocking, polling wait for a wall-clock duration.
pub struct IncubationWaiter<C: Clock = SystemClock> {
    clock: C,
    poll_interval: Duration,
    on_progress: Option<ProgressFn>,
}

impl IncubationWaiter<SystemClock> {
    /// Waiter on the system clock with the default poll interval.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for IncubationWaiter<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> IncubationWaiter<C> {
    /// Waiter on a caller-provided clock.
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            poll_interval: DEFAULT_POLL_INTERVAL,
            on_progress: None,
        }
    }

    /// Override the poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Install a progress callback, invoked each tick with remaining time.
    pub fn on_progress(mut self, callback: ProgressFn) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Wait until at least `duration` has elapsed.
    ///
    /// Polls the clock, sleeping at most one poll interval per iteration.
    /// Guaranteed not to return before the duration has fully elapsed; may
    /// return up to one poll interval late.
    pub async fn wait(&mut self, duration: Duration) {
        let start = self.clock.now();
        info!(seconds = duration.as_secs(), "incubation started");

        loop {
            let elapsed = self.clock.now().saturating_duration_since(start);
            if elapsed >= duration {
                break;
            }
            let remaining = duration - elapsed;
            info!(remaining_secs = remaining.as_secs(), "incubating");
            if let Some(callback) = self.on_progress.as_mut() {
                callback(remaining);
            }
            self.clock.sleep(remaining.min(self.poll_interval)).await;
        }

        info!(seconds = duration.as_secs(), "incubation complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Clock whose time only moves when something sleeps on it.
    #[derive(Clone)]
    struct StepClock {
        start: Instant,
        offset: Arc<Mutex<Duration>>,
    }

    impl StepClock {
        fn new() -> Self {
            Self {
                start: Instant::now(),
                offset: Arc::new(Mutex::new(Duration::ZERO)),
            }
        }

        fn elapsed(&self) -> Duration {
            *self.offset.lock().unwrap()
        }
    }

    #[async_trait]
    impl Clock for StepClock {
        fn now(&self) -> Instant {
            self.start + self.elapsed()
        }

        async fn sleep(&self, duration: Duration) {
            *self.offset.lock().unwrap() += duration;
        }
    }

    #[tokio::test]
    async fn never_returns_before_the_duration() {
        let clock = StepClock::new();
        let handle = clock.clone();
        let mut waiter = IncubationWaiter::with_clock(clock);

        waiter.wait(Duration::from_secs(3600)).await;
        assert!(handle.elapsed() >= Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn reports_progress_each_tick() {
        let clock = StepClock::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut waiter = IncubationWaiter::with_clock(clock).on_progress(Box::new(move |left| {
            sink.lock().unwrap().push(left);
        }));

        waiter.wait(Duration::from_secs(12)).await;

        // 12 s at a 5 s interval: ticks at 12, 7, and 2 s remaining
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], Duration::from_secs(12));
        assert_eq!(seen[2], Duration::from_secs(2));
    }

    #[tokio::test]
    async fn zero_duration_returns_immediately() {
        let clock = StepClock::new();
        let handle = clock.clone();
        let mut waiter = IncubationWaiter::with_clock(clock);
        waiter.wait(Duration::ZERO).await;
        assert_eq!(handle.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn final_sleep_is_clamped_to_remaining() {
        let clock = StepClock::new();
        let handle = clock.clone();
        let mut waiter = IncubationWaiter::with_clock(clock);
        waiter.wait(Duration::from_secs(7)).await;
        // 5 s tick + clamped 2 s tick, no overshoot with a stepped clock
        assert_eq!(handle.elapsed(), Duration::from_secs(7));
    }
}
