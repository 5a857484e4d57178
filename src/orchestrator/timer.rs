//! # Timers
//!
//! The repeating cycle timer and the one-shot connection timeout timer.
//!
//! Both are polled from the orchestrator's `select!` loop. A stopped or
//! disarmed timer never completes, so its branch simply stays pending.

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior, Sleep};

/// Which timer fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    CycleTick,
    ConnectionTimeout,
}

enum Schedule {
    Stopped,
    Repeating(Interval),
    OneShot(Pin<Box<Sleep>>),
}

/// Cycle timer
///
/// The first tick comes one full interval after [`CycleTimer::start`].
pub struct CycleTimer {
    schedule: Schedule,
}

impl CycleTimer {
    pub fn new() -> Self {
        Self { schedule: Schedule::Stopped }
    }

    /// Start ticking every `interval`, or once if not `repeating`
    pub fn start(&mut self, interval: Duration, repeating: bool) {
        let first = Instant::now() + interval;

        self.schedule = if repeating {
            let mut ticker = interval_at(first, interval);
            // An overrun cycle does not cause a burst of catch-up ticks
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Schedule::Repeating(ticker)
        } else {
            Schedule::OneShot(Box::pin(tokio::time::sleep_until(first)))
        };
    }

    pub fn is_running(&self) -> bool {
        !matches!(self.schedule, Schedule::Stopped)
    }

    /// Wait for the next tick
    ///
    /// Cancel safe.
    pub async fn tick(&mut self) {
        match &mut self.schedule {
            Schedule::Stopped => pending().await,
            Schedule::Repeating(ticker) => {
                ticker.tick().await;
            }
            Schedule::OneShot(deadline) => {
                deadline.as_mut().await;
                self.schedule = Schedule::Stopped;
            }
        }
    }
}

impl Default for CycleTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot connection timeout timer
pub struct TimeoutTimer {
    deadline: Option<Pin<Box<Sleep>>>,
}

impl TimeoutTimer {
    pub fn new() -> Self {
        Self { deadline: None }
    }

    /// Start (or restart) the countdown
    pub fn arm(&mut self, duration: Duration) {
        self.deadline = Some(Box::pin(sleep(duration)));
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Wait until the armed deadline passes, then disarm
    ///
    /// Cancel safe.
    pub async fn fired(&mut self) {
        match self.deadline.as_mut() {
            Some(deadline) => {
                deadline.as_mut().await;
                self.deadline = None;
            }
            None => pending().await,
        }
    }
}

impl Default for TimeoutTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns both timers and drives the orchestration cadence
#[derive(Default)]
pub struct TimerSupervisor {
    cycle: CycleTimer,
    timeout: TimeoutTimer,
}

impl TimerSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_cycle(&mut self, interval: Duration, repeating: bool) {
        self.cycle.start(interval, repeating);
    }

    pub fn arm_timeout(&mut self, duration: Duration) {
        self.timeout.arm(duration);
    }

    pub fn disarm_timeout(&mut self) {
        self.timeout.disarm();
    }

    pub fn timeout_armed(&self) -> bool {
        self.timeout.is_armed()
    }

    pub fn cycle_running(&self) -> bool {
        self.cycle.is_running()
    }

    /// Wait for whichever timer fires first
    pub async fn next(&mut self) -> TimerEvent {
        tokio::select! {
            _ = self.cycle.tick() => TimerEvent::CycleTick,
            _ = self.timeout.fired() => TimerEvent::ConnectionTimeout,
        }
    }
}
