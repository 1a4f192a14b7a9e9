//! Time sources for the trial timeline.

use chrono::{Local, NaiveTime};
use std::time::{Duration, Instant};

/// Monotonic elapsed time plus wall-clock time of day.
///
/// All waits in the timeline go through [`Clock::wait`], so a simulated
/// clock can run a whole session instantly.
pub trait Clock {
    /// Time since the clock was created.
    fn elapsed(&self) -> Duration;

    /// Local time of day.
    fn wall_time(&self) -> NaiveTime;

    /// Block for `duration`.
    fn wait(&mut self, duration: Duration);
}

/// Real time: `Instant` for offsets, `thread::sleep` for waits.
#[derive(Debug, Clone)]
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn wall_time(&self) -> NaiveTime {
        Local::now().time()
    }

    fn wait(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Simulated time. `wait` advances instantly.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Duration,
    wall_start: NaiveTime,
}

impl ManualClock {
    /// Start at zero, with wall time beginning at `wall_start`.
    pub fn new(wall_start: NaiveTime) -> Self {
        Self {
            now: Duration::ZERO,
            wall_start,
        }
    }

    pub fn advance(&mut self, by: Duration) {
        self.now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(NaiveTime::MIN)
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        self.now
    }

    fn wall_time(&self) -> NaiveTime {
        let offset = chrono::Duration::from_std(self.now).unwrap_or(chrono::Duration::zero());
        self.wall_start.overflowing_add_signed(offset).0
    }

    fn wait(&mut self, duration: Duration) {
        self.advance(duration);
    }
}
