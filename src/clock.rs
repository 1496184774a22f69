// Time source for the control loop
//
// The runtime asks a Clock for the elapsed time between ticks instead of
// reading a process-wide timer, so tests can step time by hand.

use std::cell::Cell;
use std::time::{Duration, Instant};

pub trait Clock {
    /// Time elapsed since the clock was created
    fn elapsed(&self) -> Duration;
}

/// Wall clock backed by `Instant`
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        self.now.get()
    }
}

/// Tracks the previous sample so callers get a per-tick delta
#[derive(Debug, Clone, Copy, Default)]
pub struct TickTimer {
    last: Option<Duration>,
}

impl TickTimer {
    /// Delta since the last call, or `nominal` on the first tick
    pub fn delta(&mut self, clock: &impl Clock, nominal: Duration) -> Duration {
        let now = clock.elapsed();
        let dt = match self.last {
            Some(last) => now.saturating_sub(last),
            None => nominal,
        };
        self.last = Some(now);
        dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_only_moves_when_advanced() {
        let clock = ManualClock::new();
        assert_eq!(clock.elapsed(), Duration::ZERO);
        clock.advance(Duration::from_millis(20));
        clock.advance(Duration::from_millis(5));
        assert_eq!(clock.elapsed(), Duration::from_millis(25));
    }

    #[test]
    fn tick_timer_uses_nominal_period_first() {
        let clock = ManualClock::new();
        let mut timer = TickTimer::default();
        let nominal = Duration::from_millis(20);

        assert_eq!(timer.delta(&clock, nominal), nominal);
        clock.advance(Duration::from_millis(33));
        assert_eq!(timer.delta(&clock, nominal), Duration::from_millis(33));
        assert_eq!(timer.delta(&clock, nominal), Duration::ZERO);
    }
}
