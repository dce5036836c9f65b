//! Cancelable one-shot tasks driving the engine's time-multiplexed work.
//!
//! All scheduling is cooperative: the host passes the current `Instant` into
//! every engine call and pumps [`ScanEngine::tick`](crate::engine::ScanEngine::tick)
//! whenever a deadline reported by `next_deadline` comes due. Each task carries
//! an explicit `cancel`, so deactivation can deterministically prevent any
//! in-flight callback from firing.

use std::time::{Duration, Instant};

/// One-shot timer with an explicit deadline.
#[derive(Debug, Default)]
pub struct Delay {
    deadline: Option<Instant>,
}

impl Delay {
    pub fn schedule(&mut self, at: Instant) {
        self.deadline = Some(at);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consumes the deadline and returns true when it has come due.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(at) if at <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Rate limiter with a trailing-edge guarantee.
///
/// The first value in a quiet period runs immediately; values arriving inside
/// the window replace each other (last write wins) and the survivor is
/// released once the window closes.
#[derive(Debug)]
pub struct Throttle<T: Copy> {
    window: Duration,
    last_run: Option<Instant>,
    pending: Option<T>,
    deadline: Option<Instant>,
}

impl<T: Copy> Throttle<T> {
    pub fn new(window: Duration) -> Self {
        Self { window, last_run: None, pending: None, deadline: None }
    }

    /// Offers a value. Returns it back when it should run right away,
    /// otherwise holds it for the trailing edge.
    pub fn accept(&mut self, now: Instant, value: T) -> Option<T> {
        let elapsed = self.last_run.map(|at| now.duration_since(at));
        if elapsed.is_none_or(|dt| dt >= self.window) {
            self.last_run = Some(now);
            self.pending = None;
            self.deadline = None;
            Some(value)
        } else {
            self.pending = Some(value);
            self.deadline = self.last_run.map(|at| at + self.window);
            None
        }
    }

    /// Releases the held value once the window has closed.
    pub fn fire(&mut self, now: Instant) -> Option<T> {
        match self.deadline {
            Some(at) if at <= now => {
                self.deadline = None;
                self.last_run = Some(now);
                self.pending.take()
            }
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel(&mut self) {
        self.pending = None;
        self.deadline = None;
        self.last_run = None;
    }
}

/// Coalesces bursts of notifications into one deadline per quiet period.
#[derive(Debug)]
pub struct Debounce {
    quiet: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(quiet: Duration) -> Self {
        Self { quiet, deadline: None }
    }

    /// Restarts the quiet period.
    pub fn poke(&mut self, now: Instant) {
        self.deadline = Some(now + self.quiet);
    }

    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(at) if at <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

/// Earliest of two optional deadlines.
pub fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (Some(x), None) => Some(x),
        (None, y) => y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_throttle_leading_edge_runs_immediately() {
        let mut throttle = Throttle::new(ms(16));
        let t0 = Instant::now();
        assert_eq!(throttle.accept(t0, 1), Some(1));
        assert!(throttle.deadline().is_none());
    }

    #[test]
    fn test_throttle_trailing_edge_keeps_last_value() {
        let mut throttle = Throttle::new(ms(16));
        let t0 = Instant::now();
        assert_eq!(throttle.accept(t0, 1), Some(1));
        assert_eq!(throttle.accept(t0 + ms(5), 2), None);
        assert_eq!(throttle.accept(t0 + ms(10), 3), None);
        // Not due yet
        assert_eq!(throttle.fire(t0 + ms(15)), None);
        // Window closed, the last position wins
        assert_eq!(throttle.fire(t0 + ms(16)), Some(3));
    }

    #[test]
    fn test_throttle_cancel_discards_pending() {
        let mut throttle = Throttle::new(ms(16));
        let t0 = Instant::now();
        throttle.accept(t0, 1);
        throttle.accept(t0 + ms(5), 2);
        throttle.cancel();
        assert_eq!(throttle.fire(t0 + ms(100)), None);
        assert!(!throttle.is_pending());
    }

    #[test]
    fn test_debounce_coalesces_burst() {
        let mut debounce = Debounce::new(ms(100));
        let t0 = Instant::now();
        for i in 0..10 {
            debounce.poke(t0 + ms(i));
        }
        assert!(!debounce.fire(t0 + ms(100)));
        assert!(debounce.fire(t0 + ms(109)));
        // Consumed, does not fire twice
        assert!(!debounce.fire(t0 + ms(200)));
    }

    #[test]
    fn test_delay_fire_and_cancel() {
        let mut delay = Delay::default();
        let t0 = Instant::now();
        delay.schedule(t0 + ms(50));
        assert!(!delay.fire(t0 + ms(49)));
        assert!(delay.fire(t0 + ms(50)));
        assert!(!delay.is_pending());

        delay.schedule(t0 + ms(60));
        delay.cancel();
        assert!(!delay.fire(t0 + ms(200)));
    }

    #[test]
    fn test_earliest_deadline() {
        let t0 = Instant::now();
        assert_eq!(earliest(None, None), None);
        assert_eq!(earliest(Some(t0), None), Some(t0));
        assert_eq!(earliest(Some(t0 + ms(5)), Some(t0 + ms(3))), Some(t0 + ms(3)));
    }
}
