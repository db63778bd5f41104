//! Minimum-interval send throttling.
//!
//! The rate limiter caps how often frames are *sent*, independent of how
//! often they are *captured*.  A 60 Hz camera produces a frame every ~16 ms,
//! but with the default interval of 66 ms at most ~15 frames per second reach
//! the network, bounding both bandwidth and backend load.

use std::time::{Duration, Instant};

/// Default minimum spacing between two transmissions (~15 sends per second).
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_millis(66);

/// Enforces a fixed minimum wall-clock interval between sends.
///
/// The only state is the timestamp of the last recorded send.  It is never
/// reset; comparisons always use the elapsed delta.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    last_send: Option<Instant>,
}

impl RateLimiter {
    /// Creates a limiter that permits one send per `min_interval`.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_send: None,
        }
    }

    /// Returns `true` if at least `min_interval` has elapsed since the last
    /// recorded send, or if no send has been recorded yet.
    pub fn permitted(&self, now: Instant) -> bool {
        match self.elapsed_since_send(now) {
            Some(elapsed) => elapsed >= self.min_interval,
            None => true,
        }
    }

    /// Records a transmission attempt at `now`.
    pub fn record_send(&mut self, now: Instant) {
        self.last_send = Some(now);
    }

    /// Time since the last recorded send, or `None` before the first send.
    ///
    /// Saturates at zero if `now` is earlier than the recorded timestamp.
    pub fn elapsed_since_send(&self, now: Instant) -> Option<Duration> {
        self.last_send
            .map(|last| now.saturating_duration_since(last))
    }

    /// The configured minimum interval.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_SEND_INTERVAL)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_send_is_always_permitted() {
        let limiter = RateLimiter::default();
        assert!(limiter.permitted(Instant::now()));
    }

    #[test]
    fn test_send_within_interval_is_denied() {
        // Arrange
        let t0 = Instant::now();
        let mut limiter = RateLimiter::new(Duration::from_millis(66));
        limiter.record_send(t0);

        // Act / Assert
        assert!(!limiter.permitted(t0 + Duration::from_millis(65)));
        assert!(limiter.permitted(t0 + Duration::from_millis(66)));
    }

    #[test]
    fn test_clock_going_backwards_is_treated_as_zero_elapsed() {
        let t0 = Instant::now() + Duration::from_secs(1);
        let mut limiter = RateLimiter::new(Duration::from_millis(10));
        limiter.record_send(t0);
        assert_eq!(
            limiter.elapsed_since_send(t0 - Duration::from_millis(5)),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_default_interval_is_66ms() {
        assert_eq!(RateLimiter::default().min_interval(), Duration::from_millis(66));
    }

    #[test]
    fn test_sends_per_second_bounded_for_16ms_capture() {
        // Arrange: a 60 Hz capture device, every tick acknowledged instantly,
        // so the limiter is the only throttle.
        let start = Instant::now();
        let mut limiter = RateLimiter::default();
        let mut send_times = Vec::new();

        // Act: simulate three seconds of ticks.
        for tick in 0..(3000 / 16) {
            let now = start + Duration::from_millis(tick * 16);
            if limiter.permitted(now) {
                limiter.record_send(now);
                send_times.push(now);
            }
        }

        // Assert: any one-second window holds at most ceil(1000 / 66) sends.
        for (i, &window_start) in send_times.iter().enumerate() {
            let in_window = send_times[i..]
                .iter()
                .take_while(|&&t| t < window_start + Duration::from_secs(1))
                .count();
            assert!(in_window <= 16, "{in_window} sends within one second");
        }
    }
}
