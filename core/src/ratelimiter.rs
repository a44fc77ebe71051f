use std::time::{Duration, Instant};

/// Single-slot spacing limiter: consecutive acquisitions are at least
/// `1000 / rate` ms apart. No burst credit is accumulated while idle.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    spacing: Duration,
    last_call: Option<Instant>,
}

impl RateLimiter {
    pub const DEFAULT_RATE: f64 = 1.0;

    /// `calls_per_sec` falls back to one call per second when unset or not positive.
    pub fn new(calls_per_sec: Option<f64>) -> Self {
        let rate = match calls_per_sec {
            Some(r) if r.is_finite() && r > 0.0 => r,
            _ => Self::DEFAULT_RATE,
        };
        // rounded up so the spacing never undercuts 1000/rate ms
        let spacing = Duration::from_nanos((1e9 / rate).ceil() as u64);
        RateLimiter { spacing, last_call: None }
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Time still to wait before the next call may go out.
    pub fn remaining(&self) -> Duration {
        match self.last_call {
            Some(last) => (last + self.spacing).saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }

    /// Blocks until the spacing since the previous call has elapsed, then
    /// records the current instant as the last call.
    pub fn acquire(&mut self) {
        let wait = self.remaining();
        if !wait.is_zero() {
            tracing::debug!(wait_ms = wait.as_millis() as u64, "throttling remote call");
            std::thread::sleep(wait);
        }
        self.last_call = Some(Instant::now());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        RateLimiter::new(None)
    }
}
