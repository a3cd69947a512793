use std::time::Duration;

/// Capped exponential reconnect delay.
///
/// The n-th consecutive delay is `min(floor * 2^(n-1), ceiling)`. Jitter is
/// off unless configured; when on, up to `jitter_ratio * delay` is added.
#[derive(Debug, Clone)]
pub struct Backoff {
    floor: Duration,
    ceiling: Duration,
    current: Duration,
    jitter_ratio: f64,
}

impl Backoff {
    pub const DEFAULT_FLOOR: Duration = Duration::from_secs(1);
    pub const DEFAULT_CEILING: Duration = Duration::from_secs(30);

    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        let ceiling = ceiling.max(floor);
        Self {
            floor,
            ceiling,
            current: floor,
            jitter_ratio: 0.0,
        }
    }

    pub fn with_jitter(mut self, ratio: f64) -> Self {
        self.jitter_ratio = if ratio.is_finite() {
            ratio.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    /// Delay the next failure would wait, before jitter.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Returns the delay for this failure and doubles it for the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.ceiling);
        delay + self.jitter(delay)
    }

    pub fn reset(&mut self) {
        self.current = self.floor;
    }

    fn jitter(&self, delay: Duration) -> Duration {
        if self.jitter_ratio <= 0.0 {
            return Duration::ZERO;
        }
        delay.mul_f64(self.jitter_ratio * rand::random::<f64>())
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FLOOR, Self::DEFAULT_CEILING)
    }
}
