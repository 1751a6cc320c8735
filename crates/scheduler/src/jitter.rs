//! Randomness for re-enqueue and fast retry delays

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of jitter delays
pub trait JitterSource: Send + Sync {
    /// A delay in `[0, upper)`; zero when `upper` is zero
    fn sample(&self, upper: Duration) -> Duration;
}

/// Uniform millisecond jitter
pub struct RandomJitter {
    rng: Mutex<StdRng>,
}

impl RandomJitter {
    /// Seeded from the operating system
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Reproducible sequence
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomJitter {
    fn default() -> Self {
        Self::new()
    }
}

impl JitterSource for RandomJitter {
    fn sample(&self, upper: Duration) -> Duration {
        let upper_ms = u64::try_from(upper.as_millis()).unwrap_or(u64::MAX);
        if upper_ms == 0 {
            return Duration::ZERO;
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        Duration::from_millis(rng.random_range(0..upper_ms))
    }
}

/// Cycles through a fixed list of delays.
///
/// Values at or above the requested bound are clamped just below it.
pub struct SequenceJitter {
    values: Vec<Duration>,
    next: AtomicUsize,
}

impl SequenceJitter {
    pub fn new(values: impl IntoIterator<Item = Duration>) -> Self {
        Self {
            values: values.into_iter().collect(),
            next: AtomicUsize::new(0),
        }
    }

    /// Always the same delay
    pub fn constant(value: Duration) -> Self {
        Self::new([value])
    }

    /// Number of samples drawn so far
    pub fn draws(&self) -> usize {
        self.next.load(Ordering::Relaxed)
    }
}

impl JitterSource for SequenceJitter {
    fn sample(&self, upper: Duration) -> Duration {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        if upper.is_zero() || self.values.is_empty() {
            return Duration::ZERO;
        }
        let value = self.values[index % self.values.len()];
        value.min(upper - Duration::from_nanos(1))
    }
}
