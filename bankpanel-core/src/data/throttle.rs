//! Global request-rate ceiling shared by all fetch workers.
//!
//! Each call to [`RequestThrottle::acquire`] reserves the next start slot,
//! spaced at least `min_interval` after the previous one, and sleeps until
//! that slot. Reservation happens under the lock; sleeping does not.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct RequestThrottle {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RequestThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    /// A throttle that never waits.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Reserve the next request slot and return how long the caller must wait.
    fn reserve(&self) -> Duration {
        let now = Instant::now();
        let mut next = self
            .next_slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let slot = match *next {
            Some(t) if t > now => t,
            _ => now,
        };
        *next = Some(slot + self.min_interval);
        slot.saturating_duration_since(now)
    }

    /// Block until this caller may start a request.
    pub fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let wait = self.reserve();
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
    }
}
