//! Fixed pause between consecutive provider calls.

use std::time::Duration;

/// Default pause after every attempt.
pub const DEFAULT_PAUSE: Duration = Duration::from_secs(1);

/// Issues the inter-request pause. The fetch loop calls `pause` once after
/// every attempt, success or failure.
pub trait Pacer {
    fn pause(&self);
}

/// Blocks the current thread for a constant interval.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl Default for FixedDelay {
    fn default() -> Self {
        Self(DEFAULT_PAUSE)
    }
}

impl Pacer for FixedDelay {
    fn pause(&self) {
        if !self.0.is_zero() {
            std::thread::sleep(self.0);
        }
    }
}

/// No pause at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl Pacer for NoDelay {
    fn pause(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn fixed_delay_sleeps() {
        let started = Instant::now();
        FixedDelay(Duration::from_millis(15)).pause();
        assert!(started.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn no_delay_returns_immediately() {
        let started = Instant::now();
        for _ in 0..1000 {
            NoDelay.pause();
        }
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
