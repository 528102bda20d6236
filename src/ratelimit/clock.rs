//! Wall-clock sources for window timestamps.

use std::sync::Arc;

use parking_lot::Mutex;

/// A source of wall-clock milliseconds since the Unix epoch.
///
/// Every process sharing a store must read comparable clocks; skew between
/// hosts shifts their windows by the same amount and is not corrected.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// System clock backed by `chrono::Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        // Pre-epoch clocks are clamped rather than wrapped
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Manually driven clock for tests.
///
/// Clones share the same time value.
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    current_ms: Arc<Mutex<u64>>,
}

impl MockClock {
    /// Create a mock clock starting at `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        Self {
            current_ms: Arc::new(Mutex::new(start_ms)),
        }
    }

    /// Advance the clock by `delta_ms`.
    pub fn advance(&self, delta_ms: u64) {
        *self.current_ms.lock() += delta_ms;
    }

    /// Set the clock to an absolute value.
    pub fn set(&self, now_ms: u64) {
        *self.current_ms.lock() = now_ms;
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        *self.current_ms.lock()
    }
}
