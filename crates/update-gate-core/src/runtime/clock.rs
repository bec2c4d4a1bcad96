// crates/update-gate-core/src/runtime/clock.rs
// ============================================================================
// Module: Update Gate Clocks
// Description: System and manual time sources.
// Purpose: Keep wall-clock reads behind the Clock interface.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;

use crate::core::time::Timestamp;
use crate::interfaces::Clock;

// ============================================================================
// SECTION: Clocks
// ============================================================================

/// Wall-clock time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Caller-controlled time source.
#[derive(Debug, Default)]
pub struct ManualClock {
    /// Current time in unix milliseconds.
    millis: AtomicI64,
}

impl ManualClock {
    /// Creates a clock fixed at `at`.
    #[must_use]
    pub const fn new(at: Timestamp) -> Self {
        Self {
            millis: AtomicI64::new(at.as_unix_millis()),
        }
    }

    /// Moves the clock to `at`.
    pub fn set(&self, at: Timestamp) {
        self.millis.store(at.as_unix_millis(), Ordering::SeqCst);
    }

    /// Advances the clock by `millis`.
    pub fn advance_millis(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_unix_millis(self.millis.load(Ordering::SeqCst))
    }
}
