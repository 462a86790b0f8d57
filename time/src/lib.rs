#![cfg_attr(not(test), no_std)]

use core::sync::atomic::{AtomicU64, Ordering};

/// Monotonic tick counter driven by the timer interrupt.
///
/// The value is only an ordering key, it has no relation to wall-clock time.
#[derive(Debug, Default)]
pub struct Ticks(AtomicU64);

impl Ticks {
    ///
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }
    /// Current tick value
    pub fn now(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
    /// Advance by one tick and return the new value
    pub fn tick(&self) -> u64 {
        self.advance(1)
    }
    /// Advance by `n` ticks and return the new value
    pub fn advance(&self, n: u64) -> u64 {
        self.0.fetch_add(n, Ordering::AcqRel) + n
    }
}

/// Kernel-wide tick counter, bumped once per timer interrupt
pub static TICKS: Ticks = Ticks::new();
