#![cfg_attr(not(test), no_std)]
//! Single-slot data-ready notification
//!
//! The interrupt handler for a converter's DRDY line calls [ReadySignal::give()] and returns.
//! The worker consuming conversion results blocks in [ReadySignal::wait()]. At most one
//! notification is ever pending: giving an already pending signal is a no-op, so a slow worker
//! sees one edge, not a backlog.
//!
//! ```ignore
//! static DRDY: ReadySignal = ReadySignal::new();
//!
//! #[interrupt]
//! fn EXTI0() {
//!     DRDY.give();
//! }
//! ```
use core::sync::atomic::{AtomicBool, Ordering};
use embedded_hal::delay::DelayNs;
use fugit::MicrosDurationU32;

/// Interval between polls of the pending flag while waiting.
pub const POLL_US: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Ready signal timeout")]
pub struct Timeout;

#[derive(Debug, Default)]
pub struct ReadySignal {
    pending: AtomicBool,
}

impl ReadySignal {
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
        }
    }

    /// Mark the signal pending. Safe to call from interrupt context.
    pub fn give(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Consume a pending notification.
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::Acquire)
    }

    /// Discard any stale notification.
    ///
    /// Must be called before triggering a new conversion.
    pub fn reset(&self) {
        self.pending.store(false, Ordering::Release);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Block until the signal is given or `timeout` elapses.
    ///
    /// Time is accounted in [POLL_US] steps of `delay`, so the bound is approximate
    /// (never shorter than `timeout`).
    pub fn wait<D: DelayNs>(
        &self,
        delay: &mut D,
        timeout: MicrosDurationU32,
    ) -> Result<(), Timeout> {
        let mut elapsed = 0u32;
        loop {
            if self.take() {
                return Ok(());
            }
            if elapsed >= timeout.ticks() {
                return Err(Timeout);
            }
            delay.delay_us(POLL_US);
            elapsed = elapsed.saturating_add(POLL_US);
        }
    }
}
