//! Hardware transfer epochs
//!
//! For hardware layers whose transfers run in another task. Every `init` and
//! `reset` advances the epoch; work queued in an older epoch is stale and must
//! neither run nor report events. An epoch becomes ready once its bring-up
//! has finished, and frame starts are refused until then.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use portable_atomic::{AtomicU32, Ordering};

/// Held by the transfer task while it executes one job
pub type TransferGuard<'a, M> = MutexGuard<'a, M, ()>;

/// Epoch counter plus bring-up and activity tracking
pub struct TransferEpoch<M: RawMutex> {
    /// Zero until the first `advance`
    current: AtomicU32,
    /// Epoch whose bring-up has finished
    ready: AtomicU32,
    active: Mutex<M, ()>,
}

impl<M: RawMutex> Default for TransferEpoch<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex> TransferEpoch<M> {
    /// Create with no epoch started
    pub const fn new() -> Self {
        Self {
            current: AtomicU32::new(0),
            ready: AtomicU32::new(0),
            active: Mutex::new(()),
        }
    }

    /// Current epoch
    pub fn current(&self) -> u32 {
        self.current.load(Ordering::Acquire)
    }

    /// Check if `epoch` is still current
    pub fn is_current(&self, epoch: u32) -> bool {
        self.current() == epoch
    }

    /// Start a new epoch, making all earlier work stale
    pub fn advance(&self) -> u32 {
        // Zero is reserved for "never started"
        let mut next = self.current().wrapping_add(1);
        if next == 0 {
            next = 1;
        }
        self.current.store(next, Ordering::Release);
        next
    }

    /// Record that bring-up of `epoch` finished
    ///
    /// Returns false, changing nothing observable, if `epoch` is stale.
    pub fn mark_ready(&self, epoch: u32) -> bool {
        self.ready.store(epoch, Ordering::Release);
        self.is_current(epoch)
    }

    /// Check if the current epoch finished bring-up
    pub fn is_ready(&self) -> bool {
        let current = self.current();
        current != 0 && self.ready.load(Ordering::Acquire) == current
    }

    /// Claim the hardware for one job
    pub async fn begin_transfer(&self) -> TransferGuard<'_, M> {
        self.active.lock().await
    }

    /// Wait until no job is executing
    ///
    /// After `advance`, no stale transfer touches the framebuffer once this
    /// returns.
    pub async fn wait_idle(&self) {
        drop(self.active.lock().await);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::settle;
    use embassy_futures::block_on;
    use embassy_futures::select::{select, Either};
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    type TestEpoch = TransferEpoch<CriticalSectionRawMutex>;

    #[test]
    fn test_not_ready_before_first_epoch() {
        let epoch = TestEpoch::new();
        assert_eq!(epoch.current(), 0);
        assert!(!epoch.is_ready());
    }

    #[test]
    fn test_frames_refused_until_bring_up_finishes() {
        let epoch = TestEpoch::new();

        let first = epoch.advance();
        assert!(!epoch.is_ready());
        assert!(epoch.mark_ready(first));
        assert!(epoch.is_ready());

        // A reset makes the panel unready again
        epoch.advance();
        assert!(!epoch.is_ready());
    }

    #[test]
    fn test_stale_bring_up_does_not_mark_ready() {
        let epoch = TestEpoch::new();

        // Reset while the first bring-up was still running
        let stale = epoch.advance();
        let fresh = epoch.advance();
        assert!(!epoch.is_current(stale));

        assert!(!epoch.mark_ready(stale));
        assert!(!epoch.is_ready());

        assert!(epoch.mark_ready(fresh));
        assert!(epoch.is_ready());
    }

    #[test]
    fn test_advance_skips_zero() {
        let epoch = TestEpoch::new();
        epoch.current.store(u32::MAX, Ordering::Release);
        assert_eq!(epoch.advance(), 1);
    }

    #[test]
    fn test_wait_idle_blocks_while_transfer_active() {
        let epoch = TestEpoch::new();
        let transfer = block_on(epoch.begin_transfer());

        match block_on(select(epoch.wait_idle(), settle())) {
            Either::First(()) => panic!("idle while a transfer was active"),
            Either::Second(()) => {}
        }

        drop(transfer);
        block_on(epoch.wait_idle());
    }
}
