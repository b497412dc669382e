//! Draw request signal
//!
//! Level-triggered: requests issued before the render task consumes the
//! signal collapse into a single pending draw.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;
use portable_atomic::{AtomicU32, Ordering};

/// Binary draw request event
pub struct DrawRequest<M: RawMutex> {
    signal: Signal<M, ()>,
    /// Requests issued since construction, coalesced or not
    requests: AtomicU32,
}

impl<M: RawMutex> Default for DrawRequest<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex> DrawRequest<M> {
    /// Create a signal with no draw pending
    pub const fn new() -> Self {
        Self {
            signal: Signal::new(),
            requests: AtomicU32::new(0),
        }
    }

    /// Request a draw
    ///
    /// Never blocks. A no-op for the consumer while a draw is already pending.
    pub fn request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.signal.signal(());
    }

    /// Wait for a pending draw and consume it
    pub async fn wait(&self) {
        self.signal.wait().await
    }

    /// Check if a draw is pending
    pub fn is_pending(&self) -> bool {
        self.signal.signaled()
    }

    /// Drop a pending draw without consuming it
    pub fn clear(&self) {
        self.signal.reset();
    }

    /// Total number of `request` calls
    pub fn requests(&self) -> u32 {
        self.requests.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    #[test]
    fn test_requests_coalesce() {
        let draw: DrawRequest<CriticalSectionRawMutex> = DrawRequest::new();
        assert!(!draw.is_pending());

        draw.request();
        draw.request();
        draw.request();
        assert!(draw.is_pending());
        assert_eq!(draw.requests(), 3);

        // One wait consumes all three
        block_on(draw.wait());
        assert!(!draw.is_pending());
    }

    #[test]
    fn test_clear_drops_pending_draw() {
        let draw: DrawRequest<CriticalSectionRawMutex> = DrawRequest::new();
        draw.request();
        draw.clear();
        assert!(!draw.is_pending());
        assert_eq!(draw.requests(), 1);
    }
}
