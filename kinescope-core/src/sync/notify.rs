//! Hardware completion notification
//!
//! One-slot hand-off from the display interrupt to the render task. The
//! render task arms the slot before every frame start; the interrupt handler
//! completes it at most once. Events arriving with nothing armed are stray and
//! never leave a stale completion behind for the next frame.
//!
//! `notify` is lock-free apart from the waker slot, allocation-free and
//! constant time, so it is safe to call from interrupt context.

use core::future::poll_fn;
use core::task::Poll;

use embassy_sync::waitqueue::AtomicWaker;
use kinescope_hal::HardwareEvent;
use portable_atomic::{AtomicBool, Ordering};

use crate::config::CompletionPolicy;

/// What a hardware event did to the notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NotifyOutcome {
    /// Outstanding frame completed, render task woken
    Completed,
    /// Frame outstanding but the event does not complete it under the policy
    Ignored,
    /// No frame outstanding
    Stray,
}

/// Single-slot completion flag plus scheduler wake-up
pub struct CompletionNotification {
    /// Frame started and not yet completed
    armed: AtomicBool,
    /// Completion delivered, not yet consumed
    pending: AtomicBool,
    waker: AtomicWaker,
}

impl Default for CompletionNotification {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionNotification {
    /// Create an idle notification
    pub const fn new() -> Self {
        Self {
            armed: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            waker: AtomicWaker::new(),
        }
    }

    /// Expect exactly one completion
    ///
    /// Must be called before the hardware frame start so an interrupt firing
    /// immediately is not taken for a stray one.
    pub fn arm(&self) {
        self.pending.store(false, Ordering::Release);
        self.armed.store(true, Ordering::Release);
    }

    /// Stop expecting a completion and drop any undelivered one
    pub fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
        self.pending.store(false, Ordering::Release);
    }

    /// Check if a completion is expected
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Deliver a hardware event (interrupt context)
    pub fn notify(&self, event: HardwareEvent, policy: CompletionPolicy) -> NotifyOutcome {
        if !policy.completes(event) {
            return if self.is_armed() {
                NotifyOutcome::Ignored
            } else {
                NotifyOutcome::Stray
            };
        }

        if !self.armed.swap(false, Ordering::AcqRel) {
            return NotifyOutcome::Stray;
        }

        self.pending.store(true, Ordering::Release);
        self.waker.wake();
        NotifyOutcome::Completed
    }

    /// Wait for the completion and consume it
    pub async fn wait(&self) {
        poll_fn(|cx| {
            self.waker.register(cx.waker());
            if self.pending.swap(false, Ordering::AcqRel) {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    #[test]
    fn test_event_without_frame_is_stray() {
        let notification = CompletionNotification::new();

        let outcome =
            notification.notify(HardwareEvent::FrameCompleted, CompletionPolicy::AnyEvent);
        assert_eq!(outcome, NotifyOutcome::Stray);

        // Arming afterwards must not see the stray event as a completion
        notification.arm();
        assert!(notification.is_armed());
        assert!(!notification.pending.load(Ordering::Acquire));
    }

    #[test]
    fn test_completion_wakes_once() {
        let notification = CompletionNotification::new();
        notification.arm();

        let outcome =
            notification.notify(HardwareEvent::FrameCompleted, CompletionPolicy::AnyEvent);
        assert_eq!(outcome, NotifyOutcome::Completed);
        assert!(!notification.is_armed());

        block_on(notification.wait());

        // A second event for the same frame is an anomaly
        let outcome =
            notification.notify(HardwareEvent::FrameCompleted, CompletionPolicy::AnyEvent);
        assert_eq!(outcome, NotifyOutcome::Stray);
    }

    #[test]
    fn test_accepted_ignored_under_strict_policy() {
        let notification = CompletionNotification::new();
        notification.arm();

        let policy = CompletionPolicy::FrameCompleted;
        assert_eq!(
            notification.notify(HardwareEvent::FrameAccepted, policy),
            NotifyOutcome::Ignored
        );
        assert!(notification.is_armed());

        assert_eq!(
            notification.notify(HardwareEvent::FrameCompleted, policy),
            NotifyOutcome::Completed
        );
    }

    #[test]
    fn test_accepted_completes_under_any_event_policy() {
        let notification = CompletionNotification::new();
        notification.arm();

        let policy = CompletionPolicy::AnyEvent;
        assert_eq!(
            notification.notify(HardwareEvent::FrameAccepted, policy),
            NotifyOutcome::Completed
        );
        // The trailing completion of the same frame has nothing to complete
        assert_eq!(
            notification.notify(HardwareEvent::FrameCompleted, policy),
            NotifyOutcome::Stray
        );
    }

    #[test]
    fn test_disarm_drops_pending_completion() {
        let notification = CompletionNotification::new();
        notification.arm();
        notification.notify(HardwareEvent::FrameCompleted, CompletionPolicy::AnyEvent);

        notification.disarm();
        assert!(!notification.is_armed());
        assert!(!notification.pending.load(Ordering::Acquire));
    }
}
