//! Render configuration
//!
//! The defaults reproduce the baseline behaviour: every wait is unbounded and
//! any hardware event completes the outstanding frame. Bounded waits and the
//! stricter completion policy are opt-in.

use embassy_time::Duration;
use kinescope_hal::HardwareEvent;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which hardware events complete an outstanding frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CompletionPolicy {
    /// First event of either kind completes the frame
    #[default]
    AnyEvent,
    /// Only `FrameCompleted` completes the frame; `FrameAccepted` is ignored
    ///
    /// Required for hardware that interrupts twice per frame, otherwise the
    /// lock would be released while pixels are still being shifted out.
    FrameCompleted,
}

impl CompletionPolicy {
    /// Check if `event` completes an outstanding frame under this policy
    pub fn completes(&self, event: HardwareEvent) -> bool {
        match self {
            CompletionPolicy::AnyEvent => true,
            CompletionPolicy::FrameCompleted => event.is_completion(),
        }
    }
}

/// Render sequencer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RenderConfig {
    /// Completion wait limit in ms (None = wait forever)
    #[cfg_attr(feature = "serde", serde(default))]
    pub completion_timeout_ms: Option<u32>,
    /// Frame buffer lock wait limit in ms (None = wait forever)
    #[cfg_attr(feature = "serde", serde(default))]
    pub lock_timeout_ms: Option<u32>,
    /// Completion policy for hardware events
    #[cfg_attr(feature = "serde", serde(default))]
    pub completion: CompletionPolicy,
    /// First pixel column transferred each frame
    #[cfg_attr(feature = "serde", serde(default))]
    pub origin_x: u16,
    /// First pixel row transferred each frame
    #[cfg_attr(feature = "serde", serde(default))]
    pub origin_y: u16,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderConfig {
    /// Baseline configuration: unbounded waits, any event completes, origin (0, 0)
    pub const fn new() -> Self {
        Self {
            completion_timeout_ms: None,
            lock_timeout_ms: None,
            completion: CompletionPolicy::AnyEvent,
            origin_x: 0,
            origin_y: 0,
        }
    }

    /// Bound the completion wait; expiry is reported as a hardware fault
    pub const fn with_completion_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.completion_timeout_ms = Some(timeout_ms);
        self
    }

    /// Bound the frame buffer lock wait of the render task
    pub const fn with_lock_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.lock_timeout_ms = Some(timeout_ms);
        self
    }

    /// Select which hardware events complete a frame
    pub const fn with_completion_policy(mut self, completion: CompletionPolicy) -> Self {
        self.completion = completion;
        self
    }

    /// Set the frame geometry used by every render pass
    pub const fn with_origin(mut self, x: u16, y: u16) -> Self {
        self.origin_x = x;
        self.origin_y = y;
        self
    }

    /// Completion wait limit
    pub fn completion_timeout(&self) -> Option<Duration> {
        self.completion_timeout_ms
            .map(|ms| Duration::from_millis(ms as u64))
    }

    /// Lock wait limit
    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(|ms| Duration::from_millis(ms as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unbounded() {
        let config = RenderConfig::default();
        assert_eq!(config.completion_timeout(), None);
        assert_eq!(config.lock_timeout(), None);
        assert_eq!(config.completion, CompletionPolicy::AnyEvent);
        assert_eq!((config.origin_x, config.origin_y), (0, 0));
    }

    #[test]
    fn test_builder() {
        let config = RenderConfig::new()
            .with_completion_timeout_ms(50)
            .with_lock_timeout_ms(200)
            .with_completion_policy(CompletionPolicy::FrameCompleted)
            .with_origin(4, 8);

        assert_eq!(config.completion_timeout(), Some(Duration::from_millis(50)));
        assert_eq!(config.lock_timeout(), Some(Duration::from_millis(200)));
        assert_eq!(config.completion, CompletionPolicy::FrameCompleted);
        assert_eq!((config.origin_x, config.origin_y), (4, 8));
    }

    #[test]
    fn test_completion_policy() {
        let any = CompletionPolicy::AnyEvent;
        assert!(any.completes(HardwareEvent::FrameAccepted));
        assert!(any.completes(HardwareEvent::FrameCompleted));

        let strict = CompletionPolicy::FrameCompleted;
        assert!(!strict.completes(HardwareEvent::FrameAccepted));
        assert!(strict.completes(HardwareEvent::FrameCompleted));
    }
}
