//! Render counters

use portable_atomic::{AtomicU32, Ordering};

/// Snapshot of the render counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RenderStats {
    /// `request_draw` calls, coalesced or not
    pub draw_requests: u32,
    /// Frame starts accepted by the hardware
    pub frames_started: u32,
    /// Frames whose completion was consumed
    pub frames_completed: u32,
    /// Hardware events with no frame outstanding
    pub stray_events: u32,
    /// Hardware events that did not complete the outstanding frame
    pub ignored_events: u32,
    /// Draws dropped because the display was not initialized
    pub skipped_draws: u32,
    /// Frame starts refused by the hardware
    pub start_failures: u32,
    /// Completion or lock timeouts
    pub faults: u32,
}

pub(crate) struct Counters {
    pub(crate) frames_started: AtomicU32,
    pub(crate) frames_completed: AtomicU32,
    pub(crate) stray_events: AtomicU32,
    pub(crate) ignored_events: AtomicU32,
    pub(crate) skipped_draws: AtomicU32,
    pub(crate) start_failures: AtomicU32,
    pub(crate) faults: AtomicU32,
}

impl Counters {
    pub(crate) const fn new() -> Self {
        Self {
            frames_started: AtomicU32::new(0),
            frames_completed: AtomicU32::new(0),
            stray_events: AtomicU32::new(0),
            ignored_events: AtomicU32::new(0),
            skipped_draws: AtomicU32::new(0),
            start_failures: AtomicU32::new(0),
            faults: AtomicU32::new(0),
        }
    }

    /// Increment a counter
    pub(crate) fn bump(counter: &AtomicU32) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, draw_requests: u32) -> RenderStats {
        RenderStats {
            draw_requests,
            frames_started: self.frames_started.load(Ordering::Relaxed),
            frames_completed: self.frames_completed.load(Ordering::Relaxed),
            stray_events: self.stray_events.load(Ordering::Relaxed),
            ignored_events: self.ignored_events.load(Ordering::Relaxed),
            skipped_draws: self.skipped_draws.load(Ordering::Relaxed),
            start_failures: self.start_failures.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
        }
    }
}
