//! Frame render sequencer
//!
//! One render pass:
//!
//! ```text
//! Idle ──draw request──▶ Locking ──lock + start_frame──▶ Transferring
//!   ▲                                                        │
//!   └──────────── lock released ◀── completion consumed ─────┘
//! ```
//!
//! The lock is held from before the frame start until the completion is
//! consumed, and the notification is armed before the frame start, so there
//! is never more than one transfer outstanding. Draw requests arriving during
//! a pass stay pending and produce exactly one further pass.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::with_timeout;
use kinescope_hal::DisplayHardware;

use super::state::RenderState;
use super::stats::Counters;
use super::subsystem::DisplaySubsystem;
use crate::error::RenderError;

impl<M: RawMutex, H: DisplayHardware> DisplaySubsystem<M, H> {
    /// Render task body
    ///
    /// Announces readiness, then renders one frame per (coalesced) draw
    /// request forever. Returns only on a fatal error, which the owner is
    /// expected to handle by resetting and re-initializing the display
    /// before calling `run` again.
    pub async fn run(&self) -> RenderError {
        info!("Render task started");
        self.announce_ready();

        loop {
            match self.render_once().await {
                Ok(()) => {}
                Err(e) if e.is_fatal() => {
                    error!("Render loop stopped: {}", e);
                    return e;
                }
                Err(e) => debug!("Render pass ended early: {}", e),
            }
        }
    }

    /// Perform exactly one render pass
    ///
    /// Waits for a draw request, then locks, starts and awaits one frame.
    /// The state is back to `Idle` and the lock released whatever the outcome.
    pub async fn render_once(&self) -> Result<(), RenderError> {
        self.draw.wait().await;
        self.state.set(RenderState::Locking);

        let result = self.render_frame().await;

        self.state.set(RenderState::Idle);
        result
    }

    async fn render_frame(&self) -> Result<(), RenderError> {
        let mut frame = match self.buffer.acquire(self.config.lock_timeout()).await {
            Ok(frame) => frame,
            Err(e) => {
                Counters::bump(&self.counters.faults);
                error!("Frame buffer lock not acquired: {}", e);
                return Err(e);
            }
        };

        if let Err(e) = self.ensure_initialized() {
            Counters::bump(&self.counters.skipped_draws);
            warn!("Draw requested while display is not initialized, skipped");
            return Err(e);
        }

        let (x, y) = (self.config.origin_x, self.config.origin_y);

        self.completion.arm();
        self.state.set(RenderState::Transferring);

        if frame.hardware().start_frame(x, y).is_err() {
            self.completion.disarm();
            Counters::bump(&self.counters.start_failures);
            warn!("Hardware refused frame start at ({}, {})", x, y);
            return Err(RenderError::StartFailed);
        }
        Counters::bump(&self.counters.frames_started);
        trace!("Frame started at ({}, {})", x, y);

        let completed = match self.config.completion_timeout() {
            None => {
                self.completion.wait().await;
                Ok(())
            }
            Some(limit) => with_timeout(limit, self.completion.wait())
                .await
                .map_err(|_| RenderError::HardwareFault),
        };

        match completed {
            Ok(()) => {
                Counters::bump(&self.counters.frames_completed);
                trace!("Frame completed");
            }
            Err(_) => {
                // A late interrupt for this frame must count as stray
                self.completion.disarm();
                // The hardware may still be reading the pixels; writers stay
                // locked out until the owner resets and re-initializes
                self.invalidate();
                Counters::bump(&self.counters.faults);
                error!(
                    "No frame completion within {} ms",
                    self.config.completion_timeout_ms.unwrap_or(0)
                );
            }
        }

        // Released unconditionally, success or fault
        frame.release();
        completed
    }
}
