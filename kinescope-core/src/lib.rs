//! Board-agnostic display render core
//!
//! Serializes frame draws against a display controller:
//!
//! - Draw requests from any task, coalesced into one pending draw
//! - A single render task that locks the framebuffer, starts a hardware
//!   transfer and waits for the completion interrupt
//! - A frame buffer lock shared with every task writing pixels
//! - An interrupt entry point that hands completions to the render task
//!
//! The hardware itself sits behind [`kinescope_hal::DisplayHardware`]; this
//! crate decides *when* a frame is transferred, never *what* it contains.
//!
//! # Example
//!
//! ```ignore
//! static DISPLAY: StaticCell<DisplaySubsystem<CriticalSectionRawMutex, Panel>> = StaticCell::new();
//!
//! let display = DISPLAY.init(DisplaySubsystem::new(panel, RenderConfig::new()));
//! display.init()?;
//! spawner.spawn(render_task(display)).unwrap();
//! display.wait_ready().await;
//!
//! // Any task
//! let mut pixels = display.lock_buffer(None).await?;
//! pixels.fill(0);
//! pixels.release();
//! display.request_draw();
//!
//! // Display interrupt
//! display.on_hardware_event(HardwareEvent::FrameCompleted);
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// Must come first so the logging macros are visible everywhere
mod fmt;

pub mod config;
pub mod error;
pub mod render;
pub mod sync;

#[cfg(test)]
mod testing;

pub use config::{CompletionPolicy, RenderConfig};
pub use error::RenderError;
pub use render::{DisplaySubsystem, InitStatus, RenderState, RenderStats};
pub use sync::{BufferGuard, NotifyOutcome, TransferEpoch, TransferGuard};
