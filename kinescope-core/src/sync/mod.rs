//! Synchronization primitives shared by the render task, the interrupt
//! handler and framebuffer writers
//!
//! Each primitive has a single designated producer and consumer context,
//! except the frame buffer lock which any task may take. `TransferEpoch`
//! is for hardware layers that run transfers in a task of their own.

pub mod epoch;
pub mod lock;
pub mod notify;
pub mod signal;

pub use epoch::{TransferEpoch, TransferGuard};
pub use lock::{BufferGuard, FrameBufferLock};
pub use notify::{CompletionNotification, NotifyOutcome};
pub use signal::DrawRequest;
