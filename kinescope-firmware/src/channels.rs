//! Inter-task communication channels
//!
//! Defines the statics used for communication between Embassy tasks.
//! The display subsystem carries its own signals; these only connect the
//! panel driver halves and the fault supervisor.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use kinescope_core::RenderError;

use crate::panel::PanelLink;

/// Panel jobs (init sequence, frame transfers) and bring-up state
pub static PANEL_LINK: PanelLink = PanelLink::new();

/// Fatal render errors handed to the supervisor in `main`
pub static DISPLAY_FAULT: Signal<CriticalSectionRawMutex, RenderError> = Signal::new();

/// Supervisor has reset and re-initialized the display
pub static DISPLAY_RECOVERED: Signal<CriticalSectionRawMutex, ()> = Signal::new();
