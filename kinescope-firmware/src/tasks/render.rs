//! Render task
//!
//! Runs the frame render sequencer on the high-priority executor so a
//! completion event reschedules it immediately.

use defmt::*;

use crate::channels::{DISPLAY_FAULT, DISPLAY_RECOVERED};
use crate::panel::PanelDisplay;

/// Render task
///
/// `run` only returns on a fatal error. The supervisor in `main` resets and
/// re-initializes the display, then the sequencer is restarted here.
#[embassy_executor::task]
pub async fn render_task(display: &'static PanelDisplay) {
    loop {
        let fault = display.run().await;
        error!("Display fault: {:?}, waiting for recovery", fault);
        DISPLAY_FAULT.signal(fault);
        DISPLAY_RECOVERED.wait().await;
        info!("Display recovered, restarting render loop");
    }
}
