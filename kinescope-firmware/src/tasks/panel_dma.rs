//! Panel DMA task
//!
//! Drains the panel job queue: sends the controller bring-up sequence and
//! streams frames over SPI DMA. Each frame reports `FrameAccepted` once the
//! RAM window is open and `FrameCompleted` once the last byte is out.
//! Jobs and transfers overtaken by a reset report nothing.

use defmt::*;

use kinescope_hal::HardwareEvent;

use crate::channels::PANEL_LINK;
use crate::panel::{FrameRegion, PanelBus, PanelDisplay, PanelJob};

/// Panel DMA task
#[embassy_executor::task]
pub async fn panel_dma_task(mut bus: PanelBus, display: &'static PanelDisplay) {
    info!("Panel DMA task started");

    loop {
        let job = PANEL_LINK.next_job().await;
        let _active = PANEL_LINK.begin_transfer().await;

        if !PANEL_LINK.is_current(job.generation()) {
            debug!("Dropping panel job from generation {}", job.generation());
            continue;
        }

        match job {
            PanelJob::Init { generation } => bring_up(&mut bus, display, generation).await,
            PanelJob::Frame(region) => transfer_frame(&mut bus, display, &region).await,
        }
    }
}

async fn bring_up(bus: &mut PanelBus, display: &PanelDisplay, generation: u32) {
    if let Err(e) = bus.init_sequence().await {
        error!("Panel init sequence failed: {:?}", e);
        return;
    }

    if PANEL_LINK.mark_ready(generation) {
        info!("Panel initialized");
        // Frames refused during bring-up are repainted now
        display.request_draw();
    }
}

async fn transfer_frame(bus: &mut PanelBus, display: &PanelDisplay, region: &FrameRegion) {
    if let Err(e) = bus.set_window(region.x(), region.y()).await {
        warn!("Panel window setup failed: {:?}", e);
    }
    report(display, region, HardwareEvent::FrameAccepted);

    // SAFETY: the transfer guard is held and the region was current when the
    // job was taken, see `FrameRegion::pixels`.
    let pixels = unsafe { region.pixels() };
    if let Err(e) = bus.write_pixels(pixels, region.x(), region.y()).await {
        // Still report completion so the lock is released
        warn!("Frame transfer failed: {:?}", e);
    }

    report(display, region, HardwareEvent::FrameCompleted);
}

/// Forward a transfer event unless a reset has overtaken the frame
fn report(display: &PanelDisplay, region: &FrameRegion, event: HardwareEvent) {
    if PANEL_LINK.is_current(region.generation()) {
        display.on_hardware_event(event);
    } else {
        debug!("Dropping {:?} from generation {}", event, region.generation());
    }
}
