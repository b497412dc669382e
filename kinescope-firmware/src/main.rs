//! Kinescope - Display Render Firmware
//!
//! Drives an ST7789 panel from an RP2040. A producer draws into a shared
//! framebuffer, the render task turns draw requests into SPI DMA transfers,
//! and a supervisor recovers the display after hardware faults.
//!
//! Named after the early television picture tube.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_rp::gpio::{Level, Output};
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use embassy_rp::spi::{self, Spi};
use embassy_time::Timer;
use static_cell::{ConstStaticCell, StaticCell};
use {defmt_rtt as _, panic_probe as _};

use kinescope_core::{InitStatus, RenderError};

use crate::channels::{DISPLAY_FAULT, DISPLAY_RECOVERED, PANEL_LINK};
use crate::config::{FRAMEBUFFER_LEN, RENDER_CONFIG, SPI_FREQUENCY_HZ};
use crate::panel::{PanelBus, PanelDisplay, St7789};

mod canvas;
mod channels;
mod config;
mod panel;
mod tasks;

// Render task executor; preempts the thread executor so a completion
// event reschedules the render task immediately
static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn SWI_IRQ_1() {
    EXECUTOR_HIGH.on_interrupt()
}

/// Delay between recovery attempts
const RECOVERY_RETRY_MS: u64 = 250;

// Static cells (must live forever for task references)
static FRAMEBUFFER: ConstStaticCell<[u8; FRAMEBUFFER_LEN]> =
    ConstStaticCell::new([0; FRAMEBUFFER_LEN]);
static DISPLAY: StaticCell<PanelDisplay> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Kinescope firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    // Pin assignments are board-specific (Pico Display Pack:
    // SCK=GPIO18, MOSI=GPIO19, CS=GPIO17, DC=GPIO16, BL=GPIO20)
    let mut spi_config = spi::Config::default();
    spi_config.frequency = SPI_FREQUENCY_HZ;
    let spi = Spi::new_txonly(p.SPI0, p.PIN_18, p.PIN_19, p.DMA_CH0, spi_config);

    let cs = Output::new(p.PIN_17, Level::High);
    let dc = Output::new(p.PIN_16, Level::Low);
    let backlight = Output::new(p.PIN_20, Level::Low);
    let reset = Output::new(p.PIN_21, Level::Low);

    let bus = PanelBus::new(spi, dc, cs);
    let panel = St7789::new(FRAMEBUFFER.take(), reset, backlight, &PANEL_LINK);
    let display: &'static PanelDisplay = DISPLAY.init(PanelDisplay::new(panel, RENDER_CONFIG));
    info!("SPI initialized at {} Hz", SPI_FREQUENCY_HZ);

    match display.init() {
        Ok(InitStatus::Sync) => info!("Display initialized"),
        Ok(InitStatus::Async) => info!("Display initialized, waiting for render task"),
        Err(e) => error!("Display init failed: {:?}", e),
    }

    // Spawn render task on the high-priority executor
    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let high_spawner = EXECUTOR_HIGH.start(interrupt::SWI_IRQ_1);
    high_spawner.spawn(tasks::render_task(display)).unwrap();

    spawner.spawn(tasks::panel_dma_task(bus, display)).unwrap();
    spawner.spawn(tasks::producer_task(display)).unwrap();

    info!("All tasks spawned, supervising display");

    loop {
        let fault = DISPLAY_FAULT.wait().await;
        recover(display, fault).await;
        DISPLAY_RECOVERED.signal(());
    }
}

/// Reset and re-initialize the display after a fatal render error
///
/// Retries until the display is back; the render loop stays stopped meanwhile.
async fn recover(display: &'static PanelDisplay, fault: RenderError) {
    warn!("Recovering display after {:?}", fault);
    info!("Stats before recovery: {:?}", display.stats());

    let mut attempt: u32 = 1;
    while let Err(e) = reinit(display).await {
        error!(
            "Display recovery attempt {} failed: {:?}, retrying in {}ms",
            attempt, e, RECOVERY_RETRY_MS
        );
        attempt = attempt.wrapping_add(1);
        Timer::after_millis(RECOVERY_RETRY_MS).await;
    }
    info!("Display re-initialized after {} attempt(s)", attempt);
}

async fn reinit(display: &'static PanelDisplay) -> Result<(), RenderError> {
    // Forced: a writer may still hold the framebuffer
    display.reset(true).await?;
    // A transfer the render task gave up on may still read the pixels
    PANEL_LINK.wait_idle().await;
    // The DMA task requests a repaint once bring-up finishes
    display.init()?;
    Ok(())
}
