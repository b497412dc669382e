//! ST7789 panel hardware layer
//!
//! Split in two halves:
//! - [`St7789`] implements `DisplayHardware` and lives inside the display
//!   subsystem, behind the frame buffer lock. It never waits on the bus:
//!   bring-up and frame starts are queued as [`PanelJob`]s.
//! - [`PanelBus`] owns SPI, DC and CS. The panel DMA task drives it and
//!   reports transfer progress back through `on_hardware_event`.
//!
//! The two halves meet in a [`PanelLink`]. Every `init` and `reset` starts a
//! new generation; jobs and transfers from an older generation are dropped
//! and never report events. Frame starts are refused until the bring-up
//! sequence of the current generation has finished, so the completion
//! timeout only ever covers pixel transfer time.

use core::ptr::NonNull;
use core::slice;

use embassy_rp::gpio::Output;
use embassy_rp::peripherals::SPI0;
use embassy_rp::spi::{self, Async, Spi};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{block_for, Duration, Timer};

use kinescope_core::{DisplaySubsystem, TransferEpoch, TransferGuard};
use kinescope_hal::DisplayHardware;

use crate::config::{
    BYTES_PER_PIXEL, FRAMEBUFFER_LEN, PANEL_COL_OFFSET, PANEL_HEIGHT, PANEL_ROW_OFFSET,
    PANEL_WIDTH,
};

/// Display subsystem driving the ST7789
pub type PanelDisplay = DisplaySubsystem<CriticalSectionRawMutex, St7789>;

/// ST7789 commands
mod cmd {
    pub const SWRESET: u8 = 0x01;
    pub const SLPOUT: u8 = 0x11;
    pub const NORON: u8 = 0x13;
    pub const INVON: u8 = 0x21;
    pub const DISPON: u8 = 0x29;
    pub const CASET: u8 = 0x2A;
    pub const RASET: u8 = 0x2B;
    pub const RAMWR: u8 = 0x2C;
    pub const MADCTL: u8 = 0x36;
    pub const COLMOD: u8 = 0x3A;
}

/// Landscape, RGB order
const MADCTL_LANDSCAPE: u8 = 0x70;

/// 16 bits per pixel (RGB565)
const COLMOD_RGB565: u8 = 0x55;

/// Panel hardware errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PanelError {
    /// Frame requested before init or after reset
    NotInitialized,
    /// DMA task has not drained the previous job
    QueueFull,
    /// Bring-up sequence still running
    NotReady,
    /// Frame origin outside the panel
    OutOfBounds,
}

/// Channel capacity for panel jobs (one init plus one frame in flight)
const PANEL_JOB_CHANNEL_SIZE: usize = 2;

/// Work for the panel DMA task
pub enum PanelJob {
    /// Send the controller bring-up sequence
    Init { generation: u32 },
    /// Transfer the framebuffer from the given origin
    Frame(FrameRegion),
}

impl PanelJob {
    /// Generation the job was queued in
    pub fn generation(&self) -> u32 {
        match self {
            PanelJob::Init { generation } => *generation,
            PanelJob::Frame(region) => region.generation,
        }
    }
}

/// Framebuffer region handed to the DMA task
pub struct FrameRegion {
    base: NonNull<u8>,
    x: u16,
    y: u16,
    generation: u32,
}

// SAFETY: the framebuffer is 'static and a region only moves from the render
// task to the panel DMA task, which reads it under the lock discipline
// documented on `FrameRegion::pixels`.
unsafe impl Send for FrameRegion {}

impl FrameRegion {
    /// First transferred column
    pub fn x(&self) -> u16 {
        self.x
    }

    /// First transferred row
    pub fn y(&self) -> u16 {
        self.y
    }

    /// Generation the frame was started in
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Framebuffer contents
    ///
    /// # Safety
    /// The caller must hold [`PanelLink::begin_transfer`] and have checked
    /// that the region belongs to the current generation. Until it reports
    /// `FrameCompleted` the render task holds the frame buffer lock. If the
    /// render task gives up first, the display is left uninitialized, and
    /// writers regain access only after `reset` plus
    /// [`PanelLink::wait_idle`] plus `init`, which cannot finish while the
    /// transfer guard is held.
    pub unsafe fn pixels(&self) -> &[u8] {
        slice::from_raw_parts(self.base.as_ptr(), FRAMEBUFFER_LEN)
    }
}

/// Shared state between [`St7789`] and the panel DMA task
pub struct PanelLink {
    jobs: Channel<CriticalSectionRawMutex, PanelJob, PANEL_JOB_CHANNEL_SIZE>,
    /// Advanced by every `init` and `reset`
    epoch: TransferEpoch<CriticalSectionRawMutex>,
}

impl Default for PanelLink {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelLink {
    /// Create a link with no generation started
    pub const fn new() -> Self {
        Self {
            jobs: Channel::new(),
            epoch: TransferEpoch::new(),
        }
    }

    /// Current generation
    pub fn generation(&self) -> u32 {
        self.epoch.current()
    }

    /// Check if `generation` is still current
    pub fn is_current(&self, generation: u32) -> bool {
        self.epoch.is_current(generation)
    }

    /// Check if the current generation finished bring-up
    pub fn is_ready(&self) -> bool {
        self.epoch.is_ready()
    }

    /// Record that `generation` finished bring-up
    pub fn mark_ready(&self, generation: u32) -> bool {
        self.epoch.mark_ready(generation)
    }

    /// Wait for the next job
    pub async fn next_job(&self) -> PanelJob {
        self.jobs.receive().await
    }

    /// Claim the bus for one job
    pub async fn begin_transfer(&self) -> TransferGuard<'_, CriticalSectionRawMutex> {
        self.epoch.begin_transfer().await
    }

    /// Wait until the DMA task is between jobs
    ///
    /// After a `reset` this guarantees no transfer still reads the framebuffer.
    pub async fn wait_idle(&self) {
        self.epoch.wait_idle().await
    }

    /// Invalidate queued jobs and in-flight transfers
    fn next_generation(&self) -> u32 {
        while self.jobs.try_receive().is_ok() {}
        self.epoch.advance()
    }

    fn queue(&self, job: PanelJob) -> Result<(), PanelError> {
        self.jobs.try_send(job).map_err(|_| PanelError::QueueFull)
    }
}

/// ST7789 hardware layer
pub struct St7789 {
    framebuffer: &'static mut [u8; FRAMEBUFFER_LEN],
    reset: Output<'static>,
    backlight: Output<'static>,
    link: &'static PanelLink,
    initialized: bool,
}

impl St7789 {
    /// Create the hardware layer
    ///
    /// # Arguments
    /// - `framebuffer`: Pixel memory (RGB565, big-endian, row-major)
    /// - `reset`: Active-low controller reset line
    /// - `backlight`: Backlight enable
    /// - `link`: Shared with the panel DMA task
    pub fn new(
        framebuffer: &'static mut [u8; FRAMEBUFFER_LEN],
        reset: Output<'static>,
        backlight: Output<'static>,
        link: &'static PanelLink,
    ) -> Self {
        Self {
            framebuffer,
            reset,
            backlight,
            link,
            initialized: false,
        }
    }
}

impl DisplayHardware for St7789 {
    type Error = PanelError;

    fn init(&mut self) -> Result<(), PanelError> {
        let generation = self.link.next_generation();

        // Reset pulse must be at least 10us
        self.reset.set_low();
        block_for(Duration::from_micros(20));
        self.reset.set_high();

        self.link.queue(PanelJob::Init { generation })?;
        self.backlight.set_high();
        self.initialized = true;
        Ok(())
    }

    fn reset(&mut self) {
        self.initialized = false;
        self.link.next_generation();
        self.backlight.set_low();
        // Held in reset until the next init
        self.reset.set_low();
    }

    fn start_frame(&mut self, x_offset: u16, y_offset: u16) -> Result<(), PanelError> {
        if !self.initialized {
            return Err(PanelError::NotInitialized);
        }
        if x_offset as usize >= PANEL_WIDTH || y_offset as usize >= PANEL_HEIGHT {
            return Err(PanelError::OutOfBounds);
        }
        if !self.link.is_ready() {
            return Err(PanelError::NotReady);
        }

        let region = FrameRegion {
            base: NonNull::from(&mut *self.framebuffer).cast::<u8>(),
            x: x_offset,
            y: y_offset,
            generation: self.link.generation(),
        };
        self.link.queue(PanelJob::Frame(region))
    }

    fn buffer(&self) -> &[u8] {
        &self.framebuffer[..]
    }

    fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.framebuffer[..]
    }
}

/// ST7789 SPI bus (command/data framing)
pub struct PanelBus {
    spi: Spi<'static, SPI0, Async>,
    dc: Output<'static>,
    cs: Output<'static>,
}

impl PanelBus {
    /// Create the bus
    ///
    /// # Arguments
    /// - `spi`: TX-only SPI with DMA
    /// - `dc`: Data/command select (low = command)
    /// - `cs`: Active-low chip select
    pub fn new(spi: Spi<'static, SPI0, Async>, dc: Output<'static>, cs: Output<'static>) -> Self {
        Self { spi, dc, cs }
    }

    /// Send the bring-up sequence
    ///
    /// Expects the reset line to have just been released.
    pub async fn init_sequence(&mut self) -> Result<(), spi::Error> {
        Timer::after_millis(5).await;
        self.command(cmd::SWRESET, &[]).await?;
        Timer::after_millis(150).await;
        self.command(cmd::SLPOUT, &[]).await?;
        Timer::after_millis(10).await;
        self.command(cmd::COLMOD, &[COLMOD_RGB565]).await?;
        self.command(cmd::MADCTL, &[MADCTL_LANDSCAPE]).await?;
        self.command(cmd::INVON, &[]).await?;
        self.command(cmd::NORON, &[]).await?;
        self.command(cmd::DISPON, &[]).await?;
        Timer::after_millis(10).await;
        Ok(())
    }

    /// Open a RAM write window from (x, y) to the bottom-right corner
    pub async fn set_window(&mut self, x: u16, y: u16) -> Result<(), spi::Error> {
        let x0 = PANEL_COL_OFFSET + x;
        let x1 = PANEL_COL_OFFSET + PANEL_WIDTH as u16 - 1;
        let y0 = PANEL_ROW_OFFSET + y;
        let y1 = PANEL_ROW_OFFSET + PANEL_HEIGHT as u16 - 1;

        self.command(cmd::CASET, &window_bytes(x0, x1)).await?;
        self.command(cmd::RASET, &window_bytes(y0, y1)).await?;
        self.command(cmd::RAMWR, &[]).await
    }

    /// Stream the window opened by `set_window`
    pub async fn write_pixels(&mut self, pixels: &[u8], x: u16, y: u16) -> Result<(), spi::Error> {
        let row_bytes = PANEL_WIDTH * BYTES_PER_PIXEL;
        let skip = x as usize * BYTES_PER_PIXEL;
        let rows = &pixels[y as usize * row_bytes..];

        self.dc.set_high();
        self.cs.set_low();

        let result = if skip == 0 {
            // Rows are contiguous, one DMA transfer
            self.spi.write(rows).await
        } else {
            let mut result = Ok(());
            for row in rows.chunks_exact(row_bytes) {
                result = self.spi.write(&row[skip..]).await;
                if result.is_err() {
                    break;
                }
            }
            result
        };

        self.cs.set_high();
        result
    }

    async fn command(&mut self, command: u8, params: &[u8]) -> Result<(), spi::Error> {
        self.cs.set_low();
        self.dc.set_low();

        let mut result = self.spi.write(&[command]).await;
        if result.is_ok() && !params.is_empty() {
            self.dc.set_high();
            result = self.spi.write(params).await;
        }

        self.cs.set_high();
        result
    }
}

/// CASET/RASET parameter bytes
fn window_bytes(start: u16, end: u16) -> [u8; 4] {
    let [s_hi, s_lo] = start.to_be_bytes();
    let [e_hi, e_lo] = end.to_be_bytes();
    [s_hi, s_lo, e_hi, e_lo]
}
