//! Demo scene producer
//!
//! Draws into the shared framebuffer through the frame buffer lock, then
//! asks the render task for a frame. Stands in for the application layer.

use core::fmt::Write;

use defmt::*;
use embassy_time::{Duration, Ticker};
use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::Text;
use heapless::String;

use crate::canvas::Canvas;
use crate::config::{FRAME_INTERVAL_MS, PANEL_HEIGHT, PANEL_WIDTH};
use crate::panel::PanelDisplay;

/// Width of the moving bar in pixels
const BAR_WIDTH: u32 = 16;

/// Producer task
#[embassy_executor::task]
pub async fn producer_task(display: &'static PanelDisplay) {
    display.wait_ready().await;
    info!("Producer started, frame interval {}ms", FRAME_INTERVAL_MS);

    let mut ticker = Ticker::every(Duration::from_millis(FRAME_INTERVAL_MS));
    let mut frame: u32 = 0;

    loop {
        ticker.next().await;

        match display.lock_buffer(None).await {
            Ok(mut pixels) => {
                draw_scene(&mut Canvas::new(&mut pixels), frame);
                pixels.release();
                display.request_draw();
                frame = frame.wrapping_add(1);
            }
            Err(e) => {
                // Display is being reset by the supervisor
                debug!("Framebuffer unavailable: {:?}", e);
            }
        }
    }
}

fn draw_scene(canvas: &mut Canvas<'_>, frame: u32) {
    let _ = canvas.clear(Rgb565::BLACK);

    let travel = PANEL_WIDTH as u32 - BAR_WIDTH;
    let x = frame.wrapping_mul(2) % travel;
    let _ = Rectangle::new(
        Point::new(x as i32, 0),
        Size::new(BAR_WIDTH, PANEL_HEIGHT as u32),
    )
    .into_styled(PrimitiveStyle::with_fill(Rgb565::CYAN))
    .draw(canvas);

    let mut label: String<24> = String::new();
    let _ = write!(label, "frame {}", frame);
    let style = MonoTextStyle::new(&FONT_6X10, Rgb565::WHITE);
    let _ = Text::new(&label, Point::new(4, 12), style).draw(canvas);
}
