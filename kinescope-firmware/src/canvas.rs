//! embedded-graphics target over the locked framebuffer

use core::convert::Infallible;

use embedded_graphics::pixelcolor::raw::RawU16;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;

use crate::config::{BYTES_PER_PIXEL, PANEL_HEIGHT, PANEL_WIDTH};

/// RGB565 canvas writing big-endian pixels, the panel's wire order
pub struct Canvas<'a> {
    pixels: &'a mut [u8],
}

impl<'a> Canvas<'a> {
    /// Wrap a framebuffer slice; it must hold a whole panel
    pub fn new(pixels: &'a mut [u8]) -> Self {
        debug_assert!(pixels.len() >= PANEL_WIDTH * PANEL_HEIGHT * BYTES_PER_PIXEL);
        Self { pixels }
    }
}

impl OriginDimensions for Canvas<'_> {
    fn size(&self) -> Size {
        Size::new(PANEL_WIDTH as u32, PANEL_HEIGHT as u32)
    }
}

impl DrawTarget for Canvas<'_> {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0
                || point.y < 0
                || point.x as usize >= PANEL_WIDTH
                || point.y as usize >= PANEL_HEIGHT
            {
                continue;
            }
            let index = (point.y as usize * PANEL_WIDTH + point.x as usize) * BYTES_PER_PIXEL;
            let raw = RawU16::from(color).into_inner();
            self.pixels[index..index + 2].copy_from_slice(&raw.to_be_bytes());
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        let raw = RawU16::from(color).into_inner().to_be_bytes();
        for pixel in self.pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            pixel.copy_from_slice(&raw);
        }
        Ok(())
    }
}
