//! Display configuration
//!
//! Constants generated by build.rs from display.toml. The framebuffer size
//! depends on them, so they cannot be loaded at runtime.

use kinescope_core::{CompletionPolicy, RenderConfig};

include!(concat!(env!("OUT_DIR"), "/display_config.rs"));

/// RGB565
pub const BYTES_PER_PIXEL: usize = 2;

/// Framebuffer size in bytes
pub const FRAMEBUFFER_LEN: usize = PANEL_WIDTH * PANEL_HEIGHT * BYTES_PER_PIXEL;
