//! Kinescope Hardware Abstraction Layer
//!
//! This crate defines the contract between the render core and the code that
//! actually drives a display peripheral. Chip and panel specific crates
//! implement [`DisplayHardware`]; the render core only ever talks to the trait.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  kinescope-core (render sequencer)      │
//! └─────────────────────────────────────────┘
//!          │ start_frame        ▲ HardwareEvent (IRQ)
//!          ▼                    │
//! ┌─────────────────────────────────────────┐
//! │  kinescope-hal (this crate - traits)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  panel driver (ST7789 on RP2040, ...)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`display::DisplayHardware`] - Display bring-up, reset and frame transfer

#![no_std]
#![deny(unsafe_code)]

pub mod display;

pub use display::{DisplayHardware, HardwareEvent};
