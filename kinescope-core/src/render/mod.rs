//! Frame rendering
//!
//! The [`DisplaySubsystem`] is the single context object owning every
//! primitive of the render path. The render task drives it through
//! [`DisplaySubsystem::run`]; producers, writers and the interrupt handler
//! share it by reference.

pub mod sequencer;
pub mod state;
pub mod stats;
pub mod subsystem;

pub use state::RenderState;
pub use stats::RenderStats;
pub use subsystem::{DisplaySubsystem, InitStatus};
