//! Embassy async tasks
//!
//! Each task runs independently and communicates via the display subsystem
//! and the channels in `crate::channels`.

pub mod panel_dma;
pub mod producer;
pub mod render;

pub use panel_dma::panel_dma_task;
pub use producer::producer_task;
pub use render::render_task;
