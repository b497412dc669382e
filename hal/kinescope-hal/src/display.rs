//! Display peripheral abstraction
//!
//! The hardware layer owns the pixel memory and performs transfers
//! asynchronously: `start_frame` only kicks a transfer off, completion is
//! reported later from interrupt context as a [`HardwareEvent`].

/// Transfer progress reported by the display peripheral's interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HardwareEvent {
    /// Controller latched the frame request (window set, transfer running)
    FrameAccepted,
    /// All pixel data for the frame has been shifted out
    FrameCompleted,
}

impl HardwareEvent {
    /// Check if this event marks the end of the transfer
    pub fn is_completion(&self) -> bool {
        matches!(self, HardwareEvent::FrameCompleted)
    }
}

/// Display hardware layer
///
/// Implementations drive one physical panel. None of these methods may block
/// waiting for a transfer; the render core serializes calls and holds the
/// framebuffer lock for the whole lifetime of a transfer.
pub trait DisplayHardware {
    /// Error type for hardware operations
    type Error;

    /// Bring up the display controller
    ///
    /// Must run once before any other call, and again after [`reset`](Self::reset).
    fn init(&mut self) -> Result<(), Self::Error>;

    /// Forcibly reset the controller
    ///
    /// The display is inoperable afterwards until [`init`](Self::init) runs again.
    fn reset(&mut self);

    /// Begin an asynchronous transfer of the framebuffer
    ///
    /// # Arguments
    /// - `x_offset`: First pixel column of the transferred region
    /// - `y_offset`: First pixel row of the transferred region
    ///
    /// Returns as soon as the transfer is queued. Completion is reported through
    /// the interrupt path, never through the return value.
    fn start_frame(&mut self, x_offset: u16, y_offset: u16) -> Result<(), Self::Error>;

    /// Shared pixel buffer the transfer reads from
    fn buffer(&self) -> &[u8];

    /// Writable view of the shared pixel buffer
    fn buffer_mut(&mut self) -> &mut [u8];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_event() {
        assert!(HardwareEvent::FrameCompleted.is_completion());
        assert!(!HardwareEvent::FrameAccepted.is_completion());
    }
}
