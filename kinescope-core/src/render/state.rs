//! Render sequencer states

use portable_atomic::{AtomicU8, Ordering};

/// Sequencer state
///
/// `Idle → Locking → Transferring → Idle`, forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum RenderState {
    /// Waiting for a draw request
    Idle = 0,
    /// Acquiring the frame buffer lock
    Locking = 1,
    /// Frame start issued, waiting for the hardware to complete it
    Transferring = 2,
}

impl RenderState {
    /// Get the state as a byte value
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Create a state from a byte value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(RenderState::Idle),
            1 => Some(RenderState::Locking),
            2 => Some(RenderState::Transferring),
            _ => None,
        }
    }
}

/// Atomically readable sequencer state
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) const fn new() -> Self {
        Self(AtomicU8::new(RenderState::Idle as u8))
    }

    pub(crate) fn get(&self) -> RenderState {
        RenderState::from_u8(self.0.load(Ordering::Acquire)).unwrap_or(RenderState::Idle)
    }

    pub(crate) fn set(&self, state: RenderState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }
}
