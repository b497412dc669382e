//! Render subsystem errors

/// Errors reported by the display subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RenderError {
    /// Display not initialized (never, or not since the last reset)
    NotInitialized,
    /// Frame buffer lock is held by someone else
    Busy,
    /// Frame buffer lock not acquired within the configured timeout
    LockTimeout,
    /// Hardware did not report frame completion in time
    HardwareFault,
    /// Hardware refused to start a frame transfer
    StartFailed,
    /// Hardware bring-up failed
    InitFailed,
}

impl RenderError {
    /// Check if the render loop must stop and hand this to its owner
    ///
    /// A fatal error means the subsystem can no longer trust the hardware or
    /// the lock; the owner is expected to reset and re-initialize.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RenderError::LockTimeout | RenderError::HardwareFault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors() {
        assert!(RenderError::HardwareFault.is_fatal());
        assert!(RenderError::LockTimeout.is_fatal());
        assert!(!RenderError::NotInitialized.is_fatal());
        assert!(!RenderError::StartFailed.is_fatal());
        assert!(!RenderError::Busy.is_fatal());
    }
}
