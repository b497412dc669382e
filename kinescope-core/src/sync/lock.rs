//! Frame buffer lock
//!
//! Guards the display hardware layer, and with it the pixel memory it owns.
//! The render task holds the lock from frame start to completion; any other
//! task mutating pixels must hold it too, otherwise frames tear.
//!
//! Releasing is dropping the [`BufferGuard`], so only the holder can release.

use core::ops::{Deref, DerefMut};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embassy_time::{with_timeout, Duration};
use kinescope_hal::DisplayHardware;
use portable_atomic::{AtomicBool, Ordering};

use crate::error::RenderError;

/// Mutual exclusion over the shared framebuffer
pub struct FrameBufferLock<M: RawMutex, H> {
    inner: Mutex<M, H>,
    held: AtomicBool,
}

/// Exclusive access to the framebuffer
///
/// Dereferences to the pixel bytes. The lock is released on drop.
pub struct BufferGuard<'a, M: RawMutex, H> {
    guard: MutexGuard<'a, M, H>,
    held: &'a AtomicBool,
}

impl<M: RawMutex, H> FrameBufferLock<M, H> {
    /// Wrap the hardware layer owning the pixel memory
    pub const fn new(hardware: H) -> Self {
        Self {
            inner: Mutex::new(hardware),
            held: AtomicBool::new(false),
        }
    }

    /// Acquire the lock
    ///
    /// # Arguments
    /// - `timeout`: Maximum wait, or None to wait forever
    ///
    /// Returns `LockTimeout` if the lock stayed held for the whole timeout.
    pub async fn acquire(
        &self,
        timeout: Option<Duration>,
    ) -> Result<BufferGuard<'_, M, H>, RenderError> {
        let guard = match timeout {
            None => self.inner.lock().await,
            Some(limit) => with_timeout(limit, self.inner.lock())
                .await
                .map_err(|_| RenderError::LockTimeout)?,
        };
        Ok(self.hold(guard))
    }

    /// Acquire the lock without waiting
    pub fn try_acquire(&self) -> Result<BufferGuard<'_, M, H>, RenderError> {
        let guard = self.inner.try_lock().map_err(|_| RenderError::Busy)?;
        Ok(self.hold(guard))
    }

    /// Check if someone currently holds the lock
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    fn hold<'a>(&'a self, guard: MutexGuard<'a, M, H>) -> BufferGuard<'a, M, H> {
        self.held.store(true, Ordering::Release);
        BufferGuard {
            guard,
            held: &self.held,
        }
    }
}

impl<'a, M: RawMutex, H> BufferGuard<'a, M, H> {
    /// Release the lock
    pub fn release(self) {}

    /// Hardware layer behind the lock
    pub(crate) fn hardware(&mut self) -> &mut H {
        &mut *self.guard
    }
}

impl<M: RawMutex, H: DisplayHardware> Deref for BufferGuard<'_, M, H> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.guard.buffer()
    }
}

impl<M: RawMutex, H: DisplayHardware> DerefMut for BufferGuard<'_, M, H> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.guard.buffer_mut()
    }
}

impl<M: RawMutex, H> Drop for BufferGuard<'_, M, H> {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}
