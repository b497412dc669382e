//! Display subsystem context and lifecycle
//!
//! Bootstrap (`init`), administrative reset, buffer access for writers and the
//! interrupt entry point. The render loop itself lives in
//! [`sequencer`](super::sequencer).

use core::cell::RefCell;
use core::future::poll_fn;
use core::ptr::{self, NonNull};
use core::task::Poll;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::waitqueue::MultiWakerRegistration;
use embassy_time::Duration;
use kinescope_hal::{DisplayHardware, HardwareEvent};
use portable_atomic::{AtomicBool, AtomicPtr, Ordering};

use super::state::{RenderState, StateCell};
use super::stats::{Counters, RenderStats};
use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::sync::{BufferGuard, CompletionNotification, DrawRequest, FrameBufferLock, NotifyOutcome};

/// Tasks that can wait for readiness at the same time before a re-poll is
/// forced
const READY_WAITERS: usize = 4;

/// How `init` completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitStatus {
    /// Render task already running, display usable now
    Sync,
    /// Wait for [`DisplaySubsystem::wait_ready`] before relying on the display
    Async,
}

/// Display render subsystem
///
/// Owns the draw request signal, the frame buffer lock (and through it the
/// hardware layer), the completion notification and the sequencer state.
/// Construct once, share by reference with the render task, producers and
/// the interrupt handler.
pub struct DisplaySubsystem<M: RawMutex, H: DisplayHardware> {
    pub(crate) config: RenderConfig,
    pub(crate) draw: DrawRequest<M>,
    pub(crate) buffer: FrameBufferLock<M, H>,
    pub(crate) completion: CompletionNotification,
    pub(crate) state: StateCell,
    pub(crate) counters: Counters,
    /// Hardware initialized and not reset since
    initialized: AtomicBool,
    /// Render task has announced itself
    announced: AtomicBool,
    ready_waiters: BlockingMutex<M, RefCell<MultiWakerRegistration<READY_WAITERS>>>,
    /// Framebuffer identity, null while uninitialized
    buffer_ptr: AtomicPtr<u8>,
}

impl<M: RawMutex, H: DisplayHardware> DisplaySubsystem<M, H> {
    /// Create the subsystem around a hardware layer
    ///
    /// Nothing touches the hardware until [`init`](Self::init).
    pub const fn new(hardware: H, config: RenderConfig) -> Self {
        Self {
            config,
            draw: DrawRequest::new(),
            buffer: FrameBufferLock::new(hardware),
            completion: CompletionNotification::new(),
            state: StateCell::new(),
            counters: Counters::new(),
            initialized: AtomicBool::new(false),
            announced: AtomicBool::new(false),
            ready_waiters: BlockingMutex::new(RefCell::new(MultiWakerRegistration::new())),
            buffer_ptr: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Bring up the hardware
    ///
    /// Returns `Async` until the render task has announced itself through
    /// [`run`](Self::run); callers then await [`wait_ready`](Self::wait_ready).
    /// Fails with `Busy` while the frame buffer lock is held.
    pub fn init(&self) -> Result<InitStatus, RenderError> {
        let mut frame = self.buffer.try_acquire()?;

        if frame.hardware().init().is_err() {
            error!("Display hardware init failed");
            return Err(RenderError::InitFailed);
        }

        let pixels = frame.hardware().buffer_mut();
        let len = pixels.len();
        self.buffer_ptr.store(pixels.as_mut_ptr(), Ordering::Release);

        // A stale completion from before init must not end the first frame
        self.completion.disarm();
        self.initialized.store(true, Ordering::Release);
        info!("Display initialized, {} byte framebuffer", len);

        if self.announced.load(Ordering::Acquire) {
            Ok(InitStatus::Sync)
        } else {
            Ok(InitStatus::Async)
        }
    }

    /// Reset the hardware
    ///
    /// Destructive: the display stays unusable until [`init`](Self::init) runs
    /// again, and buffer access is refused until then. A pending draw request
    /// is dropped.
    ///
    /// # Arguments
    /// - `force`: Wait for the frame buffer lock instead of refusing with
    ///   `Busy` when a transfer or a writer holds it
    pub async fn reset(&self, force: bool) -> Result<(), RenderError> {
        let mut frame = if force {
            self.buffer.acquire(None).await?
        } else {
            self.buffer.try_acquire()?
        };

        self.invalidate();
        frame.hardware().reset();
        self.completion.disarm();
        // Draws requested for the old display state are meaningless now
        self.draw.clear();
        warn!("Display reset (force={}), init required", force);
        Ok(())
    }

    /// Wait until the render task has announced itself
    ///
    /// Any number of tasks may wait at once; all of them resolve.
    pub async fn wait_ready(&self) {
        poll_fn(|cx| {
            if self.announced.load(Ordering::Acquire) {
                return Poll::Ready(());
            }
            self.ready_waiters
                .lock(|waiters| waiters.borrow_mut().register(cx.waker()));
            // Announced between the check and the registration
            if self.announced.load(Ordering::Acquire) {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
        .await
    }

    /// Mark the render task as running (first entry of the render loop)
    pub(crate) fn announce_ready(&self) {
        if !self.announced.swap(true, Ordering::AcqRel) {
            info!("Render task ready");
        }
        self.ready_waiters.lock(|waiters| waiters.borrow_mut().wake());
    }

    /// Refuse buffer access until the next `init`
    ///
    /// Caller must hold the frame buffer lock.
    pub(crate) fn invalidate(&self) {
        self.initialized.store(false, Ordering::Release);
        self.buffer_ptr.store(ptr::null_mut(), Ordering::Release);
    }

    /// Request a render pass
    ///
    /// Never blocks; requests made while one is pending are coalesced.
    pub fn request_draw(&self) {
        self.draw.request();
    }

    /// Check if a draw is pending
    pub fn draw_pending(&self) -> bool {
        self.draw.is_pending()
    }

    /// Deliver a display interrupt
    ///
    /// Interrupt context only: non-blocking, constant time, no allocation.
    /// Waking the render task on a higher priority executor makes it run as
    /// soon as the interrupt returns.
    pub fn on_hardware_event(&self, event: HardwareEvent) -> NotifyOutcome {
        let outcome = self.completion.notify(event, self.config.completion);
        match outcome {
            NotifyOutcome::Completed => {}
            NotifyOutcome::Ignored => {
                Counters::bump(&self.counters.ignored_events);
                debug!("Hardware event {} ignored", event);
            }
            NotifyOutcome::Stray => {
                Counters::bump(&self.counters.stray_events);
                warn!("Hardware event {} with no frame outstanding", event);
            }
        }
        outcome
    }

    /// Lock the framebuffer for writing
    ///
    /// # Arguments
    /// - `timeout`: Maximum wait, or None to wait forever
    ///
    /// Every pixel write outside a render pass must happen through the
    /// returned guard. Refused with `NotInitialized` after a reset.
    pub async fn lock_buffer(
        &self,
        timeout: Option<Duration>,
    ) -> Result<BufferGuard<'_, M, H>, RenderError> {
        let frame = self.buffer.acquire(timeout).await?;
        self.ensure_initialized()?;
        Ok(frame)
    }

    /// Lock the framebuffer without waiting
    pub fn try_lock_buffer(&self) -> Result<BufferGuard<'_, M, H>, RenderError> {
        let frame = self.buffer.try_acquire()?;
        self.ensure_initialized()?;
        Ok(frame)
    }

    /// Check if the frame buffer lock is currently held
    pub fn is_buffer_locked(&self) -> bool {
        self.buffer.is_held()
    }

    /// Address of the shared framebuffer
    ///
    /// Only valid for identity checks and DMA setup; writes go through
    /// [`lock_buffer`](Self::lock_buffer).
    pub fn buffer_pointer(&self) -> Result<NonNull<u8>, RenderError> {
        NonNull::new(self.buffer_ptr.load(Ordering::Acquire)).ok_or(RenderError::NotInitialized)
    }

    /// Current sequencer state
    pub fn state(&self) -> RenderState {
        self.state.get()
    }

    /// Snapshot of the render counters
    pub fn stats(&self) -> RenderStats {
        self.counters.snapshot(self.draw.requests())
    }

    /// Check if the hardware is initialized
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Check if the display is initialized and the render task running
    pub fn is_ready(&self) -> bool {
        self.is_initialized() && self.announced.load(Ordering::Acquire)
    }

    /// Active configuration
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub(crate) fn ensure_initialized(&self) -> Result<(), RenderError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(RenderError::NotInitialized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{drive, fake_display, settle, MAX_POLLS};
    use embassy_futures::join::join;
    use embassy_futures::select::{select3, Either3};
    use embassy_futures::{block_on, yield_now};
    use portable_atomic::Ordering;

    #[test]
    fn test_buffer_pointer_requires_init() {
        let (display, _recorder) = fake_display(RenderConfig::new());

        assert_eq!(display.buffer_pointer(), Err(RenderError::NotInitialized));
        assert_eq!(display.try_lock_buffer().err(), Some(RenderError::NotInitialized));

        display.init().unwrap();
        assert!(display.buffer_pointer().is_ok());
        assert!(display.try_lock_buffer().is_ok());
    }

    #[test]
    fn test_init_is_async_until_render_task_runs() {
        let (display, recorder) = fake_display(RenderConfig::new());

        assert_eq!(display.init(), Ok(InitStatus::Async));
        assert_eq!(recorder.init_calls.load(Ordering::SeqCst), 1);
        assert!(display.is_initialized());
        assert!(!display.is_ready());

        drive(&display, async {
            display.wait_ready().await;
        });
        assert!(display.is_ready());
    }

    #[test]
    fn test_every_ready_waiter_is_released() {
        let (display, _recorder) = fake_display(RenderConfig::new());
        display.init().unwrap();

        // Both waiters are parked before the render task announces itself
        let waiters = join(display.wait_ready(), display.wait_ready());
        let render = async {
            settle().await;
            display.run().await
        };
        let give_up = async {
            for _ in 0..MAX_POLLS {
                yield_now().await;
            }
        };

        match block_on(select3(waiters, render, give_up)) {
            Either3::First(((), ())) => {}
            Either3::Second(e) => panic!("render loop exited: {:?}", e),
            Either3::Third(()) => panic!("a ready waiter was never released"),
        }
        assert!(display.is_ready());
    }

    #[test]
    fn test_reset_drops_pending_draw() {
        let (display, _recorder) = fake_display(RenderConfig::new());
        display.init().unwrap();

        display.request_draw();
        assert!(display.draw_pending());

        block_on(display.reset(true)).unwrap();
        assert!(!display.draw_pending());
        assert_eq!(display.stats().draw_requests, 1);
    }

    #[test]
    fn test_reinit_after_reset_is_sync() {
        let (display, recorder) = fake_display(RenderConfig::new());
        display.init().unwrap();

        drive(&display, async {
            display.wait_ready().await;
            display.reset(true).await.unwrap();
            assert!(!display.is_ready());
            assert_eq!(display.init(), Ok(InitStatus::Sync));
        });

        assert_eq!(recorder.reset_calls.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.init_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reset_invalidates_buffer_access() {
        let (display, _recorder) = fake_display(RenderConfig::new());
        display.init().unwrap();
        assert!(display.buffer_pointer().is_ok());

        block_on(display.reset(true)).unwrap();

        // No stale pointer, no stale writes
        assert_eq!(display.buffer_pointer(), Err(RenderError::NotInitialized));
        assert_eq!(
            block_on(display.lock_buffer(None)).err(),
            Some(RenderError::NotInitialized)
        );
        assert!(!display.is_buffer_locked());
    }

    #[test]
    fn test_plain_reset_refuses_while_locked() {
        let (display, recorder) = fake_display(RenderConfig::new());
        display.init().unwrap();

        let pixels = display.try_lock_buffer().unwrap();
        assert_eq!(block_on(display.reset(false)), Err(RenderError::Busy));
        assert!(display.is_initialized());
        assert_eq!(recorder.reset_calls.load(Ordering::SeqCst), 0);

        drop(pixels);
        assert_eq!(block_on(display.reset(false)), Ok(()));
        assert!(!display.is_initialized());
    }

    #[test]
    fn test_init_refused_while_locked() {
        let (display, _recorder) = fake_display(RenderConfig::new());
        display.init().unwrap();

        let _pixels = display.try_lock_buffer().unwrap();
        assert_eq!(display.init(), Err(RenderError::Busy));
    }

    #[test]
    fn test_init_failure() {
        let (display, recorder) = fake_display(RenderConfig::new());
        recorder.fail_init.store(true, Ordering::SeqCst);

        assert_eq!(display.init(), Err(RenderError::InitFailed));
        assert!(!display.is_initialized());
        assert_eq!(display.buffer_pointer(), Err(RenderError::NotInitialized));
    }

    #[test]
    fn test_request_draw_is_idempotent() {
        let (display, _recorder) = fake_display(RenderConfig::new());

        assert!(!display.draw_pending());
        display.request_draw();
        display.request_draw();
        display.request_draw();

        assert!(display.draw_pending());
        assert_eq!(display.stats().draw_requests, 3);
    }

    #[test]
    fn test_writer_holds_lock_until_release() {
        let (display, _recorder) = fake_display(RenderConfig::new());
        display.init().unwrap();

        drive(&display, async {
            let mut pixels = display.lock_buffer(None).await.unwrap();
            assert!(display.is_buffer_locked());
            pixels.fill(0x11);
            pixels.release();
            assert!(!display.is_buffer_locked());
            settle().await;
        });
    }
}
