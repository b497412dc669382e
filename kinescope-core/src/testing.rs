//! Instrumented fake display hardware and helpers for driving the render
//! loop on the host

use core::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::boxed::Box;
use std::vec::Vec;

use embassy_futures::select::{select, Either};
use embassy_futures::{block_on, yield_now};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use kinescope_hal::{DisplayHardware, HardwareEvent};

use crate::config::RenderConfig;
use crate::render::DisplaySubsystem;
use crate::sync::NotifyOutcome;

/// Framebuffer size of the fake panel
pub const FAKE_BUFFER_LEN: usize = 64;

/// Polls allowed before `until` gives up
pub const MAX_POLLS: usize = 10_000;

/// Polls `settle` yields for
const SETTLE_POLLS: usize = 16;

/// Reads the frame buffer lock state from inside the fake hardware
type LockCheck = Box<dyn Fn() -> bool + Send + Sync>;

/// What the fake panel has been asked to do
#[derive(Default)]
pub struct Recorder {
    pub init_calls: AtomicU32,
    pub reset_calls: AtomicU32,
    pub fail_init: AtomicBool,
    pub fail_next_start: AtomicBool,
    /// Frame starts not yet completed by the test
    pub outstanding: AtomicU32,
    pub max_outstanding: AtomicU32,
    /// Frame starts issued while the frame buffer lock was held
    pub starts_locked: AtomicU32,
    /// Frame starts issued while the frame buffer lock was free
    pub starts_unlocked: AtomicU32,
    lock_check: Mutex<Option<LockCheck>>,
    starts: Mutex<Vec<(u16, u16)>>,
    first_pixels: Mutex<Vec<u8>>,
}

impl Recorder {
    pub fn start_count(&self) -> usize {
        self.starts.lock().unwrap().len()
    }

    pub fn starts(&self) -> Vec<(u16, u16)> {
        self.starts.lock().unwrap().clone()
    }

    /// First framebuffer byte seen by each frame start
    pub fn first_pixels(&self) -> Vec<u8> {
        self.first_pixels.lock().unwrap().clone()
    }

    /// Let `start_frame` observe the frame buffer lock
    pub fn watch_lock(&self, check: impl Fn() -> bool + Send + Sync + 'static) {
        *self.lock_check.lock().unwrap() = Some(Box::new(check));
    }

    /// Mark the oldest outstanding transfer as done
    pub fn finish(&self) {
        let _ = self
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }
}

#[derive(Debug)]
pub struct FakeError;

pub struct FakePanel {
    buffer: [u8; FAKE_BUFFER_LEN],
    recorder: Arc<Recorder>,
}

impl FakePanel {
    pub fn new() -> (Self, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let panel = Self {
            buffer: [0; FAKE_BUFFER_LEN],
            recorder: recorder.clone(),
        };
        (panel, recorder)
    }
}

impl DisplayHardware for FakePanel {
    type Error = FakeError;

    fn init(&mut self) -> Result<(), FakeError> {
        self.recorder.init_calls.fetch_add(1, Ordering::SeqCst);
        if self.recorder.fail_init.load(Ordering::SeqCst) {
            return Err(FakeError);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.recorder.reset_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn start_frame(&mut self, x_offset: u16, y_offset: u16) -> Result<(), FakeError> {
        if self.recorder.fail_next_start.swap(false, Ordering::SeqCst) {
            return Err(FakeError);
        }

        if let Some(check) = self.recorder.lock_check.lock().unwrap().as_ref() {
            let counter = if check() {
                &self.recorder.starts_locked
            } else {
                &self.recorder.starts_unlocked
            };
            counter.fetch_add(1, Ordering::SeqCst);
        }

        let outstanding = self.recorder.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.recorder
            .max_outstanding
            .fetch_max(outstanding, Ordering::SeqCst);

        self.recorder.starts.lock().unwrap().push((x_offset, y_offset));
        self.recorder.first_pixels.lock().unwrap().push(self.buffer[0]);
        Ok(())
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }
}

pub type TestDisplay = DisplaySubsystem<CriticalSectionRawMutex, FakePanel>;

pub fn fake_display(config: RenderConfig) -> (TestDisplay, Arc<Recorder>) {
    let (panel, recorder) = FakePanel::new();
    (DisplaySubsystem::new(panel, config), recorder)
}

/// Fake display that lives for the whole test run, with the lock watched
/// from inside `start_frame`
pub fn watched_display(config: RenderConfig) -> (&'static TestDisplay, Arc<Recorder>) {
    let (display, recorder) = fake_display(config);
    let display: &'static TestDisplay = Box::leak(Box::new(display));
    recorder.watch_lock(move || display.is_buffer_locked());
    (display, recorder)
}

/// Play the interrupt for the outstanding frame
pub fn complete_frame(display: &TestDisplay, recorder: &Recorder) {
    assert!(
        display.is_buffer_locked(),
        "completion delivered with the frame buffer lock free"
    );
    recorder.finish();
    assert_eq!(
        display.on_hardware_event(HardwareEvent::FrameCompleted),
        NotifyOutcome::Completed
    );
}

/// Run `test` alongside the render loop until `test` finishes
pub fn drive<F: Future>(display: &TestDisplay, test: F) -> F::Output {
    block_on(async {
        match select(display.run(), test).await {
            Either::First(e) => panic!("render loop exited: {:?}", e),
            Either::Second(output) => output,
        }
    })
}

/// Yield until `condition` holds
pub async fn until(mut condition: impl FnMut() -> bool) {
    for _ in 0..MAX_POLLS {
        if condition() {
            return;
        }
        yield_now().await;
    }
    panic!("condition not reached after {} polls", MAX_POLLS);
}

/// Give the render loop a few polls
pub async fn settle() {
    for _ in 0..SETTLE_POLLS {
        yield_now().await;
    }
}
