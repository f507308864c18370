//! Mock collaborators for testing sessions without hardware.
//!
//! `MockCamera` scripts per-read outcomes and counts lifecycle calls so
//! tests can assert the open/read/close contract. `MockClock` advances a
//! virtual timeline instead of sleeping, which lets full sessions run in
//! microseconds. `ScriptedInput` replays one optional signal per tick, and
//! `MemoryPersister` records what would have been written.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::traits::{
    ActiveCamera, CameraDevice, CameraError, Clock, Frame, FrameMetadata, InputPoll, PersistError,
    Persister, Result, Signal,
};

/// Test pattern for mock frame generation.
#[derive(Debug, Clone, Copy)]
pub enum TestPattern {
    /// Horizontal luma gradient from dark to light.
    Gradient,
    /// Solid color with the given Y, U, V values.
    Solid(u8, u8, u8),
}

/// Outcome of one scripted frame read.
#[derive(Debug, Clone, Copy)]
pub enum ReadOutcome {
    /// Deliver a generated frame.
    Frame,
    /// Fail this read.
    Failure,
}

/// Mock camera with a scripted read sequence and lifecycle counters.
pub struct MockCamera {
    width: u32,
    height: u32,
    pattern: TestPattern,
    script: VecDeque<ReadOutcome>,
    fail_open: bool,
    opens: u32,
    closes: u32,
    reads: u32,
    frames_produced: u32,
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new(64, 48)
    }
}

impl MockCamera {
    /// Create a mock camera producing frames of the given size.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pattern: TestPattern::Gradient,
            script: VecDeque::new(),
            fail_open: false,
            opens: 0,
            closes: 0,
            reads: 0,
            frames_produced: 0,
        }
    }

    /// Set the generated test pattern.
    #[must_use]
    pub fn with_pattern(mut self, pattern: TestPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Script the next read outcomes. Once the script is exhausted every
    /// read succeeds.
    #[must_use]
    pub fn with_read_script(mut self, script: impl IntoIterator<Item = ReadOutcome>) -> Self {
        self.script = script.into_iter().collect();
        self
    }

    /// Make `open` fail.
    #[must_use]
    pub const fn with_open_failure(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// How many times `open` was called.
    #[must_use]
    pub const fn opens(&self) -> u32 {
        self.opens
    }

    /// How many times `close` was called.
    #[must_use]
    pub const fn closes(&self) -> u32 {
        self.closes
    }

    /// How many frame reads were attempted.
    #[must_use]
    pub const fn reads(&self) -> u32 {
        self.reads
    }

    fn generate_frame(&mut self) -> Frame {
        let sequence = self.frames_produced;
        self.frames_produced += 1;

        let mut data = vec![0u8; Frame::expected_len(self.width, self.height)];
        match self.pattern {
            TestPattern::Gradient => {
                let width = self.width;
                for (i, macropixel) in data.chunks_exact_mut(4).enumerate() {
                    #[allow(clippy::cast_possible_truncation)]
                    let x = (i as u32 * 2) % width;
                    #[allow(clippy::cast_possible_truncation)]
                    let luma = ((x * 255) / width) as u8;
                    macropixel[0] = luma;
                    macropixel[1] = 128;
                    macropixel[2] = luma;
                    macropixel[3] = 128;
                }
            }
            TestPattern::Solid(y, u, v) => {
                for macropixel in data.chunks_exact_mut(4) {
                    macropixel[0] = y;
                    macropixel[1] = u;
                    macropixel[2] = y;
                    macropixel[3] = v;
                }
            }
        }

        Frame {
            width: self.width,
            height: self.height,
            data,
            metadata: FrameMetadata {
                sequence,
                timestamp: Duration::from_millis(u64::from(sequence) * 33), // ~30fps
            },
        }
    }
}

impl CameraDevice for MockCamera {
    type Active<'a> = MockActive<'a>;

    fn open(&mut self) -> Result<Self::Active<'_>> {
        self.opens += 1;
        if self.fail_open {
            return Err(CameraError::OpenFailed {
                index: 0,
                reason: "scripted open failure".to_owned(),
            });
        }
        Ok(MockActive { camera: self })
    }

    fn close(&mut self) -> Result<()> {
        self.closes += 1;
        Ok(())
    }
}

/// Streaming handle of a [`MockCamera`].
pub struct MockActive<'a> {
    camera: &'a mut MockCamera,
}

impl ActiveCamera for MockActive<'_> {
    fn read_frame(&mut self) -> Result<Frame> {
        self.camera.reads += 1;
        match self.camera.script.pop_front() {
            Some(ReadOutcome::Failure) => {
                Err(CameraError::ReadFailed("scripted read failure".to_owned()))
            }
            Some(ReadOutcome::Frame) | None => Ok(self.camera.generate_frame()),
        }
    }
}

/// Virtual clock: `sleep` advances the timeline instead of suspending.
#[derive(Debug, Clone)]
pub struct MockClock {
    now: Cell<Instant>,
    slept: Cell<Duration>,
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClock {
    /// Create a clock starting at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: Cell::new(Instant::now()),
            slept: Cell::new(Duration::ZERO),
        }
    }

    /// Total virtual time spent sleeping.
    #[must_use]
    pub fn total_slept(&self) -> Duration {
        self.slept.get()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
        self.slept.set(self.slept.get() + duration);
    }
}

/// Replays one optional signal per tick, then stays silent.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    script: VecDeque<Option<Signal>>,
}

impl ScriptedInput {
    /// Script the signals observed on consecutive ticks.
    #[must_use]
    pub fn new(ticks: impl IntoIterator<Item = Option<Signal>>) -> Self {
        Self {
            script: ticks.into_iter().collect(),
        }
    }

    /// An input source that never reports a signal.
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }
}

impl InputPoll for ScriptedInput {
    fn poll(&mut self) -> Option<Signal> {
        self.script.pop_front().flatten()
    }
}

#[derive(Debug, Default)]
struct PersistLog {
    stills: Vec<u32>,
    samples: u32,
    opens: u32,
    closes: u32,
}

/// Records persistence calls in memory; failures can be scripted.
#[derive(Debug, Default)]
pub struct MemoryPersister {
    log: Rc<RefCell<PersistLog>>,
    fail_next: u32,
    fail_open: bool,
}

impl MemoryPersister {
    /// Create an always-succeeding in-memory persister.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` persist calls.
    #[must_use]
    pub const fn failing_next(mut self, count: u32) -> Self {
        self.fail_next = count;
        self
    }

    /// Make `open` fail.
    #[must_use]
    pub const fn with_open_failure(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// A handle for inspecting recorded calls after the session consumed
    /// the persister.
    #[must_use]
    pub fn handle(&self) -> PersistHandle {
        PersistHandle(Rc::clone(&self.log))
    }

    fn scripted_failure(&mut self) -> Option<PersistError> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Some(PersistError::Io(std::io::Error::other(
                "scripted persist failure",
            )));
        }
        None
    }
}

impl Persister for MemoryPersister {
    fn open(&mut self) -> std::result::Result<(), PersistError> {
        self.log.borrow_mut().opens += 1;
        if self.fail_open {
            return Err(PersistError::Create {
                path: "mock".to_owned(),
                reason: "scripted open failure".to_owned(),
            });
        }
        Ok(())
    }

    fn save_still(&mut self, _frame: &Frame, index: u32) -> std::result::Result<(), PersistError> {
        if let Some(err) = self.scripted_failure() {
            return Err(err);
        }
        self.log.borrow_mut().stills.push(index);
        Ok(())
    }

    fn append_video_sample(&mut self, _frame: &Frame) -> std::result::Result<(), PersistError> {
        if let Some(err) = self.scripted_failure() {
            return Err(err);
        }
        self.log.borrow_mut().samples += 1;
        Ok(())
    }

    fn close(&mut self) -> std::result::Result<(), PersistError> {
        self.log.borrow_mut().closes += 1;
        Ok(())
    }
}

/// Read-side view of a [`MemoryPersister`]'s call log.
#[derive(Debug)]
pub struct PersistHandle(Rc<RefCell<PersistLog>>);

impl PersistHandle {
    /// Indices of saved stills, in call order.
    #[must_use]
    pub fn stills(&self) -> Vec<u32> {
        self.0.borrow().stills.clone()
    }

    /// Number of appended video samples.
    #[must_use]
    pub fn samples(&self) -> u32 {
        self.0.borrow().samples
    }

    /// Number of `open` calls.
    #[must_use]
    pub fn opens(&self) -> u32 {
        self.0.borrow().opens
    }

    /// Number of `close` calls.
    #[must_use]
    pub fn closes(&self) -> u32 {
        self.0.borrow().closes
    }
}
