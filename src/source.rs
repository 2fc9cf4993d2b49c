//! Frame sources
//!
//! A session pulls one frame per tick from a [`FrameSource`]. A source that
//! reports `0x0` is still warming up; that is not an error.

use crate::errors::CaptureError;
use crate::types::Frame;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Instant;

/// Monotonic clock for frame timestamps
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    start: Instant,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Share a timebase with another component.
    pub fn from_instant(start: Instant) -> Self {
        Self { start }
    }

    /// Microseconds since the clock started.
    #[inline]
    pub fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    pub fn start_instant(&self) -> Instant {
        self.start
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

pub trait FrameSource {
    /// Acquire the device. Failures are [`CaptureError::Acquisition`].
    fn open(&mut self) -> Result<(), CaptureError>;

    /// Current frame size; `(0, 0)` until the source produces frames.
    fn dimensions(&self) -> (u32, u32);

    /// Next frame, or `None` when nothing is available this tick.
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError>;

    /// Give the device back. Safe to call more than once.
    fn release(&mut self);

    fn is_open(&self) -> bool;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn open(&mut self) -> Result<(), CaptureError> {
        (**self).open()
    }

    fn dimensions(&self) -> (u32, u32) {
        (**self).dimensions()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        (**self).next_frame()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

/// In-memory frames, optionally preceded by `0x0` warm-up frames.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    frames: VecDeque<Frame>,
    warmup: usize,
    repeat_last: bool,
    last: Option<Frame>,
    open: bool,
    sequence: u64,
    clock: Option<FrameClock>,
}

impl VecSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
            ..Default::default()
        }
    }

    /// Emit `ticks` empty frames before the real ones, like a camera warming up.
    pub fn with_warmup(mut self, ticks: usize) -> Self {
        self.warmup = ticks;
        self
    }

    /// Keep returning the last frame once the queue is drained.
    pub fn repeat_last(mut self) -> Self {
        self.repeat_last = true;
        self
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    fn stamp(&mut self, frame: Frame) -> Frame {
        let timestamp = self.clock.map(|c| c.now_us()).unwrap_or_default();
        let frame = frame.with_sequence(self.sequence, timestamp);
        self.sequence += 1;
        frame
    }
}

impl FrameSource for VecSource {
    fn open(&mut self) -> Result<(), CaptureError> {
        self.open = true;
        self.clock = Some(FrameClock::new());
        Ok(())
    }

    fn dimensions(&self) -> (u32, u32) {
        if !self.open || self.warmup > 0 {
            return (0, 0);
        }
        self.frames
            .front()
            .or(self.last.as_ref())
            .map(|f| (f.width, f.height))
            .unwrap_or((0, 0))
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        if !self.open {
            return Err(CaptureError::Acquisition("source is not open".to_string()));
        }
        if self.warmup > 0 {
            self.warmup -= 1;
            let empty = Frame::new(0, 0, Vec::new());
            return Ok(Some(self.stamp(empty)));
        }

        let next = match self.frames.pop_front() {
            Some(frame) => {
                if self.repeat_last {
                    self.last = Some(frame.clone());
                }
                Some(frame)
            }
            None if self.repeat_last => self.last.clone(),
            None => None,
        };
        Ok(next.map(|frame| self.stamp(frame)))
    }

    fn release(&mut self) {
        if self.open {
            log::debug!("Releasing in-memory source after {} frames", self.sequence);
        }
        self.open = false;
        self.clock = None;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Frames decoded from image files on disk, in order.
#[derive(Debug, Clone)]
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    cursor: usize,
    dimensions: (u32, u32),
    open: bool,
}

impl ImageSequenceSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            cursor: 0,
            dimensions: (0, 0),
            open: false,
        }
    }
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self) -> Result<(), CaptureError> {
        if let Some(missing) = self.paths.iter().find(|p| !p.exists()) {
            return Err(CaptureError::Acquisition(format!(
                "image not found: {}",
                missing.display()
            )));
        }
        self.cursor = 0;
        self.open = true;
        Ok(())
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        if !self.open {
            return Err(CaptureError::Acquisition("source is not open".to_string()));
        }
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(None);
        };
        let image = image::open(path)
            .map_err(|e| CaptureError::Acquisition(format!("{}: {}", path.display(), e)))?
            .to_rgb8();
        let sequence = self.cursor as u64;
        self.cursor += 1;
        self.dimensions = image.dimensions();
        Ok(Some(Frame::from_image(image).with_sequence(sequence, 0)))
    }

    fn release(&mut self) {
        self.open = false;
        self.dimensions = (0, 0);
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
