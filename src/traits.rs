//! Core types and collaborator traits for the capture session loop.
//!
//! The session controller talks to every external collaborator through a
//! trait: the camera device, the clock, the input poll, and the persistence
//! sink are defined here, the preview seam in [`crate::preview`]. Production
//! implementations live in their own modules; mock implementations live in
//! [`crate::mock`].

use std::time::{Duration, Instant};

use thiserror::Error;

/// A captured video frame in packed YUYV layout.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Raw packed YUYV bytes (2 bytes per pixel).
    pub data: Vec<u8>,
    /// Frame metadata.
    pub metadata: FrameMetadata,
}

/// Metadata for a captured frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameMetadata {
    /// Driver-assigned frame sequence number.
    pub sequence: u32,
    /// Capture timestamp relative to stream start.
    pub timestamp: Duration,
}

impl Frame {
    /// Number of bytes a packed YUYV frame of the given dimensions occupies.
    #[must_use]
    pub const fn expected_len(width: u32, height: u32) -> usize {
        (width * height * 2) as usize
    }

    /// Get RGB values for the pixel at the specified coordinates.
    ///
    /// Returns `None` when the coordinates fall outside the frame. Odd x
    /// coordinates use the second luma sample of the macropixel with the
    /// shared chroma values.
    #[must_use]
    pub fn pixel_at(&self, x: u32, y: u32) -> Option<(u8, u8, u8)> {
        // YUYV layout: [Y0 U Y1 V] covers two horizontal pixels.
        if x >= self.width || y >= self.height {
            return None;
        }

        let pair_x = x & !1;
        let offset = ((y * self.width + pair_x) * 2) as usize;

        let y_val = if x % 2 == 0 {
            *self.data.get(offset)?
        } else {
            *self.data.get(offset + 2)?
        };
        let u = *self.data.get(offset + 1)?;
        let v = *self.data.get(offset + 3)?;

        Some(yuv_to_rgb(y_val, u, v))
    }
}

/// Convert YUV values to RGB using the ITU-R BT.601 formula.
#[must_use]
#[allow(clippy::many_single_char_names)]
pub(crate) fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y_f = f32::from(y);
    let u_f = f32::from(u) - 128.0;
    let v_f = f32::from(v) - 128.0;

    let r = 1.402f32.mul_add(v_f, y_f);
    let g = 0.714_14f32.mul_add(-v_f, 0.344_14f32.mul_add(-u_f, y_f));
    let b = 1.772f32.mul_add(u_f, y_f);

    let clamp = |val: f32| -> u8 {
        if val < 0.0 {
            0
        } else if val > 255.0 {
            255
        } else {
            #[allow(clippy::cast_possible_truncation)]
            #[allow(clippy::cast_sign_loss)]
            {
                val as u8
            }
        }
    };

    (clamp(r), clamp(g), clamp(b))
}

/// Error type for camera device operations.
#[derive(Debug, Error)]
pub enum CameraError {
    /// Device with the given index was not found or could not be opened.
    #[error("failed to open device {index}: {reason}")]
    OpenFailed {
        /// Device index (e.g. 0 for /dev/video0).
        index: u32,
        /// Driver-reported reason.
        reason: String,
    },
    /// Device opened but failed the initial capability probe.
    #[error("device capability probe failed: {0}")]
    ProbeFailed(String),
    /// Device rejected a configured property.
    #[error("device rejected property {name}: {reason}")]
    PropertyRejected {
        /// Property name as configured.
        name: &'static str,
        /// Driver-reported reason.
        reason: String,
    },
    /// A single frame read failed.
    #[error("frame read failed: {0}")]
    ReadFailed(String),
    /// I/O error talking to the device.
    #[error("device I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for camera operations.
pub type Result<T> = std::result::Result<T, CameraError>;

/// Error type for persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Output location could not be created.
    #[error("failed to create output location {path}: {reason}")]
    Create {
        /// The path that could not be created.
        path: String,
        /// Underlying reason.
        reason: String,
    },
    /// Still image encoding failed.
    #[error("failed to encode still image: {0}")]
    Encode(String),
    /// The sink does not accept this kind of sample.
    #[error("unsupported sample: {0}")]
    Unsupported(&'static str),
    /// Write to storage failed.
    #[error("storage write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// An unopened camera device handle.
///
/// The session controller owns the open/close lifecycle: it calls [`open`]
/// exactly once per session, reads frames from the returned [`ActiveCamera`]
/// for the duration of the run, and calls [`close`] exactly once on every
/// exit path that follows a successful open. Device properties are supplied
/// to the concrete implementation at construction time and applied during
/// `open`; the controller never inspects them.
///
/// [`open`]: CameraDevice::open
/// [`close`]: CameraDevice::close
pub trait CameraDevice {
    /// The streaming handle returned by [`CameraDevice::open`].
    type Active<'a>: ActiveCamera
    where
        Self: 'a;

    /// Open the device, apply configured properties, and start streaming.
    ///
    /// Implementations perform their full init here (capability probe,
    /// format negotiation, an initial validation read) so that any init
    /// failure surfaces before the first tick.
    fn open(&mut self) -> Result<Self::Active<'_>>;

    /// Release the device. Called exactly once after the streaming handle
    /// has been dropped.
    fn close(&mut self) -> Result<()>;
}

/// An opened, streaming camera.
pub trait ActiveCamera {
    /// Capture the next frame.
    fn read_frame(&mut self) -> Result<Frame>;
}

/// Monotonic time source with an explicit suspension point.
///
/// `sleep` is part of the trait so tests can drive the tick loop through a
/// mock clock without wall-clock delays.
pub trait Clock {
    /// Current instant on a monotonic timeline.
    fn now(&self) -> Instant;
    /// Suspend the capture thread for the given duration.
    fn sleep(&self, duration: Duration);
}

/// Production clock backed by [`Instant::now`] and [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// A logical input signal observed during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Stop the session before the next frame read.
    Cancel,
    /// Capture now (manual photo mode only).
    Shutter,
}

/// Non-blocking input source, consulted once per tick.
pub trait InputPoll {
    /// Return the pressed logical signal, if any. Must not block.
    fn poll(&mut self) -> Option<Signal>;
}

/// Persistence sink for captured frames.
///
/// `open` and `close` are invoked by the session controller symmetric with
/// the device handle, so sinks with their own stream lifecycle (the video
/// writer) acquire and release alongside the camera.
pub trait Persister {
    /// Prepare the sink (create directories, open the video stream).
    fn open(&mut self) -> std::result::Result<(), PersistError>;

    /// Persist one still image under the given sequence index.
    fn save_still(&mut self, frame: &Frame, index: u32) -> std::result::Result<(), PersistError>;

    /// Append one frame to the video output.
    fn append_video_sample(&mut self, frame: &Frame) -> std::result::Result<(), PersistError>;

    /// Flush and release the sink. Called exactly once per session.
    fn close(&mut self) -> std::result::Result<(), PersistError>;
}
