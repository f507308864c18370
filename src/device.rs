//! V4L2 camera backend using the v4l crate.

use std::time::Duration;

use tracing::{debug, info};
use v4l::buffer::Type;
use v4l::control::{Control, Value};
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream as V4lCaptureStream;
use v4l::video::Capture;
use v4l::Device;

use crate::config::DeviceProperties;
use crate::preprocess::FrameTransform;
use crate::traits::{ActiveCamera, CameraDevice, CameraError, Frame, FrameMetadata, Result};
use crate::validation::validate_frame;

/// V4L2_CID_AUTO_WHITE_BALANCE
const CID_AUTO_WHITE_BALANCE: u32 = 0x0098_090c;
/// V4L2_CID_FOCUS_AUTO
const CID_FOCUS_AUTO: u32 = 0x009a_090c;

const STREAM_BUFFERS: u32 = 4;

/// A V4L2 capture device, configured but not yet opened.
///
/// Properties and the geometry transform are supplied up front; they are
/// applied when the session controller opens the device, and every frame is
/// pre-processed before it reaches the session loop.
pub struct V4l2Camera {
    properties: DeviceProperties,
    transform: FrameTransform,
    device: Option<Device>,
}

impl V4l2Camera {
    /// Create an unopened handle for `/dev/video{index}`.
    #[must_use]
    pub const fn new(properties: DeviceProperties, transform: FrameTransform) -> Self {
        Self {
            properties,
            transform,
            device: None,
        }
    }

    /// Negotiate the capture format and apply driver controls.
    ///
    /// Returns the negotiated dimensions. Drivers may clamp the requested
    /// size; the negotiated one wins. Control failures are non-fatal since
    /// many cameras simply lack the control.
    fn apply_properties(device: &Device, properties: &DeviceProperties) -> Result<(u32, u32)> {
        let yuyv = v4l::FourCC::new(b"YUYV");

        let mut fmt = device
            .format()
            .map_err(|err| CameraError::ProbeFailed(err.to_string()))?;
        fmt.width = properties.width;
        fmt.height = properties.height;
        fmt.fourcc = yuyv;

        let actual = device
            .set_format(&fmt)
            .map_err(|err| CameraError::PropertyRejected {
                name: "resolution",
                reason: err.to_string(),
            })?;

        if actual.fourcc != yuyv {
            return Err(CameraError::PropertyRejected {
                name: "pixel_format",
                reason: format!("driver selected {} instead of YUYV", actual.fourcc),
            });
        }
        if actual.width != properties.width || actual.height != properties.height {
            debug!(
                requested_width = properties.width,
                requested_height = properties.height,
                width = actual.width,
                height = actual.height,
                "driver adjusted resolution"
            );
        }

        set_bool_control(device, "autofocus", CID_FOCUS_AUTO, properties.autofocus);
        set_bool_control(
            device,
            "auto_white_balance",
            CID_AUTO_WHITE_BALANCE,
            properties.auto_white_balance,
        );

        Ok((actual.width, actual.height))
    }
}

fn set_bool_control(device: &Device, name: &'static str, id: u32, value: bool) {
    let control = Control {
        id,
        value: Value::Boolean(value),
    };
    if let Err(err) = device.set_control(control) {
        debug!(control = name, error = %err, "control not applied");
    }
}

impl CameraDevice for V4l2Camera {
    type Active<'a> = V4l2Active<'a>;

    fn open(&mut self) -> Result<Self::Active<'_>> {
        let index = self.properties.index;
        let device =
            Device::new(index as usize).map_err(|err| CameraError::OpenFailed {
                index,
                reason: err.to_string(),
            })?;

        let caps = device
            .query_caps()
            .map_err(|err| CameraError::ProbeFailed(err.to_string()))?;
        if !caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE)
        {
            return Err(CameraError::ProbeFailed(format!(
                "{} cannot capture video",
                caps.card
            )));
        }
        if !caps.capabilities.contains(v4l::capability::Flags::STREAMING) {
            return Err(CameraError::ProbeFailed(format!(
                "{} does not support streaming",
                caps.card
            )));
        }
        info!(card = %caps.card, driver = %caps.driver, bus = %caps.bus, "device opened");

        let (width, height) = Self::apply_properties(&device, &self.properties)?;

        let device = self.device.insert(device);
        let stream = Stream::with_buffers(device, Type::VideoCapture, STREAM_BUFFERS).map_err(
            |err| CameraError::OpenFailed {
                index,
                reason: err.to_string(),
            },
        )?;

        let mut active = V4l2Active {
            stream,
            width,
            height,
            transform: self.transform.clone(),
        };

        // Initial validation read: a dead stream surfaces as an init
        // failure, not as a budget increment on the first tick.
        let probe = active.read_frame()?;
        validate_frame(&probe)?;

        Ok(active)
    }

    fn close(&mut self) -> Result<()> {
        // Streamoff happened when the active stream dropped; dropping the
        // handle closes the fd.
        self.device = None;
        Ok(())
    }
}

/// An opened, streaming V4L2 camera.
pub struct V4l2Active<'a> {
    stream: Stream<'a>,
    width: u32,
    height: u32,
    transform: FrameTransform,
}

impl ActiveCamera for V4l2Active<'_> {
    fn read_frame(&mut self) -> Result<Frame> {
        let (buf, meta) = self
            .stream
            .next()
            .map_err(|err| CameraError::ReadFailed(err.to_string()))?;

        // V4L2 timestamps are non-negative in practice
        #[allow(clippy::cast_sign_loss)]
        let secs = meta.timestamp.sec.max(0) as u64;
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let nanos = (meta.timestamp.usec.max(0) as u32).saturating_mul(1000);

        let frame = Frame {
            width: self.width,
            height: self.height,
            data: buf.to_vec(),
            metadata: FrameMetadata {
                sequence: meta.sequence,
                timestamp: Duration::new(secs, nanos),
            },
        };

        Ok(self.transform.apply(frame))
    }
}
