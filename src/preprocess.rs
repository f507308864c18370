//! Geometry pre-processing applied to frames before they reach the
//! session loop.
//!
//! Zoom and flips operate on packed YUYV macropixels (4 bytes covering two
//! horizontal pixels). Zoom is a center crop re-expanded to the original
//! dimensions with nearest-neighbor sampling at macropixel granularity, so
//! chroma siting is preserved. When both flips are requested the frame is
//! mirrored about both axes, i.e. rotated 180 degrees.

use serde::{Deserialize, Serialize};

use crate::traits::Frame;

/// Geometry transform configured per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameTransform {
    /// Center zoom factor. 1.0 leaves the frame untouched.
    pub zoom: f64,
    /// Mirror about the vertical axis.
    pub flip_horizontal: bool,
    /// Mirror about the horizontal axis.
    pub flip_vertical: bool,
}

impl Default for FrameTransform {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            flip_horizontal: false,
            flip_vertical: false,
        }
    }
}

impl FrameTransform {
    /// Whether applying this transform would change any frame.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.zoom <= 1.0 && !self.flip_horizontal && !self.flip_vertical
    }

    /// Range check, called once at config load.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if !self.zoom.is_finite() || self.zoom < 1.0 {
            return Err(format!("transform.zoom must be >= 1.0, got {}", self.zoom));
        }
        Ok(())
    }

    /// Apply the transform, consuming the frame.
    #[must_use]
    pub fn apply(&self, mut frame: Frame) -> Frame {
        if self.is_identity() {
            return frame;
        }
        if self.zoom > 1.0 {
            frame = zoom_center(&frame, self.zoom);
        }
        if self.flip_vertical {
            flip_vertical(&mut frame);
        }
        if self.flip_horizontal {
            flip_horizontal(&mut frame);
        }
        frame
    }
}

/// Center-crop by `zoom` and re-expand to the original dimensions.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn zoom_center(frame: &Frame, zoom: f64) -> Frame {
    let width = frame.width;
    let height = frame.height;
    let macro_w = width / 2;

    let crop_w = (((f64::from(width) / zoom) as u32).max(2)) & !1;
    let crop_h = ((f64::from(height) / zoom) as u32).max(1);
    let crop_macro_w = crop_w / 2;
    let origin_mx = (width - crop_w) / 2 / 2;
    let origin_y = (height - crop_h) / 2;

    let mut data = vec![0u8; frame.data.len()];
    for y in 0..height {
        let src_y = origin_y + (u64::from(y) * u64::from(crop_h) / u64::from(height)) as u32;
        for mx in 0..macro_w {
            let src_mx =
                origin_mx + (u64::from(mx) * u64::from(crop_macro_w) / u64::from(macro_w)) as u32;
            let src = ((src_y * macro_w + src_mx) * 4) as usize;
            let dst = ((y * macro_w + mx) * 4) as usize;
            data[dst..dst + 4].copy_from_slice(&frame.data[src..src + 4]);
        }
    }

    Frame {
        width,
        height,
        data,
        metadata: frame.metadata,
    }
}

/// Mirror about the horizontal axis (rows reversed).
fn flip_vertical(frame: &mut Frame) {
    let stride = (frame.width * 2) as usize;
    let rows = frame.height as usize;
    for y in 0..rows / 2 {
        let top = y * stride;
        let bottom = (rows - 1 - y) * stride;
        for i in 0..stride {
            frame.data.swap(top + i, bottom + i);
        }
    }
}

/// Mirror about the vertical axis. Macropixel order is reversed per row and
/// the two luma samples inside each macropixel swap; chroma stays with its
/// macropixel.
fn flip_horizontal(frame: &mut Frame) {
    let macro_w = (frame.width / 2) as usize;
    let stride = macro_w * 4;
    for y in 0..frame.height as usize {
        let row = y * stride;
        for mx in 0..macro_w / 2 {
            let a = row + mx * 4;
            let b = row + (macro_w - 1 - mx) * 4;
            for k in 0..4 {
                frame.data.swap(a + k, b + k);
            }
        }
        for mx in 0..macro_w {
            let base = row + mx * 4;
            frame.data.swap(base, base + 2);
        }
    }
}
