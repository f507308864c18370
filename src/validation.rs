//! Frame sanity checks.
//!
//! Used by the device init probe (a device that opens but delivers
//! malformed frames should fail the session before the tick loop starts)
//! and by the hardware integration tests.

use crate::traits::{CameraError, Frame, Result};

/// Validate that a frame is plausibly a packed YUYV image of its declared
/// dimensions.
pub fn validate_frame(frame: &Frame) -> Result<()> {
    if frame.width == 0 || frame.height == 0 {
        return Err(CameraError::ProbeFailed(format!(
            "frame has degenerate dimensions {}x{}",
            frame.width, frame.height
        )));
    }

    let expected = Frame::expected_len(frame.width, frame.height);
    if frame.data.len() < expected {
        return Err(CameraError::ProbeFailed(format!(
            "short frame: {} bytes, expected at least {expected} for {}x{}",
            frame.data.len(),
            frame.width,
            frame.height
        )));
    }

    Ok(())
}

/// Validate that a sequence of frames has incrementing sequence numbers
/// with no gaps.
pub fn validate_sequence(frames: &[Frame]) -> Result<()> {
    if frames.is_empty() {
        return Err(CameraError::ProbeFailed(
            "cannot validate empty frame sequence".to_owned(),
        ));
    }

    for pair in frames.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        let prev_seq = prev.metadata.sequence;
        let curr_seq = curr.metadata.sequence;
        if curr_seq != prev_seq + 1 {
            return Err(CameraError::ProbeFailed(format!(
                "frame sequence gap: expected {}, got {curr_seq}",
                prev_seq + 1
            )));
        }
    }

    Ok(())
}
