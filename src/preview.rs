//! Preview seam.
//!
//! On-screen rendering is an external collaborator; the session loop only
//! hands each successfully read frame to whatever implementation is wired
//! in. The crate ships a no-op and a log-based cadence reporter.

use tracing::debug;

use crate::traits::Frame;

/// Receives each successfully read frame, in capture order.
pub trait Preview {
    /// Present one frame. Must not block the tick.
    fn show(&mut self, frame: &Frame);
}

/// Discards every frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPreview;

impl Preview for NullPreview {
    fn show(&mut self, _frame: &Frame) {}
}

/// Reports frame cadence via tracing instead of rendering.
#[derive(Debug)]
pub struct LogPreview {
    every: u64,
    shown: u64,
}

impl LogPreview {
    /// Log every `every`-th frame (minimum 1).
    #[must_use]
    pub const fn new(every: u64) -> Self {
        Self {
            every: if every == 0 { 1 } else { every },
            shown: 0,
        }
    }
}

impl Preview for LogPreview {
    fn show(&mut self, frame: &Frame) {
        if self.shown % self.every == 0 {
            debug!(
                sequence = frame.metadata.sequence,
                width = frame.width,
                height = frame.height,
                "frame"
            );
        }
        self.shown += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_preview_clamps_zero_stride() {
        let preview = LogPreview::new(0);
        assert_eq!(preview.every, 1);
    }
}
