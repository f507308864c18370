//! Per-tick persist/complete policy for each capture mode.
//!
//! The three historical mode loops (interval photo, manual photo, timed
//! video) share one contract: given the current instant and whether the
//! shutter key was observed this tick, decide to skip, persist, or finish.
//! Strategy state is monotonic; nothing here ever rewinds a timestamp or a
//! capture count.

use std::time::{Duration, Instant};

use crate::config::{CaptureMode, PhotoTrigger, SessionConfig};

/// Minimum time after a manual trigger during which repeated triggers are
/// ignored, so one physical press cannot produce multiple saves.
pub const SHUTTER_DEBOUNCE: Duration = Duration::from_millis(300);

/// Per-tick verdict from a mode strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Keep ticking, do not persist this frame.
    Skip,
    /// Persist this frame.
    Persist,
    /// The session is done.
    Complete,
}

/// The persist/continue policy for one capture session.
#[derive(Debug)]
pub enum ModeStrategy {
    /// Capture a still every `interval` until `target` captures are done.
    IntervalPhoto {
        /// Minimum spacing between captures.
        interval: Duration,
        /// Number of stills to produce.
        target: u32,
        /// Instant of the previous capture (session start initially).
        last_capture_at: Instant,
    },
    /// Capture a still on each debounced shutter press.
    ManualPhoto {
        /// Number of stills to produce.
        target: u32,
        /// Instant of the previous accepted trigger.
        last_trigger_at: Option<Instant>,
    },
    /// Append every frame until `duration` has elapsed.
    TimedVideo {
        /// Total recording duration.
        duration: Duration,
        /// Session start instant.
        started_at: Instant,
    },
}

impl ModeStrategy {
    /// Build the strategy for the configured mode.
    #[must_use]
    pub fn from_config(config: &SessionConfig, session_start: Instant) -> Self {
        match (config.mode, config.photo_trigger) {
            (CaptureMode::Video, _) => Self::TimedVideo {
                duration: Duration::from_secs_f64(config.video_duration_secs),
                started_at: session_start,
            },
            (CaptureMode::Photo, PhotoTrigger::Auto) => Self::IntervalPhoto {
                interval: Duration::from_secs_f64(config.capture_interval_secs),
                target: config.total_captures,
                last_capture_at: session_start,
            },
            (CaptureMode::Photo, PhotoTrigger::Manual) => Self::ManualPhoto {
                target: config.total_captures,
                last_trigger_at: None,
            },
        }
    }

    /// Decide what to do with the frame read this tick.
    ///
    /// Completion is checked before anything else, so a target of zero
    /// finishes without a single persist call.
    pub fn decide(&mut self, now: Instant, shutter: bool, captures_done: u32) -> Decision {
        match self {
            Self::IntervalPhoto {
                interval,
                target,
                last_capture_at,
            } => {
                if captures_done >= *target {
                    return Decision::Complete;
                }
                if now.duration_since(*last_capture_at) >= *interval {
                    *last_capture_at = now;
                    Decision::Persist
                } else {
                    Decision::Skip
                }
            }
            Self::ManualPhoto {
                target,
                last_trigger_at,
            } => {
                if captures_done >= *target {
                    return Decision::Complete;
                }
                if !shutter {
                    return Decision::Skip;
                }
                match *last_trigger_at {
                    Some(prev) if now.duration_since(prev) < SHUTTER_DEBOUNCE => Decision::Skip,
                    _ => {
                        *last_trigger_at = Some(now);
                        Decision::Persist
                    }
                }
            }
            Self::TimedVideo {
                duration,
                started_at,
            } => {
                if now.duration_since(*started_at) >= *duration {
                    Decision::Complete
                } else {
                    Decision::Persist
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;

    fn photo_config(trigger: PhotoTrigger, interval: f64, target: u32) -> SessionConfig {
        SessionConfig {
            mode: CaptureMode::Photo,
            photo_trigger: trigger,
            capture_interval_secs: interval,
            total_captures: target,
            ..SessionConfig::default()
        }
    }

    fn video_config(duration: f64) -> SessionConfig {
        SessionConfig {
            mode: CaptureMode::Video,
            video_duration_secs: duration,
            ..SessionConfig::default()
        }
    }

    #[test]
    fn zero_interval_persists_on_first_tick() {
        let start = Instant::now();
        let mut strategy =
            ModeStrategy::from_config(&photo_config(PhotoTrigger::Auto, 0.0, 5), start);
        assert_eq!(strategy.decide(start, false, 0), Decision::Persist);
    }

    #[test]
    fn interval_spaces_captures() {
        let start = Instant::now();
        let mut strategy =
            ModeStrategy::from_config(&photo_config(PhotoTrigger::Auto, 0.05, 5), start);

        assert_eq!(strategy.decide(start, false, 0), Decision::Skip);
        let due = start + Duration::from_millis(50);
        assert_eq!(strategy.decide(due, false, 0), Decision::Persist);
        // Interval restarts from the accepted capture.
        assert_eq!(
            strategy.decide(due + Duration::from_millis(10), false, 1),
            Decision::Skip
        );
        assert_eq!(
            strategy.decide(due + Duration::from_millis(50), false, 1),
            Decision::Persist
        );
    }

    #[test]
    fn zero_target_completes_without_persisting() {
        let start = Instant::now();
        let mut auto = ModeStrategy::from_config(&photo_config(PhotoTrigger::Auto, 0.0, 0), start);
        assert_eq!(auto.decide(start, false, 0), Decision::Complete);

        let mut manual =
            ModeStrategy::from_config(&photo_config(PhotoTrigger::Manual, 0.0, 0), start);
        assert_eq!(manual.decide(start, true, 0), Decision::Complete);
    }

    #[test]
    fn completes_once_target_reached() {
        let start = Instant::now();
        let mut strategy =
            ModeStrategy::from_config(&photo_config(PhotoTrigger::Auto, 0.0, 2), start);
        assert_eq!(strategy.decide(start, false, 2), Decision::Complete);
    }

    #[test]
    fn manual_requires_shutter() {
        let start = Instant::now();
        let mut strategy =
            ModeStrategy::from_config(&photo_config(PhotoTrigger::Manual, 0.0, 3), start);
        assert_eq!(strategy.decide(start, false, 0), Decision::Skip);
        assert_eq!(strategy.decide(start, true, 0), Decision::Persist);
    }

    #[test]
    fn manual_debounces_repeated_triggers() {
        let start = Instant::now();
        let mut strategy =
            ModeStrategy::from_config(&photo_config(PhotoTrigger::Manual, 0.0, 3), start);

        assert_eq!(strategy.decide(start, true, 0), Decision::Persist);
        let within = start + SHUTTER_DEBOUNCE - Duration::from_millis(1);
        assert_eq!(strategy.decide(within, true, 1), Decision::Skip);
        let after = start + SHUTTER_DEBOUNCE;
        assert_eq!(strategy.decide(after, true, 1), Decision::Persist);
    }

    #[test]
    fn ignored_trigger_does_not_extend_debounce() {
        let start = Instant::now();
        let mut strategy =
            ModeStrategy::from_config(&photo_config(PhotoTrigger::Manual, 0.0, 3), start);

        assert_eq!(strategy.decide(start, true, 0), Decision::Persist);
        // A press inside the window is dropped and must not push the window out.
        let inside = start + Duration::from_millis(200);
        assert_eq!(strategy.decide(inside, true, 1), Decision::Skip);
        let boundary = start + SHUTTER_DEBOUNCE;
        assert_eq!(strategy.decide(boundary, true, 1), Decision::Persist);
    }

    #[test]
    fn video_persists_every_tick_until_duration() {
        let start = Instant::now();
        let mut strategy = ModeStrategy::from_config(&video_config(0.1), start);

        assert_eq!(strategy.decide(start, false, 0), Decision::Persist);
        assert_eq!(
            strategy.decide(start + Duration::from_millis(99), false, 1),
            Decision::Persist
        );
        assert_eq!(
            strategy.decide(start + Duration::from_millis(100), false, 2),
            Decision::Complete
        );
    }

    #[test]
    fn zero_duration_video_completes_immediately() {
        let start = Instant::now();
        let mut strategy = ModeStrategy::from_config(&video_config(0.0), start);
        assert_eq!(strategy.decide(start, false, 0), Decision::Complete);
    }
}
