//! The capture session controller.
//!
//! One [`SessionController::run`] call drives a full session: open the
//! device, tick the capture loop under the configured mode strategy, and
//! release the device and persistence sink exactly once on every exit path.
//! All per-tick failures are absorbed into the consecutive-error budget;
//! nothing escapes the loop except the terminal [`Outcome`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::{CaptureMode, PhotoTrigger, SessionConfig};
use crate::preview::Preview;
use crate::strategy::{Decision, ModeStrategy};
use crate::traits::{ActiveCamera, CameraDevice, Clock, InputPoll, Persister, Signal};

/// Fixed delay between loop iterations. Bounds CPU usage and gives the
/// cancellation poll a bounded response latency.
pub const TICK_DELAY: Duration = Duration::from_millis(10);

/// Backoff after a failed frame read or persist before the next attempt.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Terminal result of a session. Exactly one is produced per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The mode strategy reported completion.
    Completed,
    /// A cancellation signal was observed.
    UserCancelled,
    /// The consecutive-error budget was exhausted.
    ErrorBudgetExhausted,
    /// The device (or the persistence sink) failed to initialize.
    DeviceInitFailed,
}

impl Outcome {
    /// Whether the host process should exit non-zero for this outcome.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::ErrorBudgetExhausted | Self::DeviceInitFailed)
    }
}

/// Cooperative stop flag.
///
/// A supervising thread may clone the token and call [`cancel`]; the capture
/// loop reads it at one fixed point per tick, before the frame read. The
/// supervisor never touches the device or session state directly.
///
/// [`cancel`]: CancelToken::cancel
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Mutable state owned by the controller for the lifetime of one run.
#[derive(Debug)]
struct SessionState {
    running: bool,
    consecutive_errors: u32,
    captures_done: u32,
    last_capture_at: Option<Instant>,
}

impl SessionState {
    const fn new() -> Self {
        Self {
            running: true,
            consecutive_errors: 0,
            captures_done: 0,
            last_capture_at: None,
        }
    }
}

/// Bounded-retry policy shared by frame-read and persist failures.
#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    max_consecutive: u32,
    backoff: Duration,
}

impl RetryPolicy {
    const fn new(max_consecutive: u32) -> Self {
        Self {
            max_consecutive,
            backoff: RETRY_BACKOFF,
        }
    }

    const fn exhausted(self, consecutive_errors: u32) -> bool {
        consecutive_errors >= self.max_consecutive
    }

    /// Count one failure and suspend before the next attempt.
    fn absorb<C: Clock>(self, state: &mut SessionState, clock: &C) {
        state.consecutive_errors += 1;
        clock.sleep(self.backoff);
    }
}

/// Orchestrates one capture run from device-open to device-release.
#[derive(Debug)]
pub struct SessionController<P, I, V, C> {
    config: SessionConfig,
    retry: RetryPolicy,
    persister: P,
    input: I,
    preview: V,
    clock: C,
    cancel: CancelToken,
}

impl<P, I, V, C> SessionController<P, I, V, C>
where
    P: Persister,
    I: InputPoll,
    V: Preview,
    C: Clock,
{
    /// Build a controller for one session.
    pub fn new(config: SessionConfig, persister: P, input: I, preview: V, clock: C) -> Self {
        let retry = RetryPolicy::new(config.max_consecutive_errors);
        Self {
            config,
            retry,
            persister,
            input,
            preview,
            clock,
            cancel: CancelToken::new(),
        }
    }

    /// A clone of this session's cancellation token, for a supervising
    /// thread (e.g. a process-interrupt handler).
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Drive one full session on the given (not yet opened) device.
    ///
    /// The device and the persistence sink are released exactly once on
    /// every exit path that follows a successful acquisition; release
    /// failures during shutdown are logged and do not change the outcome.
    pub fn run<D: CameraDevice>(&mut self, device: &mut D) -> Outcome {
        let outcome = self.run_inner(device);
        match outcome {
            Outcome::Completed => info!("session completed"),
            Outcome::UserCancelled => info!("session cancelled by user"),
            Outcome::ErrorBudgetExhausted => {
                error!(
                    max = self.config.max_consecutive_errors,
                    "too many consecutive errors, session aborted"
                );
            }
            Outcome::DeviceInitFailed => error!("session never started"),
        }
        outcome
    }

    fn run_inner<D: CameraDevice>(&mut self, device: &mut D) -> Outcome {
        let mut camera = match device.open() {
            Ok(camera) => camera,
            Err(err) => {
                error!(error = %err, "device init failed");
                return Outcome::DeviceInitFailed;
            }
        };

        if let Err(err) = self.persister.open() {
            error!(error = %err, "persistence init failed");
            drop(camera);
            if let Err(err) = device.close() {
                warn!(error = %err, "device release failed");
            }
            return Outcome::DeviceInitFailed;
        }

        let outcome = self.drive(&mut camera);

        drop(camera);
        if let Err(err) = self.persister.close() {
            warn!(error = %err, "persister release failed");
        }
        if let Err(err) = device.close() {
            warn!(error = %err, "device release failed");
        }
        outcome
    }

    fn drive<A: ActiveCamera>(&mut self, camera: &mut A) -> Outcome {
        let started = self.clock.now();
        let mut state = SessionState::new();
        let mut strategy = ModeStrategy::from_config(&self.config, started);
        self.announce();

        while state.running {
            if self.retry.exhausted(state.consecutive_errors) {
                return Outcome::ErrorBudgetExhausted;
            }

            // Cancellation takes priority over capture: checked at this one
            // fixed point, before the frame read.
            let signal = self.input.poll();
            if self.cancel.is_cancelled() || signal == Some(Signal::Cancel) {
                return Outcome::UserCancelled;
            }
            let shutter = signal == Some(Signal::Shutter);

            self.tick(camera, &mut state, &mut strategy, shutter);
            self.clock.sleep(TICK_DELAY);
        }

        debug!(
            captures = state.captures_done,
            last_capture = ?state.last_capture_at.map(|at| at.duration_since(started)),
            "strategy reported completion"
        );
        Outcome::Completed
    }

    /// One tick: read, preview, decide, maybe persist. Failures increment
    /// the error budget and back off; they never escape.
    fn tick<A: ActiveCamera>(
        &mut self,
        camera: &mut A,
        state: &mut SessionState,
        strategy: &mut ModeStrategy,
        shutter: bool,
    ) {
        let now = self.clock.now();

        let frame = match camera.read_frame() {
            Ok(frame) => {
                state.consecutive_errors = 0;
                frame
            }
            Err(err) => {
                self.retry.absorb(state, &self.clock);
                warn!(
                    error = %err,
                    errors = state.consecutive_errors,
                    max = self.config.max_consecutive_errors,
                    "frame read failed, backing off"
                );
                return;
            }
        };

        self.preview.show(&frame);

        match strategy.decide(now, shutter, state.captures_done) {
            Decision::Skip => {}
            Decision::Persist => {
                let result = match self.config.mode {
                    CaptureMode::Photo => self.persister.save_still(&frame, state.captures_done),
                    CaptureMode::Video => self.persister.append_video_sample(&frame),
                };
                match result {
                    Ok(()) => {
                        state.captures_done += 1;
                        state.last_capture_at = Some(now);
                        match self.config.mode {
                            CaptureMode::Photo => info!(
                                captures = state.captures_done,
                                total = self.config.total_captures,
                                "still saved"
                            ),
                            CaptureMode::Video => {
                                debug!(samples = state.captures_done, "video sample appended");
                            }
                        }
                    }
                    Err(err) => {
                        self.retry.absorb(state, &self.clock);
                        warn!(
                            error = %err,
                            errors = state.consecutive_errors,
                            max = self.config.max_consecutive_errors,
                            "persist failed, backing off"
                        );
                    }
                }
            }
            Decision::Complete => {
                state.running = false;
            }
        }
    }

    fn announce(&self) {
        match self.config.mode {
            CaptureMode::Photo => match self.config.photo_trigger {
                PhotoTrigger::Auto => info!(
                    interval_secs = self.config.capture_interval_secs,
                    total = self.config.total_captures,
                    "photo session started (interval)"
                ),
                PhotoTrigger::Manual => info!(
                    total = self.config.total_captures,
                    "photo session started (manual shutter)"
                ),
            },
            CaptureMode::Video => info!(
                duration_secs = self.config.video_duration_secs,
                "video session started"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_is_idempotent() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn failure_outcomes() {
        assert!(Outcome::ErrorBudgetExhausted.is_failure());
        assert!(Outcome::DeviceInitFailed.is_failure());
        assert!(!Outcome::Completed.is_failure());
        assert!(!Outcome::UserCancelled.is_failure());
    }
}
