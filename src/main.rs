//! cam-session binary: drive one capture session from a JSON config file.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cam_session::config::{CaptureMode, SessionConfig};
use cam_session::input::TerminalInput;
use cam_session::persist::FsPersister;
use cam_session::preview::LogPreview;
use cam_session::session::{Outcome, SessionController};
use cam_session::traits::MonotonicClock;
use cam_session::V4l2Camera;

#[derive(Parser)]
#[command(
    name = "cam-session",
    version,
    about = "Bounded photo/video capture sessions for a single camera"
)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Override the configured device index
    #[arg(short, long)]
    device: Option<u32>,

    /// Override the configured capture mode
    #[arg(short, long, value_enum)]
    mode: Option<ModeArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Photo,
    Video,
}

impl From<ModeArg> for CaptureMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Photo => Self::Photo,
            ModeArg::Video => Self::Video,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run() {
        Ok(outcome) => {
            if outcome.is_failure() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<Outcome> {
    let args = Args::parse();

    let mut config = SessionConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(index) = args.device {
        config.device.index = index;
    }
    if let Some(mode) = args.mode {
        config.mode = mode.into();
    }
    config.validate().context("applying CLI overrides")?;

    info!(
        mode = ?config.mode,
        device = config.device.index,
        "starting session; q/Esc cancels, p captures in manual mode"
    );

    let mut device = V4l2Camera::new(config.device.clone(), config.transform.clone());
    let persister = FsPersister::from_config(&config);
    let input = TerminalInput::new().context("enabling terminal input")?;

    let mut controller = SessionController::new(
        config,
        persister,
        input,
        LogPreview::new(30),
        MonotonicClock,
    );

    Ok(controller.run(&mut device))
}
