//! Session configuration, loaded and validated once before a run.
//!
//! Every recognized device property is an explicit typed field; validation
//! happens here at load time so the capture loop never has to second-guess
//! a value mid-session.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::preprocess::FrameTransform;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read config {path}: {reason}")]
    Read {
        /// Path to the configuration file.
        path: String,
        /// Underlying reason.
        reason: String,
    },
    /// Configuration file is not valid JSON.
    #[error("failed to parse config {path}: {reason}")]
    Parse {
        /// Path to the configuration file.
        path: String,
        /// Parser message.
        reason: String,
    },
    /// A field value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level capture mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Capture still images.
    Photo,
    /// Record a fixed-duration video.
    Video,
}

/// How photo captures are triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoTrigger {
    /// Capture automatically on a fixed interval.
    Auto,
    /// Capture on the shutter key.
    Manual,
}

/// Encoded still image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoFormat {
    /// JPEG.
    Jpg,
    /// PNG.
    Png,
}

impl PhotoFormat {
    /// File extension for this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Png => "png",
        }
    }
}

/// How still image files are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StillNaming {
    /// Zero-padded monotonically increasing sequence number.
    Sequence,
    /// Capture timestamp.
    Timestamp,
}

/// Device properties applied at open time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProperties {
    /// Device index (0 for /dev/video0).
    pub index: u32,
    /// Requested frame width in pixels.
    pub width: u32,
    /// Requested frame height in pixels.
    pub height: u32,
    /// Enable driver autofocus.
    pub autofocus: bool,
    /// Enable driver auto white balance.
    pub auto_white_balance: bool,
}

impl Default for DeviceProperties {
    fn default() -> Self {
        Self {
            index: 0,
            width: 1280,
            height: 720,
            autofocus: true,
            auto_white_balance: true,
        }
    }
}

/// Output location and still file naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory captures are written to. Created if missing.
    pub folder: PathBuf,
    /// Encoded still format.
    pub photo_format: PhotoFormat,
    /// Still file naming scheme.
    pub still_naming: StillNaming,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("captures"),
            photo_format: PhotoFormat::Jpg,
            still_naming: StillNaming::Sequence,
        }
    }
}

/// Immutable configuration for one capture session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Photo or video session.
    pub mode: CaptureMode,
    /// Photo trigger sub-mode.
    pub photo_trigger: PhotoTrigger,
    /// Seconds between automatic photo captures. Zero captures every tick.
    pub capture_interval_secs: f64,
    /// Photo sessions complete after this many captures.
    pub total_captures: u32,
    /// Video sessions complete after this many seconds.
    pub video_duration_secs: f64,
    /// Consecutive tick failures tolerated before aborting.
    pub max_consecutive_errors: u32,
    /// Device properties, forwarded to the camera backend.
    pub device: DeviceProperties,
    /// Geometry pre-processing applied before frames reach the session loop.
    pub transform: FrameTransform,
    /// Output location and naming.
    pub output: OutputConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: CaptureMode::Photo,
            photo_trigger: PhotoTrigger::Auto,
            capture_interval_secs: 5.0,
            total_captures: 10,
            video_duration_secs: 30.0,
            max_consecutive_errors: 10,
            device: DeviceProperties::default(),
            transform: FrameTransform::default(),
            output: OutputConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        let config: Self =
            serde_json::from_str(&contents).map_err(|err| ConfigError::Parse {
                path: path.display().to_string(),
                reason: err.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field once; the session loop relies on these holding.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.capture_interval_secs.is_finite() || self.capture_interval_secs < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "capture_interval_secs must be a non-negative number, got {}",
                self.capture_interval_secs
            )));
        }
        if !self.video_duration_secs.is_finite() || self.video_duration_secs < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "video_duration_secs must be a non-negative number, got {}",
                self.video_duration_secs
            )));
        }
        if self.max_consecutive_errors == 0 {
            return Err(ConfigError::Invalid(
                "max_consecutive_errors must be at least 1".to_owned(),
            ));
        }
        if self.device.width == 0 || self.device.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "device resolution must be non-zero, got {}x{}",
                self.device.width, self.device.height
            )));
        }
        if self.device.width % 2 != 0 {
            // YUYV macropixels cover two horizontal pixels.
            return Err(ConfigError::Invalid(format!(
                "device width must be even for YUYV, got {}",
                self.device.width
            )));
        }
        self.transform.validate().map_err(ConfigError::Invalid)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_document_parses() {
        let json = r#"{
            "mode": "video",
            "photo_trigger": "manual",
            "capture_interval_secs": 2.5,
            "total_captures": 3,
            "video_duration_secs": 12.0,
            "max_consecutive_errors": 4,
            "device": {
                "index": 1,
                "width": 640,
                "height": 480,
                "autofocus": false,
                "auto_white_balance": false
            },
            "transform": {
                "zoom": 2.0,
                "flip_horizontal": true,
                "flip_vertical": false
            },
            "output": {
                "folder": "out",
                "photo_format": "png",
                "still_naming": "timestamp"
            }
        }"#;

        let config: SessionConfig = serde_json::from_str(json).expect("parse failed");
        config.validate().expect("validation failed");
        assert_eq!(config.mode, CaptureMode::Video);
        assert_eq!(config.photo_trigger, PhotoTrigger::Manual);
        assert_eq!(config.device.index, 1);
        assert_eq!(config.output.photo_format, PhotoFormat::Png);
        assert_eq!(config.output.still_naming, StillNaming::Timestamp);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{ "mode": "photo" }"#).expect("parse failed");
        assert_eq!(config.total_captures, 10);
        assert_eq!(config.max_consecutive_errors, 10);
        assert_eq!(config.device.width, 1280);
        assert_eq!(config.output.photo_format, PhotoFormat::Jpg);
    }

    #[test]
    fn negative_interval_rejected() {
        let config = SessionConfig {
            capture_interval_secs: -1.0,
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_error_budget_rejected() {
        let config = SessionConfig {
            max_consecutive_errors: 0,
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn odd_width_rejected() {
        let config = SessionConfig {
            device: DeviceProperties {
                width: 641,
                ..DeviceProperties::default()
            },
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn shrinking_zoom_rejected() {
        let config = SessionConfig {
            transform: FrameTransform {
                zoom: 0.5,
                ..FrameTransform::default()
            },
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
