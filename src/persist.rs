//! Filesystem persistence for stills and video samples.
//!
//! Stills are encoded to JPEG or PNG, named with either a zero-padded
//! sequence number or a capture timestamp. Video samples are appended to a
//! raw packed-YUYV stream named with the session-start timestamp; any muxer
//! can wrap it afterwards. Filename formatting and directory creation live
//! here so the session loop only ever supplies a frame and an index.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::RgbImage;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::config::{CaptureMode, PhotoFormat, SessionConfig, StillNaming};
use crate::traits::{yuv_to_rgb, Frame, PersistError, Persister};

fn file_timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(format_description!(
            "[year][month][day]_[hour][minute][second]"
        ))
        .unwrap_or_else(|_| "unknown".to_owned())
}

fn create_folder(folder: &Path) -> Result<(), PersistError> {
    fs::create_dir_all(folder).map_err(|err| PersistError::Create {
        path: folder.display().to_string(),
        reason: err.to_string(),
    })?;
    let shown = fs::canonicalize(folder).unwrap_or_else(|_| folder.to_path_buf());
    info!(folder = %shown.display(), "output folder ready");
    Ok(())
}

/// Convert a packed YUYV frame to an RGB image for encoding.
fn frame_to_rgb(frame: &Frame) -> Result<RgbImage, PersistError> {
    let expected = Frame::expected_len(frame.width, frame.height);
    let data = frame
        .data
        .get(..expected)
        .ok_or_else(|| PersistError::Encode("frame shorter than its dimensions".to_owned()))?;

    let mut rgb = Vec::with_capacity((frame.width * frame.height * 3) as usize);
    for macropixel in data.chunks_exact(4) {
        let (y0, u, y1, v) = (macropixel[0], macropixel[1], macropixel[2], macropixel[3]);
        for y in [y0, y1] {
            let (r, g, b) = yuv_to_rgb(y, u, v);
            rgb.extend_from_slice(&[r, g, b]);
        }
    }

    RgbImage::from_raw(frame.width, frame.height, rgb)
        .ok_or_else(|| PersistError::Encode("frame dimensions mismatch".to_owned()))
}

/// Writes encoded stills into the output folder.
pub struct StillWriter {
    folder: PathBuf,
    format: PhotoFormat,
    naming: StillNaming,
}

impl StillWriter {
    /// Create a still writer. The folder is created on [`Persister::open`].
    #[must_use]
    pub const fn new(folder: PathBuf, format: PhotoFormat, naming: StillNaming) -> Self {
        Self {
            folder,
            format,
            naming,
        }
    }

    fn still_path(&self, index: u32) -> PathBuf {
        let name = match self.naming {
            StillNaming::Sequence => {
                format!("capture_{index:06}.{}", self.format.extension())
            }
            StillNaming::Timestamp => {
                format!("capture_{}.{}", file_timestamp(), self.format.extension())
            }
        };
        self.folder.join(name)
    }
}

impl Persister for StillWriter {
    fn open(&mut self) -> Result<(), PersistError> {
        create_folder(&self.folder)
    }

    fn save_still(&mut self, frame: &Frame, index: u32) -> Result<(), PersistError> {
        let image = frame_to_rgb(frame)?;
        let path = self.still_path(index);
        image
            .save(&path)
            .map_err(|err| PersistError::Encode(err.to_string()))?;
        debug!(path = %path.display(), "still written");
        Ok(())
    }

    fn append_video_sample(&mut self, _frame: &Frame) -> Result<(), PersistError> {
        Err(PersistError::Unsupported("video sample on still writer"))
    }

    fn close(&mut self) -> Result<(), PersistError> {
        Ok(())
    }
}

/// Appends raw YUYV samples to a session-stamped video stream.
pub struct VideoWriter {
    folder: PathBuf,
    writer: Option<BufWriter<File>>,
    samples: u64,
}

impl VideoWriter {
    /// Create a video writer. The stream is opened on [`Persister::open`].
    #[must_use]
    pub const fn new(folder: PathBuf) -> Self {
        Self {
            folder,
            writer: None,
            samples: 0,
        }
    }
}

impl Persister for VideoWriter {
    fn open(&mut self) -> Result<(), PersistError> {
        create_folder(&self.folder)?;
        let path = self.folder.join(format!("session_{}.yuv", file_timestamp()));
        let file = File::create(&path).map_err(|err| PersistError::Create {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        info!(path = %path.display(), "video stream opened");
        self.writer = Some(BufWriter::new(file));
        Ok(())
    }

    fn save_still(&mut self, _frame: &Frame, _index: u32) -> Result<(), PersistError> {
        Err(PersistError::Unsupported("still on video writer"))
    }

    fn append_video_sample(&mut self, frame: &Frame) -> Result<(), PersistError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or(PersistError::Unsupported("video stream not open"))?;
        writer.write_all(&frame.data)?;
        self.samples += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), PersistError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            info!(samples = self.samples, "video stream closed");
        }
        Ok(())
    }
}

/// The filesystem persister for the configured mode.
pub enum FsPersister {
    /// Photo sessions write encoded stills.
    Stills(StillWriter),
    /// Video sessions append to one raw stream.
    Video(VideoWriter),
}

impl FsPersister {
    /// Build the persister matching the session mode.
    #[must_use]
    pub fn from_config(config: &SessionConfig) -> Self {
        match config.mode {
            CaptureMode::Photo => Self::Stills(StillWriter::new(
                config.output.folder.clone(),
                config.output.photo_format,
                config.output.still_naming,
            )),
            CaptureMode::Video => Self::Video(VideoWriter::new(config.output.folder.clone())),
        }
    }
}

impl Persister for FsPersister {
    fn open(&mut self) -> Result<(), PersistError> {
        match self {
            Self::Stills(writer) => writer.open(),
            Self::Video(writer) => writer.open(),
        }
    }

    fn save_still(&mut self, frame: &Frame, index: u32) -> Result<(), PersistError> {
        match self {
            Self::Stills(writer) => writer.save_still(frame, index),
            Self::Video(writer) => writer.save_still(frame, index),
        }
    }

    fn append_video_sample(&mut self, frame: &Frame) -> Result<(), PersistError> {
        match self {
            Self::Stills(writer) => writer.append_video_sample(frame),
            Self::Video(writer) => writer.append_video_sample(frame),
        }
    }

    fn close(&mut self) -> Result<(), PersistError> {
        match self {
            Self::Stills(writer) => writer.close(),
            Self::Video(writer) => writer.close(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::FrameMetadata;
    use std::time::Duration;

    fn gray_frame(width: u32, height: u32, luma: u8) -> Frame {
        let mut data = vec![0u8; Frame::expected_len(width, height)];
        for macropixel in data.chunks_exact_mut(4) {
            macropixel[0] = luma;
            macropixel[1] = 128;
            macropixel[2] = luma;
            macropixel[3] = 128;
        }
        Frame {
            width,
            height,
            data,
            metadata: FrameMetadata {
                sequence: 0,
                timestamp: Duration::ZERO,
            },
        }
    }

    #[test]
    fn stills_get_sequence_names() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let mut writer = StillWriter::new(
            dir.path().to_path_buf(),
            PhotoFormat::Jpg,
            StillNaming::Sequence,
        );
        writer.open().expect("open failed");
        writer
            .save_still(&gray_frame(64, 48, 100), 0)
            .expect("save failed");
        writer
            .save_still(&gray_frame(64, 48, 100), 1)
            .expect("save failed");

        assert!(dir.path().join("capture_000000.jpg").exists());
        assert!(dir.path().join("capture_000001.jpg").exists());
    }

    #[test]
    fn timestamp_naming_writes_png() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let mut writer = StillWriter::new(
            dir.path().to_path_buf(),
            PhotoFormat::Png,
            StillNaming::Timestamp,
        );
        writer.open().expect("open failed");
        writer
            .save_still(&gray_frame(64, 48, 100), 0)
            .expect("save failed");

        let entries: Vec<_> = fs::read_dir(dir.path())
            .expect("read_dir failed")
            .filter_map(std::result::Result::ok)
            .collect();
        assert_eq!(entries.len(), 1);
        let name = entries[0].file_name();
        let name = name.to_string_lossy();
        assert!(name.starts_with("capture_"), "unexpected name {name}");
        assert!(name.ends_with(".png"), "unexpected name {name}");
    }

    #[test]
    fn open_creates_nested_folder() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let nested = dir.path().join("a").join("b");
        let mut writer = StillWriter::new(nested.clone(), PhotoFormat::Jpg, StillNaming::Sequence);
        writer.open().expect("open failed");
        assert!(nested.is_dir());
    }

    #[test]
    fn video_stream_accumulates_samples() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let mut writer = VideoWriter::new(dir.path().to_path_buf());
        writer.open().expect("open failed");

        let frame = gray_frame(32, 16, 50);
        for _ in 0..3 {
            writer.append_video_sample(&frame).expect("append failed");
        }
        writer.close().expect("close failed");

        let entries: Vec<_> = fs::read_dir(dir.path())
            .expect("read_dir failed")
            .filter_map(std::result::Result::ok)
            .collect();
        assert_eq!(entries.len(), 1);
        let len = entries[0].metadata().expect("metadata failed").len();
        assert_eq!(len, (frame.data.len() * 3) as u64);
    }

    #[test]
    fn sample_kind_mismatch_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let frame = gray_frame(32, 16, 50);

        let mut stills = StillWriter::new(
            dir.path().to_path_buf(),
            PhotoFormat::Jpg,
            StillNaming::Sequence,
        );
        assert!(matches!(
            stills.append_video_sample(&frame),
            Err(PersistError::Unsupported(_))
        ));

        let mut video = VideoWriter::new(dir.path().to_path_buf());
        assert!(matches!(
            video.save_still(&frame, 0),
            Err(PersistError::Unsupported(_))
        ));
    }

    #[test]
    fn frame_to_rgb_converts_neutral_gray() {
        let image = frame_to_rgb(&gray_frame(4, 2, 200)).expect("conversion failed");
        assert_eq!(image.dimensions(), (4, 2));
        assert_eq!(image.get_pixel(0, 0).0, [200, 200, 200]);
    }
}
