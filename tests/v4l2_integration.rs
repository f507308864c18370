//! Integration tests requiring a real V4L2 capture device.
//!
//! These tests require:
//! - The `integration` feature flag: `cargo test --features integration`
//! - At least one /dev/video* capture device (a webcam, or the vivid
//!   virtual driver: `modprobe vivid`)
//! - Access to /dev/video* (may require video group membership)
//!
//! Tests fail loudly if no device is available - they should fail, not
//! silently skip, so CI catches a missing device configuration.

#![cfg(all(feature = "integration", feature = "mock"))]

use std::fs;
use std::path::Path;

use serial_test::serial;

use cam_session::config::{CaptureMode, DeviceProperties, PhotoTrigger, SessionConfig};
use cam_session::mock::{MemoryPersister, ScriptedInput};
use cam_session::preprocess::FrameTransform;
use cam_session::preview::NullPreview;
use cam_session::session::{Outcome, SessionController};
use cam_session::traits::{ActiveCamera, CameraDevice, MonotonicClock};
use cam_session::validation::{validate_frame, validate_sequence};
use cam_session::V4l2Camera;

/// Find indices of video4linux devices via sysfs.
fn find_capture_devices() -> Vec<u32> {
    let video4linux = Path::new("/sys/class/video4linux");
    if !video4linux.exists() {
        return Vec::new();
    }

    let mut devices = Vec::new();
    for index in 0..10 {
        let name_path = video4linux.join(format!("video{index}")).join("name");
        if fs::read_to_string(&name_path).is_ok() {
            devices.push(index);
        }
    }
    devices
}

macro_rules! require_device {
    () => {
        match find_capture_devices().first().copied() {
            Some(idx) => idx,
            None => {
                panic!(
                    "no V4L2 capture device available.\n\
                     Load the virtual driver with: sudo modprobe vivid\n\
                     Or run unit tests only: cargo test --lib"
                );
            }
        }
    };
}

fn properties(index: u32) -> DeviceProperties {
    DeviceProperties {
        index,
        width: 640,
        height: 480,
        ..DeviceProperties::default()
    }
}

#[test]
#[serial]
fn open_read_and_release() {
    let index = require_device!();
    let mut camera = V4l2Camera::new(properties(index), FrameTransform::default());

    let frames = {
        let mut active = camera.open().expect("failed to open device");
        (0..5)
            .map(|_| active.read_frame().expect("failed to read frame"))
            .collect::<Vec<_>>()
    };
    camera.close().expect("failed to release device");

    for frame in &frames {
        validate_frame(frame).expect("malformed frame");
    }
    validate_sequence(&frames).expect("frame sequence has gaps");
}

#[test]
#[serial]
fn timestamps_are_monotonic() {
    let index = require_device!();
    let mut camera = V4l2Camera::new(properties(index), FrameTransform::default());

    let mut active = camera.open().expect("failed to open device");
    let mut previous = active
        .read_frame()
        .expect("failed to read frame")
        .metadata
        .timestamp;
    for _ in 0..3 {
        let timestamp = active
            .read_frame()
            .expect("failed to read frame")
            .metadata
            .timestamp;
        assert!(timestamp >= previous, "timestamp went backwards");
        previous = timestamp;
    }
}

#[test]
#[serial]
fn full_session_against_real_device() {
    let index = require_device!();
    let mut camera = V4l2Camera::new(properties(index), FrameTransform::default());

    let config = SessionConfig {
        mode: CaptureMode::Photo,
        photo_trigger: PhotoTrigger::Auto,
        capture_interval_secs: 0.0,
        total_captures: 2,
        device: properties(index),
        ..SessionConfig::default()
    };

    let persister = MemoryPersister::new();
    let log = persister.handle();
    let mut controller = SessionController::new(
        config,
        persister,
        ScriptedInput::idle(),
        NullPreview,
        MonotonicClock,
    );

    let outcome = controller.run(&mut camera);
    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(log.stills(), vec![0, 1]);
}
