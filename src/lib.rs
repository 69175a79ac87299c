//! Hand distance estimation from a single calibrated webcam.
//!
//! The estimate uses the pinhole camera model: once the focal length of the camera is known (it is
//! derived from one calibration capture at a known distance), the distance of a hand follows from
//! its real width and its width in pixels.
//!
//! # Environment Variables
//!
//! * `HANDDIST_CALIBRATION_FILE`: Path of the two-line calibration file. Defaults to
//!   `calibration_data.txt` in the working directory.
//! * `HANDDIST_MODEL_DIR`: Directory containing `palm_detection_full.onnx` and
//!   `hand_landmark_full.onnx`. Defaults to `onnx`.
//! * `HANDDIST_WEBCAM_NAME`: Forces the device to use for the [`Webcam`]. If unset, the first
//!   device that supports a compatible image format will be used.
//! * `HANDDIST_JPEG_BACKEND`: Configures the JPEG decoder used for webcam frames. Allowed values
//!   are `zune-jpeg` (the default) and `jpeg-decoder`.
//!
//! [`Webcam`]: video::webcam::Webcam

use log::LevelFilter;

pub mod calibration;
pub mod config;
pub mod distance;
pub mod geometry;
pub mod gui;
pub mod hand;
pub mod image;
pub mod landmark;
pub mod nn;
pub mod num;
pub mod rect;
pub mod runtime;
pub mod termination;
pub mod timer;
pub mod video;


/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and this crate will log at *debug* level, `wgpu` will log at *warn* level.
/// `RUST_LOG` is applied on top of that.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
