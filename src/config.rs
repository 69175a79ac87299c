//! Runtime configuration.
//!
//! There are no command line flags; the few settings that vary between machines are read from
//! environment variables, everything else is a constant.

use std::{
    env::{self, VarError},
    path::PathBuf,
    time::Duration,
};

use anyhow::bail;

use crate::image::{JpegBackend, Resolution};

/// Distance at which the hand is held during calibration.
pub const REFERENCE_DISTANCE_CM: f64 = 30.0;

/// Distances strictly below this trigger the "too close" warning.
pub const WARNING_DISTANCE_CM: f64 = 60.0;

/// Minimum palm detection confidence while calibrating.
pub const CALIBRATION_DETECTION_CONFIDENCE: f32 = 0.7;

/// Minimum palm detection confidence during distance estimation.
pub const DETECTION_CONFIDENCE: f32 = 0.5;

/// Minimum hand presence score to keep tracking a hand.
pub const TRACKING_CONFIDENCE: f32 = 0.5;

/// How long each loop iteration waits for a key press.
pub const KEY_POLL: Duration = Duration::from_millis(5);

pub const CALIBRATION_WINDOW: &str = "Calibration";
pub const ESTIMATION_WINDOW: &str = "Hand Distance Estimator";

/// Requested webcam resolution.
pub const CAMERA_RESOLUTION: Resolution = Resolution::RES_480P;
/// Requested webcam frame rate.
pub const CAMERA_FPS: u32 = 30;

pub const CALIBRATION_FILE_VAR: &str = "HANDDIST_CALIBRATION_FILE";
pub const MODEL_DIR_VAR: &str = "HANDDIST_MODEL_DIR";
pub const WEBCAM_NAME_VAR: &str = "HANDDIST_WEBCAM_NAME";
pub const JPEG_BACKEND_VAR: &str = "HANDDIST_JPEG_BACKEND";

const DEFAULT_CALIBRATION_FILE: &str = "calibration_data.txt";
const DEFAULT_MODEL_DIR: &str = "onnx";

/// Settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Where the calibration record is loaded from and saved to.
    pub calibration_file: PathBuf,
    /// Directory containing the hand tracking networks.
    pub model_dir: PathBuf,
    /// Name of the webcam to open, or `None` to use the first suitable one.
    pub webcam_name: Option<String>,
    /// Decoder for the webcam's MJPG frames.
    pub jpeg_backend: JpegBackend,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// Returns an error if a variable is set to an invalid value.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| match env::var(name) {
            Ok(value) => Ok(Some(value)),
            Err(VarError::NotPresent) => Ok(None),
            Err(VarError::NotUnicode(s)) => bail!(
                "invalid value set for `{name}` variable: {}",
                s.to_string_lossy()
            ),
        })
    }

    fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> anyhow::Result<Option<String>>,
    {
        let jpeg_backend = match lookup(JPEG_BACKEND_VAR)? {
            Some(name) => match JpegBackend::from_name(&name) {
                Some(backend) => backend,
                None => bail!("invalid value set for `{JPEG_BACKEND_VAR}` variable: '{name}'"),
            },
            None => JpegBackend::default(),
        };

        let config = Self {
            calibration_file: lookup(CALIBRATION_FILE_VAR)?
                .unwrap_or_else(|| DEFAULT_CALIBRATION_FILE.into())
                .into(),
            model_dir: lookup(MODEL_DIR_VAR)?
                .unwrap_or_else(|| DEFAULT_MODEL_DIR.into())
                .into(),
            webcam_name: lookup(WEBCAM_NAME_VAR)?.filter(|name| !name.is_empty()),
            jpeg_backend,
        };
        log::debug!("{config:?}");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_with(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| Ok(vars.get(name).cloned()))
    }

    #[test]
    fn defaults() {
        let config = config_with(&[]).unwrap();
        assert_eq!(config.calibration_file, PathBuf::from("calibration_data.txt"));
        assert_eq!(config.model_dir, PathBuf::from("onnx"));
        assert_eq!(config.webcam_name, None);
        assert_eq!(config.jpeg_backend, JpegBackend::ZuneJpeg);
    }

    #[test]
    fn overrides() {
        let config = config_with(&[
            (CALIBRATION_FILE_VAR, "/tmp/cal.txt"),
            (MODEL_DIR_VAR, "/opt/models"),
            (WEBCAM_NAME_VAR, "Integrated Camera"),
            (JPEG_BACKEND_VAR, "jpeg-decoder"),
        ])
        .unwrap();
        assert_eq!(config.calibration_file, PathBuf::from("/tmp/cal.txt"));
        assert_eq!(config.model_dir, PathBuf::from("/opt/models"));
        assert_eq!(config.webcam_name.as_deref(), Some("Integrated Camera"));
        assert_eq!(config.jpeg_backend, JpegBackend::JpegDecoder);
    }

    #[test]
    fn invalid_jpeg_backend() {
        let err = config_with(&[(JPEG_BACKEND_VAR, "mozjpeg")]).unwrap_err();
        assert!(err.to_string().contains("mozjpeg"), "{err}");
    }
}
