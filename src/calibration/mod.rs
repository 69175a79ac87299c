//! Obtaining the camera's focal length.
//!
//! A calibration is done once by holding the hand at [`REFERENCE_DISTANCE_CM`] from the camera
//! and measuring its apparent width. The result is stored in a [`CalibrationRecord`] file and can
//! be reused on later runs.

mod capture;
mod console;
mod record;

use std::{
    io::{BufRead, Write},
    path::Path,
};

use crate::{
    config::REFERENCE_DISTANCE_CM,
    distance::focal_length,
    gui::Screen,
    landmark::LandmarkProvider,
    video::{FrameSource, Reopen},
};

pub use capture::capture_palm_width;
pub use console::Console;
pub use record::CalibrationRecord;

/// Loads the stored calibration if the user wants to reuse it, or runs a new calibration.
///
/// A missing or corrupt calibration file leads to a new calibration.
pub fn obtain<R, W, S, P>(
    path: &Path,
    console: &mut Console<R, W>,
    screen: &mut impl Screen,
    open_camera: impl FnMut() -> anyhow::Result<S>,
    open_hands: impl FnOnce() -> anyhow::Result<P>,
) -> anyhow::Result<CalibrationRecord>
where
    R: BufRead,
    W: Write,
    S: FrameSource,
    P: LandmarkProvider,
{
    if !path.exists() {
        console.say("No calibration file found.")?;
        return calibrate(path, console, screen, open_camera, open_hands);
    }

    if !console.ask_reuse()? {
        return calibrate(path, console, screen, open_camera, open_hands);
    }

    match CalibrationRecord::load(path) {
        Ok(record) => {
            console.say("Loaded calibration data successfully.")?;
            log::debug!("{record:?}");
            Ok(record)
        }
        Err(e) => {
            log::debug!("{e:#}");
            console.say("Calibration file is corrupt. Please recalibrate.")?;
            calibrate(path, console, screen, open_camera, open_hands)
        }
    }
}

/// Runs an interactive calibration and saves the result to `path`.
///
/// The camera is opened lazily: if it cannot be opened, opening is retried on every frame.
pub fn calibrate<R, W, S, P>(
    path: &Path,
    console: &mut Console<R, W>,
    screen: &mut impl Screen,
    open_camera: impl FnMut() -> anyhow::Result<S>,
    open_hands: impl FnOnce() -> anyhow::Result<P>,
) -> anyhow::Result<CalibrationRecord>
where
    R: BufRead,
    W: Write,
    S: FrameSource,
    P: LandmarkProvider,
{
    console.say("--- Starting Calibration ---")?;
    let known_hand_width_cm = console.read_hand_width()?;

    console.say(format_args!(
        "\nPlease place your hand at a known distance of {REFERENCE_DISTANCE_CM:?} cm from the camera."
    ))?;
    console.say("Ensure your palm is facing the camera.")?;
    console.say("Press 'c' to capture and calibrate.")?;

    let mut frames = Reopen::new(open_camera);
    let mut hands = open_hands()?;
    let pixel_width = capture_palm_width(&mut frames, &mut hands, screen, console)?;

    let record = CalibrationRecord {
        focal_length: focal_length(pixel_width, REFERENCE_DISTANCE_CM, known_hand_width_cm),
        known_hand_width_cm,
    };
    record.save(path)?;
    console.say(format_args!(
        "\nCalibration successful! Focal Length calculated: {:.2}",
        record.focal_length
    ))?;
    console.say(format_args!("Saved to {}", path.display()))?;

    drop(hands);
    drop(frames);
    screen.close_all();

    Ok(record)
}
