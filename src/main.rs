use std::io;

use anyhow::Context;
use handdist::{
    calibration::{self, Console},
    config::{
        Config, CALIBRATION_DETECTION_CONFIDENCE, CAMERA_FPS, CAMERA_RESOLUTION,
        DETECTION_CONFIDENCE, TRACKING_CONFIDENCE,
    },
    gui::{self, GuiScreen, Screen},
    hand::HandTracker,
    runtime,
    video::webcam::{Webcam, WebcamOptions},
};

fn main() {
    handdist::init_logger!();

    gui::run(app);
}

fn app() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let mut screen = GuiScreen::connect()?;
    let webcam_options = {
        let options = WebcamOptions::default()
            .resolution(CAMERA_RESOLUTION)
            .fps(CAMERA_FPS)
            .jpeg_backend(config.jpeg_backend);
        match &config.webcam_name {
            Some(name) => options.name(name),
            None => options,
        }
    };

    let stdin = io::stdin();
    let mut console = Console::new(stdin.lock(), io::stdout());
    let calibration = match calibration::obtain(
        &config.calibration_file,
        &mut console,
        &mut screen,
        || Webcam::open(webcam_options.clone()),
        || {
            HandTracker::load(
                &config.model_dir,
                CALIBRATION_DETECTION_CONFIDENCE,
                TRACKING_CONFIDENCE,
            )
        },
    ) {
        Ok(calibration) => calibration,
        Err(e) => {
            println!("Could not obtain calibration data. Exiting.");
            return Err(e);
        }
    };

    let mut tracker = HandTracker::load(&config.model_dir, DETECTION_CONFIDENCE, TRACKING_CONFIDENCE)
        .context("failed to load hand tracking models")?;
    let webcam = Webcam::open(webcam_options);

    println!("\nStarting distance estimation... Press 'q' to quit.");

    match webcam {
        Ok(mut webcam) => runtime::run(&mut webcam, &mut tracker, &mut screen, &calibration)?,
        Err(e) => log::error!("failed to open webcam: {e:#}"),
    }

    drop(tracker);
    screen.close_all();
    println!("Program finished.");
    Ok(())
}
