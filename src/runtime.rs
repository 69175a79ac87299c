//! The live distance estimation loop.

use crate::{
    calibration::CalibrationRecord,
    config::{ESTIMATION_WINDOW, KEY_POLL, WARNING_DISTANCE_CM},
    distance::{estimate_distance, is_too_close},
    geometry::{measure_palm, PalmMeasurement},
    gui::Screen,
    image::{draw, Color, Image},
    landmark::{LandmarkProvider, LandmarkSet},
    timer::FpsCounter,
    video::FrameSource,
};

/// What was drawn onto a frame by [`annotate_frame`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameOverlay {
    /// The palm measurement, if a hand was found.
    pub measurement: Option<PalmMeasurement>,
    /// Estimated distance in cm, if the palm had a non-zero width.
    pub distance: Option<f64>,
    pub too_close: bool,
}

/// Draws the hand skeleton, palm box, distance and proximity warning onto `frame`.
pub fn annotate_frame(
    frame: &mut Image,
    hand: Option<&LandmarkSet>,
    calibration: &CalibrationRecord,
) -> FrameOverlay {
    let Some(hand) = hand else {
        return FrameOverlay::default();
    };

    hand.draw(frame);
    let measurement = measure_palm(hand, frame.width(), frame.height());
    measurement.bbox.draw(frame, Color::MAGENTA);

    let mut overlay = FrameOverlay {
        measurement: Some(measurement),
        ..Default::default()
    };
    if measurement.pixel_width == 0 {
        return overlay;
    }

    let distance = estimate_distance(
        calibration.known_hand_width_cm,
        calibration.focal_length,
        measurement.pixel_width,
    );
    draw::text(frame, 10, 30, &format!("Distance: {distance:.2} cm"))
        .color(Color::BLUE)
        .align_left()
        .align_baseline();
    overlay.distance = Some(distance);

    if is_too_close(distance, WARNING_DISTANCE_CM) {
        let x = frame.width() as i32 / 2 - 200;
        let y = frame.height() as i32 / 2;
        draw::text(frame, x, y, "Too Close!! Move Back")
            .color(Color::RED)
            .align_left()
            .align_baseline();
        overlay.too_close = true;
    }

    overlay
}

/// Estimates and displays the hand distance for every frame until `q` is pressed.
///
/// Unreadable frames are skipped.
pub fn run(
    frames: &mut impl FrameSource,
    hands: &mut impl LandmarkProvider,
    screen: &mut impl Screen,
    calibration: &CalibrationRecord,
) -> anyhow::Result<()> {
    let mut fps = FpsCounter::new("distance estimation");
    loop {
        let mut frame = match frames.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::trace!("skipping frame: {e:#}");
                continue;
            }
        };
        frame.flip_horizontal_in_place();

        let hand = hands.detect(&frame)?;
        let overlay = annotate_frame(&mut frame, hand.as_ref(), calibration);
        if let Some(distance) = overlay.distance {
            log::trace!("hand at {distance:.1} cm");
        }
        screen.show(ESTIMATION_WINDOW, &frame)?;

        fps.tick_with(frames.timers().into_iter().chain(hands.timers()));

        if screen.wait_key(KEY_POLL) == Some('q') {
            return Ok(());
        }
    }
}
