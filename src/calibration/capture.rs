use std::io::{BufRead, Write};

use crate::{
    config::{CALIBRATION_WINDOW, KEY_POLL, REFERENCE_DISTANCE_CM},
    geometry::{measure_palm, PalmMeasurement},
    gui::Screen,
    image::{draw, Color, Image},
    landmark::LandmarkProvider,
    video::FrameSource,
};

use super::Console;

/// Shows the live camera feed until the user presses `c` with a measurable hand in view.
///
/// Returns the palm width (in pixels) measured on that frame. Frames that cannot be read are
/// skipped.
pub fn capture_palm_width<R, W>(
    frames: &mut impl FrameSource,
    hands: &mut impl LandmarkProvider,
    screen: &mut impl Screen,
    console: &mut Console<R, W>,
) -> anyhow::Result<u32>
where
    R: BufRead,
    W: Write,
{
    loop {
        let mut frame = match frames.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::trace!("skipping frame: {e:#}");
                continue;
            }
        };
        frame.flip_horizontal_in_place();

        let measurement = hands
            .detect(&frame)?
            .map(|hand| measure_palm(&hand, frame.width(), frame.height()));
        annotate(&mut frame, measurement.as_ref());
        screen.show(CALIBRATION_WINDOW, &frame)?;

        if screen.wait_key(KEY_POLL) != Some('c') {
            continue;
        }
        match measurement {
            Some(m) if m.pixel_width > 0 => return Ok(m.pixel_width),
            Some(_) => console.say("Could not measure hand width. Please try again.")?,
            None => log::debug!("no hand in view, ignoring capture request"),
        }
    }
}

fn annotate(frame: &mut Image, measurement: Option<&PalmMeasurement>) {
    if let Some(m) = measurement {
        m.bbox.draw(frame, Color::GREEN);
        draw::text(
            frame,
            m.bbox.x_min,
            m.bbox.y_min - 10,
            &format!("Pixel Width: {}", m.pixel_width),
        )
        .color(Color::GREEN)
        .align_left()
        .align_baseline();
    }

    draw::text(
        frame,
        10,
        30,
        &format!("Place hand at {REFERENCE_DISTANCE_CM:?} cm and press 'c'"),
    )
    .color(Color::RED)
    .align_left()
    .align_baseline();
}

#[cfg(test)]
mod tests {
    use crate::test::{count_color, palm, ScriptedScreen, StubFrames, StubProvider};

    use super::*;

    /// 120 pixels wide in a 640x480 frame.
    fn hand() -> crate::landmark::LandmarkSet {
        palm([0.34375, 0.75], [0.25, 0.5], [0.4375, 0.5])
    }

    fn console() -> Console<&'static [u8], Vec<u8>> {
        Console::new(&[], Vec::new())
    }

    #[test]
    fn captures_on_c_with_hand() {
        let mut frames = StubFrames::blank(640, 480);
        let mut hands = StubProvider::new([None, Some(hand())]);
        let mut screen = ScriptedScreen::new([None], 'c');

        let width = capture_palm_width(&mut frames, &mut hands, &mut screen, &mut console())
            .unwrap();
        assert_eq!(width, 120);
        assert_eq!(screen.shown.len(), 2);
        assert!(screen.shown.iter().all(|(title, _)| title == "Calibration"));
    }

    #[test]
    fn c_without_hand_is_ignored() {
        let mut frames = StubFrames::blank(640, 480);
        let mut hands = StubProvider::new([None, None, Some(hand())]);
        let mut screen = ScriptedScreen::new([], 'c');
        let mut console = console();

        let width =
            capture_palm_width(&mut frames, &mut hands, &mut screen, &mut console).unwrap();
        assert_eq!(width, 120);
        assert_eq!(screen.shown.len(), 3);
        assert!(console.output().is_empty());
    }

    #[test]
    fn zero_width_asks_to_retry() {
        let flat = palm([0.5, 0.75], [0.5, 0.5], [0.5, 0.25]);
        let mut frames = StubFrames::blank(640, 480);
        let mut hands = StubProvider::new([Some(flat), Some(hand())]);
        let mut screen = ScriptedScreen::new([], 'c');
        let mut console = console();

        let width =
            capture_palm_width(&mut frames, &mut hands, &mut screen, &mut console).unwrap();
        assert_eq!(width, 120);
        assert_eq!(
            String::from_utf8_lossy(console.output()),
            "Could not measure hand width. Please try again.\n"
        );
    }

    #[test]
    fn skips_unreadable_frames() {
        let mut frames = StubFrames::blank(640, 480).failing(3);
        let mut hands = StubProvider::always(hand());
        let mut screen = ScriptedScreen::new([], 'c');

        capture_palm_width(&mut frames, &mut hands, &mut screen, &mut console()).unwrap();
        assert_eq!(frames.reads, 4);
        assert_eq!(hands.frames.len(), 1);
        assert_eq!(screen.shown.len(), 1);
    }

    #[test]
    fn frames_are_mirrored() {
        let mut frame = Image::new(8, 4);
        frame.clear(Color::BLACK);
        frame.set(0, 0, Color::WHITE);
        let mut frames = StubFrames::new(frame);
        let mut hands = StubProvider::always(hand());
        let mut screen = ScriptedScreen::new([], 'c');

        capture_palm_width(&mut frames, &mut hands, &mut screen, &mut console()).unwrap();
        let seen = &hands.frames[0];
        assert_eq!(seen.get(7, 0), Color::WHITE);
        assert_eq!(seen.get(0, 0), Color::BLACK);
    }

    #[test]
    fn annotations() {
        let mut frames = StubFrames::blank(640, 480);
        let mut hands = StubProvider::new([None, Some(hand())]);
        let mut screen = ScriptedScreen::new([None], 'c');

        capture_palm_width(&mut frames, &mut hands, &mut screen, &mut console()).unwrap();

        let without_hand = &screen.shown[0].1;
        assert_eq!(count_color(without_hand, Color::GREEN), 0);
        assert_ne!(count_color(without_hand, Color::RED), 0);

        let with_hand = &screen.shown[1].1;
        assert_ne!(count_color(with_hand, Color::GREEN), 0);
        // Box corner.
        assert_eq!(with_hand.get(160, 240), Color::GREEN);
    }
}
