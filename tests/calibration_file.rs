use std::{
    env, fs,
    path::{Path, PathBuf},
    process,
    time::Duration,
};

use handdist::{
    calibration::{self, CalibrationRecord, Console},
    distance::{estimate_distance, is_too_close},
    gui::Screen,
    image::{Color, Image},
    landmark::{LandmarkProvider, LandmarkSet, NUM_LANDMARKS},
    video::FrameSource,
};

struct TempFile(PathBuf);

impl TempFile {
    fn new(name: &str) -> Self {
        let path = env::temp_dir().join(format!("handdist-it-{}-{name}.txt", process::id()));
        fs::remove_file(&path).ok();
        Self(path)
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        fs::remove_file(&self.0).ok();
    }
}

struct Blank;

impl FrameSource for Blank {
    fn read_frame(&mut self) -> anyhow::Result<Image> {
        let mut image = Image::new(640, 480);
        image.clear(Color::BLACK);
        Ok(image)
    }
}

/// Always sees a hand whose palm is 120 pixels wide.
struct Hand;

impl LandmarkProvider for Hand {
    fn detect(&mut self, _frame: &Image) -> anyhow::Result<Option<LandmarkSet>> {
        let mut positions = [[0.3, 0.6, 0.0]; NUM_LANDMARKS];
        positions[0] = [0.34375, 0.75, 0.0];
        positions[5] = [0.25, 0.5, 0.0];
        positions[17] = [0.4375, 0.5, 0.0];
        Ok(Some(LandmarkSet::new(positions)))
    }
}

struct PressC;

impl Screen for PressC {
    fn show(&mut self, _title: &str, _image: &Image) -> anyhow::Result<()> {
        Ok(())
    }

    fn wait_key(&mut self, _timeout: Duration) -> Option<char> {
        Some('c')
    }

    fn close_all(&mut self) {}
}

fn obtain(path: &Path, input: &str) -> (CalibrationRecord, String) {
    let mut console = Console::new(input.as_bytes(), Vec::new());
    let record = calibration::obtain(path, &mut console, &mut PressC, || Ok(Blank), || Ok(Hand))
        .unwrap();
    (record, String::from_utf8(console.output().clone()).unwrap())
}

#[test]
fn save_and_load() {
    let file = TempFile::new("save-load");
    let record = CalibrationRecord {
        focal_length: 523.8461538461538,
        known_hand_width_cm: 8.4,
    };
    record.save(&file.0).unwrap();
    assert_eq!(CalibrationRecord::load(&file.0).unwrap(), record);
}

#[test]
fn calibration_is_reused_on_next_run() {
    let file = TempFile::new("next-run");

    let (first, output) = obtain(&file.0, "8\n");
    assert!(output.starts_with("No calibration file found."));
    assert_eq!(first.focal_length, 450.0);

    let (second, output) = obtain(&file.0, "y\n");
    assert_eq!(second, first);
    assert_eq!(
        output,
        "Use previous calibration (y) or run new calibration (n)? [y/n]: \
         Loaded calibration data successfully.\n"
    );

    let near = estimate_distance(second.known_hand_width_cm, second.focal_length, 100);
    assert_eq!(near, 36.0);
    assert!(is_too_close(near, 60.0));
}

#[test]
fn corrupt_file_is_replaced() {
    let file = TempFile::new("corrupt");
    fs::write(&file.0, "450.0\n").unwrap();

    let (record, output) = obtain(&file.0, "y\n8\n");
    assert!(output.contains("Calibration file is corrupt. Please recalibrate."));
    assert_eq!(record.focal_length, 450.0);
    assert_eq!(CalibrationRecord::load(&file.0).unwrap(), record);
}
