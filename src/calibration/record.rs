use std::{fmt, fs, path::Path};

use anyhow::{anyhow, bail, Context};

/// The result of a calibration: the camera's focal length and the hand it was measured with.
///
/// Persisted as a two-line text file, focal length first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationRecord {
    /// Focal length in pixels.
    pub focal_length: f64,
    /// Palm width of the calibrated hand, in cm.
    pub known_hand_width_cm: f64,
}

impl CalibrationRecord {
    /// Parses the contents of a calibration file.
    ///
    /// Whitespace around each value is ignored, as is anything after the second line. Both values
    /// have to be positive and finite.
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let mut lines = text.lines();
        let mut value = |name: &str| -> anyhow::Result<f64> {
            let line = lines
                .next()
                .ok_or_else(|| anyhow!("missing {name}"))?
                .trim();
            let value: f64 = line
                .parse()
                .with_context(|| format!("invalid {name} '{line}'"))?;
            if !(value.is_finite() && value > 0.0) {
                bail!("{name} must be positive, got {value}");
            }
            Ok(value)
        };

        Ok(Self {
            focal_length: value("focal length")?,
            known_hand_width_cm: value("hand width")?,
        })
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read '{}'", path.display()))?;
        Self::parse(&text).with_context(|| format!("failed to parse '{}'", path.display()))
    }

    /// Writes the record to `path`, replacing any existing file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        fs::write(path, self.to_string())
            .with_context(|| format!("failed to write '{}'", path.display()))
    }
}

/// Formats the record in its file representation.
///
/// Values use the shortest representation that parses back to the same number, and always carry
/// a fractional part (`450.0`).
impl fmt::Display for CalibrationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:?}", self.focal_length)?;
        writeln!(f, "{:?}", self.known_hand_width_cm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_format() {
        let record = CalibrationRecord {
            focal_length: 450.0,
            known_hand_width_cm: 8.0,
        };
        assert_eq!(record.to_string(), "450.0\n8.0\n");

        let record = CalibrationRecord {
            focal_length: 1234.5678,
            known_hand_width_cm: 7.25,
        };
        assert_eq!(record.to_string(), "1234.5678\n7.25\n");
    }

    #[test]
    fn parse_roundtrips_exactly() {
        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..200 {
            let record = CalibrationRecord {
                focal_length: rng.f64() * 3000.0 + 1e-3,
                known_hand_width_cm: rng.f64() * 20.0 + 1e-3,
            };
            assert_eq!(CalibrationRecord::parse(&record.to_string()).unwrap(), record);
        }
    }

    #[test]
    fn parse_is_lenient_about_whitespace() {
        let record = CalibrationRecord::parse("  450 \r\n8.0\nextra\n").unwrap();
        assert_eq!(record.focal_length, 450.0);
        assert_eq!(record.known_hand_width_cm, 8.0);
    }

    #[test]
    fn parse_rejects_corrupt_files() {
        for text in [
            "",
            "450.0\n",
            "450.0",
            "abc\n8.0\n",
            "450.0\n\n",
            "450.0\neight\n",
            "-450.0\n8.0\n",
            "450.0\n0\n",
            "inf\n8.0\n",
            "NaN\n8.0\n",
        ] {
            assert!(CalibrationRecord::parse(text).is_err(), "{text:?}");
        }
    }

    #[test]
    fn load_missing_file() {
        let err = CalibrationRecord::load(Path::new("/nonexistent/calibration_data.txt"))
            .unwrap_err();
        assert!(err.to_string().contains("failed to read"), "{err}");
    }
}
