//! Palm detection + landmark estimation with region-of-interest tracking.

use std::path::Path;

use nalgebra::Vector2;

use crate::{
    image::Image,
    landmark::{LandmarkIdx, LandmarkProvider, LandmarkSet},
    rect::RotatedRect,
    timer::Timer,
};

use super::{
    detection::{upright_rotation, PalmDetector},
    landmark::{HandLandmarker, LandmarkResult},
};

/// File name of the palm detection network inside the model directory.
pub const PALM_MODEL: &str = "palm_detection_full.onnx";
/// File name of the hand landmark network inside the model directory.
pub const LANDMARK_MODEL: &str = "hand_landmark_full.onnx";

/// Tracks a single hand across frames.
///
/// Palm detection only runs while no hand is being tracked. Once the landmark network has found a
/// hand, the next frame's region of interest is derived from the landmarks, until the network's
/// presence score drops below the tracking threshold.
pub struct HandTracker {
    detector: PalmDetector,
    landmarker: HandLandmarker,
    tracking_threshold: f32,
    roi: Option<RotatedRect>,
}

impl HandTracker {
    /// Loads both networks from `model_dir`.
    ///
    /// `detection_confidence` is the minimum palm detection score that starts tracking,
    /// `tracking_confidence` the minimum hand presence score that keeps it going.
    pub fn load(
        model_dir: &Path,
        detection_confidence: f32,
        tracking_confidence: f32,
    ) -> anyhow::Result<Self> {
        let palm = model_dir.join(PALM_MODEL);
        let landmark = model_dir.join(LANDMARK_MODEL);
        log::debug!(
            "loading hand models from {} (detection={detection_confidence}, tracking={tracking_confidence})",
            model_dir.display()
        );

        Ok(Self::new(
            PalmDetector::load(palm, detection_confidence)?,
            HandLandmarker::load(landmark)?,
            tracking_confidence,
        ))
    }

    pub fn new(
        detector: PalmDetector,
        landmarker: HandLandmarker,
        tracking_confidence: f32,
    ) -> Self {
        Self {
            detector,
            landmarker,
            tracking_threshold: tracking_confidence,
            roi: None,
        }
    }

    fn compute(&mut self, frame: &Image) -> anyhow::Result<Option<LandmarkResult>> {
        let roi = match self.roi {
            Some(roi) => roi,
            None => match self.detector.detect(frame)? {
                Some(palm) => {
                    log::trace!("palm detected: {:?}", palm.bounding_rect());
                    palm.hand_roi()
                }
                None => return Ok(None),
            },
        };

        let result = self.landmarker.compute(frame, roi)?;
        if result.presence() < self.tracking_threshold {
            if self.roi.take().is_some() {
                log::trace!("hand lost (presence={:.2})", result.presence());
            }
            return Ok(None);
        }

        self.roi = next_roi(result.landmarks(), frame.width(), frame.height());
        Ok(Some(result))
    }
}

impl LandmarkProvider for HandTracker {
    fn detect(&mut self, frame: &Image) -> anyhow::Result<Option<LandmarkSet>> {
        Ok(self.compute(frame)?.map(LandmarkResult::into_landmarks))
    }

    /// Returns the timers of both networks.
    fn timers(&self) -> Vec<&Timer> {
        let [detect, extract] = self.detector.timers();
        vec![detect, extract, self.landmarker.timer()]
    }
}

/// Computes the region of interest for the next frame from the current landmarks.
///
/// The region is rotated along with the hand, so that its fingers point to the top.
fn next_roi(landmarks: &LandmarkSet, width: u32, height: u32) -> Option<RotatedRect> {
    let to_pixels = |[x, y, _]: [f32; 3]| [x * width as f32, y * height as f32];
    let [wx, wy] = to_pixels(landmarks[LandmarkIdx::Wrist]);
    let [fx, fy] = to_pixels(landmarks[LandmarkIdx::MiddleFingerMcp]);
    let angle = upright_rotation(Vector2::new(wx - fx, wy - fy));

    let points = landmarks.positions().iter().map(|&p| to_pixels(p));
    RotatedRect::bounding(angle, points)
        .map(|roi| roi.map(|rect| rect.grow_rel(0.3).grow_to_square()))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::landmark::NUM_LANDMARKS;

    use super::*;

    /// Places the wrist and one other landmark; everything else sits on the middle finger knuckle.
    fn hand(wrist: [f32; 2], middle_mcp: [f32; 2], thumb: [f32; 2]) -> LandmarkSet {
        let mut positions = [[middle_mcp[0], middle_mcp[1], 0.0]; NUM_LANDMARKS];
        positions[LandmarkIdx::Wrist as usize] = [wrist[0], wrist[1], 0.0];
        positions[LandmarkIdx::ThumbCmc as usize] = [thumb[0], thumb[1], 0.0];
        LandmarkSet::new(positions)
    }

    #[test]
    fn upright_hand_gives_padded_square() {
        // Landmarks span 200x100 pixels of a 400x400 frame.
        let set = hand([0.5, 0.75], [0.5, 0.5], [0.0, 0.5]);
        let roi = next_roi(&set, 400, 400).unwrap();
        assert_relative_eq!(roi.width(), 320.0);
        assert_relative_eq!(roi.height(), 320.0);
        assert_relative_eq!(roi.center()[0], 100.0);
        assert_relative_eq!(roi.center()[1], 250.0);
        assert_eq!(roi.transform_out(0.5, 0.0), [100.0, 90.0]);
    }

    #[test]
    fn sideways_hand_rotates_roi() {
        // Fingers point to the right.
        let set = hand([0.25, 0.5], [0.5, 0.5], [0.5, 1.0]);
        let roi = next_roi(&set, 400, 400).unwrap();
        assert_relative_eq!(roi.width(), 320.0, epsilon = 1e-3);
        assert_relative_eq!(roi.height(), 320.0, epsilon = 1e-3);
        assert_relative_eq!(roi.center()[0], 150.0, epsilon = 1e-3);
        assert_relative_eq!(roi.center()[1], 300.0, epsilon = 1e-3);

        let [x, y] = roi.transform_out(0.5, 0.0);
        assert_relative_eq!(x, 150.0 + 160.0, epsilon = 1e-3);
        assert_relative_eq!(y, 300.0, epsilon = 1e-3);
    }
}
