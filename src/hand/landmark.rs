//! Hand landmark prediction.

use std::path::Path;

use anyhow::bail;
use ndarray::ArrayD;

use crate::{
    image::Image,
    landmark::{LandmarkSet, NUM_LANDMARKS},
    nn::{Cnn, ColorMapper, NeuralNetwork},
    rect::RotatedRect,
    timer::Timer,
};

/// Landmark results estimated by the [`HandLandmarker`].
#[derive(Debug, Clone)]
pub struct LandmarkResult {
    landmarks: LandmarkSet,
    presence: f32,
}

impl LandmarkResult {
    /// Returns the landmarks, normalized to the dimensions of the full input frame.
    pub fn landmarks(&self) -> &LandmarkSet {
        &self.landmarks
    }

    pub fn into_landmarks(self) -> LandmarkSet {
        self.landmarks
    }

    /// Returns the network's confidence that a hand is actually present in the region of interest.
    pub fn presence(&self) -> f32 {
        self.presence
    }
}

/// Runs the full MediaPipe hand landmark network on a region of interest.
pub struct HandLandmarker {
    cnn: Cnn,
    t_infer: Timer,
}

impl HandLandmarker {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Self::new(NeuralNetwork::load(path)?)
    }

    pub fn new(nn: NeuralNetwork) -> anyhow::Result<Self> {
        Ok(Self {
            cnn: Cnn::new(nn, ColorMapper::linear(0.0..=1.0))?,
            t_infer: Timer::new("landmarks"),
        })
    }

    /// Estimates hand landmarks in the `roi` of `image`.
    ///
    /// The network expects the fingers to point to the top of a rotated `roi`.
    pub fn compute(&mut self, image: &Image, roi: RotatedRect) -> anyhow::Result<LandmarkResult> {
        let outputs = self.t_infer.time(|| self.cnn.estimate(image, roi))?;
        // The third output (handedness) is not needed.
        if outputs.len() < 3 {
            bail!("landmark network has {} outputs, expected at least 3", outputs.len());
        }

        let res = self.cnn.input_resolution();
        extract(
            &outputs[0],
            &outputs[1],
            |[x, y, z]| {
                let [px, py] = roi.transform_out(x / res.width() as f32, y / res.height() as f32);
                [
                    px / image.width() as f32,
                    py / image.height() as f32,
                    z / res.width() as f32 * roi.width() / image.width() as f32,
                ]
            },
        )
    }

    pub fn timer(&self) -> &Timer {
        &self.t_infer
    }
}

/// Decodes the landmark network outputs.
///
/// `to_frame` maps a landmark from network input coordinates to normalized frame coordinates.
fn extract(
    screen_landmarks: &ArrayD<f32>,
    presence_flag: &ArrayD<f32>,
    to_frame: impl Fn([f32; 3]) -> [f32; 3],
) -> anyhow::Result<LandmarkResult> {
    if screen_landmarks.shape() != [1, NUM_LANDMARKS * 3] {
        bail!(
            "unexpected landmark tensor shape {:?}",
            screen_landmarks.shape()
        );
    }
    if presence_flag.len() != 1 {
        bail!(
            "unexpected presence tensor shape {:?}",
            presence_flag.shape()
        );
    }

    let values = screen_landmarks.iter().copied().collect::<Vec<_>>();
    let mut positions = [[0.0; 3]; NUM_LANDMARKS];
    for (out, xyz) in positions.iter_mut().zip(values.chunks_exact(3)) {
        *out = to_frame([xyz[0], xyz[1], xyz[2]]);
    }

    Ok(LandmarkResult {
        landmarks: LandmarkSet::new(positions),
        presence: presence_flag.iter().copied().sum(),
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::{arr2, Array};

    use crate::{landmark::LandmarkIdx, rect::Rect};

    use super::*;

    #[test]
    fn extract_maps_through_roi() {
        let raw = Array::from_shape_fn((1, NUM_LANDMARKS * 3), |(_, i)| match i % 3 {
            0 => 112.0,
            1 => 224.0,
            _ => 22.4,
        })
        .into_dyn();

        // A 200x200 RoI at (100, 0) in a 400x200 frame.
        let roi = RotatedRect::from(Rect::from_top_left(100.0, 0.0, 200.0, 200.0));
        let result = extract(
            &raw,
            &arr2(&[[0.9]]).into_dyn(),
            |[x, y, z]| {
                let [px, py] = roi.transform_out(x / 224.0, y / 224.0);
                [px / 400.0, py / 200.0, z / 224.0 * 200.0 / 400.0]
            },
        )
        .unwrap();

        let [x, y, z] = result.landmarks()[LandmarkIdx::PinkyMcp];
        assert_relative_eq!(x, 0.5);
        assert_relative_eq!(y, 1.0);
        assert_relative_eq!(z, 0.05);
        assert_relative_eq!(result.presence(), 0.9);
    }

    #[test]
    fn extract_rejects_wrong_shape() {
        let raw = Array::<f32, _>::zeros((1, 42)).into_dyn();
        let flag = arr2(&[[1.0f32]]).into_dyn();
        assert!(extract(&raw, &flag, |p| p).is_err());
    }
}
