//! Palm detection.

use std::path::Path;

use anyhow::bail;
use nalgebra::{Rotation2, Vector2};
use ndarray::{ArrayView3, Ix3};

use crate::{
    image::{Image, Resolution},
    nn::{Cnn, ColorMapper, NeuralNetwork},
    num::{sigmoid, TotalF32},
    rect::{Rect, RotatedRect},
    timer::Timer,
};

use super::ssd::{Anchors, LayerInfo};

/// Number of values per box in the network output: 4 box values plus 7 keypoints.
const BOX_PARAMS: usize = 18;

/// A keypoint of a [`PalmDetection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keypoint {
    Wrist = 0,
    IndexFingerMcp = 1,
    MiddleFingerMcp = 2,
    RingFingerMcp = 3,
    PinkyMcp = 4,
    ThumbCmc = 5,
    ThumbMcp = 6,
}

/// A palm found by the [`PalmDetector`], in image coordinates.
#[derive(Debug, Clone)]
pub struct PalmDetection {
    confidence: f32,
    rect: Rect,
    keypoints: [[f32; 2]; 7],
}

impl PalmDetection {
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Returns the bounding rectangle of the palm.
    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    pub fn keypoint(&self, kp: Keypoint) -> [f32; 2] {
        self.keypoints[kp as usize]
    }

    /// Computes the clockwise rotation of the palm compared to an upright position.
    ///
    /// A rotation of 0° means that the fingers point upwards.
    pub fn rotation_radians(&self) -> f32 {
        let wrist = Vector2::from(self.keypoint(Keypoint::Wrist));
        let finger = Vector2::from(self.keypoint(Keypoint::MiddleFingerMcp));
        upright_rotation(wrist - finger)
    }

    /// Computes the square region of interest that the whole hand is expected to be in.
    ///
    /// The palm box is enlarged and moved towards the fingers (along the wrist to middle finger
    /// direction), since the palm detector only covers the palm and not the fingers. The region
    /// is rotated so that the fingers point to its top.
    pub fn hand_roi(&self) -> RotatedRect {
        let size = self.rect.width().max(self.rect.height());
        let wrist = Vector2::from(self.keypoint(Keypoint::Wrist));
        let finger = Vector2::from(self.keypoint(Keypoint::MiddleFingerMcp));
        let dir = (finger - wrist).try_normalize(f32::EPSILON).unwrap_or_else(Vector2::zeros);

        let [cx, cy] = self.rect.center();
        let center = Vector2::new(cx, cy) + dir * size * 0.5;
        RotatedRect::new(
            Rect::from_center(center.x, center.y, size * 2.6, size * 2.6),
            self.rotation_radians(),
        )
    }
}

/// Returns the rotation of a hand, given the vector from its middle finger knuckle to its wrist.
///
/// Upright hands (wrist straight below the fingers) have a rotation of 0. Zero-length vectors
/// count as upright.
pub(crate) fn upright_rotation(finger_to_wrist: Vector2<f32>) -> f32 {
    if finger_to_wrist.norm() <= f32::EPSILON {
        return 0.0;
    }
    Rotation2::rotation_between(&Vector2::y(), &finger_to_wrist).angle()
}

/// Detects palms using the full-range MediaPipe palm detection network.
pub struct PalmDetector {
    cnn: Cnn,
    anchors: Anchors,
    threshold: f32,
    t_infer: Timer,
    t_extract: Timer,
}

impl PalmDetector {
    /// Anchor layout of the palm detection network.
    const LAYERS: [LayerInfo; 2] = [LayerInfo::new(2, 24, 24), LayerInfo::new(6, 12, 12)];

    /// Loads the palm detection network from `path`.
    ///
    /// Detections with a confidence below `threshold` are discarded.
    pub fn load<P: AsRef<Path>>(path: P, threshold: f32) -> anyhow::Result<Self> {
        let nn = NeuralNetwork::load(path)?;
        Self::new(nn, threshold)
    }

    pub fn new(nn: NeuralNetwork, threshold: f32) -> anyhow::Result<Self> {
        let cnn = Cnn::new(nn, ColorMapper::linear(0.0..=1.0))?;
        Ok(Self {
            cnn,
            anchors: Anchors::calculate(&Self::LAYERS),
            threshold,
            t_infer: Timer::new("palm infer"),
            t_extract: Timer::new("palm extract"),
        })
    }

    /// Finds the most confident palm in `image`.
    ///
    /// The image is letterboxed to the square network input, so any aspect ratio works.
    pub fn detect(&mut self, image: &Image) -> anyhow::Result<Option<PalmDetection>> {
        let size = image.width().max(image.height()) as f32;
        let roi = Rect::from_center(
            image.width() as f32 / 2.0,
            image.height() as f32 / 2.0,
            size,
            size,
        );

        let outputs = self.t_infer.time(|| self.cnn.estimate(image, roi))?;
        if outputs.len() < 2 {
            bail!("palm network has {} outputs, expected 2", outputs.len());
        }

        let _guard = self.t_extract.start();
        let boxes = outputs[0].view().into_dimensionality::<Ix3>()?;
        let scores = outputs[1].view().into_dimensionality::<Ix3>()?;
        let input_res = self.cnn.input_resolution();

        let best = extract_best(&self.anchors, input_res, boxes, scores, self.threshold)?;
        Ok(best.map(|det| {
            // Network coordinates -> image coordinates.
            let (w, h) = (input_res.width() as f32, input_res.height() as f32);
            let to_image = |[x, y]: [f32; 2]| roi.transform_out(x / w, y / h);
            let [cx, cy] = to_image(det.rect.center());
            PalmDetection {
                confidence: det.confidence,
                rect: Rect::from_center(
                    cx,
                    cy,
                    det.rect.width() / w * roi.width(),
                    det.rect.height() / h * roi.height(),
                ),
                keypoints: det.keypoints.map(to_image),
            }
        }))
    }

    pub fn timers(&self) -> [&Timer; 2] {
        [&self.t_infer, &self.t_extract]
    }
}

/// Decodes the detection with the highest confidence at or above `threshold`.
///
/// The returned detection is in network input coordinates.
fn extract_best(
    anchors: &Anchors,
    input_res: Resolution,
    boxes: ArrayView3<'_, f32>,
    scores: ArrayView3<'_, f32>,
    threshold: f32,
) -> anyhow::Result<Option<PalmDetection>> {
    let num_anchors = anchors.anchor_count();
    if boxes.shape() != [1, num_anchors, BOX_PARAMS] {
        bail!("unexpected palm box tensor shape {:?}", boxes.shape());
    }
    if scores.shape() != [1, num_anchors, 1] {
        bail!("unexpected palm score tensor shape {:?}", scores.shape());
    }

    let best = (0..num_anchors)
        .map(|index| (index, sigmoid(scores[[0, index, 0]])))
        .filter(|&(_, conf)| conf >= threshold)
        .max_by_key(|&(_, conf)| TotalF32(conf));
    let (index, confidence) = match best {
        Some(best) => best,
        None => return Ok(None),
    };

    let anchor = &anchors[index];
    let ax = anchor.x_center() * input_res.width() as f32;
    let ay = anchor.y_center() * input_res.height() as f32;
    let param = |i: usize| boxes[[0, index, i]];

    let mut keypoints = [[0.0; 2]; 7];
    for (k, kp) in keypoints.iter_mut().enumerate() {
        *kp = [param(4 + 2 * k) + ax, param(5 + 2 * k) + ay];
    }

    Ok(Some(PalmDetection {
        confidence,
        rect: Rect::from_center(param(0) + ax, param(1) + ay, param(2), param(3)),
        keypoints,
    }))
}
