//! Palm measurements in pixel space.

use crate::{
    image::{draw, Color, Image},
    landmark::{LandmarkIdx, LandmarkSet},
};

/// Landmarks that span the palm horizontally.
const PALM_SPAN: [LandmarkIdx; 3] = [
    LandmarkIdx::Wrist,
    LandmarkIdx::IndexFingerMcp,
    LandmarkIdx::PinkyMcp,
];

/// An axis-aligned box in integer pixel coordinates.
///
/// Always satisfies `x_min <= x_max` and `y_min <= y_max`. Coordinates may lie outside of the
/// frame when the hand does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x_min: i32,
    pub y_min: i32,
    pub x_max: i32,
    pub y_max: i32,
}

impl BoundingBox {
    /// Creates a box containing only the point `(x, y)`.
    pub fn at((x, y): (i32, i32)) -> Self {
        Self {
            x_min: x,
            y_min: y,
            x_max: x,
            y_max: y,
        }
    }

    /// Extends the box to include the point `(x, y)`.
    pub fn including(self, (x, y): (i32, i32)) -> Self {
        Self {
            x_min: self.x_min.min(x),
            y_min: self.y_min.min(y),
            x_max: self.x_max.max(x),
            y_max: self.y_max.max(y),
        }
    }

    /// Horizontal extent of the box, in pixels.
    pub fn width(&self) -> u32 {
        self.x_max.abs_diff(self.x_min)
    }

    /// Vertical extent of the box, in pixels.
    pub fn height(&self) -> u32 {
        self.y_max.abs_diff(self.y_min)
    }

    /// Draws the outline of this box onto `image`.
    pub fn draw(&self, image: &mut Image, color: Color) {
        draw::rect(image, self.x_min, self.y_min, self.x_max, self.y_max)
            .color(color)
            .stroke_width(2);
    }
}

/// The apparent palm width of a hand and the box it was measured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PalmMeasurement {
    /// Horizontal span of the palm landmarks, in pixels.
    pub pixel_width: u32,
    pub bbox: BoundingBox,
}

/// Measures the palm of `landmarks` in a `width x height` frame.
///
/// The wrist and the index and pinky knuckles are converted to pixel coordinates and truncated
/// towards zero. The pixel width is the horizontal span of the resulting box.
pub fn measure_palm(landmarks: &LandmarkSet, width: u32, height: u32) -> PalmMeasurement {
    let [first, rest @ ..] = PALM_SPAN.map(|idx| {
        let [x, y] = landmarks.to_pixels(idx, width, height);
        (x as i32, y as i32)
    });
    let bbox = rest
        .into_iter()
        .fold(BoundingBox::at(first), BoundingBox::including);

    PalmMeasurement {
        pixel_width: bbox.width(),
        bbox,
    }
}
