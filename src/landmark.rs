//! Hand landmarks and the interface of landmark providers.

use std::ops::Index;

use crate::{
    image::{draw, Color, Image},
    timer::Timer,
};

/// Number of landmarks in a [`LandmarkSet`].
pub const NUM_LANDMARKS: usize = 21;

/// Names for the hand pose landmarks.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Pairs of landmarks that are connected by bones (or the palm outline).
pub const CONNECTIVITY: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        // Surround the palm:
        (Wrist, ThumbCmc),
        (Wrist, IndexFingerMcp),
        (IndexFingerMcp, MiddleFingerMcp),
        (MiddleFingerMcp, RingFingerMcp),
        (RingFingerMcp, PinkyMcp),
        (PinkyMcp, Wrist),
        // Thumb:
        (ThumbCmc, ThumbMcp),
        (ThumbMcp, ThumbIp),
        (ThumbIp, ThumbTip),
        // Index:
        (IndexFingerMcp, IndexFingerPip),
        (IndexFingerPip, IndexFingerDip),
        (IndexFingerDip, IndexFingerTip),
        // Middle:
        (MiddleFingerMcp, MiddleFingerPip),
        (MiddleFingerPip, MiddleFingerDip),
        (MiddleFingerDip, MiddleFingerTip),
        // Ring:
        (RingFingerMcp, RingFingerPip),
        (RingFingerPip, RingFingerDip),
        (RingFingerDip, RingFingerTip),
        // Pinky:
        (PinkyMcp, PinkyPip),
        (PinkyPip, PinkyDip),
        (PinkyDip, PinkyTip),
    ]
};

/// The 21 landmarks of a single detected hand.
///
/// Positions are `[x, y, z]`, with `x` and `y` normalized to the frame width and height (so a
/// landmark inside the frame lies in `[0, 1]`). `z` is relative depth and not used for distance
/// estimation.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    positions: [[f32; 3]; NUM_LANDMARKS],
}

impl LandmarkSet {
    pub fn new(positions: [[f32; 3]; NUM_LANDMARKS]) -> Self {
        Self { positions }
    }

    /// Returns all landmark positions, indexed by [`LandmarkIdx`] discriminant.
    #[inline]
    pub fn positions(&self) -> &[[f32; 3]; NUM_LANDMARKS] {
        &self.positions
    }

    /// Maps landmark `idx` to pixel coordinates of a `width x height` frame.
    ///
    /// The multiplication is done in `f64`: `f32` products can round up across an integer and
    /// truncate to the next pixel.
    pub fn to_pixels(&self, idx: LandmarkIdx, width: u32, height: u32) -> [f64; 2] {
        let [x, y, _] = self[idx];
        [
            f64::from(x) * f64::from(width),
            f64::from(y) * f64::from(height),
        ]
    }

    /// Draws the hand skeleton (bones and landmark markers) onto `image`.
    pub fn draw(&self, image: &mut Image) {
        let (w, h) = (image.width(), image.height());
        let px = |idx: LandmarkIdx| {
            let [x, y] = self.to_pixels(idx, w, h);
            (x as i32, y as i32)
        };

        for &(a, b) in CONNECTIVITY {
            let (ax, ay) = px(a);
            let (bx, by) = px(b);
            draw::line(image, ax, ay, bx, by)
                .color(Color::WHITE)
                .stroke_width(2);
        }
        for [x, y, _] in self.positions {
            draw::marker(
                image,
                (f64::from(x) * f64::from(w)) as i32,
                (f64::from(y) * f64::from(h)) as i32,
            )
            .color(Color::RED);
        }
    }
}

impl Index<LandmarkIdx> for LandmarkSet {
    type Output = [f32; 3];

    #[inline]
    fn index(&self, idx: LandmarkIdx) -> &[f32; 3] {
        &self.positions[idx as usize]
    }
}

/// A source of hand landmarks for individual camera frames.
///
/// Implementors may keep state between frames (eg. a tracked region of interest), which is why
/// [`detect`][Self::detect] takes `&mut self`.
pub trait LandmarkProvider {
    /// Looks for a hand in `frame`.
    ///
    /// Returns `Ok(None)` if no hand was found. Errors are reserved for failures of the provider
    /// itself, like a broken model.
    fn detect(&mut self, frame: &Image) -> anyhow::Result<Option<LandmarkSet>>;

    /// Returns profiling timers, if the provider keeps any.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

impl<P: LandmarkProvider + ?Sized> LandmarkProvider for &mut P {
    fn detect(&mut self, frame: &Image) -> anyhow::Result<Option<LandmarkSet>> {
        (**self).detect(frame)
    }

    fn timers(&self) -> Vec<&Timer> {
        (**self).timers()
    }
}

impl<P: LandmarkProvider + ?Sized> LandmarkProvider for Box<P> {
    fn detect(&mut self, frame: &Image) -> anyhow::Result<Option<LandmarkSet>> {
        (**self).detect(frame)
    }

    fn timers(&self) -> Vec<&Timer> {
        (**self).timers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_covers_all_landmarks() {
        let mut seen = [false; NUM_LANDMARKS];
        for &(a, b) in CONNECTIVITY {
            seen[a as usize] = true;
            seen[b as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
        assert_eq!(LandmarkIdx::PinkyTip as usize, NUM_LANDMARKS - 1);
    }

    #[test]
    fn index_and_pixels() {
        let mut positions = [[0.0; 3]; NUM_LANDMARKS];
        positions[LandmarkIdx::PinkyMcp as usize] = [0.5, 0.25, -0.1];
        let set = LandmarkSet::new(positions);
        assert_eq!(set[LandmarkIdx::PinkyMcp], [0.5, 0.25, -0.1]);
        assert_eq!(set.to_pixels(LandmarkIdx::PinkyMcp, 640, 480), [320.0, 120.0]);
    }

    #[test]
    fn draw_marks_landmarks() {
        let set = LandmarkSet::new([[0.5, 0.5, 0.0]; NUM_LANDMARKS]);
        let mut image = Image::new(20, 20);
        set.draw(&mut image);
        assert_eq!(image.get(10, 10), Color::RED);
        assert_eq!(image.get(0, 0), Color::NULL);
    }
}
