//! Floating-point rectangles used as regions of interest.

use std::fmt;

use nalgebra::{Rotation2, Vector2};

/// An axis-aligned rectangle with floating-point coordinates.
///
/// Used for regions of interest in image space that are sampled into neural network inputs. The
/// rectangle may extend past the image borders.
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    x: f32,
    y: f32,
    w: f32,
    h: f32,
}

impl Rect {
    /// Creates a rectangle extending outwards from a center point.
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self {
            x: x_center - width / 2.0,
            y: y_center - height / 2.0,
            w: width,
            h: height,
        }
    }

    /// Creates a rectangle extending downwards and right from a point.
    pub fn from_top_left(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            w: width,
            h: height,
        }
    }

    /// Computes the bounding rectangle of `points`.
    ///
    /// Returns `None` if `points` is an empty iterator.
    pub fn bounding<I: IntoIterator<Item = [f32; 2]>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let [x, y] = iter.next()?;
        let (mut x_min, mut x_max, mut y_min, mut y_max) = (x, x, y, y);
        for [x, y] in iter {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }

        Some(Self::from_top_left(x_min, y_min, x_max - x_min, y_max - y_min))
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.w
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.h
    }

    /// Returns the center coordinates of this rectangle.
    pub fn center(&self) -> [f32; 2] {
        [self.x + self.w / 2.0, self.y + self.h / 2.0]
    }

    /// Grows each side of the rectangle by a fraction of its width or height.
    ///
    /// A value of `0.1` adds 10% of the width to the left and to the right side, and 10% of the
    /// height to the top and bottom.
    pub fn grow_rel(&self, amount: f32) -> Self {
        let [cx, cy] = self.center();
        Self::from_center(
            cx,
            cy,
            self.w * (1.0 + 2.0 * amount),
            self.h * (1.0 + 2.0 * amount),
        )
    }

    /// Enlarges the shorter side so that the rectangle becomes a square with the same center.
    pub fn grow_to_square(&self) -> Self {
        let [cx, cy] = self.center();
        let size = self.w.max(self.h);
        Self::from_center(cx, cy, size, size)
    }

    /// Maps a point from the unit square `[0, 1]²` into this rectangle.
    pub fn transform_out(&self, u: f32, v: f32) -> [f32; 2] {
        [self.x + u * self.w, self.y + v * self.h]
    }
}

/// A [`Rect`], rotated around its center.
#[derive(Clone, Copy, PartialEq)]
pub struct RotatedRect {
    rect: Rect,
    radians: f32,
}

impl RotatedRect {
    /// Creates a new rotated rectangle.
    ///
    /// `radians` is the clockwise rotation (in image coordinates, with Y pointing down) to apply
    /// to `rect`.
    #[inline]
    pub fn new(rect: Rect, radians: f32) -> Self {
        Self { rect, radians }
    }

    /// Computes the smallest rectangle with the given rotation that contains all `points`.
    ///
    /// Returns `None` if `points` is an empty iterator.
    pub fn bounding<I: IntoIterator<Item = [f32; 2]>>(radians: f32, points: I) -> Option<Self> {
        // Bound the points in a frame rotated along with the rectangle, then rotate the center
        // back.
        let unrotate = Rotation2::new(-radians);
        let rect = Rect::bounding(points.into_iter().map(|[x, y]| {
            let p = unrotate * Vector2::new(x, y);
            [p.x, p.y]
        }))?;

        let [cx, cy] = rect.center();
        let center = Rotation2::new(radians) * Vector2::new(cx, cy);
        Some(Self::new(
            Rect::from_center(center.x, center.y, rect.width(), rect.height()),
            radians,
        ))
    }

    /// Applies a closure to the underlying non-rotated [`Rect`].
    pub fn map(mut self, f: impl FnOnce(Rect) -> Rect) -> Self {
        self.rect = f(self.rect);
        self
    }

    pub fn center(&self) -> [f32; 2] {
        self.rect.center()
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.rect.width()
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.rect.height()
    }

    /// Maps a point from the unit square `[0, 1]²` into this rectangle.
    ///
    /// `(0, 0)` is the top left corner of the rectangle before rotation.
    pub fn transform_out(&self, u: f32, v: f32) -> [f32; 2] {
        let [cx, cy] = self.rect.center();
        let rel = Vector2::new((u - 0.5) * self.rect.width(), (v - 0.5) * self.rect.height());
        let p = Rotation2::new(self.radians) * rel;
        [cx + p.x, cy + p.y]
    }
}

impl From<Rect> for RotatedRect {
    fn from(rect: Rect) -> Self {
        Self::new(rect, 0.0)
    }
}

impl fmt::Debug for RotatedRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} @ {:.1}°", self.rect, self.radians.to_degrees())
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect @ ({:.1},{:.1})/{:.1}x{:.1}",
            self.x, self.y, self.w, self.h
        )
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, SQRT_2};

    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn bounding() {
        assert_eq!(Rect::bounding(Vec::new()), None);
        let rect = Rect::bounding([[1.0, 5.0], [4.0, 2.0], [3.0, 3.0]]).unwrap();
        assert_eq!(rect, Rect::from_top_left(1.0, 2.0, 3.0, 3.0));
    }

    #[test]
    fn grow() {
        let rect = Rect::from_top_left(10.0, 10.0, 10.0, 20.0).grow_rel(0.5);
        assert_eq!(rect, Rect::from_top_left(5.0, 0.0, 20.0, 40.0));

        let square = Rect::from_top_left(0.0, 0.0, 10.0, 20.0).grow_to_square();
        assert_eq!(square.center(), [5.0, 10.0]);
        assert_relative_eq!(square.width(), 20.0);
        assert_relative_eq!(square.height(), 20.0);
    }

    #[test]
    fn transform_out() {
        let rect = Rect::from_top_left(-50.0, 100.0, 200.0, 200.0);
        assert_eq!(rect.transform_out(0.0, 0.0), [-50.0, 100.0]);
        assert_eq!(rect.transform_out(0.5, 1.0), [50.0, 300.0]);
    }

    #[test]
    fn unrotated_matches_rect() {
        let rect = Rect::from_top_left(-50.0, 100.0, 200.0, 100.0);
        let rotated = RotatedRect::from(rect);
        for (u, v) in [(0.0, 0.0), (0.25, 0.75), (1.0, 1.0)] {
            let [x, y] = rotated.transform_out(u, v);
            let [ex, ey] = rect.transform_out(u, v);
            assert_relative_eq!(x, ex);
            assert_relative_eq!(y, ey);
        }
    }

    #[test]
    fn rotated_transform_out() {
        // Rotated a quarter turn clockwise, the top edge of the rect ends up on the right.
        let rect = RotatedRect::new(Rect::from_center(10.0, 20.0, 4.0, 2.0), FRAC_PI_2);
        let [x, y] = rect.transform_out(0.5, 0.0);
        assert_relative_eq!(x, 11.0, epsilon = 1e-5);
        assert_relative_eq!(y, 20.0, epsilon = 1e-5);
        let [x, y] = rect.transform_out(0.0, 0.5);
        assert_relative_eq!(x, 10.0, epsilon = 1e-5);
        assert_relative_eq!(y, 18.0, epsilon = 1e-5);
        assert_eq!(rect.center(), [10.0, 20.0]);
    }

    #[test]
    fn rotated_bounding() {
        assert!(RotatedRect::bounding(1.0, Vec::new()).is_none());

        // A diamond is a square when bounded at 45°.
        let points = [[0.0, -1.0], [1.0, 0.0], [0.0, 1.0], [-1.0, 0.0]];
        let rect = RotatedRect::bounding(FRAC_PI_4, points).unwrap();
        assert_relative_eq!(rect.width(), SQRT_2, epsilon = 1e-5);
        assert_relative_eq!(rect.height(), SQRT_2, epsilon = 1e-5);
        assert_relative_eq!(rect.center()[0], 0.0, epsilon = 1e-5);
        assert_relative_eq!(rect.center()[1], 0.0, epsilon = 1e-5);

        // The corners of the bounding rect are the bounded points.
        let [x, y] = rect.transform_out(0.0, 0.0);
        assert_relative_eq!(x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(y, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn rotated_bounding_off_origin() {
        let points = [[100.0, 50.0], [110.0, 60.0], [90.0, 70.0]];
        let rect = RotatedRect::bounding(0.3, points).unwrap();
        assert_relative_eq!(rect.radians, 0.3);
        let upright = Rect::bounding(points).unwrap();
        let unrotated = RotatedRect::bounding(0.0, points).unwrap();
        assert_eq!(unrotated.rect, upright);
        assert!(rect.width() > 0.0 && rect.height() > 0.0);
    }
}
