//! Rectangle types.
//!
//! These are used for image views, palm detections and the regions of interest handed to the
//! landmark network. Coordinates are `f32` pixel coordinates with Y pointing down.

use std::fmt;

use crate::image::AspectRatio;

/// An axis-aligned rectangle in pixel coordinates.
///
/// Width and height may be zero but never negative.
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    x_center: f32,
    y_center: f32,
    width: f32,
    height: f32,
}

impl Rect {
    /// Creates a rectangle centered on `(x_center, y_center)`.
    #[inline]
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self {
            x_center,
            y_center,
            width,
            height,
        }
    }

    /// Creates a rectangle whose top left corner is at `(top_left_x, top_left_y)`.
    #[inline]
    pub fn from_top_left(top_left_x: f32, top_left_y: f32, width: f32, height: f32) -> Self {
        Self::from_center(
            top_left_x + width * 0.5,
            top_left_y + height * 0.5,
            width,
            height,
        )
    }

    /// Returns the smallest rectangle containing all `points`.
    ///
    /// Returns [`None`] if there are no points.
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

        Some(Self::from_top_left(
            x_min,
            y_min,
            x_max - x_min,
            y_max - y_min,
        ))
    }

    /// Adds a margin of `amount` times the width (height) on the left and right (top and bottom).
    ///
    /// `amount` is the relative amount of the rectangle's width and height to add to each side.
    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        Self::from_center(
            self.x_center,
            self.y_center,
            self.width * (1.0 + amount * 2.0),
            self.height * (1.0 + amount * 2.0),
        )
    }

    /// Symmetrically extends one dimension of `self` so that the resulting rectangle has the given
    /// aspect ratio.
    #[must_use]
    pub fn grow_to_fit_aspect(&self, target_aspect: AspectRatio) -> Self {
        let target_width = self.height * target_aspect.as_f32();
        if target_width >= self.width {
            Self::from_center(self.x_center, self.y_center, target_width, self.height)
        } else {
            let target_height = self.width / target_aspect.as_f32();
            Self::from_center(self.x_center, self.y_center, self.width, target_height)
        }
    }

    /// Left edge.
    #[inline]
    pub fn x(&self) -> f32 {
        self.x_center - self.width * 0.5
    }

    /// Top edge.
    #[inline]
    pub fn y(&self) -> f32 {
        self.y_center - self.height * 0.5
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.height
    }

    #[inline]
    pub fn x_center(&self) -> f32 {
        self.x_center
    }

    #[inline]
    pub fn y_center(&self) -> f32 {
        self.y_center
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.x_center, self.y_center)
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Moves the top left corner of `self` to `(x, y)`.
    #[must_use]
    pub fn move_to(&self, x: f32, y: f32) -> Rect {
        Self::from_top_left(x, y, self.width, self.height)
    }

    /// Returns the overlapping area of `self` and `other`.
    ///
    /// Returns [`None`] if they do not overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x_min = self.x().max(other.x());
        let y_min = self.y().max(other.y());
        let x_max = (self.x() + self.width()).min(other.x() + other.width());
        let y_max = (self.y() + self.height()).min(other.y() + other.height());
        if x_min > x_max || y_min > y_max {
            return None;
        }

        Some(Rect::from_top_left(x_min, y_min, x_max - x_min, y_max - y_min))
    }

    /// Computes the intersection-over-union of `self` and `other`.
    pub fn iou(&self, other: &Self) -> f32 {
        let intersection = self.intersection(other).map_or(0.0, |r| r.area());
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect @ ({},{})/{}x{}",
            self.x(),
            self.y(),
            self.width,
            self.height
        )
    }
}

/// A [`Rect`], rotated clockwise around its center.
#[derive(Clone, Copy, PartialEq)]
pub struct RotatedRect {
    rect: Rect,
    radians: f32,
    sin: f32,
    cos: f32,
}

impl RotatedRect {
    /// Rotates `rect` around its center.
    ///
    /// `radians` is clockwise.
    pub fn new(rect: Rect, radians: f32) -> Self {
        Self {
            rect,
            radians,
            sin: radians.sin(),
            cos: radians.cos(),
        }
    }

    /// Computes the bounding rectangle of `points` in a coordinate system rotated by `radians`.
    ///
    /// Returns [`None`] if `points` is empty.
    pub fn bounding<I: IntoIterator<Item = [f32; 2]>>(radians: f32, points: I) -> Option<Self> {
        // Rotate all points into the rectangle's frame of reference, compute their bounds there,
        // then rotate the center back out.
        let (sin, cos) = (-radians).sin_cos();
        let rotated = Rect::bounding(
            points
                .into_iter()
                .map(|[x, y]| [x * cos - y * sin, x * sin + y * cos]),
        )?;

        let (xc, yc) = rotated.center();
        let (sin, cos) = radians.sin_cos();
        let center = [xc * cos - yc * sin, xc * sin + yc * cos];
        Some(Self::new(
            Rect::from_center(center[0], center[1], rotated.width(), rotated.height()),
            radians,
        ))
    }

    /// Returns the clockwise rotation in radians.
    #[inline]
    pub fn rotation_radians(&self) -> f32 {
        self.radians
    }

    /// Returns the underlying, unrotated [`Rect`].
    #[inline]
    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    /// Applies a closure to the underlying [`Rect`], keeping the rotation.
    #[must_use]
    pub fn map(self, f: impl FnOnce(Rect) -> Rect) -> Self {
        Self::new(f(self.rect), self.radians)
    }

    /// Transforms a point from the outer coordinate system into the rectangle's local coordinate
    /// system (where `(0, 0)` is the top left corner of the rotated rectangle).
    pub fn transform_in(&self, x: f32, y: f32) -> [f32; 2] {
        let (cx, cy) = self.rect.center();
        let (dx, dy) = (x - cx, y - cy);
        let (x, y) = (dx * self.cos + dy * self.sin, -dx * self.sin + dy * self.cos);
        [x + self.rect.width() * 0.5, y + self.rect.height() * 0.5]
    }

    /// Transforms a point from the rectangle's local coordinate system into the outer coordinate
    /// system.
    ///
    /// This is the inverse of [`RotatedRect::transform_in`].
    pub fn transform_out(&self, x: f32, y: f32) -> [f32; 2] {
        let (cx, cy) = self.rect.center();
        let (dx, dy) = (x - self.rect.width() * 0.5, y - self.rect.height() * 0.5);
        [
            dx * self.cos - dy * self.sin + cx,
            dx * self.sin + dy * self.cos + cy,
        ]
    }
}

impl fmt::Debug for RotatedRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} rotated by {:.1}°", self.rect, self.radians.to_degrees())
    }
}

impl From<Rect> for RotatedRect {
    #[inline]
    fn from(rect: Rect) -> Self {
        Self::new(rect, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    #[test]
    fn bounding() {
        let rect = Rect::bounding([[0.0, 0.0], [1.0, 1.0], [-1.0, -1.0]]).unwrap();
        assert_eq!(rect, Rect::from_top_left(-1.0, -1.0, 2.0, 2.0));
        assert_eq!(Rect::bounding([]), None);
    }

    #[test]
    fn iou() {
        let a = Rect::from_top_left(0.0, 0.0, 2.0, 2.0);
        assert_eq!(a.iou(&a), 1.0);
        assert_eq!(a.iou(&Rect::from_top_left(5.0, 5.0, 1.0, 1.0)), 0.0);
        assert_relative_eq!(a.iou(&Rect::from_top_left(1.0, 0.0, 2.0, 2.0)), 2.0 / 6.0);
    }

    #[test]
    fn fit_aspect() {
        assert_eq!(
            Rect::from_center(10.0, 10.0, 50.0, 100.0).grow_to_fit_aspect(AspectRatio::SQUARE),
            Rect::from_center(10.0, 10.0, 100.0, 100.0),
        );
        assert_eq!(
            Rect::from_center(10.0, 10.0, 100.0, 50.0).grow_to_fit_aspect(AspectRatio::SQUARE),
            Rect::from_center(10.0, 10.0, 100.0, 100.0),
        );
    }

    #[test]
    fn rotated_transform_roundtrips() {
        let rect = RotatedRect::new(Rect::from_center(5.0, 3.0, 4.0, 2.0), 0.7);
        let [x, y] = rect.transform_out(1.0, 1.5);
        let [x, y] = rect.transform_in(x, y);
        assert_relative_eq!(x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(y, 1.5, epsilon = 1e-5);
    }

    #[test]
    fn quarter_turn_moves_top_left_to_top_right() {
        let rect = RotatedRect::new(Rect::from_center(0.0, 0.0, 2.0, 2.0), FRAC_PI_2);
        let [x, y] = rect.transform_out(0.0, 0.0);
        assert_relative_eq!(x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(y, -1.0, epsilon = 1e-5);
    }
}
