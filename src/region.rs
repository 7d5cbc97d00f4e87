//! Hand region extraction.
//!
//! A [`BoundingBox`] is the axis-aligned pixel box around a [`LandmarkSet`], expanded by a fixed
//! margin and clipped to the frame.

use std::fmt;

use crate::hand::LandmarkSet;
use crate::image::{AsImageView, Image, Resolution};
use crate::rect::Rect;

/// Default margin (in pixels) added around the landmarks on every side.
pub const DEFAULT_MARGIN: u32 = 30;

/// An axis-aligned box in pixel coordinates.
///
/// The maximum coordinates are exclusive, so the box covers `x_min..x_max` and `y_min..y_max`.
/// Boxes produced by [`BoundingBox::around`] always satisfy `x_min <= x_max <= width` and
/// `y_min <= y_max <= height`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl BoundingBox {
    /// Computes the bounding box of `landmarks` in a frame of resolution `res`, grows it by
    /// `margin` pixels on every side and clips it to the frame.
    ///
    /// Landmark coordinates are scaled to pixels, truncated and clamped to the frame before the
    /// margin is applied, so a hand beyond an edge still gets a `margin` wide box along that edge.
    /// Returns [`None`] if `landmarks` is empty.
    pub fn around(landmarks: &LandmarkSet, res: Resolution, margin: u32) -> Option<Self> {
        let (w, h) = (res.width() as i64, res.height() as i64);
        let mut points = landmarks.points().iter().map(|&[x, y]| {
            // Float-to-int casts saturate, so far out of bounds points can't overflow.
            (
                ((x * w as f32) as i64).clamp(0, w),
                ((y * h as f32) as i64).clamp(0, h),
            )
        });

        let (x, y) = points.next()?;
        let (mut x_min, mut x_max, mut y_min, mut y_max) = (x, x, y, y);
        for (x, y) in points {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }

        let m = i64::from(margin);
        let clamp = |v: i64, max: i64| v.clamp(0, max) as u32;
        Some(Self {
            x_min: clamp(x_min.saturating_sub(m), w),
            y_min: clamp(y_min.saturating_sub(m), h),
            x_max: clamp(x_max.saturating_add(m), w),
            y_max: clamp(y_max.saturating_add(m), h),
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.x_max.saturating_sub(self.x_min)
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.y_max.saturating_sub(self.y_min)
    }

    /// Returns `true` if this box has zero width or height.
    ///
    /// With a zero margin this happens for a single landmark, or for landmarks on one edge.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Returns the box as a [`Rect`].
    pub fn rect(&self) -> Rect {
        Rect::from_top_left(
            self.x_min as f32,
            self.y_min as f32,
            self.width() as f32,
            self.height() as f32,
        )
    }

    /// Copies the part of `image` covered by this box into a new [`Image`].
    ///
    /// Returns [`None`] for degenerate boxes.
    pub fn crop<V: AsImageView>(&self, image: &V) -> Option<Image> {
        if self.is_degenerate() {
            return None;
        }
        Some(image.as_view().view(self.rect()).to_image())
    }
}

impl fmt::Debug for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BoundingBox ({},{})..({},{})",
            self.x_min, self.y_min, self.x_max, self.y_max
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::image::Color;

    use super::*;

    const RES: Resolution = Resolution::new(100, 100);

    fn bbox(points: &[[f32; 2]]) -> BoundingBox {
        BoundingBox::around(&LandmarkSet::new(points.to_vec()), RES, DEFAULT_MARGIN).unwrap()
    }

    #[test]
    fn empty_set() {
        assert_eq!(
            BoundingBox::around(&LandmarkSet::new(Vec::new()), RES, DEFAULT_MARGIN),
            None
        );
    }

    #[test]
    fn margin_and_clipping() {
        let b = bbox(&[[0.5, 0.5], [0.625, 0.75]]);
        assert_eq!(
            b,
            BoundingBox {
                x_min: 20,
                y_min: 20,
                x_max: 92,
                y_max: 100,
            }
        );

        let b = bbox(&[[0.125, 0.25], [0.875, 0.5]]);
        assert_eq!((b.x_min, b.y_min, b.x_max, b.y_max), (0, 0, 100, 80));
    }

    #[test]
    fn pixel_coordinates_truncate() {
        let b = BoundingBox::around(&LandmarkSet::new(vec![[0.509, 0.259]]), RES, 0).unwrap();
        assert_eq!((b.x_min, b.y_min, b.x_max, b.y_max), (50, 25, 50, 25));
        assert!(b.is_degenerate());
    }

    #[test]
    fn top_left_corner() {
        let b = bbox(&[[0.0, 0.0]]);
        assert_eq!((b.x_min, b.y_min), (0, 0));
        assert_eq!((b.x_max, b.y_max), (30, 30));
        assert!(!b.is_degenerate());
    }

    #[test]
    fn landmarks_outside_are_clamped() {
        let b = bbox(&[[1.5, 0.5], [2.0, 0.6]]);
        assert_eq!((b.x_min, b.y_min, b.x_max, b.y_max), (70, 20, 100, 90));

        let b = bbox(&[[-0.4, -0.4], [-0.5, -0.6]]);
        assert_eq!((b.x_min, b.y_min, b.x_max, b.y_max), (0, 0, 30, 30));

        let b = bbox(&[[0.5, 1.5], [0.6, 1.8]]);
        assert_eq!((b.x_min, b.y_min, b.x_max, b.y_max), (20, 70, 90, 100));
        assert!(!b.is_degenerate());
    }

    #[test]
    fn degenerate_box_is_not_cropped() {
        let b = BoundingBox::around(&LandmarkSet::new(vec![[2.0, 0.5]]), RES, 0).unwrap();
        assert_eq!((b.x_min, b.x_max), (100, 100));
        assert!(b.is_degenerate());
        assert!(b.crop(&Image::new(100, 100)).is_none());
    }

    #[test]
    fn stays_in_bounds() {
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        for _ in 0..1000 {
            let res = Resolution::new(rng.u32(1..=640), rng.u32(1..=480));
            let margin = rng.u32(0..=64);
            let points = (0..rng.usize(1..=21))
                .map(|_| [rng.f32() * 3.0 - 1.0, rng.f32() * 3.0 - 1.0])
                .collect();
            let b = BoundingBox::around(&LandmarkSet::new(points), res, margin).unwrap();

            assert!(b.x_min <= b.x_max && b.x_max <= res.width(), "{b:?} in {res}");
            assert!(b.y_min <= b.y_max && b.y_max <= res.height(), "{b:?} in {res}");
        }
    }

    #[test]
    fn crop_copies_region() {
        let mut image = Image::new(8, 6);
        image.set(3, 2, Color::RED);
        let b = BoundingBox {
            x_min: 2,
            y_min: 1,
            x_max: 6,
            y_max: 4,
        };
        let crop = b.crop(&image).unwrap();
        assert_eq!(crop.resolution(), Resolution::new(4, 3));
        assert_eq!(crop.get(1, 1), Color::RED);
        assert_eq!(crop.get(0, 0), Color::NULL);
    }
}
