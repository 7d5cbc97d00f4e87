//! SSD (Single Shot MultiBox Detector) anchors.
//!
//! Only anchors of fixed size are supported, which is what the palm detector uses. Box offsets
//! decoded by a network are relative to the anchor center.

use std::ops::Index;

/// Anchor center, in `0.0..=1.0` relative to the network input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    x: f32,
    y: f32,
}

impl Anchor {
    pub fn x_center(&self) -> f32 {
        self.x
    }

    pub fn y_center(&self) -> f32 {
        self.y
    }
}

/// An output feature map of an SSD network.
#[derive(Debug, Clone, Copy)]
pub struct FeatureMap {
    width: u32,
    height: u32,
    anchors_per_cell: u32,
}

impl FeatureMap {
    /// A `width`x`height` grid with `anchors_per_cell` anchors in every cell.
    ///
    /// # Panics
    ///
    /// Panics if `anchors_per_cell` is zero.
    pub const fn new(width: u32, height: u32, anchors_per_cell: u32) -> Self {
        assert!(anchors_per_cell > 0, "feature map cells need at least 1 anchor");
        Self {
            width,
            height,
            anchors_per_cell,
        }
    }

    fn anchors(self) -> impl Iterator<Item = Anchor> {
        let (w, h) = (self.width as f32, self.height as f32);
        (0..self.height).flat_map(move |row| {
            (0..self.width).flat_map(move |col| {
                let anchor = Anchor {
                    x: (col as f32 + 0.5) / w,
                    y: (row as f32 + 0.5) / h,
                };
                std::iter::repeat(anchor).take(self.anchors_per_cell as usize)
            })
        })
    }
}

/// Anchors of all feature maps, in the order the network outputs boxes.
pub struct Anchors(Vec<Anchor>);

impl Anchors {
    pub fn new(maps: &[FeatureMap]) -> Self {
        Self(maps.iter().flat_map(|map| map.anchors()).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Index<usize> for Anchors {
    type Output = Anchor;

    fn index(&self, index: usize) -> &Anchor {
        &self.0[index]
    }
}
