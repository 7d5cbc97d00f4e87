//! Hand localization.
//!
//! A [`HandLocator`] finds the hands in a camera frame and returns one [`LandmarkSet`] per hand.
//! [`PalmLandmarkLocator`] implements this with two networks: palm [`detection`] finds the rough
//! position and rotation of each hand, and the [`landmark`] network then estimates 21 landmarks
//! inside a rotated region around each palm.

pub mod detection;
pub mod landmark;

use std::path::Path;

use crate::detection::Detector;
use crate::image::{Image, Resolution};
use crate::landmark::{Estimate, Estimator};
use crate::rect::RotatedRect;
use crate::timer::Timer;

use self::detection::PalmDetectionNetwork;
use self::landmark::{HandLandmarkNetwork, LandmarkResult};

/// The landmarks of a single located hand.
///
/// Points are in frame-relative normalized coordinates: `(0.0, 0.0)` is the top left corner of the
/// frame, `(1.0, 1.0)` the bottom right one. Points may lie slightly outside of that range when
/// the hand is partially out of view.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<[f32; 2]>,
}

impl LandmarkSet {
    /// Creates a landmark set from normalized points.
    pub fn new(points: Vec<[f32; 2]>) -> Self {
        Self { points }
    }

    /// Creates a landmark set from pixel coordinates in a frame of resolution `res`.
    pub fn from_pixels<I: IntoIterator<Item = [f32; 2]>>(points: I, res: Resolution) -> Self {
        let (w, h) = (res.width() as f32, res.height() as f32);
        Self {
            points: points.into_iter().map(|[x, y]| [x / w, y / h]).collect(),
        }
    }

    pub fn points(&self) -> &[[f32; 2]] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Locates hands in camera frames.
pub trait HandLocator {
    /// Returns the landmarks of every hand found in `frame`.
    ///
    /// Returns an empty list when no hand is visible.
    fn locate(&mut self, frame: &Image) -> anyhow::Result<Vec<LandmarkSet>>;

    /// Returns profiling timers for the networks involved.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

/// A [`HandLocator`] using palm detection followed by hand landmark estimation.
pub struct PalmLandmarkLocator {
    detector: Detector,
    estimator: Estimator<LandmarkResult>,
    max_hands: usize,
}

impl PalmLandmarkLocator {
    pub const DEFAULT_DETECTION_THRESHOLD: f32 = 0.7;
    /// Landmark results with a lower hand presence score are discarded.
    pub const PRESENCE_THRESHOLD: f32 = 0.5;
    pub const DEFAULT_MAX_HANDS: usize = 1;

    /// Palm -> hand grow factor.
    const PALM_TO_HAND: f32 = 1.5;

    /// Loads the palm detection and hand landmark networks from ONNX files.
    pub fn load<P: AsRef<Path>, L: AsRef<Path>>(
        palm_model: P,
        landmark_model: L,
    ) -> anyhow::Result<Self> {
        let mut detector = Detector::new(PalmDetectionNetwork::load(palm_model)?);
        detector.set_threshold(Self::DEFAULT_DETECTION_THRESHOLD);
        let estimator = Estimator::new(HandLandmarkNetwork::load(landmark_model)?);
        log::debug!(
            "palm detection input {}, hand landmark input {}",
            detector.input_resolution(),
            estimator.input_resolution(),
        );

        Ok(Self {
            detector,
            estimator,
            max_hands: Self::DEFAULT_MAX_HANDS,
        })
    }

    /// Sets the minimum palm detection confidence.
    pub fn set_detection_threshold(&mut self, threshold: f32) {
        self.detector.set_threshold(threshold);
    }

    /// Sets the maximum number of hands reported per frame.
    ///
    /// When more palms are detected, the most confident ones are used.
    pub fn set_max_hands(&mut self, max_hands: usize) {
        self.max_hands = max_hands;
    }
}

impl HandLocator for PalmLandmarkLocator {
    fn locate(&mut self, frame: &Image) -> anyhow::Result<Vec<LandmarkSet>> {
        let res = frame.resolution();
        if res.num_pixels() == 0 {
            return Ok(Vec::new());
        }

        let rois = self
            .detector
            .detect(frame)?
            .iter()
            .take(self.max_hands)
            .map(|det| {
                RotatedRect::new(
                    det.bounding_rect().grow_rel(Self::PALM_TO_HAND),
                    det.angle(),
                )
            })
            .collect::<Vec<_>>();

        let mut hands = Vec::with_capacity(rois.len());
        for roi in rois {
            let estimate = self.estimator.estimate_in(frame, roi)?;
            if estimate.presence() < Self::PRESENCE_THRESHOLD {
                log::trace!(
                    "discarding hand in {:?} with presence {}",
                    roi,
                    estimate.presence()
                );
                continue;
            }

            hands.push(LandmarkSet::from_pixels(
                estimate.landmarks().iter().map(|lm| [lm.x(), lm.y()]),
                res,
            ));
        }

        Ok(hands)
    }

    fn timers(&self) -> Vec<&Timer> {
        self.detector
            .timers()
            .chain(self.estimator.timers())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landmark_set_normalizes_pixels() {
        let set = LandmarkSet::from_pixels([[50.0, 25.0], [100.0, 0.0]], Resolution::new(100, 50));
        assert_eq!(set.points(), &[[0.5, 0.5], [1.0, 0.0]]);
        assert_eq!(set.len(), 2);
        assert!(!set.is_empty());
    }

    #[test]
    fn locator_timer_names_are_distinct() {
        let names = crate::detection::TIMER_NAMES
            .iter()
            .chain(&crate::landmark::TIMER_NAMES)
            .collect::<Vec<_>>();
        for (i, name) in names.iter().enumerate() {
            assert!(!names[i + 1..].contains(name), "duplicate timer name {name}");
        }
    }
}
