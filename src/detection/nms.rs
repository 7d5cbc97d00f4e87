//! Non-Maximum Averaging.
//!
//! The palm detector produces many overlapping detections for a single hand, one for every anchor
//! that fires. [`NonMaxSuppression`] merges each group of overlapping detections into their
//! confidence-weighted average, leaving a single detection for each hand.

use crate::{iter::zip_exact, num::TotalF32, rect::Rect};

use super::{Detection, Keypoint};

/// Merges overlapping detections, reusing one scratch buffer.
pub struct NonMaxSuppression {
    avg_buf: Vec<Detection>,
}

impl NonMaxSuppression {
    /// Detections whose boxes have at least this intersection-over-union are merged.
    pub const IOU_THRESH: f32 = 0.3;

    pub fn new() -> Self {
        Self {
            avg_buf: Vec::new(),
        }
    }

    /// Performs non-maximum suppression on `detections`, in place.
    ///
    /// Afterwards, `detections` is sorted by descending confidence.
    pub fn process(&mut self, detections: &mut Vec<Detection>) {
        // Sort by ascending confidence, process highest confidence first by starting at the back.
        detections.sort_unstable_by_key(|det| TotalF32(det.confidence));

        let mut out = Vec::with_capacity(detections.len());
        while let Some(seed) = detections.pop() {
            self.avg_buf.clear();
            let avg_buf = &mut self.avg_buf;
            detections.retain(|other| {
                if seed.bounding_rect().iou(&other.bounding_rect()) >= Self::IOU_THRESH {
                    avg_buf.push(other.clone());
                    false
                } else {
                    true
                }
            });
            self.avg_buf.push(seed);
            out.push(average(&self.avg_buf));
        }

        self.avg_buf.clear();
        *detections = out;
    }
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the confidence-weighted average of `dets`.
///
/// The result keeps the confidence of the last detection, which is the seed of the group.
fn average(dets: &[Detection]) -> Detection {
    let seed = &dets[dets.len() - 1];
    let mut keypoints = vec![Keypoint::new(0.0, 0.0); seed.keypoints().len()];
    let (mut x, mut y, mut w, mut h, mut angle) = (0.0, 0.0, 0.0, 0.0, 0.0);
    let mut divisor = 0.0;

    for det in dets {
        debug_assert_eq!(
            keypoints.len(),
            det.keypoints().len(),
            "keypoint count must be constant"
        );

        let factor = det.confidence();
        divisor += factor;
        for (acc, kp) in zip_exact(&mut keypoints, det.keypoints()) {
            acc.x += kp.x * factor;
            acc.y += kp.y * factor;
        }
        let rect = det.bounding_rect();
        x += rect.x_center() * factor;
        y += rect.y_center() * factor;
        w += rect.width() * factor;
        h += rect.height() * factor;
        angle += det.angle() * factor;
    }

    for kp in &mut keypoints {
        kp.x /= divisor;
        kp.y /= divisor;
    }

    let mut avg = Detection::with_keypoints(
        seed.confidence(),
        Rect::from_center(x / divisor, y / divisor, w / divisor, h / divisor),
        keypoints,
    );
    avg.set_angle(angle / divisor);
    avg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_separate_hands() {
        let mut nms = NonMaxSuppression::new();

        let mut dets = vec![
            Detection::new(0.8, Rect::from_center(0.0, 0.0, 1.0, 1.0)),
            Detection::new(0.9, Rect::from_center(5.0, 0.0, 1.0, 1.0)),
        ];
        nms.process(&mut dets);
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].confidence(), 0.9);
    }

    #[test]
    fn average_weights_by_confidence() {
        let mut nms = NonMaxSuppression::new();

        let mut a = Detection::with_keypoints(
            0.75,
            Rect::from_center(-1.0, 3.0, 1.0, 1.0),
            vec![Keypoint::new(0.0, 0.0)],
        );
        a.set_angle(0.4);
        let b = Detection::with_keypoints(
            0.25,
            Rect::from_center(-1.0, 3.0, 1.5, 1.5),
            vec![Keypoint::new(4.0, 0.0)],
        );
        let mut dets = vec![b, a];
        nms.process(&mut dets);
        assert_eq!(dets.len(), 1);

        let d = &dets[0];
        assert_eq!(d.confidence(), 0.75);
        assert_eq!(d.bounding_rect(), Rect::from_center(-1.0, 3.0, 1.125, 1.125));
        assert_eq!(d.keypoints()[0].x(), 1.0);
        assert!((d.angle() - 0.3).abs() < 1e-6);
    }
}
