//! Palm detection.

use std::path::Path;

use anyhow::ensure;
use nalgebra::{Point2, Rotation2, Vector2};

use crate::detection::{
    ssd::{Anchor, Anchors, FeatureMap},
    Detection, Network,
};
use crate::image::Resolution;
use crate::nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs};
use crate::num::sigmoid;
use crate::rect::Rect;

/// A keypoint of a palm [`Detection`].
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

const FEATURE_MAPS: [FeatureMap; 2] = [FeatureMap::new(24, 24, 2), FeatureMap::new(12, 12, 6)];

/// Values per anchor: box center and size, then 7 keypoints.
const BOX_PARAMS: usize = 4 + 7 * 2;

/// The full-range MediaPipe palm detection network.
///
/// Takes an RGB image in NCHW layout with values in `0.0..=1.0` and produces an SSD output with
/// 2016 anchors.
pub struct PalmDetectionNetwork {
    cnn: Cnn,
    anchors: Anchors,
}

impl PalmDetectionNetwork {
    /// Loads the network from an ONNX file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let cnn = Cnn::new(
            NeuralNetwork::from_path(path)?.load()?,
            CnnInputShape::NCHW,
            ColorMapper::linear(0.0..=1.0),
        )?;
        Ok(Self {
            cnn,
            anchors: Anchors::new(&FEATURE_MAPS),
        })
    }
}

impl Network for PalmDetectionNetwork {
    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(
        &self,
        outputs: &Outputs,
        threshold: f32,
        detections: &mut Vec<Detection>,
    ) -> anyhow::Result<()> {
        extract_outputs(
            &self.anchors,
            self.cnn.input_resolution(),
            outputs,
            threshold,
            detections,
        )
    }
}

fn extract_outputs(
    anchors: &Anchors,
    input_res: Resolution,
    outputs: &Outputs,
    threshold: f32,
    detections: &mut Vec<Detection>,
) -> anyhow::Result<()> {
    ensure!(
        outputs.len() == 2,
        "palm detection network produced {} outputs, expected 2",
        outputs.len()
    );
    let (boxes, scores) = (&outputs[0], &outputs[1]);
    let n = anchors.len();
    ensure!(
        boxes.shape() == [1, n, BOX_PARAMS] && scores.shape() == [1, n, 1],
        "unexpected palm detection output shapes {:?} and {:?}",
        boxes.shape(),
        scores.shape(),
    );

    let scores = scores.index([0]);
    let boxes = boxes.index([0]);
    for (i, (score, params)) in scores.iter().zip(boxes.iter()).enumerate() {
        let confidence = sigmoid(score.index([0]).as_singular());
        if confidence >= threshold {
            detections.push(decode_palm(
                anchors[i],
                input_res,
                params.as_slice(),
                confidence,
            ));
        }
    }

    Ok(())
}

/// Decodes the box and keypoints predicted relative to `anchor`, in input pixel coordinates.
fn decode_palm(
    anchor: Anchor,
    input_res: Resolution,
    params: &[f32],
    confidence: f32,
) -> Detection {
    let ax = anchor.x_center() * input_res.width() as f32;
    let ay = anchor.y_center() * input_res.height() as f32;

    let [dx, dy, w, h] = [params[0], params[1], params[2], params[3]];
    let keypoints = params[4..]
        .chunks_exact(2)
        .map(|kp| crate::detection::Keypoint::new(ax + kp[0], ay + kp[1]))
        .collect();

    let mut det = Detection::with_keypoints(
        confidence,
        Rect::from_center(ax + dx, ay + dy, w, h),
        keypoints,
    );
    det.set_angle(palm_angle(&det));
    det
}

/// Clockwise rotation of a palm in radians, from the direction of the middle finger as seen from
/// the wrist. 0 means the fingers point up.
fn palm_angle(det: &Detection) -> f32 {
    let point = |kp: Keypoint| {
        let kp = det.keypoints()[kp as usize];
        Point2::new(kp.x(), kp.y())
    };
    let down = point(Keypoint::Wrist) - point(Keypoint::MiddleFingerMcp);
    Rotation2::rotation_between(&Vector2::y(), &down).angle()
}
