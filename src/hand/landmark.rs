//! Hand landmark estimation.

use std::path::Path;

use anyhow::ensure;

use crate::iter::zip_exact;
use crate::landmark::{Estimate, Landmarks, Network};
use crate::nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs};

/// Number of landmarks per hand: the wrist, then 4 joints for each finger from thumb to pinky.
pub const NUM_LANDMARKS: usize = 21;

/// The output of [`HandLandmarkNetwork`].
#[derive(Clone)]
pub struct LandmarkResult {
    landmarks: Landmarks,
    presence: f32,
}

impl Default for LandmarkResult {
    fn default() -> Self {
        Self {
            landmarks: Landmarks::new(NUM_LANDMARKS),
            presence: 0.0,
        }
    }
}

impl Estimate for LandmarkResult {
    #[inline]
    fn landmarks(&self) -> &Landmarks {
        &self.landmarks
    }

    #[inline]
    fn landmarks_mut(&mut self) -> &mut Landmarks {
        &mut self.landmarks
    }

    #[inline]
    fn presence(&self) -> f32 {
        self.presence
    }
}

/// The MediaPipe full hand landmark network (224x224 RGB input).
pub struct HandLandmarkNetwork {
    cnn: Cnn,
}

impl HandLandmarkNetwork {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        // Outputs 2 and 3 are handedness and world-space landmarks, which are not needed.
        let nn = NeuralNetwork::from_path(path)?
            .with_output_selection([0, 1])
            .load()?;
        Ok(Self {
            cnn: Cnn::new(nn, CnnInputShape::NCHW, ColorMapper::linear(0.0..=1.0))?,
        })
    }
}

impl Network for HandLandmarkNetwork {
    type Output = LandmarkResult;

    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(&self, outputs: &Outputs, estimate: &mut LandmarkResult) -> anyhow::Result<()> {
        extract(outputs, estimate)
    }
}

fn extract(outputs: &Outputs, estimate: &mut LandmarkResult) -> anyhow::Result<()> {
    ensure!(
        outputs.len() == 2,
        "hand landmark network produced {} outputs, expected 2",
        outputs.len()
    );
    let (screen, presence) = (&outputs[0], &outputs[1]);
    ensure!(
        screen.shape() == [1, NUM_LANDMARKS * 3] && presence.shape() == [1, 1],
        "unexpected hand landmark output shapes {:?} and {:?}",
        screen.shape(),
        presence.shape(),
    );

    estimate.presence = presence.index([0, 0]).as_singular();
    for (xyz, out) in zip_exact(
        screen.index([0]).as_slice().chunks_exact(3),
        estimate.landmarks.positions_mut(),
    ) {
        out.copy_from_slice(xyz);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::nn::tensor::Tensor;

    use super::*;

    #[test]
    fn rejects_wrong_shapes() {
        let outputs = Outputs::from_tensors([
            Tensor::from_iter(&[1, 3], [0.0; 3]),
            Tensor::from_iter(&[1, 1], [1.0]),
        ]);
        assert!(extract(&outputs, &mut LandmarkResult::default()).is_err());

        let outputs = Outputs::from_tensors([Tensor::from_iter(&[1, 63], [0.0; 63])]);
        assert!(extract(&outputs, &mut LandmarkResult::default()).is_err());
    }

    #[test]
    fn reads_landmarks() {
        let outputs = Outputs::from_tensors([
            Tensor::from_iter(&[1, 63], (0..63).map(|i| i as f32)),
            Tensor::from_iter(&[1, 1], [0.75]),
        ]);
        let mut res = LandmarkResult::default();
        extract(&outputs, &mut res).unwrap();
        assert_eq!(res.presence(), 0.75);

        let positions = res.landmarks().positions();
        assert_eq!(positions[0], [0.0, 1.0, 2.0]);
        assert_eq!(positions[1], [3.0, 4.0, 5.0]);
        assert_eq!(positions[20], [60.0, 61.0, 62.0]);
    }
}
