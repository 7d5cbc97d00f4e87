//! Hand sign classification.
//!
//! A [`SignClassifier`] maps a preprocessed hand image (see [`crate::preprocess`]) to a
//! [`Prediction`]: the most likely of the classifier's labels.

use std::path::Path;

use anyhow::{bail, ensure, Context};

use crate::nn::{tensor::Tensor, Inputs, NeuralNetwork};
use crate::num::argmax;

/// The most likely label of a classifier output and its confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    index: usize,
    confidence: f32,
}

impl Prediction {
    /// Creates a prediction from the classifier's output distribution.
    ///
    /// Returns an error if `probabilities` is empty or contains NaN.
    pub fn from_probabilities(probabilities: &[f32]) -> anyhow::Result<Self> {
        ensure!(
            !probabilities.iter().any(|p| p.is_nan()),
            "classifier output contains NaN: {:?}",
            probabilities,
        );
        let Some((index, max)) = argmax(probabilities) else {
            bail!("classifier produced an empty output");
        };

        Ok(Self {
            index,
            confidence: max.clamp(0.0, 1.0) * 100.0,
        })
    }

    /// Returns the index of the most likely label.
    ///
    /// If several labels share the highest probability, the first one is returned.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the probability of the most likely label, as a percentage in `0.0..=100.0`.
    #[inline]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }
}

/// Classifies preprocessed hand images.
pub trait SignClassifier {
    /// Returns the number of labels this classifier distinguishes.
    fn output_width(&self) -> usize;

    /// Classifies a preprocessed `[1, 32, 32, 1]` tensor.
    fn classify(&mut self, input: &Tensor) -> anyhow::Result<Prediction>;
}

/// Memory layout of the classifier's input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLayout {
    /// `[1, H, W, 1]`, the layout of Keras models.
    NHWC,
    /// `[1, 1, H, W]`.
    NCHW,
}

impl InputLayout {
    fn shape(self, size: usize) -> [usize; 4] {
        match self {
            Self::NHWC => [1, size, size, 1],
            Self::NCHW => [1, 1, size, size],
        }
    }
}

/// A [`SignClassifier`] backed by a convolutional network in ONNX format.
pub struct CnnClassifier {
    nn: NeuralNetwork,
    input_shape: [usize; 4],
    output_width: usize,
}

impl CnnClassifier {
    /// Width and height of the network input.
    pub const INPUT_SIZE: usize = 32;

    /// Loads a classifier network, detecting whether it expects NHWC or NCHW input.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        Self::load_with_layout(path, InputLayout::NHWC).or_else(|nhwc_err| {
            log::debug!("loading {} as NHWC failed: {nhwc_err:#}", path.display());
            Self::load_with_layout(path, InputLayout::NCHW).with_context(|| {
                format!(
                    "failed to load classifier '{}' (as NHWC: {nhwc_err:#})",
                    path.display()
                )
            })
        })
    }

    /// Loads a classifier network with a known input layout.
    ///
    /// Symbolic batch dimensions in the model are fixed to 1.
    pub fn load_with_layout<P: AsRef<Path>>(path: P, layout: InputLayout) -> anyhow::Result<Self> {
        let input_shape = layout.shape(Self::INPUT_SIZE);
        let nn = NeuralNetwork::from_path(path)?
            .with_input_shape(&input_shape)
            .load()?;
        Self::new(nn, input_shape)
    }

    fn new(nn: NeuralNetwork, input_shape: [usize; 4]) -> anyhow::Result<Self> {
        let [input] = nn.inputs() else {
            bail!(
                "classifier has to take exactly 1 input, this one takes {}",
                nn.num_inputs()
            );
        };
        ensure!(
            input.shape() == input_shape,
            "classifier input '{}' has shape {:?}, expected {:?}",
            input.name(),
            input.shape(),
            input_shape,
        );

        let [output] = nn.outputs() else {
            bail!(
                "classifier has to produce exactly 1 output, this one produces {}",
                nn.num_outputs()
            );
        };
        let output_width = match output.shape() {
            [1, n] | [n] => *n,
            shape => bail!(
                "classifier output '{}' has unsupported shape {:?}",
                output.name(),
                shape
            ),
        };

        log::info!(
            "loaded classifier with input {:?} and {} outputs",
            input_shape,
            output_width
        );

        Ok(Self {
            nn,
            input_shape,
            output_width,
        })
    }
}

impl SignClassifier for CnnClassifier {
    fn output_width(&self) -> usize {
        self.output_width
    }

    fn classify(&mut self, input: &Tensor) -> anyhow::Result<Prediction> {
        // A single-channel tensor has the same memory layout in NHWC and NCHW.
        let input = input.reshape(&self.input_shape)?;
        let outputs = self.nn.estimate(&Inputs::from(input))?;
        ensure!(outputs.len() == 1, "expected 1 classifier output");

        let output = &outputs[0];
        let probabilities = output.as_raw_data();
        ensure!(
            probabilities.len() == self.output_width,
            "classifier output has shape {:?}, expected {} values",
            output.shape(),
            self.output_width,
        );
        Prediction::from_probabilities(probabilities)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn confidence_is_max_probability() {
        let p = Prediction::from_probabilities(&[0.1, 0.25, 0.6, 0.05]).unwrap();
        assert_eq!(p.index(), 2);
        assert_relative_eq!(p.confidence(), 60.0, epsilon = 1e-4);
    }

    #[test]
    fn confidence_in_range() {
        let mut rng = fastrand::Rng::with_seed(99);
        for _ in 0..200 {
            let len = rng.usize(1..=24);
            let probs = (0..len).map(|_| rng.f32() * 1.2 - 0.1).collect::<Vec<_>>();
            let max = probs.iter().copied().fold(f32::MIN, f32::max);

            let p = Prediction::from_probabilities(&probs).unwrap();
            assert!((0.0..=100.0).contains(&p.confidence()));
            assert_eq!(probs[p.index()], max);
            assert_relative_eq!(p.confidence(), max.clamp(0.0, 1.0) * 100.0);
        }
    }

    #[test]
    fn ties_pick_first() {
        let p = Prediction::from_probabilities(&[0.5, 0.0, 0.5]).unwrap();
        assert_eq!(p.index(), 0);
    }

    #[test]
    fn invalid_outputs() {
        assert!(Prediction::from_probabilities(&[]).is_err());
        assert!(Prediction::from_probabilities(&[0.2, f32::NAN]).is_err());
    }

    #[test]
    fn input_layouts() {
        assert_eq!(InputLayout::NHWC.shape(32), [1, 32, 32, 1]);
        assert_eq!(InputLayout::NCHW.shape(32), [1, 1, 32, 32]);
    }

    #[test]
    fn missing_model() {
        let err = CnnClassifier::load("does/not/exist.onnx").err().unwrap();
        assert!(format!("{err:#}").contains("does/not/exist.onnx"));
    }
}
