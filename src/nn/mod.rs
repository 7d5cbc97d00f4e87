//! ONNX network inference on the CPU, backed by [`tract_onnx`].
//!
//! [`NeuralNetwork`] runs a model on [`Tensor`]s. [`Cnn`] wraps a network that takes a single RGB
//! image and samples its input tensor from an [`ImageView`].

pub mod tensor;

use std::{
    ops::{Index, RangeInclusive},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, bail, Context};
use tract_onnx::prelude::{
    tvec, DatumExt, Framework, Graph, InferenceModelExt, SimplePlan, TValue, TVec, TypedFact,
    TypedOp,
};

use crate::image::{AsImageView, Color, ImageView, Resolution};
use tensor::Tensor;

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A network taking one RGB image as input.
///
/// Cloning is cheap; clones share the loaded model.
#[derive(Clone)]
pub struct Cnn {
    nn: NeuralNetwork,
    input_res: Resolution,
    shape: CnnInputShape,
    color_mapper: ColorMapper,
}

impl Cnn {
    /// Wraps `nn`, which must have a single input of the given [`CnnInputShape`] with 3 channels
    /// and a batch size of 1.
    pub fn new(
        nn: NeuralNetwork,
        shape: CnnInputShape,
        color_mapper: ColorMapper,
    ) -> anyhow::Result<Self> {
        let [input] = nn.inputs() else {
            bail!(
                "image network must have exactly 1 input, found {}",
                nn.num_inputs()
            );
        };

        let (w, h) = match (shape, input.shape()) {
            (CnnInputShape::NCHW, &[1, 3, h, w]) | (CnnInputShape::NHWC, &[1, h, w, 3]) => (w, h),
            (_, other) => bail!("input shape {other:?} does not have {shape:?} layout"),
        };
        let input_res = Resolution::new(w.try_into()?, h.try_into()?);

        Ok(Self {
            nn,
            input_res,
            shape,
            color_mapper,
        })
    }

    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Runs the network on `image`.
    ///
    /// The image is resampled (nearest neighbor) to the input resolution, so images of a
    /// different aspect ratio come out stretched.
    pub fn estimate<V: AsImageView>(&self, image: &V) -> anyhow::Result<Outputs> {
        let tensor = self.to_tensor(image.as_view());
        self.nn.estimate(&Inputs::from(tensor))
    }

    fn to_tensor(&self, view: ImageView<'_>) -> Tensor {
        let (w, h) = (
            self.input_res.width() as usize,
            self.input_res.height() as usize,
        );
        let (sx, sy) = (
            view.width() as f32 / w as f32,
            view.height() as f32 / h as f32,
        );
        let sample = |x: usize, y: usize| {
            let color = view.get(
                (x as f32 * sx).round() as u32,
                (y as f32 * sy).round() as u32,
            );
            self.color_mapper.map(color)
        };

        match self.shape {
            CnnInputShape::NCHW => {
                Tensor::from_array_shape_fn([1, 3, h, w], |[_, c, y, x]| sample(x, y)[c])
            }
            CnnInputShape::NHWC => {
                Tensor::from_array_shape_fn([1, h, w, 3], |[_, y, x, c]| sample(x, y)[c])
            }
        }
    }
}

/// Converts sRGB pixel values to network input values.
#[derive(Debug, Clone, Copy)]
pub struct ColorMapper {
    offset: f32,
    scale: f32,
}

impl ColorMapper {
    /// Maps the 8-bit channel range `0..=255` linearly onto `target_range`.
    ///
    /// # Panics
    ///
    /// Panics if `target_range` is empty or a single value.
    pub fn linear(target_range: RangeInclusive<f32>) -> Self {
        let (start, end) = target_range.into_inner();
        assert!(end > start, "invalid color range {start}..={end}");
        Self {
            offset: start,
            scale: (end - start) / 255.0,
        }
    }

    fn map(&self, color: Color) -> [f32; 3] {
        [color.r(), color.g(), color.b()].map(|v| f32::from(v) * self.scale + self.offset)
    }
}

/// Order of the dimensions of an image network's input tensor.
///
/// `N` is the batch size, `C` the color channel, `H` and `W` the image height and width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CnnInputShape {
    NCHW,
    NHWC,
}

/// Configures how a network file is loaded. Created by [`NeuralNetwork::from_path`].
pub struct Loader {
    path: PathBuf,
    model_data: Vec<u8>,
    input_shape: Option<Vec<usize>>,
    outputs: Option<Vec<usize>>,
}

impl Loader {
    /// Fixes the shape of the first input, for models exported with symbolic dimensions (such as
    /// a variable batch size).
    pub fn with_input_shape(mut self, shape: &[usize]) -> Self {
        self.input_shape = Some(shape.to_vec());
        self
    }

    /// Restricts [`NeuralNetwork::estimate`] to the given output indices, in the given order.
    pub fn with_output_selection<O: Into<Vec<usize>>>(mut self, outputs: O) -> Self {
        self.outputs = Some(outputs.into());
        self
    }

    /// Parses and optimizes the model.
    ///
    /// Fails if the model is malformed, uses an operator `tract` does not implement, or still has
    /// a symbolic input or output shape.
    pub fn load(self) -> anyhow::Result<NeuralNetwork> {
        let name = self.path.display();
        let mut model = tract_onnx::onnx()
            .model_for_read(&mut &*self.model_data)
            .with_context(|| format!("failed to parse network '{name}'"))?;
        if let Some(shape) = &self.input_shape {
            model = model.with_input_fact(0, f32::fact(shape.clone()).into())?;
        }
        let graph = model
            .into_optimized()
            .with_context(|| format!("failed to optimize network '{name}'"))?;

        let all_outputs = graph.output_outlets()?.to_vec();
        let outputs = match &self.outputs {
            None => all_outputs,
            Some(selection) => selection
                .iter()
                .map(|&i| {
                    all_outputs.get(i).copied().ok_or_else(|| {
                        let count = all_outputs.len();
                        anyhow!("network '{name}' has no output {i} (it has {count})")
                    })
                })
                .collect::<anyhow::Result<_>>()?,
        };
        let plan = SimplePlan::new_for_outputs(graph, &outputs)?;

        let model = plan.model();
        let mut inputs = Vec::new();
        for (i, outlet) in model.input_outlets()?.iter().enumerate() {
            let node = &model.node(outlet.node).name;
            inputs.push(TensorInfo::new(node, &model.input_fact(i)?.shape)?);
        }
        let mut outputs = Vec::new();
        for (i, outlet) in model.output_outlets()?.iter().enumerate() {
            let node = &model.node(outlet.node).name;
            outputs.push(TensorInfo::new(node, &model.output_fact(i)?.shape)?);
        }

        log::debug!("loaded network '{name}': inputs {inputs:?}, outputs {outputs:?}");

        Ok(NeuralNetwork(Arc::new(Loaded {
            plan,
            inputs,
            outputs,
        })))
    }
}

/// A loaded, optimized network.
///
/// Cloning is cheap; clones share the model.
#[derive(Clone)]
pub struct NeuralNetwork(Arc<Loaded>);

struct Loaded {
    plan: Plan,
    inputs: Vec<TensorInfo>,
    outputs: Vec<TensorInfo>,
}

impl NeuralNetwork {
    /// Reads an `.onnx` model file.
    ///
    /// The network is parsed when [`Loader::load`] is called on the result.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Loader> {
        let path = path.as_ref();
        if path.extension().map_or(true, |ext| ext != "onnx") {
            bail!("network file '{}' is not an `.onnx` model", path.display());
        }

        let model_data = std::fs::read(path)
            .with_context(|| format!("failed to read network '{}'", path.display()))?;
        Ok(Loader {
            path: path.to_path_buf(),
            model_data,
            input_shape: None,
            outputs: None,
        })
    }

    pub fn num_inputs(&self) -> usize {
        self.0.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.0.outputs.len()
    }

    /// Describes the tensors [`NeuralNetwork::estimate`] expects, in order.
    pub fn inputs(&self) -> &[TensorInfo] {
        &self.0.inputs
    }

    /// Describes the tensors [`NeuralNetwork::estimate`] returns, in order.
    pub fn outputs(&self) -> &[TensorInfo] {
        &self.0.outputs
    }

    /// Runs inference.
    pub fn estimate(&self, inputs: &Inputs) -> anyhow::Result<Outputs> {
        let inputs = inputs
            .inner
            .iter()
            .map(|t| Ok(TValue::from_const(Arc::new(t.to_tract()?))))
            .collect::<anyhow::Result<TVec<_>>>()?;
        let inner = self
            .0
            .plan
            .run(inputs)?
            .iter()
            .map(|t| Tensor::from_tract(t))
            .collect::<anyhow::Result<_>>()?;
        Ok(Outputs { inner })
    }
}

/// Name and concrete shape of a network input or output.
#[derive(Debug, Clone)]
pub struct TensorInfo {
    name: String,
    shape: Vec<usize>,
}

impl TensorInfo {
    fn new(name: &str, shape: &tract_onnx::prelude::ShapeFact) -> anyhow::Result<Self> {
        let concrete = shape.as_concrete().ok_or_else(|| {
            anyhow!("tensor '{name}' has symbolic shape {shape:?} (set a concrete input shape)")
        })?;
        Ok(Self {
            name: name.to_string(),
            shape: concrete.to_vec(),
        })
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Tensors produced by one inference pass, one per selected output.
#[derive(Debug)]
pub struct Outputs {
    inner: TVec<Tensor>,
}

impl Outputs {
    /// Builds an output list by hand, for decoding tests.
    pub fn from_tensors<I: IntoIterator<Item = Tensor>>(tensors: I) -> Self {
        Self {
            inner: tensors.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Index<usize> for Outputs {
    type Output = Tensor;

    fn index(&self, index: usize) -> &Tensor {
        &self.inner[index]
    }
}

/// Input tensors for [`NeuralNetwork::estimate`].
#[derive(Debug)]
pub struct Inputs {
    inner: TVec<Tensor>,
}

impl From<Tensor> for Inputs {
    fn from(t: Tensor) -> Self {
        Self { inner: tvec![t] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_mapper() {
        let mapper = ColorMapper::linear(-1.0..=1.0);
        assert_eq!(mapper.map(Color::BLACK), [-1.0, -1.0, -1.0]);
        assert_eq!(mapper.map(Color::WHITE), [1.0, 1.0, 1.0]);

        let mapper = ColorMapper::linear(0.0..=1.0);
        assert_eq!(mapper.map(Color::BLACK), [0.0, 0.0, 0.0]);
        assert_eq!(mapper.map(Color::RED), [1.0, 0.0, 0.0]);
    }

    #[test]
    #[should_panic(expected = "invalid color range")]
    fn empty_color_range() {
        ColorMapper::linear(1.0..=1.0);
    }

    #[test]
    fn rejects_non_onnx_paths() {
        let err = NeuralNetwork::from_path("models/classifier.h5")
            .err()
            .expect("non-ONNX path accepted");
        assert!(err.to_string().contains("classifier.h5"), "{err}");
    }

    #[test]
    fn missing_model_names_path() {
        let err = NeuralNetwork::from_path("does/not/exist.onnx")
            .err()
            .expect("missing file accepted");
        assert!(err.to_string().contains("does/not/exist.onnx"), "{err}");
    }
}
