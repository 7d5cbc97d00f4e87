//! Row-major `f32` tensors.
//!
//! Tensors carry camera images into the hand tracking networks, the preprocessed hand crop into
//! the sign classifier, and raw network outputs back out to be decoded into detections,
//! landmarks and letter probabilities.

use std::fmt;

use anyhow::bail;
use tinyvec::TinyVec;

use crate::iter::zip_exact;

/// Inline storage for shapes and strides; none of the networks use more than 4 dimensions.
type Dims = TinyVec<[usize; 4]>;

#[derive(Clone)]
struct Layout {
    shape: Dims,
    /// Element distance between successive indices of each dimension.
    strides: Dims,
}

impl Layout {
    fn from_shape(shape: &[usize]) -> Self {
        let mut strides: Dims = shape.iter().map(|_| 0).collect();
        let mut stride = 1;
        for (out, &size) in zip_exact(strides.iter_mut().rev(), shape.iter().rev()) {
            *out = stride;
            stride *= size;
        }

        Self {
            shape: Dims::from(shape),
            strides,
        }
    }

    fn elements(&self) -> usize {
        self.shape.iter().product()
    }

    fn without_outer(&self, count: usize) -> Layout {
        Self {
            shape: Dims::from(&self.shape[count..]),
            strides: Dims::from(&self.strides[count..]),
        }
    }
}

/// Calls `f` with every index of `shape`, last dimension fastest.
fn for_each_index<const N: usize>(shape: [usize; N], mut f: impl FnMut([usize; N])) {
    if shape.contains(&0) {
        return;
    }

    let mut index = [0; N];
    'outer: loop {
        f(index);

        for (i, &size) in zip_exact(index.iter_mut().rev(), shape.iter().rev()) {
            *i += 1;
            if *i < size {
                continue 'outer;
            }
            *i = 0;
        }
        return;
    }
}

/// An owned tensor with a shape determined at runtime.
///
/// Use [`Tensor::index`] to borrow an inner part as a [`TensorView`]. The elements of
/// 1-dimensional tensors are accessed with `as_slice`, the value of 0-dimensional ones with
/// `as_singular`.
#[derive(Clone)]
pub struct Tensor {
    layout: Layout,
    data: Box<[f32]>,
}

/// A borrowed part of a [`Tensor`].
#[derive(Clone)]
pub struct TensorView<'a> {
    layout: Layout,
    data: &'a [f32],
}

impl Tensor {
    /// Creates a tensor by calling `f` with each index in row-major order.
    pub fn from_array_shape_fn<const N: usize, F: FnMut([usize; N]) -> f32>(
        shape: [usize; N],
        mut f: F,
    ) -> Self {
        let mut data = Vec::with_capacity(shape.iter().product());
        for_each_index(shape, |index| data.push(f(index)));
        Self {
            layout: Layout::from_shape(&shape),
            data: data.into(),
        }
    }

    /// Creates a tensor from its elements in row-major order.
    ///
    /// # Panics
    ///
    /// Panics if `iter` does not yield exactly the number of elements `shape` calls for.
    #[track_caller]
    pub fn from_iter<I: IntoIterator<Item = f32>>(shape: &[usize], iter: I) -> Self {
        let layout = Layout::from_shape(shape);
        let data: Box<[f32]> = iter.into_iter().collect();
        assert_eq!(
            data.len(),
            layout.elements(),
            "wrong number of elements for tensor of shape {shape:?}"
        );
        Self { layout, data }
    }

    pub(super) fn from_tract(tract: &tract_onnx::prelude::Tensor) -> anyhow::Result<Self> {
        Ok(Self {
            layout: Layout::from_shape(tract.shape()),
            data: tract.as_slice::<f32>()?.into(),
        })
    }

    pub(super) fn to_tract(&self) -> anyhow::Result<tract_onnx::prelude::Tensor> {
        tract_onnx::prelude::Tensor::from_shape(self.shape(), &self.data)
    }

    /// Borrows the whole tensor as a [`TensorView`].
    pub fn view(&self) -> TensorView<'_> {
        TensorView {
            layout: self.layout.clone(),
            data: &self.data,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.layout.shape
    }

    pub fn rank(&self) -> usize {
        self.layout.shape.len()
    }

    /// Returns every element, in row-major order.
    pub fn as_raw_data(&self) -> &[f32] {
        &self.data
    }

    /// Returns a copy of the elements arranged in a different shape.
    pub fn reshape(&self, shape: &[usize]) -> anyhow::Result<Tensor> {
        let layout = Layout::from_shape(shape);
        if layout.elements() != self.data.len() {
            bail!(
                "cannot reshape tensor of shape {:?} to {:?}",
                self.shape(),
                shape
            );
        }
        Ok(Self {
            layout,
            data: self.data.clone(),
        })
    }

    /// Fixes the outermost `N` indices, returning a view of the remaining dimensions.
    ///
    /// Indexing a `[1, 2016, 18]` tensor with `[0, i]` yields the `[18]` parameters of box `i`.
    ///
    /// # Panics
    ///
    /// Panics if the tensor has fewer than `N` dimensions or an index is out of range.
    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'_> {
        self.view().index(indices)
    }

    /// Iterates over the outermost dimension.
    #[track_caller]
    pub fn iter(&self) -> impl Iterator<Item = TensorView<'_>> {
        let len = self.shape().first().copied().unwrap_or_else(|| {
            panic!("cannot iterate over a 0-dimensional tensor");
        });
        (0..len).map(move |i| self.index([i]))
    }

    #[track_caller]
    pub fn as_slice(&self) -> &[f32] {
        self.view().as_slice()
    }

    #[track_caller]
    pub fn as_singular(&self) -> f32 {
        self.view().as_singular()
    }
}

impl From<f32> for Tensor {
    fn from(value: f32) -> Self {
        Tensor::from_iter(&[], [value])
    }
}

impl From<&[f32]> for Tensor {
    fn from(slice: &[f32]) -> Self {
        Tensor::from_iter(&[slice.len()], slice.iter().copied())
    }
}

impl<const N: usize> From<[f32; N]> for Tensor {
    fn from(arr: [f32; N]) -> Self {
        Tensor::from_iter(&[N], arr)
    }
}

impl<'d> TensorView<'d> {
    pub fn shape(&self) -> &[usize] {
        &self.layout.shape
    }

    pub fn rank(&self) -> usize {
        self.layout.shape.len()
    }

    /// See [`Tensor::index`].
    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'d> {
        assert!(
            N <= self.rank(),
            "index {indices:?} has too many dimensions for shape {:?}",
            self.shape(),
        );

        let mut data = self.data;
        let dims = self.shape().iter().zip(self.layout.strides.iter());
        for ((&size, &stride), &index) in dims.zip(&indices) {
            assert!(
                index < size,
                "index {indices:?} out of range for shape {:?}",
                self.shape(),
            );
            data = &data[index * stride..(index + 1) * stride];
        }

        TensorView {
            layout: self.layout.without_outer(N),
            data,
        }
    }

    /// Iterates over the outermost dimension.
    #[track_caller]
    pub fn iter(&self) -> impl Iterator<Item = TensorView<'d>> + '_ {
        let len = self.shape().first().copied().unwrap_or_else(|| {
            panic!("cannot iterate over a 0-dimensional tensor view");
        });
        (0..len).map(move |i| self.index([i]))
    }

    /// Returns the elements of a 1-dimensional view.
    #[track_caller]
    pub fn as_slice(&self) -> &'d [f32] {
        assert_eq!(
            self.rank(),
            1,
            "tensor of shape {:?} is not a vector",
            self.shape()
        );
        self.data
    }

    /// Returns the value of a 0-dimensional view.
    #[track_caller]
    pub fn as_singular(&self) -> f32 {
        assert_eq!(
            self.rank(),
            0,
            "tensor of shape {:?} is not a scalar",
            self.shape(),
        );
        self.data[0]
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor({:?})", self.shape())
    }
}

impl fmt::Debug for TensorView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TensorView({:?})", self.shape())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_fn_order() {
        let mut seen = Vec::new();
        let tensor = Tensor::from_array_shape_fn([1, 2, 3], |index| {
            seen.push(index);
            0.0
        });
        assert_eq!(tensor.shape(), &[1, 2, 3]);
        assert_eq!(
            seen,
            [
                [0, 0, 0],
                [0, 0, 1],
                [0, 0, 2],
                [0, 1, 0],
                [0, 1, 1],
                [0, 1, 2],
            ]
        );
    }

    #[test]
    fn empty_shape_never_calls() {
        let tensor = Tensor::from_array_shape_fn([1, 2, 0, 3], |idx| unreachable!("{idx:?}"));
        assert_eq!(tensor.shape(), &[1, 2, 0, 3]);
        assert_eq!(tensor.index([0, 1]).iter().count(), 0);
    }

    #[test]
    fn singular() {
        let tensor = Tensor::from(1.5);
        assert_eq!(tensor.rank(), 0);
        assert_eq!(tensor.as_singular(), 1.5);
        assert_eq!(tensor.index([]).as_singular(), 1.5);
    }

    #[test]
    fn index_rows() {
        let tensor = Tensor::from_iter(&[1, 2, 2], [0.0, 1.0, 2.0, 3.0]);

        let rows = tensor.index([0]);
        assert_eq!(rows.shape(), [2, 2]);
        assert_eq!(rows.index([0]).as_slice(), [0.0, 1.0]);
        assert_eq!(rows.index([1]).as_slice(), [2.0, 3.0]);
        assert_eq!(tensor.index([0, 1, 0]).as_singular(), 2.0);
        assert_eq!(rows.iter().count(), 2);
        assert_eq!(tensor.iter().count(), 1);
    }

    #[test]
    fn reshape_keeps_elements() {
        let nhwc = Tensor::from_array_shape_fn([1, 2, 2, 1], |[_, y, x, _]| (y * 2 + x) as f32);
        let nchw = nhwc.reshape(&[1, 1, 2, 2]).unwrap();
        assert_eq!(nchw.shape(), [1, 1, 2, 2]);
        assert_eq!(nchw.as_raw_data(), [0.0, 1.0, 2.0, 3.0]);
        assert!(nhwc.reshape(&[1, 3]).is_err());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn index_out_of_bounds() {
        Tensor::from([1.0, 2.0]).index([2]);
    }
}
