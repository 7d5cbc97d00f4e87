//! Converts cropped hand images into classifier input.
//!
//! The steps, in order:
//!
//! 1. Convert to grayscale (ITU-R BT.601 luma).
//! 2. Mirror horizontally.
//! 3. Gaussian blur with a square kernel.
//! 4. Binary threshold, producing the black/white [`Preprocessed::mask`].
//! 5. Linear (triangle filter) resize to the classifier's input size.
//! 6. Normalize to `[0, 1]`.

use anyhow::ensure;
use image::{
    imageops::{self, FilterType},
    GrayImage, Luma,
};

use crate::image::{AsImageView, ImageView};
use crate::nn::tensor::Tensor;

/// Tunable preprocessing parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessParams {
    /// Width and height of the Gaussian blur kernel. Must be odd.
    pub blur_kernel: u32,
    /// Pixels brighter than this become white, all others black.
    pub threshold: u8,
    /// Width and height of the output tensor.
    pub output_size: u32,
}

impl Default for PreprocessParams {
    fn default() -> Self {
        Self {
            blur_kernel: 15,
            threshold: 161,
            output_size: 32,
        }
    }
}

/// Result of [`preprocess`].
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// Classifier input of shape `[1, size, size, 1]`, with values in `[0, 1]`.
    pub tensor: Tensor,
    /// The thresholded image before resizing, at the resolution of the input.
    pub mask: GrayImage,
}

/// Preprocesses a (cropped) hand image.
///
/// Returns an error if `image` is empty or `params` are invalid.
pub fn preprocess<V: AsImageView>(
    image: &V,
    params: &PreprocessParams,
) -> anyhow::Result<Preprocessed> {
    preprocess_impl(image.as_view(), params)
}

fn preprocess_impl(view: ImageView<'_>, params: &PreprocessParams) -> anyhow::Result<Preprocessed> {
    ensure!(
        view.width() > 0 && view.height() > 0,
        "cannot preprocess empty {}x{} image",
        view.width(),
        view.height(),
    );
    ensure!(
        params.blur_kernel % 2 == 1,
        "blur kernel size must be odd, got {}",
        params.blur_kernel,
    );
    ensure!(params.output_size > 0, "output size must be non-zero");

    let gray = grayscale(view);
    let flipped = imageops::flip_horizontal(&gray);
    let mut mask = gaussian_blur(&flipped, params.blur_kernel);
    threshold(&mut mask, params.threshold);

    let size = params.output_size;
    let resized = imageops::resize(&mask, size, size, FilterType::Triangle);
    let tensor = Tensor::from_iter(
        &[1, size as usize, size as usize, 1],
        resized.pixels().map(|p| f32::from(p.0[0]) / 255.0),
    );

    Ok(Preprocessed { tensor, mask })
}

/// Converts to grayscale with `0.299 R + 0.587 G + 0.114 B`, ignoring alpha.
fn grayscale(view: ImageView<'_>) -> GrayImage {
    GrayImage::from_fn(view.width(), view.height(), |x, y| {
        let c = view.get(x, y);
        let luma = 0.299 * f32::from(c.r()) + 0.587 * f32::from(c.g()) + 0.114 * f32::from(c.b());
        Luma([luma.round() as u8])
    })
}

/// Sigma used for a Gaussian kernel of the given size when none is specified.
fn default_sigma(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

fn gaussian_kernel(size: u32) -> Vec<f32> {
    let sigma = default_sigma(size);
    let center = (size / 2) as f32;
    let mut kernel = (0..size)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect::<Vec<_>>();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= sum);
    kernel
}

/// Maps an out-of-range index back into `0..len` by mirroring around the edge pixels, without
/// repeating them (`gfedcb|abcdefgh|gfedcba`).
fn reflect_101(index: i64, len: u32) -> u32 {
    if len == 1 {
        return 0;
    }
    let len = i64::from(len);
    let period = 2 * (len - 1);
    let i = index.rem_euclid(period);
    (if i >= len { period - i } else { i }) as u32
}

/// Separable Gaussian blur with a `kernel_size`x`kernel_size` kernel.
fn gaussian_blur(image: &GrayImage, kernel_size: u32) -> GrayImage {
    let (w, h) = image.dimensions();
    let kernel = gaussian_kernel(kernel_size);
    let radius = i64::from(kernel_size / 2);

    let mut horizontal = vec![0.0f32; (w * h) as usize];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = reflect_101(i64::from(x) + k as i64 - radius, w);
                acc += weight * f32::from(image[(sx, y)].0[0]);
            }
            horizontal[(y * w + x) as usize] = acc;
        }
    }

    GrayImage::from_fn(w, h, |x, y| {
        let mut acc = 0.0;
        for (k, weight) in kernel.iter().enumerate() {
            let sy = reflect_101(i64::from(y) + k as i64 - radius, h);
            acc += weight * horizontal[(sy * w + x) as usize];
        }
        Luma([acc.round().clamp(0.0, 255.0) as u8])
    })
}

fn threshold(image: &mut GrayImage, threshold: u8) {
    for Luma([v]) in image.pixels_mut() {
        *v = if *v > threshold { 255 } else { 0 };
    }
}
