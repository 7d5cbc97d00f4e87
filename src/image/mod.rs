//! Camera frames and views into them.
//!
//! [`Image`] owns RGBA8 pixel data. [`ImageView`] and [`ImageViewMut`] address a (possibly
//! rotated) rectangle of an [`Image`] without copying; the neural networks sample their inputs
//! through views, and the [`draw`] functions write through them.

pub mod draw;
mod jpeg;
mod resolution;

#[cfg(test)]
mod tests;

use std::{fmt, path::Path};

use anyhow::{bail, Context};
use embedded_graphics::{pixelcolor::raw::RawU32, prelude::PixelColor};
use image::{GrayImage, ImageBuffer, Rgba, RgbaImage};

pub use jpeg::JpegBackend;
pub use resolution::*;

use crate::rect::{Rect, RotatedRect};

/// An 8-bit sRGB image with alpha channel.
#[derive(Clone)]
pub struct Image {
    // Row-major RGBA8, the layout of the GUI's texture format.
    pub(crate) buf: RgbaImage,
}

impl Image {
    /// Creates a fully transparent image of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: ImageBuffer::new(width, height),
        }
    }

    /// Reads an image file.
    ///
    /// JPEG files go through the default [`JpegBackend`], so that stills decode the same way as
    /// webcam frames. Other formats are detected from their contents.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let is_jpeg = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| {
                ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg")
            });
        if is_jpeg {
            return Self::decode_jpeg(&data);
        }

        let buf = image::load_from_memory(&data)
            .with_context(|| format!("unsupported image format in '{}'", path.display()))?
            .to_rgba8();
        Ok(Self { buf })
    }

    /// Decodes a JPEG or Motion JPEG frame with the default [`JpegBackend`].
    pub fn decode_jpeg(data: &[u8]) -> anyhow::Result<Self> {
        jpeg::decode_jpeg(data, JpegBackend::default())
    }

    pub fn decode_jpeg_with(data: &[u8], backend: JpegBackend) -> anyhow::Result<Self> {
        jpeg::decode_jpeg(data, backend)
    }

    /// Creates an image from row-major RGBA8 data.
    pub fn from_rgba8(res: Resolution, buf: &[u8]) -> anyhow::Result<Self> {
        let expected = res.num_pixels() as usize * 4;
        if buf.len() != expected {
            bail!(
                "{} image needs {} bytes of RGBA data, got {}",
                res,
                expected,
                buf.len(),
            );
        }

        // Cannot fail, the length was checked above.
        let buf = RgbaImage::from_raw(res.width(), res.height(), buf.to_vec())
            .context("RGBA buffer does not match resolution")?;
        Ok(Self { buf })
    }

    /// Expands a grayscale image to opaque RGBA.
    pub fn from_luma8(gray: &GrayImage) -> Self {
        Self {
            buf: ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
                let [l] = gray[(x, y)].0;
                Rgba([l, l, l, 255])
            }),
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns the rectangle `(0, 0, width, height)`.
    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::from_top_left(0.0, 0.0, self.width() as f32, self.height() as f32)
    }

    /// Returns the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Color {
        Color(self.buf[(x, y)].0)
    }

    /// Overwrites the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.buf[(x, y)] = Rgba(color.0);
    }

    /// Borrows the area of this image covered by `rect`.
    ///
    /// The view has the size of `rect` even where `rect` extends past the image; those pixels
    /// read as [`Color::NULL`].
    pub fn view(&self, rect: impl Into<RotatedRect>) -> ImageView<'_> {
        ImageView {
            image: self,
            data: ViewData::full(self).view(rect),
        }
    }

    /// Mutably borrows the area of this image covered by `rect`.
    ///
    /// Writes to pixels outside of the image are dropped.
    pub fn view_mut(&mut self, rect: impl Into<RotatedRect>) -> ImageViewMut<'_> {
        ImageViewMut {
            data: ViewData::full(self).view(rect),
            image: self,
        }
    }

    /// Fills the whole image with `color`.
    pub fn clear(&mut self, color: Color) {
        for pixel in self.buf.pixels_mut() {
            pixel.0 = color.0;
        }
    }

    /// Returns the raw row-major RGBA8 data.
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.buf.as_raw()
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image({})", self.resolution())
    }
}

/// Placement of a view inside its root [`Image`].
#[derive(Debug, Clone, Copy)]
struct ViewData {
    rect: RotatedRect,
}

impl ViewData {
    fn full(image: &Image) -> Self {
        Self {
            rect: image.rect().into(),
        }
    }

    /// Nests `rect`, given in this view's coordinates, inside this view.
    fn view(&self, rect: impl Into<RotatedRect>) -> Self {
        let rect: RotatedRect = rect.into();
        let inner = rect.rect();

        let (cx, cy) = inner.center();
        let [cx, cy] = self.rect.transform_out(cx, cy);
        let moved = inner.move_to(cx - inner.width() / 2.0, cy - inner.height() / 2.0);

        Self {
            rect: RotatedRect::new(
                moved,
                self.rect.rotation_radians() + rect.rotation_radians(),
            ),
        }
    }

    fn width(&self) -> f32 {
        self.rect.rect().width()
    }

    fn height(&self) -> f32 {
        self.rect.rect().height()
    }

    fn rect(&self) -> Rect {
        Rect::from_top_left(0.0, 0.0, self.width(), self.height())
    }

    /// Maps a view pixel to the nearest pixel of `image`, if there is one.
    fn image_coord(&self, x: u32, y: u32, image: &Image) -> Option<(u32, u32)> {
        let [ix, iy] = self.rect.transform_out(x as f32 + 0.5, y as f32 + 0.5);
        let (ix, iy) = ((ix - 0.5).round(), (iy - 0.5).round());

        let inside = (0.0..image.width() as f32).contains(&ix)
            && (0.0..image.height() as f32).contains(&iy);
        inside.then_some((ix as u32, iy as u32))
    }

    fn get(&self, x: u32, y: u32, image: &Image) -> Color {
        self.image_coord(x, y, image)
            .map_or(Color::NULL, |(x, y)| image.get(x, y))
    }
}

/// A borrowed rectangle of an [`Image`].
#[derive(Clone, Copy)]
pub struct ImageView<'a> {
    image: &'a Image,
    data: ViewData,
}

impl<'a> ImageView<'a> {
    pub fn width(&self) -> u32 {
        self.data.width() as u32
    }

    pub fn height(&self) -> u32 {
        self.data.height() as u32
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns the rectangle `(0, 0, width, height)`.
    #[inline]
    pub fn rect(&self) -> Rect {
        self.data.rect()
    }

    /// Returns the pixel at `(x, y)` of this view, or [`Color::NULL`] if that position is outside
    /// of the underlying image.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.data.get(x, y, self.image)
    }

    /// Borrows the area covered by `rect`, given in this view's coordinates.
    ///
    /// `rect` may reach past the edges of this view; it is only limited by the underlying
    /// [`Image`].
    pub fn view(&self, rect: impl Into<RotatedRect>) -> ImageView<'a> {
        ImageView {
            image: self.image,
            data: self.data.view(rect),
        }
    }

    /// Copies the viewed pixels into a new, unrotated [`Image`].
    pub fn to_image(&self) -> Image {
        Image {
            buf: ImageBuffer::from_fn(self.width(), self.height(), |x, y| {
                Rgba(self.get(x, y).0)
            }),
        }
    }
}

impl fmt::Debug for ImageView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageView({})", self.resolution())
    }
}

/// A mutably borrowed rectangle of an [`Image`].
pub struct ImageViewMut<'a> {
    image: &'a mut Image,
    data: ViewData,
}

impl<'a> ImageViewMut<'a> {
    pub fn width(&self) -> u32 {
        self.data.width() as u32
    }

    pub fn height(&self) -> u32 {
        self.data.height() as u32
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        self.data.rect()
    }

    #[inline]
    fn set(&mut self, x: u32, y: u32, color: Color) {
        if let Some((x, y)) = self.data.image_coord(x, y, self.image) {
            self.image.set(x, y, color);
        }
    }

    /// Reborrows `self` for a shorter lifetime, like `&mut *r` does for references.
    pub fn reborrow(&mut self) -> ImageViewMut<'_> {
        ImageViewMut {
            image: self.image,
            data: self.data,
        }
    }
}

impl fmt::Debug for ImageViewMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageViewMut({}x{})", self.width(), self.height())
    }
}

/// A non-premultiplied sRGB color with alpha.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct Color(pub(crate) [u8; 4]);

impl Color {
    /// Transparent black, read from outside of an image.
    pub const NULL: Self = Self([0, 0, 0, 0]);
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);
    pub const RED: Self = Self([255, 0, 0, 255]);
    pub const GREEN: Self = Self([0, 255, 0, 255]);

    #[inline]
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    #[inline]
    pub fn r(&self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub fn g(&self) -> u8 {
        self.0[1]
    }

    #[inline]
    pub fn b(&self) -> u8 {
        self.0[2]
    }

    #[inline]
    pub fn a(&self) -> u8 {
        self.0[3]
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
    }
}

impl PixelColor for Color {
    type Raw = RawU32;
}

/// Read access to pixel data, implemented by [`Image`] and its views.
///
/// Functions that only read pixels take `V: AsImageView` so that callers can pass either a whole
/// frame or a region of it.
pub trait AsImageView {
    fn as_view(&self) -> ImageView<'_>;
}

/// Write access to pixel data, implemented by [`Image`] and [`ImageViewMut`].
pub trait AsImageViewMut: AsImageView {
    fn as_view_mut(&mut self) -> ImageViewMut<'_>;
}

impl AsImageView for Image {
    fn as_view(&self) -> ImageView<'_> {
        self.view(self.rect())
    }
}

impl AsImageViewMut for Image {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        let rect = self.rect();
        self.view_mut(rect)
    }
}

impl AsImageView for ImageView<'_> {
    fn as_view(&self) -> ImageView<'_> {
        *self
    }
}

impl AsImageView for ImageViewMut<'_> {
    fn as_view(&self) -> ImageView<'_> {
        ImageView {
            image: self.image,
            data: self.data,
        }
    }
}

impl AsImageViewMut for ImageViewMut<'_> {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        self.reborrow()
    }
}

impl<V: AsImageView> AsImageView for &V {
    fn as_view(&self) -> ImageView<'_> {
        (**self).as_view()
    }
}

impl<V: AsImageView> AsImageView for &mut V {
    fn as_view(&self) -> ImageView<'_> {
        (**self).as_view()
    }
}

impl<V: AsImageViewMut> AsImageViewMut for &mut V {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        (**self).as_view_mut()
    }
}
