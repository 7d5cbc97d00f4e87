//! Annotation primitives for [`Image`][super::Image]s.
//!
//! [`rect`] and [`text`] return builders that are drawn when they go out of scope, so a call can
//! be customized by chaining setters onto it.

use std::convert::Infallible;

use embedded_graphics::{
    draw_target::DrawTarget,
    mono_font::{ascii, MonoFont, MonoTextStyle},
    prelude::*,
    primitives::{PrimitiveStyle, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};

use crate::image::{AsImageViewMut, Color, ImageViewMut};
use crate::rect::Rect;

const DEFAULT_COLOR: Color = Color::RED;

/// An outlined rectangle, drawn on drop.
pub struct DrawRect<'a> {
    target: Target<'a>,
    rect: Rect,
    color: Color,
    stroke_width: u32,
}

impl DrawRect<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the outline thickness in pixels (default: 1).
    ///
    /// The outline is centered on the rectangle's edges.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl Drop for DrawRect<'_> {
    fn drop(&mut self) {
        let top_left = Point::new(self.rect.x().round() as i32, self.rect.y().round() as i32);
        let size = Size::new(
            self.rect.width().round() as u32,
            self.rect.height().round() as u32,
        );
        let style = PrimitiveStyle::with_stroke(self.color, self.stroke_width);
        let result = Rectangle::new(top_left, size)
            .into_styled(style)
            .draw(&mut self.target);
        unwrap_infallible(result);
    }
}

/// A line of text, drawn on drop.
pub struct DrawText<'a> {
    target: Target<'a>,
    position: Point,
    text: &'a str,
    color: Color,
    font: &'static MonoFont<'static>,
    alignment: Alignment,
    baseline: Baseline,
}

impl DrawText<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Switches from the 6x10 font to the 10x20 one.
    pub fn large(&mut self) -> &mut Self {
        self.font = &ascii::FONT_10X20;
        self
    }

    /// Places the text so that its left edge is at the anchor point.
    pub fn align_left(&mut self) -> &mut Self {
        self.alignment = Alignment::Left;
        self
    }

    /// Places the text so that its bottom edge is at the anchor point.
    pub fn align_bottom(&mut self) -> &mut Self {
        self.baseline = Baseline::Bottom;
        self
    }
}

impl Drop for DrawText<'_> {
    fn drop(&mut self) {
        let style = TextStyleBuilder::new()
            .alignment(self.alignment)
            .baseline(self.baseline)
            .build();
        let result = Text::with_text_style(
            self.text,
            self.position,
            MonoTextStyle::new(self.font, self.color),
            style,
        )
        .draw(&mut self.target);
        unwrap_infallible(result);
    }
}

fn unwrap_infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(t) => t,
        Err(never) => match never {},
    }
}

/// Outlines `rect` on `image`.
pub fn rect<I: AsImageViewMut>(image: &mut I, rect: Rect) -> DrawRect<'_> {
    DrawRect {
        target: Target(image.as_view_mut()),
        rect,
        color: DEFAULT_COLOR,
        stroke_width: 1,
    }
}

/// Writes `text` on `image`, anchored at `(x, y)`.
///
/// Unless changed, the text is centered on the anchor point in both directions. Text extending
/// beyond the image is clipped.
pub fn text<'a, I: AsImageViewMut>(
    image: &'a mut I,
    x: i32,
    y: i32,
    text: &'a str,
) -> DrawText<'a> {
    DrawText {
        target: Target(image.as_view_mut()),
        position: Point::new(x, y),
        text,
        color: DEFAULT_COLOR,
        font: &ascii::FONT_6X10,
        alignment: Alignment::Center,
        baseline: Baseline::Middle,
    }
}

/// Adapts an [`ImageViewMut`] to `embedded-graphics`, discarding out-of-bounds pixels.
struct Target<'a>(ImageViewMut<'a>);

impl Target<'_> {
    fn contains(&self, point: Point) -> bool {
        u32::try_from(point.x).map_or(false, |x| x < self.0.width())
            && u32::try_from(point.y).map_or(false, |y| y < self.0.height())
    }
}

impl Dimensions for Target<'_> {
    fn bounding_box(&self) -> Rectangle {
        Rectangle::new(Point::zero(), Size::new(self.0.width(), self.0.height()))
    }
}

impl DrawTarget for Target<'_> {
    type Color = Color;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Infallible>
    where
        I: IntoIterator<Item = Pixel<Color>>,
    {
        for Pixel(point, color) in pixels {
            if self.contains(point) {
                self.0.set(point.x as u32, point.y as u32, color);
            }
        }
        Ok(())
    }
}
