//! Result visualization.

use crate::image::{draw, AsImageViewMut, Color};
use crate::region::BoundingBox;

/// Title of the window showing the annotated camera frames.
pub const MAIN_WINDOW: &str = "ASL Recognition";

/// Title of the window showing the thresholded hand image fed to the classifier.
pub const MASK_WINDOW: &str = "Preprocessed Image";

const COLOR: Color = Color::GREEN;
const STROKE_WIDTH: u32 = 2;
/// Distance between the text's baseline and the top of the bounding box.
const TEXT_OFFSET: i32 = 10;

/// Formats the text shown next to a recognized sign, eg. `Letter: A (97.25%)`.
pub fn overlay_text(label: char, confidence: f32) -> String {
    format!("Letter: {label} ({confidence:.2}%)")
}

/// Draws the bounding box of a recognized sign and its label and confidence above it.
pub fn draw_sign<I: AsImageViewMut>(
    image: &mut I,
    bbox: &BoundingBox,
    label: char,
    confidence: f32,
) {
    draw::rect(image, bbox.rect())
        .color(COLOR)
        .stroke_width(STROKE_WIDTH);

    let text = overlay_text(label, confidence);
    draw::text(image, bbox.x_min as i32, bbox.y_min as i32 - TEXT_OFFSET, &text)
        .color(COLOR)
        .large()
        .align_left()
        .align_bottom();
}

#[cfg(test)]
mod tests {
    use crate::image::Image;

    use super::*;

    #[test]
    fn text_format() {
        assert_eq!(overlay_text('A', 97.254), "Letter: A (97.25%)");
        assert_eq!(overlay_text('Y', 100.0), "Letter: Y (100.00%)");
        assert_eq!(overlay_text('K', 3.0), "Letter: K (3.00%)");
    }

    #[test]
    fn draws_box_and_text() {
        let mut image = Image::new(200, 120);
        image.clear(Color::BLACK);
        let bbox = BoundingBox {
            x_min: 20,
            y_min: 50,
            x_max: 120,
            y_max: 110,
        };
        draw_sign(&mut image, &bbox, 'B', 50.0);

        assert_eq!(image.get(20, 50), Color::GREEN);
        assert_eq!(image.get(119, 109), Color::GREEN);
        assert_eq!(image.get(70, 80), Color::BLACK);

        // Text ends 10px above the box.
        let text_pixels = (0..=40)
            .flat_map(|y| (0..200).map(move |x| (x, y)))
            .filter(|&(x, y)| image.get(x, y) == Color::GREEN)
            .count();
        assert!(text_pixels > 0);
        assert!((41..49).all(|y| (0..200).all(|x| image.get(x, y) == Color::BLACK)));
    }
}
