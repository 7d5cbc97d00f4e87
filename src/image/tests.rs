use std::f32::consts::TAU;

use image::Luma;

use super::*;
use Color as C;

fn mkimage<const W: usize, const H: usize>(rows: [[Color; W]; H]) -> Image {
    let data = rows
        .into_iter()
        .flatten()
        .flat_map(|color| color.0)
        .collect::<Vec<_>>();
    Image::from_rgba8(Resolution::new(W as u32, H as u32), &data).unwrap()
}

#[test]
fn nested_views() {
    let image = mkimage([
        [C::GREEN, C::WHITE, C::WHITE],
        [C::WHITE, C::RED, C::WHITE],
        [C::WHITE, C::WHITE, C::WHITE],
    ]);

    let root = ViewData::full(&image);
    assert_eq!(root.rect(), Rect::from_top_left(0.0, 0.0, 3.0, 3.0));

    let center = root.view(Rect::from_top_left(1.0, 1.0, 1.0, 1.0));
    assert_eq!(center.rect(), Rect::from_top_left(0.0, 0.0, 1.0, 1.0));
    assert_eq!(center.rect, Rect::from_top_left(1.0, 1.0, 1.0, 1.0).into());

    // Offsets accumulate.
    let corner = center.view(Rect::from_top_left(0.0, 0.0, 2.0, 2.0));
    assert_eq!(corner.rect, Rect::from_top_left(1.0, 1.0, 2.0, 2.0).into());

    let view = image.view(Rect::from_top_left(1.0, 1.0, 2.0, 2.0));
    assert_eq!(view.get(0, 0), C::RED);
    assert_eq!(view.view(Rect::from_top_left(-1.0, -1.0, 1.0, 1.0)).get(0, 0), C::GREEN);
}

#[test]
fn rotated_views() {
    #[rustfmt::skip]
    let image = mkimage([
        [C::GREEN, C::WHITE],
        [C::WHITE, C::RED],
    ]);
    let square = Rect::from_top_left(0.0, 0.0, 2.0, 2.0);

    let upright = image.view(RotatedRect::new(square, 0.0));
    assert_eq!(upright.get(0, 0), C::GREEN);
    assert_eq!(upright.get(1, 1), C::RED);

    let upside_down = image.view(RotatedRect::new(square, TAU / 2.0));
    assert_eq!(upside_down.get(0, 0), C::RED);
    assert_eq!(upside_down.get(1, 1), C::GREEN);

    let quarter = image.view(RotatedRect::new(square, TAU / 4.0));
    assert_eq!(quarter.get(0, 0), C::WHITE);
    assert_eq!(quarter.get(1, 0), C::RED);
    assert_eq!(quarter.get(0, 1), C::GREEN);
    assert_eq!(quarter.get(1, 1), C::WHITE);
}

#[test]
fn outside_reads_null() {
    let image = mkimage([[C::RED, C::GREEN]]);

    let view = image.view(Rect::from_top_left(1.0, 0.0, 99.0, 100.0));
    assert_eq!(view.resolution(), Resolution::new(99, 100));
    assert_eq!(view.get(0, 0), C::GREEN);
    assert_eq!(view.get(0, 1), C::NULL);
    assert_eq!(view.get(1, 0), C::NULL);
}

#[test]
fn writes_outside_are_dropped() {
    let mut image = mkimage([[C::BLACK, C::BLACK]]);
    let mut view = image.view_mut(Rect::from_top_left(1.0, 0.0, 2.0, 1.0));
    view.set(0, 0, C::WHITE);
    view.set(1, 0, C::WHITE);
    assert_eq!(image.get(0, 0), C::BLACK);
    assert_eq!(image.get(1, 0), C::WHITE);
}

#[test]
fn crop_to_image() {
    let image = mkimage([
        [C::GREEN, C::WHITE, C::WHITE],
        [C::WHITE, C::RED, C::BLACK],
    ]);

    let crop = image
        .view(Rect::from_top_left(1.0, 1.0, 2.0, 1.0))
        .to_image();
    assert_eq!(crop.resolution(), Resolution::new(2, 1));
    assert_eq!(crop.get(0, 0), C::RED);
    assert_eq!(crop.get(1, 0), C::BLACK);
}

#[test]
fn from_rgba8_checks_size() {
    assert!(Image::from_rgba8(Resolution::new(2, 2), &[0; 15]).is_err());
    assert!(Image::from_rgba8(Resolution::new(2, 2), &[0; 16]).is_ok());
}

#[test]
fn luma_to_rgba() {
    let gray = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 0 } else { 255 }]));
    let image = Image::from_luma8(&gray);
    assert_eq!(image.get(0, 0), C::BLACK);
    assert_eq!(image.get(1, 0), C::WHITE);
}

#[test]
fn load() {
    let dir = std::env::temp_dir().join(format!("handsign-image-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let path = dir.join("frame.png");
    RgbaImage::from_pixel(3, 2, Rgba([255, 0, 0, 255]))
        .save(&path)
        .unwrap();
    let image = Image::load(&path).unwrap();
    assert_eq!(image.resolution(), Resolution::new(3, 2));
    assert_eq!(image.get(2, 1), C::RED);

    assert!(Image::load(dir.join("missing.png")).is_err());

    let garbage = dir.join("garbage.jpg");
    std::fs::write(&garbage, b"not a jpeg").unwrap();
    assert!(Image::load(&garbage).is_err());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn draw_rect_outline() {
    let mut image = Image::new(6, 6);
    image.clear(C::BLACK);
    draw::rect(&mut image, Rect::from_top_left(1.0, 1.0, 4.0, 4.0)).color(C::GREEN);
    assert_eq!(image.get(1, 1), C::GREEN);
    assert_eq!(image.get(4, 4), C::GREEN);
    assert_eq!(image.get(2, 2), C::BLACK);
    assert_eq!(image.get(0, 0), C::BLACK);
}

#[test]
fn draw_text_is_clipped() {
    let mut image = Image::new(8, 8);
    image.clear(C::BLACK);
    draw::text(&mut image, -50, -50, "Letter: A").color(C::WHITE);
    assert!(image.data().chunks(4).all(|px| px == [0, 0, 0, 255]));

    draw::text(&mut image, 4, 4, "W").color(C::WHITE);
    assert!(image.data().chunks(4).any(|px| px == [255, 255, 255, 255]));
}

#[test]
fn jpeg_backends() {
    assert_eq!("zune-jpeg".parse::<JpegBackend>().unwrap(), JpegBackend::ZuneJpeg);
    assert_eq!(
        "jpeg-decoder".parse::<JpegBackend>().unwrap(),
        JpegBackend::JpegDecoder
    );
    assert!("mozjpeg".parse::<JpegBackend>().is_err());
    assert_eq!(JpegBackend::JpegDecoder.to_string(), "jpeg-decoder");

    for backend in [JpegBackend::ZuneJpeg, JpegBackend::JpegDecoder] {
        assert!(Image::decode_jpeg_with(b"not a jpeg", backend).is_err());
    }
}
