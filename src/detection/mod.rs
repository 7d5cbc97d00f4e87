//! Running detection networks on whole frames.
//!
//! A [`Detector`] letterboxes the frame to the network's input shape, lets the [`Network`] decode
//! raw detections, merges overlapping ones with [`nms::NonMaxSuppression`] and finally maps them
//! back to frame coordinates.

pub mod nms;
pub mod ssd;

use anyhow::anyhow;

use crate::image::{AsImageView, ImageView, Resolution};
use crate::nn::{Cnn, Outputs};
use crate::rect::Rect;
use crate::timer::Timer;

use self::nms::NonMaxSuppression;

/// A network that finds objects of a single class.
pub trait Network: Send + Sync + 'static {
    fn cnn(&self) -> &Cnn;

    /// Decodes every detection with a confidence of at least `threshold` from `outputs`, in the
    /// network's input coordinates.
    ///
    /// Fails if `outputs` do not have the shapes the network produces.
    fn extract(
        &self,
        outputs: &Outputs,
        threshold: f32,
        detections: &mut Vec<Detection>,
    ) -> anyhow::Result<()>;
}

/// Names of the [`Detector`] stage timers.
pub(crate) const TIMER_NAMES: [&str; 3] = ["palm infer", "palm extract", "palm nms"];

pub struct Detector {
    network: Box<dyn Network>,
    detections: Vec<Detection>,
    threshold: f32,
    nms: NonMaxSuppression,
    t_infer: Timer,
    t_extract: Timer,
    t_nms: Timer,
}

impl Detector {
    pub const DEFAULT_THRESHOLD: f32 = 0.5;

    pub fn new<N: Network>(network: N) -> Self {
        let [t_infer, t_extract, t_nms] = TIMER_NAMES.map(Timer::new);
        Self {
            network: Box::new(network),
            detections: Vec::new(),
            threshold: Self::DEFAULT_THRESHOLD,
            nms: NonMaxSuppression::new(),
            t_infer,
            t_extract,
            t_nms,
        }
    }

    pub fn input_resolution(&self) -> Resolution {
        self.network.cnn().input_resolution()
    }

    /// Sets the minimum confidence (`0.0..=1.0`) of reported detections.
    #[inline]
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    /// Detects objects in `image`.
    ///
    /// Detections are in `image` coordinates and ordered from most to least confident.
    pub fn detect<V: AsImageView>(&mut self, image: &V) -> anyhow::Result<&[Detection]> {
        self.detect_in(image.as_view())
    }

    fn detect_in(&mut self, image: ImageView<'_>) -> anyhow::Result<&[Detection]> {
        self.detections.clear();

        let cnn = self.network.cnn();
        let input_res = cnn.input_resolution();
        let aspect = input_res
            .aspect_ratio()
            .ok_or_else(|| anyhow!("detection network has empty input {input_res}"))?;

        // Pad the image to the network's aspect ratio instead of stretching it.
        let padded = image.rect().grow_to_fit_aspect(aspect);
        let outputs = self.t_infer.time(|| cnn.estimate(&image.view(padded)))?;

        self.t_extract.time(|| {
            self.network
                .extract(&outputs, self.threshold, &mut self.detections)
        })?;
        self.t_nms.time(|| self.nms.process(&mut self.detections));

        let scale = padded.width() / input_res.width() as f32;
        for det in &mut self.detections {
            det.map_out(scale, padded.x(), padded.y());
        }
        log::trace!("{} detections", self.detections.len());

        Ok(&self.detections)
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract, &self.t_nms].into_iter()
    }
}

/// A detected object: its bounding box, confidence, rotation and keypoints.
///
/// Confidences are in `0.0..=1.0` (raw scores go through [`crate::num::sigmoid`]) and weigh the
/// detection when overlapping detections are averaged.
#[derive(Debug, Clone)]
pub struct Detection {
    confidence: f32,
    angle: f32,
    rect: Rect,
    keypoints: Vec<Keypoint>,
}

impl Detection {
    pub fn new(confidence: f32, rect: Rect) -> Self {
        Self::with_keypoints(confidence, rect, Vec::new())
    }

    pub fn with_keypoints(confidence: f32, rect: Rect, keypoints: Vec<Keypoint>) -> Self {
        Self {
            confidence,
            angle: 0.0,
            rect,
            keypoints,
        }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Clockwise rotation of the object in radians; 0 for upright objects.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
    }

    /// Returns the axis-aligned box around the object.
    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Scales network input coordinates by `scale`, then offsets them by `(dx, dy)`.
    fn map_out(&mut self, scale: f32, dx: f32, dy: f32) {
        let (xc, yc) = self.rect.center();
        self.rect = Rect::from_center(
            xc * scale + dx,
            yc * scale + dy,
            self.rect.width() * scale,
            self.rect.height() * scale,
        );
        for kp in &mut self.keypoints {
            kp.x = kp.x * scale + dx;
            kp.y = kp.y * scale + dy;
        }
    }
}

/// A point of interest attached to a [`Detection`], such as a palm's wrist.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    x: f32,
    y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }
}
