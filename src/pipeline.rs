//! The per-frame recognition pipeline.
//!
//! [`Pipeline`] owns the hand locator, the classifier and their settings. It is created once and
//! then invoked for every frame; no state is carried from one frame to the next.

use anyhow::anyhow;
use image::GrayImage;

use crate::classify::{CnnClassifier, SignClassifier};
use crate::config::Config;
use crate::hand::{HandLocator, PalmLandmarkLocator};
use crate::image::Image;
use crate::labels::LabelSet;
use crate::preprocess::{self, PreprocessParams};
use crate::region::{BoundingBox, DEFAULT_MARGIN};
use crate::render;
use crate::timer::Timer;

/// A recognized hand sign.
#[derive(Debug, Clone)]
pub struct Sign {
    /// Location of the hand in the frame.
    pub bbox: BoundingBox,
    /// The recognized symbol.
    pub label: char,
    /// Classifier confidence in percent.
    pub confidence: f32,
    /// The thresholded hand image the classifier's input was computed from.
    pub mask: GrayImage,
}

/// Detects, crops, preprocesses, classifies and renders hand signs.
pub struct Pipeline {
    locator: Box<dyn HandLocator>,
    classifier: Box<dyn SignClassifier>,
    labels: LabelSet,
    params: PreprocessParams,
    margin: u32,
    min_confidence: f32,
    t_detect: Timer,
    t_crop: Timer,
    t_preprocess: Timer,
    t_classify: Timer,
    t_render: Timer,
}

impl Pipeline {
    /// Creates a pipeline from its parts.
    ///
    /// Returns an error if `labels` does not have exactly one symbol per classifier output.
    pub fn new<L, C>(locator: L, classifier: C, labels: LabelSet) -> anyhow::Result<Self>
    where
        L: HandLocator + 'static,
        C: SignClassifier + 'static,
    {
        labels.check_width(classifier.output_width())?;
        Ok(Self {
            locator: Box::new(locator),
            classifier: Box::new(classifier),
            labels,
            params: PreprocessParams::default(),
            margin: DEFAULT_MARGIN,
            min_confidence: 0.0,
            t_detect: Timer::new("detect"),
            t_crop: Timer::new("crop"),
            t_preprocess: Timer::new("preprocess"),
            t_classify: Timer::new("classify"),
            t_render: Timer::new("render"),
        })
    }

    /// Loads the networks named by `config` and creates a pipeline using them.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let mut locator = PalmLandmarkLocator::load(config.palm_model(), config.landmark_model())?;
        locator.set_detection_threshold(config.detection_threshold());
        locator.set_max_hands(config.max_hands());
        let classifier = CnnClassifier::load(config.classifier_model())?;

        let mut this = Self::new(locator, classifier, config.labels().clone())?;
        this.set_margin(config.margin());
        this.set_min_confidence(config.min_confidence());
        Ok(this)
    }

    /// Sets the margin (in pixels) added around each hand's landmarks.
    pub fn set_margin(&mut self, margin: u32) {
        self.margin = margin;
    }

    /// Sets the minimum confidence (in percent) for a sign to be reported.
    pub fn set_min_confidence(&mut self, min_confidence: f32) {
        self.min_confidence = min_confidence;
    }

    pub fn set_preprocess_params(&mut self, params: PreprocessParams) {
        self.params = params;
    }

    /// Recognizes the hand signs in `frame`, without modifying it.
    pub fn recognize(&mut self, frame: &Image) -> anyhow::Result<Vec<Sign>> {
        let hands = self.t_detect.time(|| self.locator.locate(frame))?;

        let mut signs = Vec::with_capacity(hands.len());
        for landmarks in &hands {
            let Some(bbox) = BoundingBox::around(landmarks, frame.resolution(), self.margin) else {
                continue;
            };
            let Some(crop) = self.t_crop.time(|| bbox.crop(frame)) else {
                log::debug!("skipping degenerate hand region {:?}", bbox);
                continue;
            };

            let pre = self
                .t_preprocess
                .time(|| preprocess::preprocess(&crop, &self.params))?;
            let prediction = self.t_classify.time(|| self.classifier.classify(&pre.tensor))?;
            let label = self.labels.get(prediction.index()).ok_or_else(|| {
                anyhow!(
                    "classifier output {} has no label in {}",
                    prediction.index(),
                    self.labels
                )
            })?;

            if prediction.confidence() < self.min_confidence {
                log::trace!(
                    "ignoring '{}' at {:?}: confidence {:.2}% below {:.2}%",
                    label,
                    bbox,
                    prediction.confidence(),
                    self.min_confidence,
                );
                continue;
            }

            signs.push(Sign {
                bbox,
                label,
                confidence: prediction.confidence(),
                mask: pre.mask,
            });
        }

        Ok(signs)
    }

    /// Recognizes the hand signs in `frame` and draws them onto it.
    pub fn process_frame(&mut self, frame: &mut Image) -> anyhow::Result<Vec<Sign>> {
        let signs = self.recognize(frame)?;
        self.t_render.time(|| {
            for sign in &signs {
                render::draw_sign(frame, &sign.bbox, sign.label, sign.confidence);
            }
        });
        Ok(signs)
    }

    /// Returns the per-stage timers, followed by the hand locator's timers.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [
            &self.t_detect,
            &self.t_crop,
            &self.t_preprocess,
            &self.t_classify,
            &self.t_render,
        ]
        .into_iter()
        .chain(self.locator.timers())
    }
}
