//! End-to-end tests of the recognition pipeline, with stand-ins for the neural networks.

use std::{cell::RefCell, rc::Rc};

use approx::assert_relative_eq;
use handsign::classify::{Prediction, SignClassifier};
use handsign::hand::{HandLocator, LandmarkSet};
use handsign::image::{Color, Image};
use handsign::labels::LabelSet;
use handsign::nn::tensor::Tensor;
use handsign::pipeline::Pipeline;
use handsign::preprocess::PreprocessParams;
use handsign::region::BoundingBox;
use handsign::video::{FrameSource, Stills};

/// Reports the same hands in every frame.
struct FixedHands(Vec<LandmarkSet>);

impl HandLocator for FixedHands {
    fn locate(&mut self, _frame: &Image) -> anyhow::Result<Vec<LandmarkSet>> {
        Ok(self.0.clone())
    }
}

/// Returns fixed probabilities and records every input tensor.
struct FixedClassifier {
    probabilities: Vec<f32>,
    inputs: Rc<RefCell<Vec<Tensor>>>,
}

impl FixedClassifier {
    fn new(probabilities: Vec<f32>) -> (Self, Rc<RefCell<Vec<Tensor>>>) {
        let inputs = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                probabilities,
                inputs: inputs.clone(),
            },
            inputs,
        )
    }

    /// A 24-way distribution with `p` at `index` and the rest spread evenly.
    fn peaked(index: usize, p: f32) -> (Self, Rc<RefCell<Vec<Tensor>>>) {
        let rest = (1.0 - p) / 23.0;
        let probabilities = (0..24).map(|i| if i == index { p } else { rest }).collect();
        Self::new(probabilities)
    }
}

impl SignClassifier for FixedClassifier {
    fn output_width(&self) -> usize {
        self.probabilities.len()
    }

    fn classify(&mut self, input: &Tensor) -> anyhow::Result<Prediction> {
        self.inputs.borrow_mut().push(input.clone());
        Prediction::from_probabilities(&self.probabilities)
    }
}

fn black_frame(width: u32, height: u32) -> Image {
    let mut image = Image::new(width, height);
    image.clear(Color::BLACK);
    image
}

fn hand(points: &[[f32; 2]]) -> LandmarkSet {
    LandmarkSet::new(points.to_vec())
}

#[test]
fn black_frame_with_hand_inside() {
    let (classifier, inputs) = FixedClassifier::peaked(1, 0.9);
    let locator = FixedHands(vec![hand(&[[0.375, 0.375], [0.5, 0.5], [0.625, 0.625]])]);
    let mut pipeline = Pipeline::new(locator, classifier, LabelSet::default()).unwrap();

    let signs = pipeline.recognize(&black_frame(100, 100)).unwrap();
    assert_eq!(signs.len(), 1);
    let sign = &signs[0];
    assert_eq!(
        sign.bbox,
        BoundingBox {
            x_min: 7,
            y_min: 7,
            x_max: 92,
            y_max: 92,
        }
    );
    assert_eq!(sign.label, 'B');
    assert_relative_eq!(sign.confidence, 90.0, epsilon = 1e-4);
    assert_eq!(sign.mask.dimensions(), (85, 85));

    let inputs = inputs.borrow();
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0].shape(), &[1, 32, 32, 1]);
    assert!(inputs[0].as_raw_data().iter().all(|&v| v == 0.0));
}

#[test]
fn hand_at_top_left_corner() {
    let (classifier, _) = FixedClassifier::peaked(0, 0.5);
    let locator = FixedHands(vec![hand(&[[0.0, 0.0]; 21])]);
    let mut pipeline = Pipeline::new(locator, classifier, LabelSet::default()).unwrap();

    let signs = pipeline.recognize(&black_frame(100, 100)).unwrap();
    assert_eq!(signs.len(), 1);
    let bbox = signs[0].bbox;
    assert_eq!((bbox.x_min, bbox.y_min), (0, 0));
    assert_eq!((bbox.x_max, bbox.y_max), (30, 30));
    assert_eq!(signs[0].label, 'A');
}

#[test]
fn no_hands() {
    let (classifier, inputs) = FixedClassifier::peaked(0, 1.0);
    let mut pipeline = Pipeline::new(FixedHands(Vec::new()), classifier, LabelSet::default()).unwrap();

    let mut frame = black_frame(64, 48);
    let signs = pipeline.process_frame(&mut frame).unwrap();
    assert!(signs.is_empty());
    assert!(inputs.borrow().is_empty());
    assert!(frame.data().chunks(4).all(|px| px == [0, 0, 0, 255]));
}

#[test]
fn hand_beyond_bottom_edge() {
    let (classifier, inputs) = FixedClassifier::peaked(0, 1.0);
    let locator = FixedHands(vec![hand(&[[0.5, 1.5], [0.6, 1.8]])]);
    let mut pipeline = Pipeline::new(locator, classifier, LabelSet::default()).unwrap();

    let signs = pipeline.recognize(&black_frame(100, 100)).unwrap();
    assert_eq!(signs.len(), 1);
    assert_eq!(
        signs[0].bbox,
        BoundingBox {
            x_min: 20,
            y_min: 70,
            x_max: 90,
            y_max: 100,
        }
    );
    assert_eq!(inputs.borrow().len(), 1);
}

#[test]
fn degenerate_region_is_skipped() {
    let (classifier, inputs) = FixedClassifier::peaked(0, 1.0);
    let locator = FixedHands(vec![hand(&[[0.5, 0.5]])]);
    let mut pipeline = Pipeline::new(locator, classifier, LabelSet::default()).unwrap();
    pipeline.set_margin(0);

    let signs = pipeline.recognize(&black_frame(100, 100)).unwrap();
    assert!(signs.is_empty());
    assert!(inputs.borrow().is_empty());
}

#[test]
fn every_hand_is_classified() {
    let (classifier, inputs) = FixedClassifier::peaked(23, 0.4);
    let locator = FixedHands(vec![
        hand(&[[0.25, 0.25]]),
        hand(&[[0.75, 0.75]]),
        hand(&[]),
    ]);
    let mut pipeline = Pipeline::new(locator, classifier, LabelSet::default()).unwrap();

    let signs = pipeline.recognize(&black_frame(200, 200)).unwrap();
    assert_eq!(signs.len(), 2);
    assert!(signs.iter().all(|s| s.label == 'Y'));
    assert_eq!(inputs.borrow().len(), 2);
}

#[test]
fn confidence_gating() {
    let locator = || FixedHands(vec![hand(&[[0.5, 0.5]])]);

    let (classifier, _) = FixedClassifier::peaked(3, 0.05);
    let mut pipeline = Pipeline::new(locator(), classifier, LabelSet::default()).unwrap();
    let signs = pipeline.recognize(&black_frame(100, 100)).unwrap();
    assert_eq!(signs.len(), 1, "low confidence predictions are reported by default");
    assert_eq!(signs[0].label, 'D');

    let (classifier, _) = FixedClassifier::peaked(3, 0.05);
    let mut pipeline = Pipeline::new(locator(), classifier, LabelSet::default()).unwrap();
    pipeline.set_min_confidence(50.0);
    assert!(pipeline.recognize(&black_frame(100, 100)).unwrap().is_empty());
}

#[test]
fn label_width_must_match() {
    let (classifier, _) = FixedClassifier::new(vec![0.5, 0.5]);
    assert!(Pipeline::new(FixedHands(Vec::new()), classifier, LabelSet::default()).is_err());

    let (classifier, _) = FixedClassifier::new(vec![0.25, 0.75]);
    let labels = "NY".parse().unwrap();
    let mut pipeline = Pipeline::new(FixedHands(vec![hand(&[[0.5, 0.5]])]), classifier, labels)
        .unwrap();
    let signs = pipeline.recognize(&black_frame(100, 100)).unwrap();
    assert_eq!(signs[0].label, 'Y');
    assert_relative_eq!(signs[0].confidence, 75.0);
}

#[test]
fn draws_results() {
    let (classifier, _) = FixedClassifier::peaked(0, 0.99);
    let locator = FixedHands(vec![hand(&[[0.5, 0.5]])]);
    let mut pipeline = Pipeline::new(locator, classifier, LabelSet::default()).unwrap();

    let mut frame = black_frame(200, 200);
    let signs = pipeline.process_frame(&mut frame).unwrap();
    assert_eq!(signs.len(), 1);
    let bbox = signs[0].bbox;
    assert_eq!(frame.get(bbox.x_min, bbox.y_min), Color::GREEN);
    assert_eq!(frame.get(100, 100), Color::BLACK);
}

#[test]
fn stops_when_frames_run_out() {
    let (classifier, inputs) = FixedClassifier::peaked(0, 0.99);
    let locator = FixedHands(vec![hand(&[[0.5, 0.5]])]);
    let mut pipeline = Pipeline::new(locator, classifier, LabelSet::default()).unwrap();
    let mut source = Stills::new((0..3).map(|_| black_frame(80, 60)));

    let mut frames = 0;
    while let Some(mut frame) = source.read_frame().unwrap() {
        pipeline.process_frame(&mut frame).unwrap();
        frames += 1;
    }
    assert_eq!(frames, 3);
    assert_eq!(inputs.borrow().len(), 3);
}

#[test]
fn custom_preprocessing() {
    let (classifier, inputs) = FixedClassifier::peaked(0, 0.5);
    let locator = FixedHands(vec![hand(&[[0.5, 0.5]])]);
    let mut pipeline = Pipeline::new(locator, classifier, LabelSet::default()).unwrap();
    pipeline.set_preprocess_params(PreprocessParams {
        blur_kernel: 3,
        threshold: 0,
        output_size: 16,
    });

    let mut frame = Image::new(100, 100);
    frame.clear(Color::WHITE);
    let signs = pipeline.recognize(&frame).unwrap();
    assert_eq!(signs.len(), 1);

    let inputs = inputs.borrow();
    assert_eq!(inputs[0].shape(), &[1, 16, 16, 1]);
    assert!(inputs[0].as_raw_data().iter().all(|&v| v == 1.0));
}
