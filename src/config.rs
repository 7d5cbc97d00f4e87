//! Application configuration.
//!
//! [`Config::from_env`] reads the following environment variables. All of them are optional.
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `HANDSIGN_CLASSIFIER` | Classifier ONNX file | `models/asl_cnn_model.onnx` |
//! | `HANDSIGN_PALM_MODEL` | Palm detection ONNX file | `models/palm_detection_full.onnx` |
//! | `HANDSIGN_LANDMARK_MODEL` | Hand landmark ONNX file | `models/hand_landmark_full.onnx` |
//! | `HANDSIGN_LABELS` | Label symbols, in classifier output order | `ABCDEFGHIKLMNOPQRSTUVWXY` |
//! | `HANDSIGN_MIN_CONFIDENCE` | Minimum confidence (percent) for a sign to be shown | `0` |
//! | `HANDSIGN_DETECTION_THRESHOLD` | Minimum palm detection confidence (`0.0..=1.0`) | `0.7` |
//! | `HANDSIGN_MAX_HANDS` | Maximum number of hands per frame | `1` |
//! | `HANDSIGN_MARGIN` | Bounding box margin in pixels | `30` |
//! | `HANDSIGN_WEBCAM_NAME` | Name of the webcam to open | first supported device |
//! | `HANDSIGN_JPEG_BACKEND` | `zune-jpeg` or `jpeg-decoder` | `zune-jpeg` |

use std::{
    env::{self, VarError},
    fmt::Display,
    path::PathBuf,
    str::FromStr,
};

use anyhow::{anyhow, bail, Context};

use crate::hand::PalmLandmarkLocator;
use crate::image::JpegBackend;
use crate::labels::LabelSet;
use crate::region::DEFAULT_MARGIN;

const VAR_CLASSIFIER: &str = "HANDSIGN_CLASSIFIER";
const VAR_PALM_MODEL: &str = "HANDSIGN_PALM_MODEL";
const VAR_LANDMARK_MODEL: &str = "HANDSIGN_LANDMARK_MODEL";
const VAR_LABELS: &str = "HANDSIGN_LABELS";
const VAR_MIN_CONFIDENCE: &str = "HANDSIGN_MIN_CONFIDENCE";
const VAR_DETECTION_THRESHOLD: &str = "HANDSIGN_DETECTION_THRESHOLD";
const VAR_MAX_HANDS: &str = "HANDSIGN_MAX_HANDS";
const VAR_MARGIN: &str = "HANDSIGN_MARGIN";
const VAR_WEBCAM_NAME: &str = "HANDSIGN_WEBCAM_NAME";
const VAR_JPEG_BACKEND: &str = "HANDSIGN_JPEG_BACKEND";

/// Runtime configuration of the recognizer.
#[derive(Debug, Clone)]
pub struct Config {
    classifier_model: PathBuf,
    palm_model: PathBuf,
    landmark_model: PathBuf,
    labels: LabelSet,
    min_confidence: f32,
    detection_threshold: f32,
    max_hands: usize,
    margin: u32,
    webcam_name: Option<String>,
    jpeg_backend: JpegBackend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            classifier_model: "models/asl_cnn_model.onnx".into(),
            palm_model: "models/palm_detection_full.onnx".into(),
            landmark_model: "models/hand_landmark_full.onnx".into(),
            labels: LabelSet::default(),
            min_confidence: 0.0,
            detection_threshold: PalmLandmarkLocator::DEFAULT_DETECTION_THRESHOLD,
            max_hands: PalmLandmarkLocator::DEFAULT_MAX_HANDS,
            margin: DEFAULT_MARGIN,
            webcam_name: None,
            jpeg_backend: JpegBackend::default(),
        }
    }
}

impl Config {
    /// Creates the default configuration, overridden by any `HANDSIGN_*` environment variables.
    ///
    /// Returns an error naming the variable if a value cannot be parsed or is out of range.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name))
    }

    fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let var = |name: &str| -> anyhow::Result<Option<String>> {
            match lookup(name) {
                Ok(value) => {
                    log::debug!("`{name}` is set to '{value}'");
                    Ok(Some(value))
                }
                Err(VarError::NotPresent) => Ok(None),
                Err(VarError::NotUnicode(s)) => {
                    bail!("invalid value set for `{name}` variable: {s:?}")
                }
            }
        };
        let parsed = |name: &str| -> anyhow::Result<Option<_>> {
            var(name)?
                .map(|value| parse_var(name, &value))
                .transpose()
        };

        let mut config = Self::default();
        if let Some(path) = var(VAR_CLASSIFIER)? {
            config = config.with_classifier_model(path);
        }
        if let Some(path) = var(VAR_PALM_MODEL)? {
            config = config.with_palm_model(path);
        }
        if let Some(path) = var(VAR_LANDMARK_MODEL)? {
            config = config.with_landmark_model(path);
        }
        if let Some(labels) = var(VAR_LABELS)? {
            let labels = labels
                .parse()
                .with_context(|| format!("invalid value set for `{VAR_LABELS}` variable"))?;
            config = config.with_labels(labels);
        }
        if let Some(min) = parsed(VAR_MIN_CONFIDENCE)? {
            check_range(VAR_MIN_CONFIDENCE, min, 0.0, 100.0)?;
            config = config.with_min_confidence(min);
        }
        if let Some(threshold) = parsed(VAR_DETECTION_THRESHOLD)? {
            check_range(VAR_DETECTION_THRESHOLD, threshold, 0.0, 1.0)?;
            config = config.with_detection_threshold(threshold);
        }
        if let Some(max_hands) = var(VAR_MAX_HANDS)? {
            config = config.with_max_hands(parse_var(VAR_MAX_HANDS, &max_hands)?);
        }
        if let Some(margin) = var(VAR_MARGIN)? {
            config = config.with_margin(parse_var(VAR_MARGIN, &margin)?);
        }
        if let Some(name) = var(VAR_WEBCAM_NAME)? {
            config = config.with_webcam_name(name);
        }
        if let Some(backend) = var(VAR_JPEG_BACKEND)? {
            config = config.with_jpeg_backend(parse_var(VAR_JPEG_BACKEND, &backend)?);
        }

        Ok(config)
    }

    pub fn with_classifier_model(self, path: impl Into<PathBuf>) -> Self {
        Self {
            classifier_model: path.into(),
            ..self
        }
    }

    pub fn with_palm_model(self, path: impl Into<PathBuf>) -> Self {
        Self {
            palm_model: path.into(),
            ..self
        }
    }

    pub fn with_landmark_model(self, path: impl Into<PathBuf>) -> Self {
        Self {
            landmark_model: path.into(),
            ..self
        }
    }

    pub fn with_labels(self, labels: LabelSet) -> Self {
        Self { labels, ..self }
    }

    /// Sets the minimum classifier confidence (in percent) for a sign to be reported.
    ///
    /// The default of 0 reports every prediction.
    pub fn with_min_confidence(self, min_confidence: f32) -> Self {
        Self {
            min_confidence,
            ..self
        }
    }

    pub fn with_detection_threshold(self, detection_threshold: f32) -> Self {
        Self {
            detection_threshold,
            ..self
        }
    }

    pub fn with_max_hands(self, max_hands: usize) -> Self {
        Self { max_hands, ..self }
    }

    pub fn with_margin(self, margin: u32) -> Self {
        Self { margin, ..self }
    }

    /// Selects the webcam to open by its device name.
    pub fn with_webcam_name(self, name: impl Into<String>) -> Self {
        Self {
            webcam_name: Some(name.into()),
            ..self
        }
    }

    pub fn with_jpeg_backend(self, jpeg_backend: JpegBackend) -> Self {
        Self {
            jpeg_backend,
            ..self
        }
    }

    pub fn classifier_model(&self) -> &PathBuf {
        &self.classifier_model
    }

    pub fn palm_model(&self) -> &PathBuf {
        &self.palm_model
    }

    pub fn landmark_model(&self) -> &PathBuf {
        &self.landmark_model
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    pub fn detection_threshold(&self) -> f32 {
        self.detection_threshold
    }

    pub fn max_hands(&self) -> usize {
        self.max_hands
    }

    pub fn margin(&self) -> u32 {
        self.margin
    }

    pub fn webcam_name(&self) -> Option<&str> {
        self.webcam_name.as_deref()
    }

    pub fn jpeg_backend(&self) -> JpegBackend {
        self.jpeg_backend
    }
}

fn parse_var<T>(name: &str, value: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow!("invalid value set for `{name}` variable: '{value}' ({e})"))
}

fn check_range(name: &str, value: f32, min: f32, max: f32) -> anyhow::Result<()> {
    if !(min..=max).contains(&value) {
        bail!("`{name}` must be between {min} and {max}, got {value}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars = vars
            .iter()
            .map(|&(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        Config::from_lookup(|name| vars.get(name).cloned().ok_or(VarError::NotPresent))
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(
            config.classifier_model(),
            &PathBuf::from("models/asl_cnn_model.onnx")
        );
        assert_eq!(config.labels(), &LabelSet::default());
        assert_eq!(config.min_confidence(), 0.0);
        assert_eq!(config.detection_threshold(), 0.7);
        assert_eq!(config.max_hands(), 1);
        assert_eq!(config.margin(), 30);
        assert_eq!(config.webcam_name(), None);
        assert_eq!(config.jpeg_backend(), JpegBackend::ZuneJpeg);
    }

    #[test]
    fn overrides() {
        let config = config(&[
            (VAR_CLASSIFIER, "/tmp/cnn.onnx"),
            (VAR_LABELS, "XYZ"),
            (VAR_MIN_CONFIDENCE, "42.5"),
            (VAR_DETECTION_THRESHOLD, "0.5"),
            (VAR_MAX_HANDS, " 2 "),
            (VAR_MARGIN, "12"),
            (VAR_WEBCAM_NAME, "Integrated Camera"),
            (VAR_JPEG_BACKEND, "jpeg-decoder"),
        ])
        .unwrap();
        assert_eq!(config.classifier_model(), &PathBuf::from("/tmp/cnn.onnx"));
        assert_eq!(config.labels().to_string(), "XYZ");
        assert_eq!(config.min_confidence(), 42.5);
        assert_eq!(config.detection_threshold(), 0.5);
        assert_eq!(config.max_hands(), 2);
        assert_eq!(config.margin(), 12);
        assert_eq!(config.webcam_name(), Some("Integrated Camera"));
        assert_eq!(config.jpeg_backend(), JpegBackend::JpegDecoder);
    }

    #[test]
    fn errors_name_variable() {
        for (name, value) in [
            (VAR_MARGIN, "-3"),
            (VAR_MAX_HANDS, "lots"),
            (VAR_MIN_CONFIDENCE, "101"),
            (VAR_DETECTION_THRESHOLD, "nan"),
            (VAR_JPEG_BACKEND, "mozjpeg"),
            (VAR_LABELS, "AA"),
        ] {
            let err = config(&[(name, value)]).unwrap_err();
            assert!(format!("{err:#}").contains(name), "{err:#}");
        }
    }
}
