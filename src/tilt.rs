use crate::colorimetry::{mean, percentage};
use crate::config::{ModelSource, ModelsConfig};
use crate::error::Error;
use crate::pipeline::landmarks::indices::{CHEEK_POINTS, LEFT_POINT, LEFT_TILT_POINTS, RIGHT_POINT, RIGHT_TILT_POINTS};
use crate::pipeline::landmarks::LandmarkSet;
use crate::pipeline::model::{Inference, ModelStore, OrtModel};
use anyhow::Result;
use ndarray::Array2;
use tracing::{debug, span, warn, Level};

pub const CLASSIFIERS: [&str; 9] = ["abc", "bc", "gdc", "knc", "rfc", "svc", "mc", "sc", "vc"];

/// Symmetry measures of a face, in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TiltFeatures {
    pub horizontal_distance_difference: f64,
    pub horizontal_z_difference: f64,
    pub vertical_distance_difference: f64,
    pub percentage_distance_middlepoint_difference: f64,
}

impl TiltFeatures {
    /// Classifier input, ordered by feature name.
    pub fn to_input(&self) -> Array2<f32> {
        let values = [
            self.horizontal_distance_difference,
            self.horizontal_z_difference,
            self.percentage_distance_middlepoint_difference,
            self.vertical_distance_difference,
        ];
        Array2::from_shape_fn((1, values.len()), |(_, i)| values[i] as f32)
    }
}

/// Returns the side's distance delta and the percentage between its two
/// pairs of depth distances.
fn side_symmetry(depths: &[f64; 4]) -> (f64, f64) {
    let distances: Vec<f64> = (0..depths.len())
        .map(|i| (depths[(i + 1) % depths.len()] - depths[i]).abs())
        .collect();
    let diffs = [
        percentage(distances[0], distances[1]),
        percentage(distances[2], distances[3]),
    ];
    (diffs[1] - diffs[0], percentage(diffs[0], diffs[1]))
}

pub fn generate_features(landmarks: &LandmarkSet) -> Result<TiltFeatures> {
    let cheeks = landmarks.points(&CHEEK_POINTS)?;
    let d0 = (cheeks[1].x - cheeks[0].x) as f64;
    let d1 = (cheeks[3].x - cheeks[2].x) as f64;

    let left_z = landmarks.get(LEFT_POINT)?.z;
    let right_z = landmarks.get(RIGHT_POINT)?.z;

    let chain = |idxs: &[usize; 4]| -> Result<[f64; 4]> {
        let mut depths = [0.; 4];
        for (depth, &i) in depths.iter_mut().zip(idxs) {
            *depth = landmarks.get(i)?.z;
        }
        Ok(depths)
    };
    let left = side_symmetry(&chain(&LEFT_TILT_POINTS)?);
    let right = side_symmetry(&chain(&RIGHT_TILT_POINTS)?);

    Ok(TiltFeatures {
        horizontal_distance_difference: percentage(d0, d1).ceil(),
        horizontal_z_difference: percentage(left_z, right_z).ceil(),
        vertical_distance_difference: percentage(left.0, right.0).ceil(),
        percentage_distance_middlepoint_difference: mean(&[left.1, right.1]).unwrap_or(0.).ceil(),
    })
}

/// Majority label, ties going to the label seen first.
fn majority(labels: &[i64]) -> Option<i64> {
    let mut best: Option<(i64, usize)> = None;
    for &label in labels {
        let count = labels.iter().filter(|&&l| l == label).count();
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((label, count));
        }
    }
    best.map(|(label, _)| label)
}

pub struct TiltClassifier {
    models: Vec<(String, Box<dyn Inference>)>,
    forward_label: i64,
}

impl TiltClassifier {
    pub fn new(models: Vec<(String, Box<dyn Inference>)>, forward_label: i64) -> TiltClassifier {
        TiltClassifier { models, forward_label }
    }

    /// Loads the classifier ensemble, leaving out the ones that cannot be
    /// fetched or opened.
    pub fn load(store: &ModelStore, config: &ModelsConfig, forward_label: i64) -> Result<TiltClassifier> {
        let mut models: Vec<(String, Box<dyn Inference>)> = vec![];
        for name in CLASSIFIERS {
            let file = format!("tilt_learning_{name}_model.onnx");
            let source = ModelSource {
                url: config.tilt_url_base.as_ref().map(|base| format!("{}/{file}", base.trim_end_matches('/'))),
                file,
            };

            match store.ensure(&source).and_then(|path| OrtModel::load(&path, config.threads)) {
                Ok(model) => models.push((name.to_string(), Box::new(model) as Box<dyn Inference>)),
                Err(e) => warn!("Skipping tilt classifier {name}: {e}"),
            }
        }

        if models.is_empty() {
            return Err(Error::Config("no tilt classifier could be loaded".to_string()).into());
        }
        Ok(TiltClassifier::new(models, forward_label))
    }

    pub fn predict(&self, features: &TiltFeatures) -> Result<i64> {
        let span = span!(Level::DEBUG, "tilt_learning");
        let _guard = span.enter();

        let input = features.to_input().into_dyn();
        let mut labels = Vec::with_capacity(self.models.len());
        for (name, model) in &self.models {
            let label = model.infer(input.clone()).and_then(|outputs| {
                outputs
                    .first()
                    .and_then(|o| o.iter().next().copied())
                    .map(|v| v.round() as i64)
                    .ok_or_else(|| Error::Geometry(format!("classifier {name} returned no label")).into())
            });
            match label {
                Ok(label) => labels.push(label),
                Err(e) => warn!("Tilt classifier {name} failed: {e}"),
            }
        }
        debug!("Tilt votes: {labels:?}");

        majority(&labels).ok_or_else(|| Error::Geometry("no tilt classifier produced a vote".to_string()).into())
    }

    pub fn looks_forward(&self, features: &TiltFeatures) -> Result<bool> {
        Ok(self.predict(features)? == self.forward_label)
    }
}
