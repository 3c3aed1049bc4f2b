//! Deterministic baseline predictor.
//!
//! A stand-in for the external training service so the pipeline, CLI, and
//! tests run fully offline. The "model" is the recency-window mean per
//! entity, spread across quantile levels by fixed scale factors, with the
//! fitted means persisted as a JSON artifact.

use demandcast_core::features::{FeatureFrame, FutureRow};
use demandcast_core::ports::{ModelHandle, PredictError, Predictor, QuantileRow, TrainSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// Scale applied to the window mean per quantile level.
const QUANTILE_SCALES: [f64; 5] = [0.60, 0.85, 1.0, 1.15, 1.40];

#[derive(Debug, Serialize, Deserialize)]
struct Artifact {
    window: usize,
    /// Window mean per canonical entity id.
    means: BTreeMap<String, f64>,
}

/// Quantile forecaster predicting the scaled recency-window mean.
pub struct WindowMeanPredictor {
    window: usize,
    artifact_dir: PathBuf,
}

impl WindowMeanPredictor {
    pub fn new(window: usize, artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            window: window.max(1),
            artifact_dir: artifact_dir.into(),
        }
    }

    fn window_means(&self, frame: &FeatureFrame) -> BTreeMap<String, f64> {
        // Frame rows are grouped per entity in month order.
        let mut targets: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for row in &frame.rows {
            targets.entry(row.key.canonical()).or_default().push(row.target);
        }
        targets
            .into_iter()
            .map(|(id, values)| {
                let tail = &values[values.len().saturating_sub(self.window)..];
                let mean = if tail.is_empty() {
                    0.0
                } else {
                    tail.iter().sum::<f64>() / tail.len() as f64
                };
                (id, mean)
            })
            .collect()
    }
}

impl Predictor for WindowMeanPredictor {
    fn fit(&self, frame: &FeatureFrame, _spec: &TrainSpec) -> Result<ModelHandle, PredictError> {
        let artifact = Artifact {
            window: self.window,
            means: self.window_means(frame),
        };
        let json = serde_json::to_vec_pretty(&artifact)
            .map_err(|e| PredictError::Train(format!("artifact serialization: {e}")))?;
        let version = blake3::hash(&json).to_hex().to_string()[..12].to_string();

        fs::create_dir_all(&self.artifact_dir)
            .map_err(|e| PredictError::Train(format!("artifact dir: {e}")))?;
        let path = self.artifact_dir.join(format!("window_mean_{version}.json"));
        fs::write(&path, json).map_err(|e| PredictError::Train(format!("artifact write: {e}")))?;

        Ok(ModelHandle {
            name: "window-mean".into(),
            version,
            artifact_uri: path.display().to_string(),
        })
    }

    fn predict(
        &self,
        handle: &ModelHandle,
        frame: &FeatureFrame,
        future: &[FutureRow],
        _selector: Option<&str>,
    ) -> Result<Vec<QuantileRow>, PredictError> {
        // Prefer the fitted artifact; entities it never saw fall back to
        // the means of the prediction frame.
        let fitted: BTreeMap<String, f64> = match fs::read(&handle.artifact_uri) {
            Ok(bytes) => {
                let artifact: Artifact = serde_json::from_slice(&bytes)
                    .map_err(|e| PredictError::Artifact(format!("artifact parse: {e}")))?;
                artifact.means
            }
            Err(_) => BTreeMap::new(),
        };
        let fallback = self.window_means(frame);

        Ok(future
            .iter()
            .map(|row| {
                let id = row.key.canonical();
                let mean = fitted
                    .get(&id)
                    .or_else(|| fallback.get(&id))
                    .copied()
                    .unwrap_or(0.0);
                QuantileRow {
                    key: row.key.clone(),
                    month: row.month,
                    values: QUANTILE_SCALES.map(|s| s * mean),
                }
            })
            .collect())
    }
}
