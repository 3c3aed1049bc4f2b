//! Trainable quantile predictor capability.

use crate::domain::EntityKey;
use crate::features::{FeatureFrame, FutureRow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Training parameters handed to the predictor backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainSpec {
    pub horizon: u32,
    pub quantile_levels: Vec<f64>,
    pub time_limit_secs: u64,
    pub eval_metric: String,
    /// Backend-specific hyperparameters, passed through opaquely.
    pub hyperparameters: BTreeMap<String, serde_json::Value>,
}

/// Reference to a fitted model artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelHandle {
    pub name: String,
    pub version: String,
    pub artifact_uri: String,
}

/// Raw quantile output for one (entity, month), in quantile-level order.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantileRow {
    pub key: EntityKey,
    pub month: NaiveDate,
    pub values: [f64; 5],
}

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("training failed: {0}")]
    Train(String),
    #[error("prediction failed: {0}")]
    Predict(String),
    #[error("model artifact unavailable: {0}")]
    Artifact(String),
}

/// A trainable quantile forecaster.
///
/// `selector` names the single sub-model to predict with; backends that do
/// not recognize it may reject the call, which the orchestrator retries
/// once without a selector.
pub trait Predictor: Send + Sync {
    fn fit(&self, frame: &FeatureFrame, spec: &TrainSpec) -> Result<ModelHandle, PredictError>;

    fn predict(
        &self,
        handle: &ModelHandle,
        frame: &FeatureFrame,
        future: &[FutureRow],
        selector: Option<&str>,
    ) -> Result<Vec<QuantileRow>, PredictError>;
}
