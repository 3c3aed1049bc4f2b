//! Immutable planner configuration.
//!
//! A `PlannerConfig` is fully constructed before a run starts and never
//! mutated afterwards; everything derived per period lives in
//! [`crate::context::PeriodContext`]. The config is serializable so runs
//! are reproducible, and `config_id()` gives a content hash for log lines
//! and model version descriptions.

use demandcast_core::ports::TrainSpec;
use demandcast_core::routing::{AttributeFilter, RoutePredicate};
use demandcast_core::segmentation::SegmentThresholds;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Content-addressable identifier of a configuration.
pub type ConfigId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Window lengths of a planning run, in months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Windows {
    /// Demand history pulled for training and fallbacks.
    pub history_months: u32,
    /// Trailing window the segment metrics are computed over.
    pub segmentation_months: u32,
    /// Forecast horizon.
    pub horizon_months: u32,
    /// Sales-recency window deciding moving-average vs zero fallback;
    /// also the moving-average buffer size.
    pub recency_months: u32,
}

impl Default for Windows {
    fn default() -> Self {
        Self {
            history_months: 36,
            segmentation_months: 12,
            horizon_months: 18,
            recency_months: 12,
        }
    }
}

/// Settings of the trainable model and its registry bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Registered model name.
    pub name: String,
    /// Version label key carrying the planning-month tag.
    pub version_label_key: String,
    /// Sub-model selector for prediction, retried without on failure.
    pub selector: Option<String>,
    pub eval_metric: String,
    pub time_limit_secs: u64,
    /// Backend-specific hyperparameters, passed through opaquely.
    pub hyperparameters: BTreeMap<String, serde_json::Value>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            name: "demand-planner".into(),
            version_label_key: "planning-month".into(),
            selector: Some("best_quality".into()),
            eval_metric: "WQL".into(),
            time_limit_secs: 3600,
            hyperparameters: BTreeMap::new(),
        }
    }
}

/// Where the business-owned master list lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceLocation {
    pub container: String,
    pub path: String,
    pub sheet: String,
}

impl Default for ReferenceLocation {
    fn default() -> Self {
        Self {
            container: "reference".into(),
            path: "master_list".into(),
            sheet: "materials".into(),
        }
    }
}

/// How the simulation driver reacts to a failed month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Abort the backtest on the first failed month.
    FailFast,
    /// Record the failure and continue with the next month.
    FailIsolated,
}

/// Immutable configuration of a planning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Product classification the run plans for.
    pub classification: String,
    /// Legal entity filter.
    pub company: String,
    /// Units of measure admitted into the run.
    pub uom_filter: Vec<String>,
    /// How the simulation driver reacts to a failed month.
    pub failure_mode: FailureMode,
    pub windows: Windows,
    pub thresholds: SegmentThresholds,
    /// Segment predicate routing entities to the model path.
    pub forecastable: RoutePredicate,
    pub model: ModelSettings,
    pub reference: ReferenceLocation,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            classification: "CEMENT".into(),
            company: "6012".into(),
            uom_filter: vec!["BAG".into()],
            failure_mode: FailureMode::FailFast,
            windows: Windows::default(),
            thresholds: SegmentThresholds::default(),
            forecastable: RoutePredicate::default(),
            model: ModelSettings::default(),
            reference: ReferenceLocation::default(),
        }
    }
}

impl PlannerConfig {
    /// Load from a TOML file; missing fields take their defaults through
    /// serde only where the type itself defaults, so files are explicit.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Deterministic content hash of the configuration.
    pub fn config_id(&self) -> ConfigId {
        let json = serde_json::to_vec(self).expect("config serialization is infallible");
        blake3::hash(&json).to_hex().to_string()
    }

    /// Attribute filters applied before monthly aggregation.
    pub fn attribute_filters(&self) -> Vec<AttributeFilter> {
        vec![
            AttributeFilter::new("classification", [self.classification.clone()]),
            AttributeFilter::new("company", [self.company.clone()]),
            AttributeFilter::new("uom", self.uom_filter.clone()),
        ]
    }

    /// Training parameters for the predictor backend.
    pub fn train_spec(&self) -> TrainSpec {
        TrainSpec {
            horizon: self.windows.horizon_months,
            quantile_levels: demandcast_core::domain::QUANTILE_LEVELS.to_vec(),
            time_limit_secs: self.model.time_limit_secs,
            eval_metric: self.model.eval_metric.clone(),
            hyperparameters: self.model.hyperparameters.clone(),
        }
    }
}
