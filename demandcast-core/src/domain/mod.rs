//! Domain types: entity identity, series rows, segment labels, forecast
//! and monitoring schemas, model versions.

mod forecast;
mod key;
mod monitor;
mod segment;
mod series;

pub use forecast::{ForecastRecord, LoadStamp, Quantiles, Strategy, QUANTILE_LEVELS};
pub use key::EntityKey;
pub use monitor::{MonitoringRecord, QuantileErrors};
pub use segment::{AbcClass, FsnClass, SegmentLabel, XyzClass};
pub use series::{DemandRecord, SeriesPoint};

use serde::{Deserialize, Serialize};

/// One registered version of the trainable forecasting model.
///
/// One version is produced per calendar month and reused across replays of
/// the same month; `label_value` carries the `vYYYYMM` month tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub name: String,
    pub label_key: String,
    pub label_value: String,
    pub artifact_uri: String,
}
