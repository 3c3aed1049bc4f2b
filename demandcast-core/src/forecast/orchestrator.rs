//! Forecast orchestration across the three strategies.

use crate::calendar::add_months;
use crate::domain::{
    EntityKey, ForecastRecord, LoadStamp, Quantiles, SegmentLabel, SeriesPoint, Strategy,
};
use crate::features::{build_frame, future_frame};
use crate::forecast::moving_average;
use crate::ports::{ModelHandle, PredictError, Predictor};
use crate::routing::{KnownPartition, RoutedPopulation};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error(transparent)]
    Predict(#[from] PredictError),
}

/// Caller-forced row flags; `None` derives the flag from the populations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlagOverrides {
    pub has_recent_sales: Option<bool>,
    pub is_forecastable: Option<bool>,
    pub is_known: Option<bool>,
    pub is_active: Option<bool>,
}

/// Runs the routed populations through their strategies and assembles the
/// unified forecast output.
///
/// The forecastable population goes to the trained model. The fallback
/// population splits on recent sales: entities with a sale inside the
/// trailing recency window get the recursive moving average, the rest get
/// zeros. Paths with empty populations are skipped, and an empty universe
/// yields an empty result, not an error.
pub struct Orchestrator<'a> {
    pub predictor: &'a dyn Predictor,
    pub model: &'a ModelHandle,
    /// Sub-model to predict with; on failure the call is retried once
    /// without it. A failure of the retry is fatal for the run.
    pub selector: Option<&'a str>,
    pub horizon: u32,
    /// Sales-recency window length in months; also the moving-average
    /// buffer size.
    pub recency_months: u32,
    pub stamp: LoadStamp,
    pub overrides: FlagOverrides,
}

impl Orchestrator<'_> {
    pub fn run(
        &self,
        points: &[SeriesPoint],
        labels: &[SegmentLabel],
        routed: &RoutedPopulation,
        partition: &KnownPartition,
    ) -> Result<Vec<ForecastRecord>, ForecastError> {
        let Some(last) = points.iter().map(|p| p.month).max() else {
            return Ok(Vec::new());
        };

        // Month-sorted dense values per entity.
        let mut per_entity: BTreeMap<String, (EntityKey, BTreeMap<NaiveDate, f64>)> =
            BTreeMap::new();
        for p in points {
            let entry = per_entity
                .entry(p.key.canonical())
                .or_insert_with(|| (p.key.clone(), BTreeMap::new()));
            *entry.1.entry(p.month).or_insert(0.0) += p.qty;
        }

        // Strict boundary: only sales after `last - (W - 1)` months count
        // as recent.
        let boundary = add_months(last, -(self.recency_months as i32 - 1));
        let recent: BTreeSet<String> = per_entity
            .iter()
            .filter(|(_, (_, by_month))| {
                by_month.iter().any(|(m, qty)| *m > boundary && *qty > 0.0)
            })
            .map(|(canonical, _)| canonical.clone())
            .collect();

        let known: BTreeSet<String> = partition
            .known_active
            .iter()
            .chain(&partition.known_inactive)
            .map(|k| k.canonical())
            .collect();
        let active: BTreeSet<String> = partition
            .known_active
            .iter()
            .chain(&partition.unknown)
            .map(|k| k.canonical())
            .collect();

        let flags = |key: &EntityKey, forecastable: bool| {
            let canonical = key.canonical();
            (
                self.overrides
                    .has_recent_sales
                    .unwrap_or_else(|| recent.contains(&canonical)),
                self.overrides.is_forecastable.unwrap_or(forecastable),
                self.overrides.is_known.unwrap_or_else(|| known.contains(&canonical)),
                self.overrides.is_active.unwrap_or_else(|| active.contains(&canonical)),
            )
        };

        let mut out = Vec::new();

        // Model path.
        if !routed.forecastable.is_empty() {
            let wanted: BTreeSet<String> =
                routed.forecastable.iter().map(|k| k.canonical()).collect();
            let model_points: Vec<SeriesPoint> = points
                .iter()
                .filter(|p| wanted.contains(&p.key.canonical()))
                .cloned()
                .collect();
            let frame = build_frame(&model_points, labels, self.horizon);
            let future = future_frame(&frame, self.horizon);
            let rows = match self.predictor.predict(self.model, &frame, &future, self.selector) {
                Ok(rows) => rows,
                Err(err) if self.selector.is_some() => {
                    warn!(error = %err, "prediction with model selector failed, retrying without");
                    self.predictor.predict(self.model, &frame, &future, None)?
                }
                Err(err) => return Err(err.into()),
            };
            info!(entities = routed.forecastable.len(), rows = rows.len(), "model path done");
            for row in rows {
                let (recent, forecastable, known, active) = flags(&row.key, true);
                out.push(ForecastRecord {
                    key: row.key,
                    month: row.month,
                    quantiles: Quantiles::from_raw(row.values),
                    strategy: Strategy::Model,
                    has_recent_sales: recent,
                    is_forecastable: forecastable,
                    is_known: known,
                    is_active: active,
                    stamp: self.stamp,
                });
            }
        }

        // Fallback paths.
        for key in &routed.fallback {
            let canonical = key.canonical();
            let (has_recent, forecastable, is_known, is_active) = flags(key, false);
            let strategy = if has_recent {
                Strategy::MovingAverage
            } else {
                Strategy::Zero
            };
            let values: Vec<i64> = match strategy {
                Strategy::MovingAverage => {
                    let history: Vec<f64> = per_entity
                        .get(&canonical)
                        .map(|(_, by_month)| by_month.values().copied().collect())
                        .unwrap_or_default();
                    moving_average::project(&history, self.recency_months as usize, self.horizon)
                }
                _ => vec![0; self.horizon as usize],
            };
            for (step, value) in values.into_iter().enumerate() {
                out.push(ForecastRecord {
                    key: key.clone(),
                    month: add_months(last, step as i32 + 1),
                    quantiles: Quantiles::flat(value),
                    strategy,
                    has_recent_sales: has_recent,
                    is_forecastable: forecastable,
                    is_known,
                    is_active,
                    stamp: self.stamp,
                });
            }
        }

        Ok(out)
    }
}
