//! The existence-gated planning pipeline for one period.
//!
//! Every external touchpoint is guarded: missing inputs downgrade the run
//! to a graceful skip, an already-loaded period is read back instead of
//! recomputed, and tables are created on first use. Only genuine backend
//! failures surface as errors.

use crate::config::PlannerConfig;
use crate::context::PeriodContext;
use demandcast_core::calendar::add_months;
use demandcast_core::domain::{EntityKey, ForecastRecord, SegmentLabel, SeriesPoint};
use demandcast_core::features::build_frame;
use demandcast_core::forecast::{FlagOverrides, ForecastError, Orchestrator};
use demandcast_core::monitor::monitor;
use demandcast_core::ports::{
    ModelHandle, ModelRegistry, PartitionSpec, PlanningStore, PredictError, Predictor,
    ReferenceStore, RegisterSpec, Registration, RegistryError, StoreError, Table, TableProbe,
    WriteMode,
};
use demandcast_core::preparation::{complete_months, monthly_series, prepare};
use demandcast_core::routing::{split_forecastable, split_known, RoutedPopulation};
use demandcast_core::segmentation::segment;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Forecast(#[from] ForecastError),
    #[error(transparent)]
    Train(#[from] PredictError),
}

/// What happened on the forecast side of a period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForecastStage {
    /// Demand table missing or unreachable; nothing to plan from.
    SkippedNoDemand,
    /// Master list missing; the known/unknown split is impossible.
    SkippedNoMasterList,
    /// The period was already loaded; rows were read back, not recomputed.
    AlreadyLoaded { rows: usize },
    /// Forecasts were generated and appended.
    Generated { rows: usize, trained: bool },
}

/// What happened on the monitoring side of a period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorStage {
    /// Skipped because the forecast side had no inputs.
    Skipped,
    /// Monitoring for this period already exists.
    AlreadyLoaded,
    /// No stored batch became observable this period.
    NothingToMonitor,
    /// Monitoring rows were appended.
    Written { rows: usize },
}

/// Outcome of one period. Skips are outcomes, never errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodOutcome {
    pub period: u32,
    pub forecast: ForecastStage,
    pub monitoring: MonitorStage,
}

/// One planning period, wired to its collaborators.
pub struct Pipeline<'a> {
    pub config: &'a PlannerConfig,
    pub store: &'a dyn PlanningStore,
    pub reference: &'a dyn ReferenceStore,
    pub registry: &'a dyn ModelRegistry,
    pub predictor: &'a dyn Predictor,
}

impl Pipeline<'_> {
    /// Run the full period: forecast stage, then monitoring stage.
    pub fn run_period(&self, ctx: &PeriodContext) -> Result<PeriodOutcome, PipelineError> {
        info!(period = ctx.period, config = %self.config.config_id(), "period start");

        if self.store.probe(Table::Demand) != TableProbe::Exists {
            info!(period = ctx.period, "demand table unavailable, skipping period");
            return Ok(PeriodOutcome {
                period: ctx.period,
                forecast: ForecastStage::SkippedNoDemand,
                monitoring: MonitorStage::Skipped,
            });
        }

        let forecast = self.forecast_stage(ctx)?;
        // Monitoring needs only demand and stored forecasts, so it still
        // runs when the master list is missing.
        let monitoring = self.monitoring_stage(ctx)?;

        Ok(PeriodOutcome {
            period: ctx.period,
            forecast,
            monitoring,
        })
    }

    fn forecast_stage(&self, ctx: &PeriodContext) -> Result<ForecastStage, PipelineError> {
        let loc = &self.config.reference;
        if !self.reference.exists(&loc.container, &loc.path) {
            info!(period = ctx.period, "master list missing, skipping forecast stage");
            return Ok(ForecastStage::SkippedNoMasterList);
        }

        self.ensure_table(Table::Forecast)?;

        if self.store.has_period(Table::Forecast, ctx.period)? {
            let rows = self.store.read_forecasts(ctx.period)?;
            info!(period = ctx.period, rows = rows.len(), "period already loaded, read back");
            return Ok(ForecastStage::AlreadyLoaded { rows: rows.len() });
        }

        let demand = self.store.read_demand(&ctx.history)?;
        let dense = prepare(
            &demand,
            &self.config.attribute_filters(),
            self.config.windows.history_months,
        );
        let entities: Vec<EntityKey> = distinct_keys(&dense);

        let master = self
            .reference
            .read_master_list(&loc.container, &loc.path, &loc.sheet)?;
        let partition = split_known(&entities, &master);
        info!(
            period = ctx.period,
            known_active = partition.known_active.len(),
            unknown = partition.unknown.len(),
            known_inactive = partition.known_inactive.len(),
            "universe split against master list"
        );

        // Segment and route the full universe. Known/unknown is an
        // independent dimension carried as row flags, not a routing
        // input: an unknown entity can still be forecastable, and its
        // demand value counts toward the ABC ranking.
        let labels = segment(
            &dense,
            self.config.windows.segmentation_months,
            &self.config.thresholds,
        );
        let routed = split_forecastable(&entities, &labels, &self.config.forecastable);

        let (model, trained) = self.get_or_train(ctx, &dense, &labels, &routed)?;

        let orchestrator = Orchestrator {
            predictor: self.predictor,
            model: &model,
            selector: self.config.model.selector.as_deref(),
            horizon: self.config.windows.horizon_months,
            recency_months: self.config.windows.recency_months,
            stamp: ctx.stamp,
            overrides: FlagOverrides::default(),
        };
        let rows = orchestrator.run(&dense, &labels, &routed, &partition)?;

        if rows.is_empty() {
            info!(period = ctx.period, "empty universe, nothing to load");
            return Ok(ForecastStage::Generated { rows: 0, trained });
        }
        self.store.write_forecasts(&rows, WriteMode::Append)?;
        info!(period = ctx.period, rows = rows.len(), trained, "forecasts loaded");
        Ok(ForecastStage::Generated { rows: rows.len(), trained })
    }

    /// Reuse this month's model version if one is registered, otherwise
    /// train and register it. An empty model population yields a detached
    /// handle; the model path is skipped downstream.
    fn get_or_train(
        &self,
        ctx: &PeriodContext,
        dense: &[SeriesPoint],
        labels: &[SegmentLabel],
        routed: &RoutedPopulation,
    ) -> Result<(ModelHandle, bool), PipelineError> {
        let settings = &self.config.model;
        let version = ctx.model_version();

        if routed.forecastable.is_empty() {
            return Ok((
                ModelHandle {
                    name: settings.name.clone(),
                    version,
                    artifact_uri: String::new(),
                },
                false,
            ));
        }

        let (exists, versions) =
            self.registry
                .version_exists(&settings.name, &settings.version_label_key, &version)?;
        if exists {
            let handle =
                self.registry
                    .load(&settings.name, &settings.version_label_key, &version)?;
            info!(period = ctx.period, version = %version, "reusing registered model version");
            return Ok((handle, false));
        }

        let wanted: BTreeSet<String> =
            routed.forecastable.iter().map(|k| k.canonical()).collect();
        let train_points: Vec<SeriesPoint> = dense
            .iter()
            .filter(|p| wanted.contains(&p.key.canonical()))
            .cloned()
            .collect();
        // The frame trains with the same three covariate groups the
        // prediction frame carries, segment statics included.
        let frame = build_frame(&train_points, labels, self.config.windows.horizon_months);
        let handle = self.predictor.fit(&frame, &self.config.train_spec())?;

        let registration = self.registry.register(&RegisterSpec {
            name: settings.name.clone(),
            label_key: settings.version_label_key.clone(),
            label_value: version.clone(),
            artifact_uri: handle.artifact_uri.clone(),
            description: format!("config {}", self.config.config_id()),
            aliases: vec!["last-training".into(), version.clone()],
        })?;
        debug_assert_eq!(registration == Registration::First, versions.is_empty());
        match registration {
            Registration::First => {
                info!(period = ctx.period, version = %version, "registered first model version")
            }
            Registration::NewVersion => {
                info!(period = ctx.period, version = %version, "registered new model version")
            }
        }
        Ok((
            ModelHandle {
                name: settings.name.clone(),
                version,
                artifact_uri: handle.artifact_uri,
            },
            true,
        ))
    }

    fn monitoring_stage(&self, ctx: &PeriodContext) -> Result<MonitorStage, PipelineError> {
        if self.store.probe(Table::Forecast) != TableProbe::Exists {
            return Ok(MonitorStage::NothingToMonitor);
        }
        self.ensure_table(Table::Monitoring)?;

        if self.store.has_period(Table::Monitoring, ctx.period)? {
            info!(period = ctx.period, "monitoring already loaded");
            return Ok(MonitorStage::AlreadyLoaded);
        }

        // Batches whose last forecast month is the month before as-of have
        // just become fully observable.
        let last_observable = add_months(ctx.as_of, -1);
        let batch = self.store.read_forecasts_ending(last_observable)?;
        if batch.is_empty() {
            info!(period = ctx.period, "no stored batch became observable");
            return Ok(MonitorStage::NothingToMonitor);
        }

        let demand = self.store.read_demand(&ctx.monitoring)?;
        let monthly = monthly_series(&demand, &self.config.attribute_filters());
        let actuals = complete_months(&monthly, &ctx.monitoring);

        let rows = monitor(&batch, &actuals);
        if rows.is_empty() {
            return Ok(MonitorStage::NothingToMonitor);
        }
        self.store.write_monitoring(&rows, WriteMode::Append)?;
        info!(period = ctx.period, rows = rows.len(), "monitoring loaded");
        Ok(MonitorStage::Written { rows: rows.len() })
    }

    /// Create the table when its probe says absent. An unreachable probe
    /// takes the same branch; `create_partitioned` is a no-op for a table
    /// that turns out to exist.
    fn ensure_table(&self, table: Table) -> Result<(), PipelineError> {
        match self.store.probe(table) {
            TableProbe::Exists => Ok(()),
            TableProbe::Absent => {
                info!(%table, "creating partitioned table");
                Ok(self.store.create_partitioned(table, &PartitionSpec::MONTHLY)?)
            }
            TableProbe::AccessError => {
                warn!(%table, "probe could not reach the backend, taking the create branch");
                Ok(self.store.create_partitioned(table, &PartitionSpec::MONTHLY)?)
            }
        }
    }
}

fn distinct_keys(points: &[SeriesPoint]) -> Vec<EntityKey> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for p in points {
        if seen.insert(p.key.canonical()) {
            out.push(p.key.clone());
        }
    }
    out
}

/// Forecast rows of a batch grouped by their load period, newest first.
/// Convenience for status reporting.
pub fn periods_loaded(rows: &[ForecastRecord]) -> Vec<u32> {
    let mut periods: Vec<u32> = rows
        .iter()
        .map(|r| r.stamp.load_period)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    periods.reverse();
    periods
}
