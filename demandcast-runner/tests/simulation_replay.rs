//! Replay idempotence and failure-mode behavior of the simulation driver.

use chrono::NaiveDate;
use demandcast_core::calendar::add_months;
use demandcast_core::domain::{DemandRecord, EntityKey};
use demandcast_core::features::{FeatureFrame, FutureRow};
use demandcast_core::ports::{ModelHandle, PredictError, Predictor, QuantileRow, TrainSpec};
use demandcast_runner::baseline::WindowMeanPredictor;
use demandcast_runner::config::{FailureMode, PlannerConfig};
use demandcast_runner::pipeline::{ForecastStage, Pipeline};
use demandcast_runner::simulation::SimulationDriver;
use demandcast_runner::stores::{MemoryPlanningStore, MemoryReferenceStore, MemoryRegistry};

fn d(y: i32, m: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, 1).unwrap()
}

fn key(material: &str) -> EntityKey {
    EntityKey::new("CEMENT", "6012", "W001", material, "BAG")
}

fn test_config() -> PlannerConfig {
    let mut config = PlannerConfig::default();
    config.windows.history_months = 24;
    config.windows.segmentation_months = 12;
    config.windows.horizon_months = 6;
    config.windows.recency_months = 12;
    config
}

fn seed_steady_seller(store: &MemoryPlanningStore, key: &EntityKey, from: NaiveDate, months: u32) {
    store.push_demand((0..months).map(|i| DemandRecord {
        key: key.clone(),
        date: add_months(from, i as i32),
        qty: 100.0,
    }));
}

/// Predictor whose every call fails. Stands in for an unreachable
/// training backend.
struct BrokenPredictor;

impl Predictor for BrokenPredictor {
    fn fit(&self, _frame: &FeatureFrame, _spec: &TrainSpec) -> Result<ModelHandle, PredictError> {
        Err(PredictError::Train("training backend unreachable".into()))
    }

    fn predict(
        &self,
        _handle: &ModelHandle,
        _frame: &FeatureFrame,
        _future: &[FutureRow],
        _selector: Option<&str>,
    ) -> Result<Vec<QuantileRow>, PredictError> {
        Err(PredictError::Predict("prediction backend unreachable".into()))
    }
}

#[test]
fn rerunning_a_month_reads_back_and_trains_once() {
    let config = test_config();
    let store = MemoryPlanningStore::new();
    let steady = key("M1");
    seed_steady_seller(&store, &steady, d(2022, 4), 24);

    let reference = MemoryReferenceStore::with_master(vec![steady]);
    let registry = MemoryRegistry::new();
    let artifact_dir = tempfile::tempdir().unwrap();
    let predictor = WindowMeanPredictor::new(12, artifact_dir.path());

    let driver = SimulationDriver {
        config: &config,
        pipeline: Pipeline {
            config: &config,
            store: &store,
            reference: &reference,
            registry: &registry,
            predictor: &predictor,
        },
    };

    let first = driver.run(d(2024, 4)).unwrap();
    assert_eq!(first.forecast, ForecastStage::Generated { rows: 6, trained: true });

    let second = driver.run(d(2024, 4)).unwrap();
    assert_eq!(second.forecast, ForecastStage::AlreadyLoaded { rows: 6 });

    assert_eq!(store.forecast_rows().len(), 6);
    assert_eq!(registry.version_count("demand-planner"), 1);
}

#[test]
fn each_backtest_month_gets_its_own_model_version() {
    let config = test_config();
    let store = MemoryPlanningStore::new();
    let steady = key("M1");
    seed_steady_seller(&store, &steady, d(2022, 1), 30);

    let reference = MemoryReferenceStore::with_master(vec![steady]);
    let registry = MemoryRegistry::new();
    let artifact_dir = tempfile::tempdir().unwrap();
    let predictor = WindowMeanPredictor::new(12, artifact_dir.path());

    let driver = SimulationDriver {
        config: &config,
        pipeline: Pipeline {
            config: &config,
            store: &store,
            reference: &reference,
            registry: &registry,
            predictor: &predictor,
        },
    };

    let report = driver.backtest(d(2024, 1), d(2024, 3)).unwrap();
    assert_eq!(report.months.len(), 3);
    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.failed(), 0);
    assert_eq!(
        report.months.iter().map(|m| m.period).collect::<Vec<_>>(),
        vec![202401, 202402, 202403]
    );
    assert_eq!(registry.version_count("demand-planner"), 3);
    // 3 months, 6 horizon rows each.
    assert_eq!(store.forecast_rows().len(), 18);
}

#[test]
fn fail_fast_aborts_on_the_first_broken_month() {
    let mut config = test_config();
    config.failure_mode = FailureMode::FailFast;
    let store = MemoryPlanningStore::new();
    let steady = key("M1");
    seed_steady_seller(&store, &steady, d(2022, 1), 30);

    let reference = MemoryReferenceStore::with_master(vec![steady]);
    let registry = MemoryRegistry::new();
    let predictor = BrokenPredictor;

    let driver = SimulationDriver {
        config: &config,
        pipeline: Pipeline {
            config: &config,
            store: &store,
            reference: &reference,
            registry: &registry,
            predictor: &predictor,
        },
    };

    assert!(driver.backtest(d(2024, 1), d(2024, 3)).is_err());
    assert!(store.forecast_rows().is_empty());
}

#[test]
fn fail_isolated_records_failures_and_keeps_going() {
    let mut config = test_config();
    config.failure_mode = FailureMode::FailIsolated;
    let store = MemoryPlanningStore::new();
    let steady = key("M1");
    seed_steady_seller(&store, &steady, d(2022, 1), 30);

    let reference = MemoryReferenceStore::with_master(vec![steady]);
    let registry = MemoryRegistry::new();
    let predictor = BrokenPredictor;

    let driver = SimulationDriver {
        config: &config,
        pipeline: Pipeline {
            config: &config,
            store: &store,
            reference: &reference,
            registry: &registry,
            predictor: &predictor,
        },
    };

    let report = driver.backtest(d(2024, 1), d(2024, 3)).unwrap();
    assert_eq!(report.months.len(), 3);
    assert_eq!(report.failed(), 3);
    assert_eq!(report.succeeded(), 0);
}

#[test]
fn months_without_demand_replay_as_skips() {
    let config = test_config();
    let store = MemoryPlanningStore::without_demand_table();
    let reference = MemoryReferenceStore::with_master(vec![key("M1")]);
    let registry = MemoryRegistry::new();
    let artifact_dir = tempfile::tempdir().unwrap();
    let predictor = WindowMeanPredictor::new(12, artifact_dir.path());

    let driver = SimulationDriver {
        config: &config,
        pipeline: Pipeline {
            config: &config,
            store: &store,
            reference: &reference,
            registry: &registry,
            predictor: &predictor,
        },
    };

    // A skip is an outcome, never a failure, in either failure mode.
    let report = driver.backtest(d(2024, 1), d(2024, 4)).unwrap();
    assert_eq!(report.months.len(), 4);
    assert_eq!(report.failed(), 0);
    assert!(report
        .months
        .iter()
        .all(|m| m.outcome.as_ref().unwrap().forecast == ForecastStage::SkippedNoDemand));
}
