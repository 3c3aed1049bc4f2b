//! In-memory store backends.
//!
//! Test and demo doubles for the capability traits, with toggles for the
//! absent-table and unreachable-backend branches the pipeline guards
//! against.

use chrono::NaiveDate;
use demandcast_core::calendar::{month_floor, period, MonthWindow};
use demandcast_core::domain::{
    DemandRecord, EntityKey, ForecastRecord, ModelVersion, MonitoringRecord,
};
use demandcast_core::ports::{
    ModelHandle, ModelRegistry, PartitionSpec, PlanningStore, ReferenceStore, RegisterSpec,
    Registration, RegistryError, StoreError, Table, TableProbe, WriteMode,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

#[derive(Default)]
struct PlanningState {
    demand_table: bool,
    demand: Vec<DemandRecord>,
    forecast_table: bool,
    forecasts: Vec<ForecastRecord>,
    monitoring_table: bool,
    monitoring: Vec<MonitoringRecord>,
    probe_failures: Vec<Table>,
}

/// In-memory [`PlanningStore`].
pub struct MemoryPlanningStore {
    state: Mutex<PlanningState>,
}

impl Default for MemoryPlanningStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPlanningStore {
    /// Empty store with an existing (empty) demand table.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PlanningState {
                demand_table: true,
                ..PlanningState::default()
            }),
        }
    }

    /// Store whose demand table does not exist at all.
    pub fn without_demand_table() -> Self {
        Self {
            state: Mutex::new(PlanningState::default()),
        }
    }

    pub fn push_demand(&self, records: impl IntoIterator<Item = DemandRecord>) {
        let mut state = self.state.lock().unwrap();
        state.demand_table = true;
        state.demand.extend(records);
    }

    /// Make probes of `table` report an unreachable backend.
    pub fn fail_probe(&self, table: Table) {
        self.state.lock().unwrap().probe_failures.push(table);
    }

    pub fn forecast_rows(&self) -> Vec<ForecastRecord> {
        self.state.lock().unwrap().forecasts.clone()
    }

    pub fn monitoring_rows(&self) -> Vec<MonitoringRecord> {
        self.state.lock().unwrap().monitoring.clone()
    }

    fn table_present(state: &PlanningState, table: Table) -> bool {
        match table {
            Table::Demand => state.demand_table,
            Table::Forecast => state.forecast_table,
            Table::Monitoring => state.monitoring_table,
        }
    }
}

impl PlanningStore for MemoryPlanningStore {
    fn probe(&self, table: Table) -> TableProbe {
        let state = self.state.lock().unwrap();
        if state.probe_failures.contains(&table) {
            return TableProbe::AccessError;
        }
        if Self::table_present(&state, table) {
            TableProbe::Exists
        } else {
            TableProbe::Absent
        }
    }

    fn has_period(&self, table: Table, p: u32) -> Result<bool, StoreError> {
        let state = self.state.lock().unwrap();
        if !Self::table_present(&state, table) {
            return Err(StoreError::Unavailable { table });
        }
        Ok(match table {
            Table::Demand => state
                .demand
                .iter()
                .any(|r| period(month_floor(r.date)) == p),
            Table::Forecast => state.forecasts.iter().any(|r| r.stamp.load_period == p),
            Table::Monitoring => state
                .monitoring
                .iter()
                .any(|r| r.forecast.stamp.load_period == p),
        })
    }

    fn read_demand(&self, window: &MonthWindow) -> Result<Vec<DemandRecord>, StoreError> {
        let state = self.state.lock().unwrap();
        if !state.demand_table {
            return Err(StoreError::Unavailable { table: Table::Demand });
        }
        Ok(state
            .demand
            .iter()
            .filter(|r| window.contains(month_floor(r.date)))
            .cloned()
            .collect())
    }

    fn read_forecasts(&self, p: u32) -> Result<Vec<ForecastRecord>, StoreError> {
        let state = self.state.lock().unwrap();
        if !state.forecast_table {
            return Err(StoreError::Unavailable { table: Table::Forecast });
        }
        Ok(state
            .forecasts
            .iter()
            .filter(|r| r.stamp.load_period == p)
            .cloned()
            .collect())
    }

    fn read_forecasts_ending(
        &self,
        last_month: NaiveDate,
    ) -> Result<Vec<ForecastRecord>, StoreError> {
        let state = self.state.lock().unwrap();
        if !state.forecast_table {
            return Err(StoreError::Unavailable { table: Table::Forecast });
        }
        let mut last_by_batch: BTreeMap<u32, NaiveDate> = BTreeMap::new();
        for r in &state.forecasts {
            let entry = last_by_batch.entry(r.stamp.load_period).or_insert(r.month);
            if r.month > *entry {
                *entry = r.month;
            }
        }
        let observable: BTreeSet<u32> = last_by_batch
            .into_iter()
            .filter(|(_, last)| *last == last_month)
            .map(|(p, _)| p)
            .collect();
        Ok(state
            .forecasts
            .iter()
            .filter(|r| observable.contains(&r.stamp.load_period))
            .cloned()
            .collect())
    }

    fn write_forecasts(&self, rows: &[ForecastRecord], mode: WriteMode) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if !state.forecast_table {
            return Err(StoreError::Unavailable { table: Table::Forecast });
        }
        if mode == WriteMode::Replace {
            let periods: BTreeSet<u32> = rows.iter().map(|r| r.stamp.load_period).collect();
            state.forecasts.retain(|r| !periods.contains(&r.stamp.load_period));
        }
        state.forecasts.extend(rows.iter().cloned());
        Ok(())
    }

    fn write_monitoring(
        &self,
        rows: &[MonitoringRecord],
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if !state.monitoring_table {
            return Err(StoreError::Unavailable { table: Table::Monitoring });
        }
        if mode == WriteMode::Replace {
            let periods: BTreeSet<u32> =
                rows.iter().map(|r| r.forecast.stamp.load_period).collect();
            state
                .monitoring
                .retain(|r| !periods.contains(&r.forecast.stamp.load_period));
        }
        state.monitoring.extend(rows.iter().cloned());
        Ok(())
    }

    fn create_partitioned(&self, table: Table, _spec: &PartitionSpec) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        match table {
            Table::Demand => state.demand_table = true,
            Table::Forecast => state.forecast_table = true,
            Table::Monitoring => state.monitoring_table = true,
        }
        Ok(())
    }
}

/// In-memory [`ReferenceStore`].
#[derive(Default)]
pub struct MemoryReferenceStore {
    master: Mutex<Option<Vec<EntityKey>>>,
}

impl MemoryReferenceStore {
    /// Store with no master list; `exists` reports false.
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn with_master(master: Vec<EntityKey>) -> Self {
        Self {
            master: Mutex::new(Some(master)),
        }
    }
}

impl ReferenceStore for MemoryReferenceStore {
    fn exists(&self, _container: &str, _path: &str) -> bool {
        self.master.lock().unwrap().is_some()
    }

    fn read_master_list(
        &self,
        _container: &str,
        _path: &str,
        _sheet: &str,
    ) -> Result<Vec<EntityKey>, StoreError> {
        self.master
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| StoreError::Backend("master list is not present".into()))
    }
}

struct StoredVersion {
    version: ModelVersion,
    handle: ModelHandle,
}

/// In-memory [`ModelRegistry`].
#[derive(Default)]
pub struct MemoryRegistry {
    versions: Mutex<Vec<StoredVersion>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version_count(&self, name: &str) -> usize {
        self.versions
            .lock()
            .unwrap()
            .iter()
            .filter(|v| v.version.name == name)
            .count()
    }
}

impl ModelRegistry for MemoryRegistry {
    fn version_exists(
        &self,
        name: &str,
        label_key: &str,
        label_value: &str,
    ) -> Result<(bool, Vec<ModelVersion>), RegistryError> {
        let versions = self.versions.lock().unwrap();
        let all: Vec<ModelVersion> = versions
            .iter()
            .filter(|v| v.version.name == name)
            .map(|v| v.version.clone())
            .collect();
        let exists = all
            .iter()
            .any(|v| v.label_key == label_key && v.label_value == label_value);
        Ok((exists, all))
    }

    fn load(
        &self,
        name: &str,
        label_key: &str,
        label_value: &str,
    ) -> Result<ModelHandle, RegistryError> {
        self.versions
            .lock()
            .unwrap()
            .iter()
            .find(|v| {
                v.version.name == name
                    && v.version.label_key == label_key
                    && v.version.label_value == label_value
            })
            .map(|v| v.handle.clone())
            .ok_or_else(|| RegistryError::VersionNotFound {
                name: name.into(),
                label_key: label_key.into(),
                label_value: label_value.into(),
            })
    }

    fn register(&self, spec: &RegisterSpec) -> Result<Registration, RegistryError> {
        let mut versions = self.versions.lock().unwrap();
        let first = !versions.iter().any(|v| v.version.name == spec.name);
        versions.push(StoredVersion {
            version: ModelVersion {
                name: spec.name.clone(),
                label_key: spec.label_key.clone(),
                label_value: spec.label_value.clone(),
                artifact_uri: spec.artifact_uri.clone(),
            },
            handle: ModelHandle {
                name: spec.name.clone(),
                version: spec.label_value.clone(),
                artifact_uri: spec.artifact_uri.clone(),
            },
        });
        Ok(if first {
            Registration::First
        } else {
            Registration::NewVersion
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use demandcast_core::domain::{LoadStamp, Quantiles, Strategy};

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn key(material: &str) -> EntityKey {
        EntityKey::new("CEMENT", "6012", "W001", material, "BAG")
    }

    fn forecast(month: NaiveDate, load_period: u32) -> ForecastRecord {
        ForecastRecord {
            key: key("M1"),
            month,
            quantiles: Quantiles::flat(1),
            strategy: Strategy::Model,
            has_recent_sales: true,
            is_forecastable: true,
            is_known: true,
            is_active: true,
            stamp: LoadStamp::new(d(2024, 1), load_period),
        }
    }

    #[test]
    fn probe_tristate_covers_all_branches() {
        let store = MemoryPlanningStore::new();
        assert_eq!(store.probe(Table::Demand), TableProbe::Exists);
        assert_eq!(store.probe(Table::Forecast), TableProbe::Absent);
        store.fail_probe(Table::Forecast);
        assert_eq!(store.probe(Table::Forecast), TableProbe::AccessError);
    }

    #[test]
    fn writes_to_an_absent_table_fail_closed() {
        let store = MemoryPlanningStore::new();
        let err = store
            .write_forecasts(&[forecast(d(2024, 2), 202401)], WriteMode::Append)
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { table: Table::Forecast }));
    }

    #[test]
    fn forecasts_ending_selects_only_complete_batches() {
        let store = MemoryPlanningStore::new();
        store
            .create_partitioned(Table::Forecast, &PartitionSpec::MONTHLY)
            .unwrap();
        // Batch 202401 ends 2024-03; batch 202402 ends 2024-04.
        store
            .write_forecasts(
                &[
                    forecast(d(2024, 2), 202401),
                    forecast(d(2024, 3), 202401),
                    forecast(d(2024, 3), 202402),
                    forecast(d(2024, 4), 202402),
                ],
                WriteMode::Append,
            )
            .unwrap();
        let ending = store.read_forecasts_ending(d(2024, 3)).unwrap();
        assert_eq!(ending.len(), 2);
        assert!(ending.iter().all(|r| r.stamp.load_period == 202401));
    }

    #[test]
    fn registry_distinguishes_first_from_new_version() {
        let registry = MemoryRegistry::new();
        let spec = RegisterSpec {
            name: "demand-planner".into(),
            label_key: "planning-month".into(),
            label_value: "v202401".into(),
            artifact_uri: "mem://a".into(),
            description: String::new(),
            aliases: vec![],
        };
        assert_eq!(registry.register(&spec).unwrap(), Registration::First);
        let mut next = spec.clone();
        next.label_value = "v202402".into();
        assert_eq!(registry.register(&next).unwrap(), Registration::NewVersion);

        let (exists, versions) = registry
            .version_exists("demand-planner", "planning-month", "v202401")
            .unwrap();
        assert!(exists);
        assert_eq!(versions.len(), 2);
        let handle = registry
            .load("demand-planner", "planning-month", "v202402")
            .unwrap();
        assert_eq!(handle.version, "v202402");
    }
}
