//! Planning warehouse capability.

use crate::calendar::MonthWindow;
use crate::domain::{DemandRecord, ForecastRecord, MonitoringRecord};
use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

/// Logical tables of the planning warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Demand,
    Forecast,
    Monitoring,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Demand => "demand",
            Table::Forecast => "forecast",
            Table::Monitoring => "monitoring",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a table existence probe.
///
/// Probing never returns an error: a backend that cannot answer reports
/// `AccessError`, and the caller decides which way that fails. The
/// pipeline treats it like `Absent` (fail-open, take the create branch)
/// while actual reads stay fail-closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableProbe {
    Exists,
    Absent,
    AccessError,
}

/// Integer-range partition layout for a created table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionSpec {
    pub start: u32,
    pub end: u32,
    pub step: u32,
}

impl PartitionSpec {
    /// One partition per month, YYYYMM keyed, covering 2023-01..2118-12.
    pub const MONTHLY: PartitionSpec = PartitionSpec {
        start: 202301,
        end: 211812,
        step: 1,
    };

    pub fn contains(&self, period: u32) -> bool {
        period >= self.start && period <= self.end
    }
}

/// Whether a write replaces the target partition or appends to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Replace,
    Append,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{table} table is not available")]
    Unavailable { table: Table },
    #[error("storage backend failure: {0}")]
    Backend(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The planning warehouse: monthly demand in, forecasts and monitoring out.
///
/// Periods are YYYYMM integers matching the partition layout. Reads are
/// fail-closed (`Result`); only `probe` is allowed to swallow backend
/// failures into its tri-state answer.
pub trait PlanningStore: Send + Sync {
    fn probe(&self, table: Table) -> TableProbe;

    /// Whether the table already holds rows for `period`.
    fn has_period(&self, table: Table, period: u32) -> Result<bool, StoreError>;

    fn read_demand(&self, window: &MonthWindow) -> Result<Vec<DemandRecord>, StoreError>;

    /// All forecast rows loaded under `period`.
    fn read_forecasts(&self, period: u32) -> Result<Vec<ForecastRecord>, StoreError>;

    /// Forecast rows of every stored batch whose latest forecast month is
    /// exactly `last_month`. Selects the batches that have just become
    /// fully observable.
    fn read_forecasts_ending(&self, last_month: NaiveDate)
        -> Result<Vec<ForecastRecord>, StoreError>;

    fn write_forecasts(&self, rows: &[ForecastRecord], mode: WriteMode) -> Result<(), StoreError>;

    fn write_monitoring(
        &self,
        rows: &[MonitoringRecord],
        mode: WriteMode,
    ) -> Result<(), StoreError>;

    /// Create `table` with the given partition layout. Creating a table
    /// that already exists is a no-op.
    fn create_partitioned(&self, table: Table, spec: &PartitionSpec) -> Result<(), StoreError>;
}
