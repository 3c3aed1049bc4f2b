//! Parquet-backed planning store with Hive-style partitioning.
//!
//! Layout: `{root}/table={name}/period={YYYYMM}.parquet`, one file per
//! load period, plus a `meta.json` sidecar per table recording the
//! partition layout. Writes are atomic (write to .tmp, rename into place).

use chrono::{Duration, NaiveDate};
use demandcast_core::calendar::{month_floor, period, MonthWindow};
use demandcast_core::domain::{
    DemandRecord, EntityKey, ForecastRecord, LoadStamp, MonitoringRecord, QuantileErrors,
    Quantiles, Strategy,
};
use demandcast_core::ports::{
    PartitionSpec, PlanningStore, StoreError, Table, TableProbe, WriteMode,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata sidecar for one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableMeta {
    table: String,
    partition_start: u32,
    partition_end: u32,
    partition_step: u32,
    created_at: chrono::NaiveDateTime,
}

/// Local Parquet [`PlanningStore`].
pub struct ParquetPlanningStore {
    root: PathBuf,
}

impl ParquetPlanningStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_dir(&self, table: Table) -> PathBuf {
        self.root.join(format!("table={}", table.as_str()))
    }

    fn period_path(&self, table: Table, p: u32) -> PathBuf {
        self.table_dir(table).join(format!("period={p}.parquet"))
    }

    fn require_table(&self, table: Table) -> Result<(), StoreError> {
        if self.table_dir(table).is_dir() {
            Ok(())
        } else {
            Err(StoreError::Unavailable { table })
        }
    }

    /// Period keys of every partition file present for `table`, ascending.
    fn partitions(&self, table: Table) -> Result<Vec<u32>, StoreError> {
        let mut periods = Vec::new();
        for entry in fs::read_dir(self.table_dir(table))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some(p) = stem.strip_prefix("period=").and_then(|p| p.parse().ok()) {
                periods.push(p);
            }
        }
        periods.sort_unstable();
        Ok(periods)
    }

    /// Raw demand rows, partitioned by transaction month.
    pub fn write_demand(&self, records: &[DemandRecord]) -> Result<(), StoreError> {
        self.ensure_dir(Table::Demand)?;
        let mut by_period: BTreeMap<u32, Vec<&DemandRecord>> = BTreeMap::new();
        for r in records {
            by_period.entry(period(month_floor(r.date))).or_default().push(r);
        }
        for (p, rows) in by_period {
            let path = self.period_path(Table::Demand, p);
            let mut all: Vec<DemandRecord> = if path.exists() {
                read_demand_file(&path)?
            } else {
                Vec::new()
            };
            all.extend(rows.into_iter().cloned());
            let df = demand_to_dataframe(&all)?;
            write_atomic(&df, &path)?;
        }
        Ok(())
    }

    fn ensure_dir(&self, table: Table) -> Result<(), StoreError> {
        fs::create_dir_all(self.table_dir(table))?;
        Ok(())
    }
}

impl PlanningStore for ParquetPlanningStore {
    fn probe(&self, table: Table) -> TableProbe {
        match fs::metadata(self.table_dir(table)) {
            Ok(meta) if meta.is_dir() => TableProbe::Exists,
            Ok(_) => TableProbe::AccessError,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => TableProbe::Absent,
            Err(_) => TableProbe::AccessError,
        }
    }

    fn has_period(&self, table: Table, p: u32) -> Result<bool, StoreError> {
        self.require_table(table)?;
        Ok(self.period_path(table, p).exists())
    }

    fn read_demand(&self, window: &MonthWindow) -> Result<Vec<DemandRecord>, StoreError> {
        self.require_table(Table::Demand)?;
        let lo = period(window.start);
        let hi = period(window.end);
        let mut out = Vec::new();
        for p in self.partitions(Table::Demand)? {
            if p < lo || p > hi {
                continue;
            }
            let rows = read_demand_file(&self.period_path(Table::Demand, p))?;
            out.extend(rows.into_iter().filter(|r| window.contains(month_floor(r.date))));
        }
        Ok(out)
    }

    fn read_forecasts(&self, p: u32) -> Result<Vec<ForecastRecord>, StoreError> {
        self.require_table(Table::Forecast)?;
        let path = self.period_path(Table::Forecast, p);
        if !path.exists() {
            return Ok(Vec::new());
        }
        read_forecast_file(&path)
    }

    fn read_forecasts_ending(
        &self,
        last_month: NaiveDate,
    ) -> Result<Vec<ForecastRecord>, StoreError> {
        self.require_table(Table::Forecast)?;
        let mut out = Vec::new();
        for p in self.partitions(Table::Forecast)? {
            let rows = read_forecast_file(&self.period_path(Table::Forecast, p))?;
            if rows.iter().map(|r| r.month).max() == Some(last_month) {
                out.extend(rows);
            }
        }
        Ok(out)
    }

    fn write_forecasts(&self, rows: &[ForecastRecord], mode: WriteMode) -> Result<(), StoreError> {
        self.require_table(Table::Forecast)?;
        let mut by_period: BTreeMap<u32, Vec<ForecastRecord>> = BTreeMap::new();
        for r in rows {
            by_period.entry(r.stamp.load_period).or_default().push(r.clone());
        }
        for (p, mut batch) in by_period {
            let path = self.period_path(Table::Forecast, p);
            if mode == WriteMode::Append && path.exists() {
                let mut existing = read_forecast_file(&path)?;
                existing.append(&mut batch);
                batch = existing;
            }
            let df = forecasts_to_dataframe(&batch)?;
            write_atomic(&df, &path)?;
        }
        Ok(())
    }

    fn write_monitoring(
        &self,
        rows: &[MonitoringRecord],
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        self.require_table(Table::Monitoring)?;
        let mut by_period: BTreeMap<u32, Vec<MonitoringRecord>> = BTreeMap::new();
        for r in rows {
            by_period
                .entry(r.forecast.stamp.load_period)
                .or_default()
                .push(r.clone());
        }
        for (p, mut batch) in by_period {
            let path = self.period_path(Table::Monitoring, p);
            if mode == WriteMode::Append && path.exists() {
                let mut existing = read_monitoring_file(&path)?;
                existing.append(&mut batch);
                batch = existing;
            }
            let df = monitoring_to_dataframe(&batch)?;
            write_atomic(&df, &path)?;
        }
        Ok(())
    }

    fn create_partitioned(&self, table: Table, spec: &PartitionSpec) -> Result<(), StoreError> {
        self.ensure_dir(table)?;
        let meta_path = self.table_dir(table).join("meta.json");
        if meta_path.exists() {
            return Ok(());
        }
        let meta = TableMeta {
            table: table.as_str().to_string(),
            partition_start: spec.start,
            partition_end: spec.end,
            partition_step: spec.step,
            created_at: chrono::Local::now().naive_local(),
        };
        let json = serde_json::to_string_pretty(&meta)
            .map_err(|e| StoreError::Backend(format!("meta serialization: {e}")))?;
        fs::write(meta_path, json)?;
        Ok(())
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn write_atomic(df: &DataFrame, path: &Path) -> Result<(), StoreError> {
    let tmp = path.with_extension("parquet.tmp");
    let file = fs::File::create(&tmp)?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| StoreError::Backend(format!("write parquet: {e}")))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        StoreError::Backend(format!("atomic rename failed: {e}"))
    })
}

fn read_dataframe(path: &Path) -> Result<DataFrame, StoreError> {
    let file = fs::File::open(path)?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| StoreError::Backend(format!("read parquet: {e}")))
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
}

fn date_to_days(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

fn days_to_date(days: i32) -> NaiveDate {
    epoch() + Duration::days(days as i64)
}

fn date_column(name: &str, dates: Vec<i32>) -> Result<Column, StoreError> {
    Column::new(name.into(), dates)
        .cast(&DataType::Date)
        .map_err(|e| StoreError::Backend(format!("{name} cast: {e}")))
}

fn key_columns(keys: impl Iterator<Item = EntityKey> + Clone) -> Vec<Column> {
    vec![
        Column::new(
            "classification".into(),
            keys.clone().map(|k| k.classification).collect::<Vec<_>>(),
        ),
        Column::new("company".into(), keys.clone().map(|k| k.company).collect::<Vec<_>>()),
        Column::new("site".into(), keys.clone().map(|k| k.site).collect::<Vec<_>>()),
        Column::new("material".into(), keys.clone().map(|k| k.material).collect::<Vec<_>>()),
        Column::new("uom".into(), keys.map(|k| k.uom).collect::<Vec<_>>()),
    ]
}

fn demand_to_dataframe(rows: &[DemandRecord]) -> Result<DataFrame, StoreError> {
    let mut columns = key_columns(rows.iter().map(|r| r.key.clone()));
    columns.push(date_column("date", rows.iter().map(|r| date_to_days(r.date)).collect())?);
    columns.push(Column::new("qty".into(), rows.iter().map(|r| r.qty).collect::<Vec<_>>()));
    DataFrame::new(columns).map_err(|e| StoreError::Backend(format!("demand dataframe: {e}")))
}

fn forecasts_to_dataframe(rows: &[ForecastRecord]) -> Result<DataFrame, StoreError> {
    let mut columns = key_columns(rows.iter().map(|r| r.key.clone()));
    columns.push(date_column("month", rows.iter().map(|r| date_to_days(r.month)).collect())?);
    for (i, name) in ["q05", "q25", "q50", "q75", "q95"].iter().enumerate() {
        columns.push(Column::new(
            (*name).into(),
            rows.iter().map(|r| r.quantiles.0[i]).collect::<Vec<i64>>(),
        ));
    }
    columns.push(Column::new(
        "strategy".into(),
        rows.iter().map(|r| r.strategy.as_str().to_string()).collect::<Vec<_>>(),
    ));
    columns.push(Column::new(
        "has_recent_sales".into(),
        rows.iter().map(|r| r.has_recent_sales).collect::<Vec<bool>>(),
    ));
    columns.push(Column::new(
        "is_forecastable".into(),
        rows.iter().map(|r| r.is_forecastable).collect::<Vec<bool>>(),
    ));
    columns.push(Column::new(
        "is_known".into(),
        rows.iter().map(|r| r.is_known).collect::<Vec<bool>>(),
    ));
    columns.push(Column::new(
        "is_active".into(),
        rows.iter().map(|r| r.is_active).collect::<Vec<bool>>(),
    ));
    columns.push(date_column(
        "load_date",
        rows.iter().map(|r| date_to_days(r.stamp.load_date)).collect(),
    )?);
    columns.push(Column::new(
        "load_period".into(),
        rows.iter().map(|r| r.stamp.load_period).collect::<Vec<u32>>(),
    ));
    columns.push(Column::new(
        "deleted".into(),
        rows.iter().map(|r| r.stamp.deleted).collect::<Vec<bool>>(),
    ));
    columns.push(date_column(
        "deletion_date",
        rows.iter().map(|r| date_to_days(r.stamp.deletion_date)).collect(),
    )?);
    DataFrame::new(columns).map_err(|e| StoreError::Backend(format!("forecast dataframe: {e}")))
}

fn monitoring_to_dataframe(rows: &[MonitoringRecord]) -> Result<DataFrame, StoreError> {
    let forecasts: Vec<ForecastRecord> = rows.iter().map(|r| r.forecast.clone()).collect();
    let mut df = forecasts_to_dataframe(&forecasts)?;
    df.with_column(Column::new(
        "actual".into(),
        rows.iter().map(|r| r.actual).collect::<Vec<Option<i64>>>(),
    ))
    .map_err(|e| StoreError::Backend(format!("actual column: {e}")))?;
    for (i, name) in ["e05", "e25", "e50", "e75", "e95"].iter().enumerate() {
        df.with_column(Column::new(
            (*name).into(),
            rows.iter().map(|r| r.errors.0[i]).collect::<Vec<Option<i64>>>(),
        ))
        .map_err(|e| StoreError::Backend(format!("{name} column: {e}")))?;
    }
    Ok(df)
}

struct ColumnReader<'a> {
    df: &'a DataFrame,
}

impl<'a> ColumnReader<'a> {
    fn str_col(&self, name: &str) -> Result<&'a StringChunked, StoreError> {
        self.df
            .column(name)
            .and_then(|c| c.str())
            .map_err(|e| StoreError::Backend(format!("column {name}: {e}")))
    }

    fn i64_col(&self, name: &str) -> Result<&'a Int64Chunked, StoreError> {
        self.df
            .column(name)
            .and_then(|c| c.i64())
            .map_err(|e| StoreError::Backend(format!("column {name}: {e}")))
    }

    fn u32_col(&self, name: &str) -> Result<&'a UInt32Chunked, StoreError> {
        self.df
            .column(name)
            .and_then(|c| c.u32())
            .map_err(|e| StoreError::Backend(format!("column {name}: {e}")))
    }

    fn f64_col(&self, name: &str) -> Result<&'a Float64Chunked, StoreError> {
        self.df
            .column(name)
            .and_then(|c| c.f64())
            .map_err(|e| StoreError::Backend(format!("column {name}: {e}")))
    }

    fn bool_col(&self, name: &str) -> Result<&'a BooleanChunked, StoreError> {
        self.df
            .column(name)
            .and_then(|c| c.bool())
            .map_err(|e| StoreError::Backend(format!("column {name}: {e}")))
    }

    fn date_col(&self, name: &str) -> Result<&'a DateChunked, StoreError> {
        self.df
            .column(name)
            .and_then(|c| c.date())
            .map_err(|e| StoreError::Backend(format!("column {name}: {e}")))
    }

    fn key(&self, i: usize) -> Result<EntityKey, StoreError> {
        let get = |name: &str| -> Result<String, StoreError> {
            Ok(self
                .str_col(name)?
                .get(i)
                .ok_or_else(|| StoreError::Backend(format!("null {name} at row {i}")))?
                .to_string())
        };
        Ok(EntityKey {
            classification: get("classification")?,
            company: get("company")?,
            site: get("site")?,
            material: get("material")?,
            uom: get("uom")?,
        })
    }

    fn date(&self, name: &str, i: usize) -> Result<NaiveDate, StoreError> {
        let days = self
            .date_col(name)?
            .get(i)
            .ok_or_else(|| StoreError::Backend(format!("null {name} at row {i}")))?;
        Ok(days_to_date(days))
    }
}

fn parse_strategy(s: &str) -> Result<Strategy, StoreError> {
    match s {
        "model" => Ok(Strategy::Model),
        "moving_average" => Ok(Strategy::MovingAverage),
        "zero" => Ok(Strategy::Zero),
        other => Err(StoreError::Backend(format!("unknown strategy '{other}'"))),
    }
}

fn read_demand_file(path: &Path) -> Result<Vec<DemandRecord>, StoreError> {
    let df = read_dataframe(path)?;
    let r = ColumnReader { df: &df };
    let qty = r.f64_col("qty")?;
    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        out.push(DemandRecord {
            key: r.key(i)?,
            date: r.date("date", i)?,
            qty: qty.get(i).unwrap_or(0.0),
        });
    }
    Ok(out)
}

fn read_forecast_row(r: &ColumnReader<'_>, i: usize) -> Result<ForecastRecord, StoreError> {
    let mut quantiles = [0i64; 5];
    for (slot, name) in quantiles.iter_mut().zip(["q05", "q25", "q50", "q75", "q95"]) {
        *slot = r
            .i64_col(name)?
            .get(i)
            .ok_or_else(|| StoreError::Backend(format!("null {name} at row {i}")))?;
    }
    let strategy = parse_strategy(
        r.str_col("strategy")?
            .get(i)
            .ok_or_else(|| StoreError::Backend(format!("null strategy at row {i}")))?,
    )?;
    let flag = |name: &str| -> Result<bool, StoreError> {
        Ok(r.bool_col(name)?.get(i).unwrap_or(false))
    };
    Ok(ForecastRecord {
        key: r.key(i)?,
        month: r.date("month", i)?,
        quantiles: Quantiles(quantiles),
        strategy,
        has_recent_sales: flag("has_recent_sales")?,
        is_forecastable: flag("is_forecastable")?,
        is_known: flag("is_known")?,
        is_active: flag("is_active")?,
        stamp: LoadStamp {
            load_date: r.date("load_date", i)?,
            load_period: r
                .u32_col("load_period")?
                .get(i)
                .ok_or_else(|| StoreError::Backend(format!("null load_period at row {i}")))?,
            deleted: flag("deleted")?,
            deletion_date: r.date("deletion_date", i)?,
        },
    })
}

fn read_forecast_file(path: &Path) -> Result<Vec<ForecastRecord>, StoreError> {
    let df = read_dataframe(path)?;
    let r = ColumnReader { df: &df };
    (0..df.height()).map(|i| read_forecast_row(&r, i)).collect()
}

fn read_monitoring_file(path: &Path) -> Result<Vec<MonitoringRecord>, StoreError> {
    let df = read_dataframe(path)?;
    let r = ColumnReader { df: &df };
    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let forecast = read_forecast_row(&r, i)?;
        let actual = r.i64_col("actual")?.get(i);
        let mut errors = [None; 5];
        for (slot, name) in errors.iter_mut().zip(["e05", "e25", "e50", "e75", "e95"]) {
            *slot = r.i64_col(name)?.get(i);
        }
        out.push(MonitoringRecord {
            forecast,
            actual,
            errors: QuantileErrors(errors),
        });
    }
    Ok(out)
}
