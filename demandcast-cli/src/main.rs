//! DemandCast CLI — planning runs, backtests, and local data management.
//!
//! Commands:
//! - `run` — plan one month against the local data directory
//! - `backtest` — replay the monthly trigger over a date range
//! - `import` — load transactional demand from CSV into the Parquet store
//! - `master` — install a master-list CSV into the reference layout
//! - `seed` — generate synthetic demand for local experimentation
//! - `status` — report table sizes and loaded periods

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use demandcast_core::calendar::{add_months, month_floor};
use demandcast_core::domain::{DemandRecord, EntityKey, ForecastRecord};
use demandcast_core::ports::{PlanningStore, Table, TableProbe};
use demandcast_runner::baseline::WindowMeanPredictor;
use demandcast_runner::config::PlannerConfig;
use demandcast_runner::pipeline::{
    periods_loaded, ForecastStage, MonitorStage, PeriodOutcome, Pipeline,
};
use demandcast_runner::simulation::SimulationDriver;
use demandcast_runner::stores::{
    default_registry_dir, read_key_csv, DirReferenceStore, FsModelRegistry, ParquetPlanningStore,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "demandcast", about = "DemandCast CLI — monthly supply planning engine")]
struct Cli {
    /// Data directory holding the Parquet tables, reference files, and
    /// model registry.
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// Path to a TOML planner config. Defaults to the built-in config.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan one month: forecast load plus monitoring load.
    Run {
        /// Planning date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        as_of: Option<String>,
    },
    /// Replay the monthly trigger from one month to another, inclusive.
    Backtest {
        /// First planning month (YYYY-MM-DD).
        #[arg(long)]
        from: String,

        /// Last planning month (YYYY-MM-DD).
        #[arg(long)]
        to: String,
    },
    /// Import transactional demand from a CSV file.
    Import {
        /// CSV with columns: classification,company,site,material,uom,date,qty.
        file: PathBuf,
    },
    /// Install a master-list CSV into the reference layout.
    Master {
        /// CSV with columns: classification,company,site,material,uom.
        file: PathBuf,
    },
    /// Generate synthetic demand for local experimentation.
    Seed {
        /// Number of entities to generate.
        #[arg(long, default_value_t = 50)]
        entities: usize,

        /// Number of history months to generate.
        #[arg(long, default_value_t = 36)]
        months: u32,

        /// First history month (YYYY-MM-DD). Defaults to `months` ago.
        #[arg(long)]
        start: Option<String>,

        /// RNG seed.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Also install the generated entities as the master list.
        #[arg(long, default_value_t = false)]
        with_master: bool,
    },
    /// Report table sizes and loaded periods.
    Status,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { as_of } => run_period(&cli.data_dir, &config, as_of.as_deref()),
        Commands::Backtest { from, to } => run_backtest(&cli.data_dir, &config, &from, &to),
        Commands::Import { file } => run_import(&cli.data_dir, &file),
        Commands::Master { file } => run_master(&cli.data_dir, &config, &file),
        Commands::Seed {
            entities,
            months,
            start,
            seed,
            with_master,
        } => run_seed(&cli.data_dir, &config, entities, months, start.as_deref(), seed, with_master),
        Commands::Status => run_status(&cli.data_dir),
    }
}

fn load_config(path: Option<&Path>) -> Result<PlannerConfig> {
    match path {
        Some(p) => PlannerConfig::from_toml_file(p)
            .with_context(|| format!("loading config {}", p.display())),
        None => Ok(PlannerConfig::default()),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

/// Build the driver over the local data directory and hand it to `f`.
fn with_driver<T>(
    data_dir: &Path,
    config: &PlannerConfig,
    f: impl FnOnce(&SimulationDriver) -> Result<T>,
) -> Result<T> {
    let store = ParquetPlanningStore::new(data_dir);
    let reference = DirReferenceStore::new(data_dir);
    let registry = FsModelRegistry::new(default_registry_dir(data_dir));
    let predictor = WindowMeanPredictor::new(
        config.windows.recency_months as usize,
        data_dir.join("artifacts"),
    );
    let driver = SimulationDriver {
        config,
        pipeline: Pipeline {
            config,
            store: &store,
            reference: &reference,
            registry: &registry,
            predictor: &predictor,
        },
    };
    f(&driver)
}

fn run_period(data_dir: &Path, config: &PlannerConfig, as_of: Option<&str>) -> Result<()> {
    let as_of = match as_of {
        Some(s) => parse_date(s)?,
        None => chrono::Local::now().date_naive(),
    };
    let outcome = with_driver(data_dir, config, |driver| Ok(driver.run(as_of)?))?;
    print_outcome(&outcome);
    Ok(())
}

fn run_backtest(data_dir: &Path, config: &PlannerConfig, from: &str, to: &str) -> Result<()> {
    let from = parse_date(from)?;
    let to = parse_date(to)?;
    let report = with_driver(data_dir, config, |driver| Ok(driver.backtest(from, to)?))?;

    println!();
    println!("=== Backtest Report ===");
    println!("Months:    {}", report.months.len());
    println!("Succeeded: {}", report.succeeded());
    println!("Failed:    {}", report.failed());
    println!();
    for month in &report.months {
        match &month.outcome {
            Ok(outcome) => print_outcome(outcome),
            Err(err) => println!("{}  FAILED: {err}", month.period),
        }
    }
    Ok(())
}

fn print_outcome(outcome: &PeriodOutcome) {
    let forecast = match &outcome.forecast {
        ForecastStage::SkippedNoDemand => "skipped (no demand table)".to_string(),
        ForecastStage::SkippedNoMasterList => "skipped (no master list)".to_string(),
        ForecastStage::AlreadyLoaded { rows } => format!("already loaded ({rows} rows)"),
        ForecastStage::Generated { rows, trained } => {
            format!("{rows} rows loaded (trained: {trained})")
        }
    };
    let monitoring = match &outcome.monitoring {
        MonitorStage::Skipped => "skipped".to_string(),
        MonitorStage::AlreadyLoaded => "already loaded".to_string(),
        MonitorStage::NothingToMonitor => "nothing observable".to_string(),
        MonitorStage::Written { rows } => format!("{rows} rows written"),
    };
    println!("{}  forecast: {forecast}; monitoring: {monitoring}", outcome.period);
}

/// One transactional CSV row. `csv` cannot flatten nested structs, so the
/// key attributes are inlined.
#[derive(Debug, Deserialize)]
struct TransactionRow {
    classification: String,
    company: String,
    site: String,
    material: String,
    uom: String,
    date: NaiveDate,
    qty: f64,
}

fn run_import(data_dir: &Path, file: &Path) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file)
        .with_context(|| format!("opening {}", file.display()))?;

    let mut records = Vec::new();
    for row in reader.deserialize() {
        let row: TransactionRow = row.with_context(|| format!("parsing {}", file.display()))?;
        records.push(DemandRecord {
            key: EntityKey::new(row.classification, row.company, row.site, row.material, row.uom),
            date: row.date,
            qty: row.qty,
        });
    }

    let store = ParquetPlanningStore::new(data_dir);
    store.write_demand(&records)?;
    println!("Imported {} demand rows into {}", records.len(), data_dir.display());
    Ok(())
}

fn run_master(data_dir: &Path, config: &PlannerConfig, file: &Path) -> Result<()> {
    let keys = read_key_csv(file)?;
    write_master(data_dir, config, &keys)?;
    println!("Installed master list with {} entities", keys.len());
    Ok(())
}

fn write_master(data_dir: &Path, config: &PlannerConfig, keys: &[EntityKey]) -> Result<()> {
    let loc = &config.reference;
    let dir = data_dir.join(&loc.container).join(&loc.path);
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{}.csv", loc.sheet));

    let mut writer = csv::Writer::from_path(&path)?;
    for key in keys {
        writer.serialize(key)?;
    }
    writer.flush()?;
    Ok(())
}

fn run_seed(
    data_dir: &Path,
    config: &PlannerConfig,
    entities: usize,
    months: u32,
    start: Option<&str>,
    seed: u64,
    with_master: bool,
) -> Result<()> {
    let start = match start {
        Some(s) => month_floor(parse_date(s)?),
        None => {
            let today = month_floor(chrono::Local::now().date_naive());
            add_months(today, -(months as i32))
        }
    };
    let uom = config.uom_filter.first().cloned().unwrap_or_else(|| "BAG".into());

    let mut rng = StdRng::seed_from_u64(seed);
    let mut keys = Vec::with_capacity(entities);
    let mut records = Vec::new();
    for i in 0..entities {
        let key = EntityKey::new(
            &config.classification,
            &config.company,
            format!("W{:03}", 1 + i / 25),
            format!("MAT-{i:04}"),
            &uom,
        );
        let base: f64 = rng.gen_range(5.0..500.0);
        // Sparsity varies per entity so the segmenter has all of F/S/N
        // to chew on.
        let gap_rate: f64 = rng.gen_range(0.0..0.7);
        for m in 0..months {
            if rng.gen::<f64>() < gap_rate {
                continue;
            }
            records.push(DemandRecord {
                key: key.clone(),
                date: add_months(start, m as i32),
                qty: (base * rng.gen_range(0.5..1.5)).round(),
            });
        }
        keys.push(key);
    }

    let store = ParquetPlanningStore::new(data_dir);
    store.write_demand(&records)?;
    println!(
        "Seeded {} demand rows for {} entities starting {}",
        records.len(),
        entities,
        start
    );

    if with_master {
        write_master(data_dir, config, &keys)?;
        println!("Installed the seeded entities as the master list");
    }
    Ok(())
}

fn run_status(data_dir: &Path) -> Result<()> {
    if !data_dir.exists() {
        println!("Data directory does not exist: {}", data_dir.display());
        return Ok(());
    }

    let mut any = false;
    for table in [Table::Demand, Table::Forecast, Table::Monitoring] {
        let dir = data_dir.join(format!("table={table}"));
        let Some((files, size, range)) = partition_summary(&dir)? else {
            continue;
        };
        any = true;
        println!(
            "{:<12} {files:>4} partitions  {:>10}  {range}",
            table.to_string(),
            format_size(size)
        );
    }
    if !any {
        println!("No tables under {}", data_dir.display());
        return Ok(());
    }

    // Loaded forecast batches, newest first.
    let store = ParquetPlanningStore::new(data_dir);
    if store.probe(Table::Forecast) == TableProbe::Exists {
        let mut rows: Vec<ForecastRecord> = Vec::new();
        for period in partition_periods(&data_dir.join(format!("table={}", Table::Forecast)))? {
            rows.extend(store.read_forecasts(period)?);
        }
        let loaded = periods_loaded(&rows);
        if !loaded.is_empty() {
            let list: Vec<String> = loaded.iter().map(|p| p.to_string()).collect();
            println!();
            println!("Forecast batches loaded (newest first): {}", list.join(", "));
        }
    }
    Ok(())
}

/// Partition file count, total size, and period range of one table
/// directory. `None` when the table does not exist.
fn partition_summary(dir: &Path) -> Result<Option<(usize, u64, String)>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let periods = partition_periods(dir)?;
    let mut size = 0u64;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if let Ok(meta) = entry.metadata() {
            size += meta.len();
        }
    }
    let range = match (periods.first(), periods.last()) {
        (Some(first), Some(last)) => format!("{first} to {last}"),
        _ => "(empty)".to_string(),
    };
    Ok(Some((periods.len(), size, range)))
}

/// Periods of a table directory, ascending, parsed from the partition
/// file names.
fn partition_periods(dir: &Path) -> Result<Vec<u32>> {
    let mut periods = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(rest) = name.strip_prefix("period=") else {
            continue;
        };
        let Some(digits) = rest.strip_suffix(".parquet") else {
            continue;
        };
        if let Ok(period) = digits.parse::<u32>() {
            periods.push(period);
        }
    }
    periods.sort_unstable();
    Ok(periods)
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
