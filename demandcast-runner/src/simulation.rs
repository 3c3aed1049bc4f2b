//! Multi-month simulation driver.
//!
//! Replays the monthly trigger over a date range. The pipeline's
//! existence gates make replays idempotent, so re-running a range is safe:
//! already-loaded months read back instead of recomputing.

use crate::config::{FailureMode, PlannerConfig};
use crate::context::PeriodContext;
use crate::pipeline::{PeriodOutcome, Pipeline, PipelineError};
use chrono::NaiveDate;
use demandcast_core::calendar::{add_months, month_floor, period};
use tracing::{error, info};

/// One simulated month of a backtest.
#[derive(Debug)]
pub struct MonthResult {
    pub period: u32,
    pub outcome: Result<PeriodOutcome, PipelineError>,
}

/// Collected results of a monthly replay.
#[derive(Debug, Default)]
pub struct BacktestReport {
    pub months: Vec<MonthResult>,
}

impl BacktestReport {
    pub fn succeeded(&self) -> usize {
        self.months.iter().filter(|m| m.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.months.len() - self.succeeded()
    }
}

/// Drives the pipeline across planning months.
pub struct SimulationDriver<'a> {
    pub config: &'a PlannerConfig,
    pub pipeline: Pipeline<'a>,
}

impl SimulationDriver<'_> {
    /// One trigger invocation: plan the month containing `as_of`.
    pub fn run(&self, as_of: NaiveDate) -> Result<PeriodOutcome, PipelineError> {
        let ctx = PeriodContext::derive(as_of, self.config);
        self.pipeline.run_period(&ctx)
    }

    /// Replay every month from `from` to `to` inclusive.
    ///
    /// Under `FailFast` the first failed month aborts the backtest; under
    /// `FailIsolated` it is recorded and the replay continues.
    pub fn backtest(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<BacktestReport, PipelineError> {
        let mut report = BacktestReport::default();
        let mut month = month_floor(from);
        let last = month_floor(to);
        while month <= last {
            let p = period(month);
            match self.run(month) {
                Ok(outcome) => {
                    report.months.push(MonthResult { period: p, outcome: Ok(outcome) });
                }
                Err(err) => match self.config.failure_mode {
                    FailureMode::FailFast => {
                        error!(period = p, error = %err, "month failed, aborting backtest");
                        return Err(err);
                    }
                    FailureMode::FailIsolated => {
                        error!(period = p, error = %err, "month failed, continuing");
                        report.months.push(MonthResult { period: p, outcome: Err(err) });
                    }
                },
            }
            month = add_months(month, 1);
        }
        info!(
            months = report.months.len(),
            failed = report.failed(),
            "backtest complete"
        );
        Ok(report)
    }
}
