//! Per-period run context.

use crate::config::PlannerConfig;
use chrono::NaiveDate;
use demandcast_core::calendar::{add_months, month_floor, period, MonthWindow};
use demandcast_core::domain::LoadStamp;

/// Everything a single planning period derives from (as-of date, config).
///
/// A pure value computed once per period; the pipeline and stores take it
/// by reference instead of reaching back into a mutable planner object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodContext {
    /// First of the planning month.
    pub as_of: NaiveDate,
    /// Planning period as YYYYMM; the load partition key.
    pub period: u32,
    /// History window for training and fallbacks, ending at the month
    /// before the planning month.
    pub history: MonthWindow,
    /// Months whose forecasts become fully observable this period.
    pub monitoring: MonthWindow,
    pub stamp: LoadStamp,
}

impl PeriodContext {
    pub fn derive(as_of: NaiveDate, config: &PlannerConfig) -> Self {
        let as_of = month_floor(as_of);
        let prev = add_months(as_of, -1);
        Self {
            as_of,
            period: period(as_of),
            history: MonthWindow::trailing(prev, config.windows.history_months),
            monitoring: MonthWindow::new(
                add_months(as_of, -(config.windows.horizon_months as i32)),
                prev,
            ),
            stamp: LoadStamp::new(as_of, period(as_of)),
        }
    }

    /// Month-tagged model version value, e.g. `v202404`.
    pub fn model_version(&self) -> String {
        format!("v{}", self.period)
    }
}
