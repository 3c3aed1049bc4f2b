//! Demand segmentation and forecast routing for monthly supply planning.
//!
//! The crate turns raw transactional demand into a dense monthly series,
//! segments it along ABC (value), XYZ (variability), and FSN (turnover)
//! axes, routes every entity to a forecasting strategy, and produces a
//! unified quantile forecast plus accuracy monitoring. External systems
//! (warehouse, reference files, model registry, predictor) sit behind the
//! traits in [`ports`].

pub mod calendar;
pub mod domain;
pub mod features;
pub mod forecast;
pub mod monitor;
pub mod ports;
pub mod preparation;
pub mod routing;
pub mod segmentation;
