//! Forecast strategies and their orchestration.
//!
//! Three paths produce the unified output: the trained quantile model for
//! the routed forecastable population, a recursive moving average for
//! fallback entities that still sell, and zeros for the rest.

mod moving_average;
mod orchestrator;
mod ring;

pub use moving_average::project;
pub use orchestrator::{FlagOverrides, ForecastError, Orchestrator};
pub use ring::RingBuffer;
