//! Planning-run orchestration.
//!
//! Wires the engine in `demandcast-core` to concrete store backends:
//! immutable run configuration, per-period context, the existence-gated
//! pipeline, and the multi-month simulation driver. The [`baseline`]
//! predictor keeps everything runnable without an external ML service.

pub mod baseline;
pub mod config;
pub mod context;
pub mod pipeline;
pub mod simulation;
pub mod stores;
