//! Capability traits for external collaborators.
//!
//! The pipeline talks to its warehouse, reference storage, model registry,
//! and predictor exclusively through these traits, so runs are testable
//! against in-memory fakes and portable across backends.

mod datastore;
mod filestore;
mod predictor;
mod registry;

pub use datastore::{
    PartitionSpec, PlanningStore, StoreError, Table, TableProbe, WriteMode,
};
pub use filestore::ReferenceStore;
pub use predictor::{ModelHandle, PredictError, Predictor, QuantileRow, TrainSpec};
pub use registry::{ModelRegistry, Registration, RegisterSpec, RegistryError};
