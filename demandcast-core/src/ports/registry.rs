//! Model registry capability: month-tagged version bookkeeping.

use crate::domain::ModelVersion;
use super::predictor::ModelHandle;
use thiserror::Error;

/// Registration request for a freshly trained model.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterSpec {
    pub name: String,
    pub label_key: String,
    pub label_value: String,
    pub artifact_uri: String,
    pub description: String,
    /// Aliases moved to the new version, e.g. `last-training` and the
    /// version value itself.
    pub aliases: Vec<String>,
}

/// Whether a registration created the model or added a version to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    First,
    NewVersion,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("model {name} has no version labeled {label_key}={label_value}")]
    VersionNotFound {
        name: String,
        label_key: String,
        label_value: String,
    },
    #[error("registry backend failure: {0}")]
    Backend(String),
}

/// Version store for trained models. One version per planning month; a
/// replay of the same month reuses the existing version instead of
/// training again.
pub trait ModelRegistry: Send + Sync {
    /// Whether any version carries the given label, along with every
    /// version of the model (empty when the model itself is new).
    fn version_exists(
        &self,
        name: &str,
        label_key: &str,
        label_value: &str,
    ) -> Result<(bool, Vec<ModelVersion>), RegistryError>;

    fn load(
        &self,
        name: &str,
        label_key: &str,
        label_value: &str,
    ) -> Result<ModelHandle, RegistryError>;

    fn register(&self, spec: &RegisterSpec) -> Result<Registration, RegistryError>;
}
