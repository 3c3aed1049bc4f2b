//! JSON-sidecar model registry for local runs.

use demandcast_core::domain::ModelVersion;
use demandcast_core::ports::{
    ModelHandle, ModelRegistry, RegisterSpec, Registration, RegistryError,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredVersion {
    version: ModelVersion,
    aliases: Vec<String>,
    registered_at: chrono::NaiveDateTime,
    description: String,
}

/// File-backed [`ModelRegistry`], one `versions.json` per registry root.
pub struct FsModelRegistry {
    root: PathBuf,
}

impl FsModelRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn versions_path(&self) -> PathBuf {
        self.root.join("versions.json")
    }

    fn read_all(&self) -> Result<Vec<StoredVersion>, RegistryError> {
        let path = self.versions_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&path)
            .map_err(|e| RegistryError::Backend(format!("read {}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| RegistryError::Backend(format!("parse {}: {e}", path.display())))
    }

    fn write_all(&self, versions: &[StoredVersion]) -> Result<(), RegistryError> {
        fs::create_dir_all(&self.root)
            .map_err(|e| RegistryError::Backend(format!("create registry dir: {e}")))?;
        let json = serde_json::to_string_pretty(versions)
            .map_err(|e| RegistryError::Backend(format!("serialize versions: {e}")))?;
        let path = self.versions_path();
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .map_err(|e| RegistryError::Backend(format!("write versions: {e}")))?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            RegistryError::Backend(format!("atomic rename failed: {e}"))
        })
    }
}

fn matches(v: &ModelVersion, name: &str, label_key: &str, label_value: &str) -> bool {
    v.name == name && v.label_key == label_key && v.label_value == label_value
}

impl ModelRegistry for FsModelRegistry {
    fn version_exists(
        &self,
        name: &str,
        label_key: &str,
        label_value: &str,
    ) -> Result<(bool, Vec<ModelVersion>), RegistryError> {
        let stored = self.read_all()?;
        let all: Vec<ModelVersion> = stored
            .iter()
            .filter(|s| s.version.name == name)
            .map(|s| s.version.clone())
            .collect();
        let exists = all.iter().any(|v| matches(v, name, label_key, label_value));
        Ok((exists, all))
    }

    fn load(
        &self,
        name: &str,
        label_key: &str,
        label_value: &str,
    ) -> Result<ModelHandle, RegistryError> {
        self.read_all()?
            .into_iter()
            .find(|s| matches(&s.version, name, label_key, label_value))
            .map(|s| ModelHandle {
                name: s.version.name,
                version: s.version.label_value,
                artifact_uri: s.version.artifact_uri,
            })
            .ok_or_else(|| RegistryError::VersionNotFound {
                name: name.into(),
                label_key: label_key.into(),
                label_value: label_value.into(),
            })
    }

    fn register(&self, spec: &RegisterSpec) -> Result<Registration, RegistryError> {
        let mut stored = self.read_all()?;
        let first = !stored.iter().any(|s| s.version.name == spec.name);

        // Aliases are unique per model; they move to the new version.
        for s in stored.iter_mut().filter(|s| s.version.name == spec.name) {
            s.aliases.retain(|a| !spec.aliases.contains(a));
        }
        stored.push(StoredVersion {
            version: ModelVersion {
                name: spec.name.clone(),
                label_key: spec.label_key.clone(),
                label_value: spec.label_value.clone(),
                artifact_uri: spec.artifact_uri.clone(),
            },
            aliases: spec.aliases.clone(),
            registered_at: chrono::Local::now().naive_local(),
            description: spec.description.clone(),
        });
        self.write_all(&stored)?;
        Ok(if first {
            Registration::First
        } else {
            Registration::NewVersion
        })
    }
}

/// Registry root helper used by the CLI.
pub fn default_registry_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("registry")
}
