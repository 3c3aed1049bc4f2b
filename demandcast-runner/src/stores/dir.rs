//! Directory-backed reference store reading CSV sheets.

use csv::ReaderBuilder;
use demandcast_core::domain::EntityKey;
use demandcast_core::ports::{ReferenceStore, StoreError};
use std::path::{Path, PathBuf};

/// Reference store over a local directory tree.
///
/// `container` maps to a subdirectory, `path` to a file or directory
/// inside it. A directory `path` holds one CSV per sheet; a file `path`
/// is read directly and the sheet name is ignored.
pub struct DirReferenceStore {
    root: PathBuf,
}

impl DirReferenceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, container: &str, path: &str) -> PathBuf {
        self.root.join(container).join(path)
    }

    fn sheet_path(&self, container: &str, path: &str, sheet: &str) -> PathBuf {
        let resolved = self.resolve(container, path);
        if resolved.is_dir() {
            resolved.join(format!("{sheet}.csv"))
        } else {
            resolved
        }
    }
}

impl ReferenceStore for DirReferenceStore {
    fn exists(&self, container: &str, path: &str) -> bool {
        self.resolve(container, path).exists()
    }

    fn read_master_list(
        &self,
        container: &str,
        path: &str,
        sheet: &str,
    ) -> Result<Vec<EntityKey>, StoreError> {
        let file = self.sheet_path(container, path, sheet);
        read_key_csv(&file)
    }
}

/// Read entity keys from a headered CSV with the five key columns.
pub fn read_key_csv(path: &Path) -> Result<Vec<EntityKey>, StoreError> {
    let mut reader = ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| StoreError::Backend(format!("open {}: {e}", path.display())))?;
    let mut keys = Vec::new();
    for record in reader.deserialize() {
        let key: EntityKey =
            record.map_err(|e| StoreError::Backend(format!("parse {}: {e}", path.display())))?;
        keys.push(key);
    }
    Ok(keys)
}
