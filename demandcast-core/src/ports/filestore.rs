//! Reference-data capability: the business-owned master list.

use crate::domain::EntityKey;
use super::datastore::StoreError;

/// File-shaped reference storage holding the master entity list.
pub trait ReferenceStore: Send + Sync {
    /// Existence probe. Fail-open like table probes: a backend failure
    /// reports `false` and the caller skips gracefully.
    fn exists(&self, container: &str, path: &str) -> bool;

    /// Read the master list of known entities from one sheet of the
    /// reference workbook.
    fn read_master_list(
        &self,
        container: &str,
        path: &str,
        sheet: &str,
    ) -> Result<Vec<EntityKey>, StoreError>;
}
