//! Store backends implementing the capability traits: in-memory doubles
//! for tests and demos, Parquet/CSV/JSON-backed stores for local runs.

mod dir;
mod fs_registry;
mod memory;
mod parquet;

pub use dir::{read_key_csv, DirReferenceStore};
pub use fs_registry::{default_registry_dir, FsModelRegistry};
pub use memory::{MemoryPlanningStore, MemoryReferenceStore, MemoryRegistry};
pub use parquet::ParquetPlanningStore;
