//! Artifact index: the record of what has been built
//!
//! # Keyspace
//!
//! | Key | Meaning | Mutability |
//! |-----|---------|------------|
//! | `name@version` | One finished build | Write-once |
//! | `name` | Latest pointer, last committed version | Overwritten on commit |
//!
//! A versioned key exists only for builds whose artifact reached storage.
//! The latest pointer follows commit order, not semantic version order.

pub mod entry;
pub mod manager;
pub mod snapshot;

pub use entry::{artifact_file_name, ArtifactKey, IndexEntry, PackageSpec};
pub use manager::{CacheIndex, IndexStats};
pub use snapshot::{IndexLoad, IndexStore, LoadStatus};
