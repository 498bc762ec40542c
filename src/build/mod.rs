//! Build pipeline: from package names to committed index entries
//!
//! # Outcomes
//!
//! | Outcome | Counted as | Index touched |
//! |---------|-----------|---------------|
//! | Host-provided name | `skipped_builtin` | no |
//! | Version already built | `skipped_cached` | no |
//! | Resolve / build / upload error | `failed` | no |
//! | Built and stored | `bundled` | versioned key + latest pointer |

pub mod journal;
pub mod orchestrator;
pub mod summary;

pub use journal::BuildJournal;
pub use orchestrator::{Adapters, BuildOrchestrator, PipelineSettings};
pub use summary::{FailureRecord, Outcome, PackageReport, RunSummary, SkipReason};
