//! Terminal output with a plain fallback for CI and pipes
//!
//! ```rust,ignore
//! use kiln::ui::{self, UiContext, BuildProgress};
//!
//! let ctx = UiContext::detect();
//! let progress = BuildProgress::new(&ctx, names.len());
//! // ... progress.on_report(&report) per package ...
//! progress.finish();
//! ui::key_value(&ctx, "Bundled", "1");
//! ```

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    key_value, key_value_status, remark, section, step_info, step_ok_detail, step_warn_hint,
    warn_hint_stderr,
};
pub use progress::{format_bytes, BuildProgress};
