//! Kiln - versioned build-artifact cache for npm packages
//!
//! Resolves packages to exact versions, bundles each version once,
//! stores the artifact and answers lookups over HTTP from an index.

pub mod build;
pub mod bundler;
pub mod cli;
pub mod config;
pub mod error;
pub mod index;
pub mod registry;
pub mod server;
pub mod storage;
pub mod ui;

pub use error::{KilnError, KilnResult};
