//! npm + esbuild bundler
//!
//! Each build runs in its own transient directory:
//!
//! ```text
//! kiln-build-XXXX/
//! ├── package.json     # single exact dependency
//! ├── node_modules/    # npm install output
//! ├── entry.js         # re-exports the package
//! └── out.js           # esbuild output (the artifact)
//! ```
//!
//! The directory is removed when the build finishes, fails, or is dropped
//! by a timeout.

use crate::bundler::{Bundler, HostModules};
use crate::config::schema::BuildConfig;
use crate::error::{KilnError, KilnResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::fs;
use tokio::process::Command;
use tracing::debug;

const ENTRY_FILE: &str = "entry.js";
const OUT_FILE: &str = "out.js";

/// Bundler that installs with npm and bundles with esbuild
pub struct EsbuildBundler {
    npm: String,
    esbuild: String,
    work_dir: PathBuf,
}

impl EsbuildBundler {
    pub fn new(npm: impl Into<String>, esbuild: impl Into<String>, work_dir: PathBuf) -> Self {
        Self {
            npm: npm.into(),
            esbuild: esbuild.into(),
            work_dir,
        }
    }

    pub fn from_config(config: &BuildConfig) -> Self {
        Self::new(
            config.npm.clone(),
            config.esbuild.clone(),
            config.work_dir.clone().unwrap_or_else(std::env::temp_dir),
        )
    }

    async fn workspace(&self, package: &str) -> KilnResult<TempDir> {
        fs::create_dir_all(&self.work_dir).await.map_err(|e| {
            bundle_error(package, &format!("creating work dir {}", self.work_dir.display()), e)
        })?;

        tempfile::Builder::new()
            .prefix("kiln-build-")
            .tempdir_in(&self.work_dir)
            .map_err(|e| bundle_error(package, "creating build directory", e))
    }

    /// Run a tool in `dir` and return its output
    async fn exec(&self, program: &str, args: &[String], dir: &Path) -> KilnResult<std::process::Output> {
        debug!("Executing: {} {:?}", program, args);

        Command::new(program)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| KilnError::command_failed(format!("{} {:?}", program, args), e))
    }

    async fn install(&self, name: &str, version: &str, dir: &Path) -> KilnResult<()> {
        let package = format!("{}@{}", name, version);
        let manifest = serde_json::to_vec_pretty(&manifest_json(name, version))
            .map_err(|e| bundle_error(&package, "encoding package.json", e))?;
        fs::write(dir.join("package.json"), manifest)
            .await
            .map_err(|e| bundle_error(&package, "writing package.json", e))?;

        let args: Vec<String> = [
            "install",
            "--no-audit",
            "--no-fund",
            "--ignore-scripts",
            "--omit=dev",
            "--legacy-peer-deps",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let output = self.exec(&self.npm, &args, dir).await?;
        if !output.status.success() {
            return Err(KilnError::Install {
                package,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if !dir.join("node_modules").join(name).join("package.json").exists() {
            return Err(KilnError::EntryNotFound { package });
        }

        Ok(())
    }

    async fn build(&self, name: &str, version: &str, host: &HostModules, dir: &Path) -> KilnResult<Vec<u8>> {
        let package = format!("{}@{}", name, version);
        fs::write(dir.join(ENTRY_FILE), entry_module(name))
            .await
            .map_err(|e| bundle_error(&package, "writing entry.js", e))?;

        let args = esbuild_args(host);
        let output = self.exec(&self.esbuild, &args, dir).await?;
        if !output.status.success() {
            return Err(KilnError::Bundle {
                package,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        fs::read(dir.join(OUT_FILE))
            .await
            .map_err(|e| bundle_error(&package, "reading out.js", e))
    }
}

#[async_trait]
impl Bundler for EsbuildBundler {
    async fn bundle(&self, name: &str, version: &str, host: &HostModules) -> KilnResult<Vec<u8>> {
        let workspace = self.workspace(&format!("{}@{}", name, version)).await?;
        let dir = workspace.path().to_path_buf();

        let result = async {
            self.install(name, version, &dir).await?;
            self.build(name, version, host, &dir).await
        }
        .await;

        if let Err(e) = workspace.close() {
            debug!("Failed to remove build directory {}: {}", dir.display(), e);
        }

        result
    }
}

/// Local failures inside a build directory count against the build stage
fn bundle_error(package: &str, context: &str, e: impl std::fmt::Display) -> KilnError {
    KilnError::Bundle {
        package: package.to_string(),
        stderr: format!("{}: {}", context, e),
    }
}

fn manifest_json(name: &str, version: &str) -> serde_json::Value {
    let mut dependencies = serde_json::Map::new();
    dependencies.insert(name.to_string(), serde_json::Value::String(version.to_string()));

    serde_json::json!({
        "name": "kiln-build",
        "private": true,
        "dependencies": dependencies,
    })
}

/// Entry module exposing both the named exports and a default export
fn entry_module(name: &str) -> String {
    let quoted = serde_json::Value::String(name.to_string()).to_string();
    format!(
        "import * as pkg from {q};\nexport * from {q};\nexport default (pkg.default ?? pkg);\n",
        q = quoted
    )
}

fn esbuild_args(host: &HostModules) -> Vec<String> {
    let mut args: Vec<String> = [
        ENTRY_FILE,
        "--bundle",
        "--minify",
        "--format=esm",
        "--platform=browser",
        "--log-level=error",
        "--define:process.env.NODE_ENV=\"production\"",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    args.push(format!("--outfile={}", OUT_FILE));
    args.extend(host.esbuild_externals());
    args
}
