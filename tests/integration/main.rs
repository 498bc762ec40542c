//! Integration tests for Kiln

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const SNAPSHOT: &str = r#"{
  "axios": {
    "name": "axios",
    "version": "1.6.0",
    "storageId": "9f1c2d",
    "fileName": "axios@1.6.0.js",
    "url": "https://blobs.example.com/9f1c2d/axios@1.6.0.js",
    "size": 2048,
    "uploadedAt": "2026-03-01T10:00:00Z",
    "latestVersion": "1.6.0"
  },
  "axios@1.5.0": {
    "name": "axios",
    "version": "1.5.0",
    "storageId": "77ab01",
    "fileName": "axios@1.5.0.js",
    "url": "https://blobs.example.com/77ab01/axios@1.5.0.js",
    "size": 1900,
    "uploadedAt": "2026-02-01T10:00:00Z"
  },
  "axios@1.6.0": {
    "name": "axios",
    "version": "1.6.0",
    "storageId": "9f1c2d",
    "fileName": "axios@1.6.0.js",
    "url": "https://blobs.example.com/9f1c2d/axios@1.6.0.js",
    "size": 2048,
    "uploadedAt": "2026-03-01T10:00:00Z"
  }
}"#;

    /// Sandbox with its own config, index, storage and failures file
    struct Workspace {
        dir: TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let root = dir.path();
            let config = format!(
                r#"[general]
journal = false

[index]
path = '{index}'

[build]
failures_path = '{failures}'
resolve_timeout_secs = 5

[registry]
url = "http://127.0.0.1:9"

[storage]
backend = "local"
local_dir = '{artifacts}'
"#,
                index = root.join("index.json").display(),
                failures = root.join("failures.json").display(),
                artifacts = root.join("artifacts").display(),
            );
            fs::write(root.join("config.toml"), config).unwrap();
            Self { dir }
        }

        fn with_snapshot(self, content: &str) -> Self {
            fs::write(self.path("index.json"), content).unwrap();
            self
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn kiln(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("kiln");
            cmd.arg("--config")
                .arg(self.path("config.toml"))
                .env_remove("KILN_REGISTRY_URL")
                .env_remove("KILN_STORAGE_API_KEY")
                .env_remove("KILN_STORAGE_ENDPOINT")
                .env_remove("KILN_STORAGE_BUCKET")
                .env_remove("RUST_LOG");
            cmd
        }
    }

    fn read_json(path: &Path) -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("kiln")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("versioned build-artifact cache"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("kiln")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("kiln"));
    }

    #[test]
    fn config_path_honors_flag() {
        let ws = Workspace::new();
        ws.kiln()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let ws = Workspace::new();
        ws.kiln()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[build]"))
            .stdout(predicate::str::contains("concurrency = 4"));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let ws = Workspace::new();
        fs::write(ws.path("config.toml"), "[build]\nconcurrency = 0\n").unwrap();
        ws.kiln()
            .arg("stats")
            .assert()
            .failure()
            .stderr(predicate::str::contains("concurrency"));
    }

    #[test]
    fn config_commands_work_on_incomplete_config() {
        let ws = Workspace::new();
        fs::write(ws.path("config.toml"), "[storage]\nbackend = \"http\"\n").unwrap();

        ws.kiln()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));

        ws.kiln()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("backend = \"http\""));

        ws.kiln()
            .arg("stats")
            .assert()
            .failure()
            .stderr(predicate::str::contains("storage."));
    }

    #[test]
    fn config_init_force_replaces_broken_file() {
        let ws = Workspace::new();
        fs::write(ws.path("config.toml"), "[build\nconcurrency = ").unwrap();

        ws.kiln()
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("config.toml"));

        ws.kiln()
            .args(["config", "init", "--force"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));

        ws.kiln()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("concurrency = 4"));
    }

    #[test]
    fn lookup_latest() {
        let ws = Workspace::new().with_snapshot(SNAPSHOT);
        ws.kiln()
            .args(["lookup", "axios"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"version\": \"1.6.0\""));
    }

    #[test]
    fn lookup_exact_version() {
        let ws = Workspace::new().with_snapshot(SNAPSHOT);
        ws.kiln()
            .args(["lookup", "axios@1.5.0"])
            .assert()
            .success()
            .stdout(predicate::str::contains("77ab01"));
    }

    #[test]
    fn lookup_miss_fails() {
        let ws = Workspace::new().with_snapshot(SNAPSHOT);
        ws.kiln()
            .args(["lookup", "axios@9.9.9"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not cached"));
    }

    #[test]
    fn versions_newest_first() {
        let ws = Workspace::new().with_snapshot(SNAPSHOT);
        let output = ws
            .kiln()
            .args(["versions", "axios", "--format", "json"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(body["count"], 2);
        assert_eq!(body["versions"][0]["version"], "1.6.0");
        assert_eq!(body["versions"][1]["version"], "1.5.0");
    }

    #[test]
    fn stats_json() {
        let ws = Workspace::new().with_snapshot(SNAPSHOT);
        let output = ws
            .kiln()
            .args(["stats", "--format", "json"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(body["uniquePackages"], 1);
        assert_eq!(body["totalVersions"], 2);
        assert_eq!(body["totalSize"], 3948);
    }

    #[test]
    fn stats_on_corrupt_snapshot_warns_and_reports_empty() {
        let ws = Workspace::new().with_snapshot("{ not json");
        ws.kiln()
            .arg("stats")
            .assert()
            .success()
            .stderr(predicate::str::contains("corrupt"))
            .stdout(predicate::str::contains("Packages: 0"))
            .stdout(predicate::str::contains("corrupt").not());
    }

    #[test]
    fn json_output_stays_parseable_on_corrupt_snapshot() {
        let ws = Workspace::new().with_snapshot("{ not json");
        let output = ws
            .kiln()
            .args(["versions", "axios", "--format", "json"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(body["count"], 0);
        assert!(String::from_utf8_lossy(&output.stderr).contains("corrupt"));
    }

    #[test]
    fn build_requires_packages() {
        let ws = Workspace::new();
        ws.kiln()
            .arg("build")
            .assert()
            .failure()
            .stderr(predicate::str::contains("No packages to build"));
    }

    #[test]
    fn build_skips_host_modules_and_persists_index() {
        let ws = Workspace::new().with_snapshot(SNAPSHOT);
        ws.kiln()
            .args(["build", "react", "react-dom/client"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Skipped (builtin): 2"));

        let index = read_json(&ws.path("index.json"));
        assert_eq!(index["axios@1.6.0"]["storageId"], "9f1c2d");
        assert!(index.get("react").is_none());

        let failures = read_json(&ws.path("failures.json"));
        assert_eq!(failures, serde_json::json!([]));

        let mirrored = ws.path("artifacts").join("kiln-index").join("index.json");
        assert!(mirrored.exists());
    }

    #[test]
    fn build_failures_are_data_not_exit_codes() {
        let ws = Workspace::new();
        fs::write(ws.path("packages.txt"), "# unreachable registry\nleft-pad\n").unwrap();

        ws.kiln()
            .args(["build", "--packages-file"])
            .arg(ws.path("packages.txt"))
            .assert()
            .success()
            .stdout(predicate::str::contains("Failed: 1"));

        let failures = read_json(&ws.path("failures.json"));
        assert_eq!(failures[0]["name"], "left-pad");
        assert_eq!(failures[0]["stage"], "resolve");
    }
}
