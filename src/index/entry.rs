//! Index entry types and package spec parsing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A lookup key split into package name and optional version.
///
/// Handles both `name@version` and `@scope/name@version`: the `@` that
/// opens a scope is never treated as the version separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageSpec {
    pub name: String,
    pub version: Option<String>,
}

impl PackageSpec {
    /// Parse a lookup key. A trailing `@` with no version is a bare name.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let scope_offset = usize::from(input.starts_with('@'));

        match input[scope_offset..].find('@') {
            Some(pos) => {
                let split = scope_offset + pos;
                let version = &input[split + 1..];
                Self {
                    name: input[..split].to_string(),
                    version: (!version.is_empty()).then(|| version.to_string()),
                }
            }
            None => Self {
                name: input.to_string(),
                version: None,
            },
        }
    }

    /// The exact artifact this spec addresses, if it names a version
    pub fn artifact_key(&self) -> Option<ArtifactKey> {
        self.version
            .as_deref()
            .map(|version| ArtifactKey::new(&self.name, version))
    }
}

/// Identity of one built artifact: `name@version`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactKey {
    pub name: String,
    pub version: String,
}

impl ArtifactKey {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Metadata for one stored artifact.
///
/// The same shape is used for versioned entries and for the bare-name
/// latest pointer; only the pointer carries `latest_version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub name: String,
    pub version: String,
    pub storage_id: String,
    pub file_name: String,
    pub url: String,
    #[serde(rename = "size")]
    pub size_bytes: u64,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,
}

impl IndexEntry {
    pub fn key(&self) -> ArtifactKey {
        ArtifactKey::new(&self.name, &self.version)
    }

    /// Copy of this entry tagged as the latest pointer for its name
    pub fn as_latest_pointer(&self) -> Self {
        Self {
            latest_version: Some(self.version.clone()),
            ..self.clone()
        }
    }
}

/// Timestamps that are missing or unparseable load as `None`
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc)))
}

/// Storage file name for an artifact: `{sanitized-name}@{version}.js`
///
/// The scope marker is dropped, `/` becomes `__`, and anything outside
/// `[A-Za-z0-9._-]` becomes `_`.
pub fn artifact_file_name(name: &str, version: &str) -> String {
    format!("{}@{}.js", sanitize(name), sanitize(version))
}

fn sanitize(raw: &str) -> String {
    raw.trim_start_matches('@')
        .replace('/', "__")
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}
