//! In-memory artifact index
//!
//! Keeps versioned entries and latest pointers in separate maps so that
//! "a pointer exists for this name" is never mistaken for "this exact
//! version was built". Both are flattened into one keyspace only when
//! persisted.

use crate::index::entry::{ArtifactKey, IndexEntry, PackageSpec};
use indexmap::IndexMap;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// Aggregate figures over versioned entries only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub unique_packages: usize,
    pub total_versions: usize,
    pub total_size: u64,
}

/// The mapping from artifact identity to stored artifact metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheIndex {
    by_key: BTreeMap<ArtifactKey, IndexEntry>,
    latest_by_name: BTreeMap<String, IndexEntry>,
}

impl CacheIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the index from the flat persisted keyspace
    pub fn from_snapshot(snapshot: BTreeMap<String, IndexEntry>) -> Self {
        let mut index = Self::new();

        for (key, entry) in snapshot {
            let spec = PackageSpec::parse(&key);
            match spec.artifact_key() {
                Some(artifact) => {
                    if artifact != entry.key() {
                        warn!(
                            "Index key {} does not match entry {}, keeping key",
                            key,
                            entry.key()
                        );
                    }
                    index.by_key.insert(artifact, entry);
                }
                None => {
                    let mut pointer = entry;
                    if pointer.latest_version.is_none() {
                        pointer.latest_version = Some(pointer.version.clone());
                    }
                    index.latest_by_name.insert(spec.name, pointer);
                }
            }
        }

        index
    }

    /// Flatten into the persisted keyspace (`name` and `name@version`)
    pub fn to_snapshot(&self) -> BTreeMap<String, IndexEntry> {
        let versioned = self
            .by_key
            .iter()
            .map(|(key, entry)| (key.to_string(), entry.clone()));
        let pointers = self
            .latest_by_name
            .iter()
            .map(|(name, entry)| (name.clone(), entry.clone()));

        versioned.chain(pointers).collect()
    }

    /// True iff a versioned entry exists for exactly this name and version
    pub fn is_built(&self, name: &str, version: &str) -> bool {
        self.by_key.contains_key(&ArtifactKey::new(name, version))
    }

    /// Record a successful build and move the latest pointer to it
    pub fn commit(&mut self, entry: IndexEntry) {
        let key = entry.key();
        debug!("Committing {}", key);

        self.latest_by_name
            .insert(entry.name.clone(), entry.as_latest_pointer());
        self.by_key.insert(key, entry);
    }

    /// Look up a bare name (latest pointer) or `name@version`
    pub fn get(&self, key: &str) -> Option<&IndexEntry> {
        self.lookup(&PackageSpec::parse(key))
    }

    /// Look up an already-parsed spec
    pub fn lookup(&self, spec: &PackageSpec) -> Option<&IndexEntry> {
        match spec.artifact_key() {
            Some(key) => self.by_key.get(&key),
            None => self.latest_by_name.get(&spec.name),
        }
    }

    /// Look up many keys; each distinct input key appears once, in first-seen order
    pub fn batch_get<'a, I, S>(&self, keys: I) -> IndexMap<String, Option<&IndexEntry>>
    where
        I: IntoIterator<Item = &'a S>,
        S: AsRef<str> + 'a + ?Sized,
    {
        let mut results = IndexMap::new();
        for key in keys {
            let key = key.as_ref();
            if !results.contains_key(key) {
                results.insert(key.to_string(), self.get(key));
            }
        }
        results
    }

    /// All versioned entries for a name, most recently uploaded first.
    ///
    /// Entries without a usable timestamp sort as oldest, keeping their
    /// relative key order.
    pub fn list_versions(&self, name: &str) -> Vec<&IndexEntry> {
        let mut versions: Vec<&IndexEntry> = self
            .by_key
            .range(ArtifactKey::new(name, "")..)
            .take_while(|(key, _)| key.name == name)
            .map(|(_, entry)| entry)
            .collect();

        versions.sort_by_key(|entry| Reverse(entry.uploaded_at));
        versions
    }

    /// Aggregate figures; latest pointers are excluded
    pub fn stats(&self) -> IndexStats {
        let names: HashSet<&str> = self.by_key.keys().map(|k| k.name.as_str()).collect();
        IndexStats {
            unique_packages: names.len(),
            total_versions: self.by_key.len(),
            total_size: self.by_key.values().map(|e| e.size_bytes).sum(),
        }
    }

    /// Total number of persisted keys (versioned + latest pointers)
    pub fn len(&self) -> usize {
        self.by_key.len() + self.latest_by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty() && self.latest_by_name.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    pub(crate) fn entry(name: &str, version: &str, size: u64) -> IndexEntry {
        entry_at(name, version, size, Some(Utc::now()))
    }

    pub(crate) fn entry_at(
        name: &str,
        version: &str,
        size: u64,
        uploaded_at: Option<DateTime<Utc>>,
    ) -> IndexEntry {
        let file_name = crate::index::artifact_file_name(name, version);
        IndexEntry {
            name: name.to_string(),
            version: version.to_string(),
            storage_id: format!("id-{}", file_name),
            url: format!("https://blobs.example.com/{}", file_name),
            file_name,
            size_bytes: size,
            uploaded_at,
            sha256: None,
            latest_version: None,
        }
    }

    #[test]
    fn commit_marks_built_and_moves_pointer() {
        let mut index = CacheIndex::new();
        assert!(!index.is_built("axios", "1.6.0"));

        index.commit(entry("axios", "1.6.0", 100));
        assert!(index.is_built("axios", "1.6.0"));
        assert!(!index.is_built("axios", "1.5.0"));

        let latest = index.get("axios").unwrap();
        assert_eq!(latest.version, "1.6.0");
        assert_eq!(latest.latest_version.as_deref(), Some("1.6.0"));
    }

    #[test]
    fn latest_pointer_is_last_committed_not_highest() {
        let mut index = CacheIndex::new();
        index.commit(entry("axios", "1.6.0", 100));
        index.commit(entry("axios", "1.5.0", 90));

        assert_eq!(index.get("axios").unwrap().version, "1.5.0");
        assert_eq!(index.get("axios@1.6.0").unwrap().version, "1.6.0");
    }

    #[test]
    fn pointer_alone_is_not_a_build() {
        let mut snapshot = BTreeMap::new();
        snapshot.insert("axios".to_string(), entry("axios", "1.6.0", 1));
        let index = CacheIndex::from_snapshot(snapshot);

        assert!(index.get("axios").is_some());
        assert!(!index.is_built("axios", "1.6.0"));
        assert_eq!(index.stats().total_versions, 0);
    }

    #[test]
    fn scoped_lookup() {
        let mut index = CacheIndex::new();
        index.commit(entry("@react-navigation/native", "7.1.0", 5));

        assert!(index.get("@react-navigation/native@7.1.0").is_some());
        assert!(index.get("@react-navigation/native").is_some());
        assert!(index.get("@react-navigation/native@7.0.0").is_none());
    }

    #[test]
    fn batch_get_keeps_each_input_once() {
        let mut index = CacheIndex::new();
        index.commit(entry("axios", "1.6.0", 100));

        let keys = ["axios", "ghost-pkg", "axios", "axios@1.6.0"];
        let results = index.batch_get(&keys);

        assert_eq!(results.len(), 3);
        let order: Vec<&str> = results.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["axios", "ghost-pkg", "axios@1.6.0"]);
        assert!(results["axios"].is_some());
        assert!(results["ghost-pkg"].is_none());
    }

    #[test]
    fn list_versions_newest_first_missing_timestamps_last() {
        let now = Utc::now();
        let mut index = CacheIndex::new();
        index.commit(entry_at("lodash", "4.17.20", 1, Some(now - Duration::days(2))));
        index.commit(entry_at("lodash", "4.17.19", 1, None));
        index.commit(entry_at("lodash", "4.17.21", 1, Some(now)));
        index.commit(entry_at("lodash-es", "4.17.21", 1, Some(now)));

        let versions: Vec<&str> = index
            .list_versions("lodash")
            .iter()
            .map(|e| e.version.as_str())
            .collect();
        assert_eq!(versions, vec!["4.17.21", "4.17.20", "4.17.19"]);
    }

    #[test]
    fn stats_exclude_pointers() {
        let mut index = CacheIndex::new();
        index.commit(entry("axios", "1.5.0", 100));
        index.commit(entry("axios", "1.6.0", 200));
        index.commit(entry("lodash", "4.17.21", 50));

        assert_eq!(
            index.stats(),
            IndexStats {
                unique_packages: 2,
                total_versions: 3,
                total_size: 350,
            }
        );
        assert_eq!(index.len(), 5);
    }

    #[test]
    fn snapshot_roundtrip_preserves_keys() {
        let mut index = CacheIndex::new();
        index.commit(entry("axios", "1.6.0", 100));
        index.commit(entry("@scope/pkg", "0.1.0", 7));

        let snapshot = index.to_snapshot();
        let keys: Vec<&str> = snapshot.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["@scope/pkg", "@scope/pkg@0.1.0", "axios", "axios@1.6.0"]);

        assert_eq!(CacheIndex::from_snapshot(snapshot), index);
    }
}
