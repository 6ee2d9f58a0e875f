//! Dependency lock record
//!
//! `venv/docki.lock` remembers which dependency set was last installed
//! successfully, together with the environment spec it came from. It is plain YAML so it
//! can be read and edited by hand; only `python_dep` is consulted.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{EnvironmentSpec, ProjectPaths};
use crate::error::Result;

/// File name inside the virtual environment directory
pub const LOCK_FILE: &str = "docki.lock";

#[derive(Serialize)]
struct LockRecord<'a> {
    #[serde(flatten)]
    spec: &'a EnvironmentSpec,
    python_dep: &'a [String],
    installed_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct StoredRecord {
    #[serde(default)]
    python_dep: Vec<String>,
}

/// Reads and writes the lock record of one project
#[derive(Debug, Clone)]
pub struct LockStore {
    path: PathBuf,
}

impl LockStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_project(paths: &ProjectPaths) -> Self {
        Self::new(paths.venv_dir().join(LOCK_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recorded dependency set; `None` when absent or unreadable
    pub fn recorded(&self) -> Option<Vec<String>> {
        let content = fs::read_to_string(&self.path).ok()?;
        match serde_yaml::from_str::<StoredRecord>(&content) {
            Ok(record) => Some(record.python_dep),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable lock record");
                None
            }
        }
    }

    /// Whether `resolved` matches the recorded set, ignoring order and duplicates
    pub fn is_current(&self, resolved: &[String]) -> bool {
        let Some(recorded) = self.recorded() else {
            return false;
        };
        let recorded: BTreeSet<&str> = recorded.iter().map(String::as_str).collect();
        let resolved: BTreeSet<&str> = resolved.iter().map(String::as_str).collect();
        debug!(?recorded, ?resolved, "comparing dependency sets");
        recorded == resolved
    }

    /// Replace the record; written to a sibling file and renamed into place
    pub fn write(&self, spec: &EnvironmentSpec, resolved: &[String]) -> Result<()> {
        let record = LockRecord {
            spec,
            python_dep: resolved,
            installed_at: Utc::now(),
        };
        let yaml = serde_yaml::to_string(&record)?;

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("lock.tmp");
        fs::write(&tmp, yaml)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> EnvironmentSpec {
        EnvironmentSpec::from_yaml("base_image: ubuntu\nsystem_dep: [python3]\npython_dep: [a, b]\n").unwrap()
    }

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_missing_record_is_never_current() {
        let dir = tempfile::tempdir().unwrap();
        let store = LockStore::new(dir.path().join("venv").join(LOCK_FILE));
        assert_eq!(store.recorded(), None);
        assert!(!store.is_current(&list(&["a"])));
    }

    #[test]
    fn test_set_semantics() {
        let dir = tempfile::tempdir().unwrap();
        let store = LockStore::new(dir.path().join("venv").join(LOCK_FILE));
        store.write(&spec(), &list(&["a", "b"])).unwrap();

        assert!(store.is_current(&list(&["a", "b"])));
        assert!(store.is_current(&list(&["b", "a"])));
        assert!(!store.is_current(&list(&["a", "b", "c"])));
        assert!(!store.is_current(&list(&["a"])));
    }

    #[test]
    fn test_record_holds_full_spec() {
        let dir = tempfile::tempdir().unwrap();
        let store = LockStore::new(dir.path().join(LOCK_FILE));
        store.write(&spec(), &list(&["a", "b"])).unwrap();

        let content = fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("base_image: ubuntu"));
        assert!(content.contains("system_dep:"));
        assert!(content.contains("python_dep:"));
        assert!(content.contains("installed_at:"));
        assert!(!dir.path().join("docki.lock.tmp").exists());
    }

    #[test]
    fn test_hand_edited_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE);
        fs::write(&path, "# edited\nsomething_else: 1\npython_dep:\n  - b\n  - a\n").unwrap();
        assert!(LockStore::new(&path).is_current(&list(&["a", "b"])));

        fs::write(&path, "python_dep: [unterminated").unwrap();
        assert!(!LockStore::new(&path).is_current(&list(&["a", "b"])));
    }
}
