//! Persisted decision store: output path -> last-committed fingerprint
//! hash, as JSON under the cache root.
//!
//! Grounded on the teacher's `cache/index.rs` (`FxHashMap` + serde_json
//! index) and `cache/modified.rs`'s write pattern (write to a sibling
//! temp file, then rename, so a crash mid-write can't corrupt the
//! index that's read back on the next run).

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    /// output path (as string) -> fingerprint hash (hex)
    entries: FxHashMap<String, String>,
}

/// A JSON-backed map from output path to the hash recorded the last
/// time its build was committed.
pub struct DecisionStore {
    path: PathBuf,
    inner: Mutex<StoreFile>,
}

impl DecisionStore {
    /// Load (or initialize empty) the store at `cache_root/decisions.json`.
    pub fn open(cache_root: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = cache_root.as_ref().join("decisions.json");
        let inner = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            serde_json::from_str(&text).unwrap_or_default()
        } else {
            StoreFile::default()
        };
        Ok(Self { path, inner: Mutex::new(inner) })
    }

    pub fn get(&self, output: &Path) -> Option<String> {
        self.inner.lock().entries.get(&key(output)).cloned()
    }

    /// Record `hash` for `output` and persist the store to disk.
    pub fn set(&self, output: &Path, hash: String) -> std::io::Result<()> {
        self.inner.lock().entries.insert(key(output), hash);
        self.flush()
    }

    fn flush(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(&*self.inner.lock())?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn key(output: &Path) -> String {
    output.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn set_then_reopen_recalls_hash() {
        let dir = TempDir::new().unwrap();
        let store = DecisionStore::open(dir.path()).unwrap();
        let out = PathBuf::from("/project/out.pdf");
        store.set(&out, "abc123".to_string()).unwrap();

        let reopened = DecisionStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get(&out), Some("abc123".to_string()));
    }

    #[test]
    fn missing_entry_is_none() {
        let dir = TempDir::new().unwrap();
        let store = DecisionStore::open(dir.path()).unwrap();
        assert_eq!(store.get(Path::new("/nope")), None);
    }
}
