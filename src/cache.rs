//! Snapshot cache for pipeline intermediates
//!
//! The pipeline persists its intermediate and final maps (extracted file
//! list, record stores, localization tables) so later runs can skip the
//! archive scan. Snapshots are strictly advisory: a missing or corrupt
//! snapshot is a cache miss that triggers a full rebuild, never an error,
//! and a cold-cache run produces an identical record graph.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;

/// Snapshot file for the extracted file-name list
pub const FILES: &str = "files";
/// Snapshot file for the component store
pub const COMPONENTS: &str = "components";
/// Snapshot file for the macro store
pub const MACROS: &str = "macros";
/// Snapshot file for the class defaults
pub const DEFAULTS: &str = "defaults";
/// Snapshot file for languages and translation tables
pub const I18N: &str = "i18n";

/// A directory of named snapshot files
#[derive(Debug, Clone)]
pub struct CacheDir {
    root: PathBuf,
}

impl CacheDir {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        CacheDir {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Load a JSON snapshot. Absence and corruption both read as a miss.
    pub fn load_json<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.root.join(name);
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(value) => {
                debug!("Restored {} from cache", name);
                Some(value)
            }
            Err(e) => {
                debug!("Discarding corrupt cache snapshot {}: {}", name, e);
                None
            }
        }
    }

    /// Write a JSON snapshot, creating the cache directory as needed.
    pub fn save_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let json = serde_json::to_string(value)?;
        fs::write(self.root.join(name), json)?;
        Ok(())
    }

    /// Load the newline-separated extracted file list.
    pub fn load_file_list(&self) -> Option<Vec<PathBuf>> {
        let content = fs::read_to_string(self.root.join(FILES)).ok()?;
        if content.is_empty() {
            return None;
        }
        debug!("Restored file names from cache");
        Some(content.lines().map(PathBuf::from).collect())
    }

    /// Persist the extracted file list.
    pub fn save_file_list(&self, files: &[PathBuf]) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let joined: Vec<String> = files
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        fs::write(self.root.join(FILES), joined.join("\n"))?;
        Ok(())
    }

    /// Remove every snapshot, forcing the next load to rebuild.
    pub fn clear(&self) -> Result<()> {
        if self.root.is_dir() {
            fs::remove_dir_all(&self.root)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_json_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = CacheDir::new(tmp.path().join("cache"));

        let mut value = BTreeMap::new();
        value.insert("a".to_string(), 1u32);
        cache.save_json("test", &value).unwrap();

        let restored: BTreeMap<String, u32> = cache.load_json("test").unwrap();
        assert_eq!(restored, value);
    }

    #[test]
    fn test_missing_snapshot_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = CacheDir::new(tmp.path());
        assert!(cache.load_json::<Vec<u32>>("absent").is_none());
        assert!(cache.load_file_list().is_none());
    }

    #[test]
    fn test_corrupt_snapshot_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = CacheDir::new(tmp.path());
        fs::create_dir_all(tmp.path()).unwrap();
        fs::write(tmp.path().join("broken"), "{not json").unwrap();
        assert!(cache.load_json::<Vec<u32>>("broken").is_none());
    }

    #[test]
    fn test_file_list_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = CacheDir::new(tmp.path().join("cache"));
        let files = vec![PathBuf::from("out/a.xml"), PathBuf::from("out/b.xml")];
        cache.save_file_list(&files).unwrap();
        assert_eq!(cache.load_file_list().unwrap(), files);
    }
}
