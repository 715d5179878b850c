//! Flat-file JSON mirror
//!
//! Disaster-recovery fallback for the relational backend: every collection is
//! mirrored as one pretty-printed JSON array per file. Writes go through a
//! temp file + rename so a crash mid-write never leaves a truncated mirror.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One directory of JSON mirror files, one per collection
#[derive(Clone)]
pub struct JsonMirror {
    dir: PathBuf,
}

impl JsonMirror {
    pub async fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create mirror directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Atomically replace the mirror file for a collection
    pub async fn write<T: Serialize>(&self, name: &str, items: &[T]) -> Result<()> {
        let body = serde_json::to_vec_pretty(items)?;
        self.write_raw(name, body).await
    }

    /// Atomically replace the mirror file with an arbitrary JSON value
    pub async fn write_value<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let body = serde_json::to_vec_pretty(value)?;
        self.write_raw(name, body).await
    }

    async fn write_raw(&self, name: &str, body: Vec<u8>) -> Result<()> {
        let target = self.path_for(name);
        let tmp = self.dir.join(format!("{name}.json.tmp"));
        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("Failed to write mirror temp file {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &target)
            .await
            .with_context(|| format!("Failed to replace mirror file {}", target.display()))?;
        Ok(())
    }

    /// Read a collection mirror; a missing or malformed file reads as None
    pub async fn read<T: DeserializeOwned>(&self, name: &str) -> Option<Vec<T>> {
        self.read_value(name).await
    }

    /// Read an arbitrary JSON value mirror
    pub async fn read_value<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.path_for(name);
        let raw = tokio::fs::read_to_string(&path).await.ok()?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("Mirror file {} is malformed, ignoring: {err}", path.display());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_and_read_roundtrip() {
        let dir = tempdir().unwrap();
        let mirror = JsonMirror::open(dir.path()).await.unwrap();

        let items = vec!["a".to_string(), "b".to_string()];
        mirror.write("letters", &items).await.unwrap();

        let loaded: Vec<String> = mirror.read("letters").await.unwrap();
        assert_eq!(loaded, items);
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_none() {
        let dir = tempdir().unwrap();
        let mirror = JsonMirror::open(dir.path()).await.unwrap();
        assert!(mirror.read::<String>("absent").await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_file_reads_as_none() {
        let dir = tempdir().unwrap();
        let mirror = JsonMirror::open(dir.path()).await.unwrap();
        tokio::fs::write(dir.path().join("broken.json"), "{nope")
            .await
            .unwrap();
        assert!(mirror.read::<String>("broken").await.is_none());
    }

    #[tokio::test]
    async fn test_write_replaces_previous_contents() {
        let dir = tempdir().unwrap();
        let mirror = JsonMirror::open(dir.path()).await.unwrap();

        mirror.write("items", &[1, 2, 3]).await.unwrap();
        mirror.write("items", &[9]).await.unwrap();

        let loaded: Vec<i64> = mirror.read("items").await.unwrap();
        assert_eq!(loaded, vec![9]);
    }
}
