//! Backup snapshots
//!
//! A snapshot is a timestamped directory holding a recursive copy of the
//! configured source/config trees, taken before a batch of actions is
//! applied. Snapshots are write-once; nothing indexes them beyond the
//! directory listing itself.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::types::short_id;

/// Copy the configured trees into a fresh timestamped snapshot directory
/// and return its path. Missing source paths are skipped silently.
pub async fn create_snapshot(
    source_root: &Path,
    backup_root: &Path,
    paths: &[String],
) -> Result<PathBuf> {
    let stamp = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S-%3f").to_string();
    let mut target = backup_root.join(&stamp);
    if target.exists() {
        target = backup_root.join(format!("{stamp}-{}", short_id("snap")));
    }

    let source_root = source_root.to_path_buf();
    let paths = paths.to_vec();
    let target_clone = target.clone();

    tokio::task::spawn_blocking(move || copy_trees(&source_root, &target_clone, &paths))
        .await
        .context("backup task failed")??;

    Ok(target)
}

fn copy_trees(source_root: &Path, target: &Path, paths: &[String]) -> Result<()> {
    std::fs::create_dir_all(target)
        .with_context(|| format!("Failed to create snapshot directory {}", target.display()))?;

    for rel in paths {
        let source = source_root.join(rel);
        if !source.exists() {
            continue;
        }
        if source.is_file() {
            let dest = target.join(rel);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(&source, &dest)
                .with_context(|| format!("Failed to copy {}", source.display()))?;
            continue;
        }
        for entry in WalkDir::new(&source).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            let Ok(suffix) = path.strip_prefix(source_root) else {
                continue;
            };
            let dest = target.join(suffix);
            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&dest)?;
            } else if entry.file_type().is_file() {
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::copy(path, &dest)
                    .with_context(|| format!("Failed to copy {}", path.display()))?;
            }
        }
    }

    Ok(())
}

/// Snapshot discovery is a plain directory listing, newest last
pub async fn list_snapshots(backup_root: &Path) -> Vec<PathBuf> {
    let Ok(mut reader) = tokio::fs::read_dir(backup_root).await else {
        return Vec::new();
    };
    let mut snapshots = Vec::new();
    while let Ok(Some(entry)) = reader.next_entry().await {
        if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
            snapshots.push(entry.path());
        }
    }
    snapshots.sort();
    snapshots
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_snapshot_copies_trees_recursively() {
        let source = tempdir().unwrap();
        let backups = tempdir().unwrap();

        std::fs::create_dir_all(source.path().join("src/deep")).unwrap();
        std::fs::write(source.path().join("src/main.rs"), "fn main() {}").unwrap();
        std::fs::write(source.path().join("src/deep/mod.rs"), "// nested").unwrap();
        std::fs::write(source.path().join("Cargo.toml"), "[package]").unwrap();

        let snapshot = create_snapshot(
            source.path(),
            backups.path(),
            &["src".to_string(), "Cargo.toml".to_string()],
        )
        .await
        .unwrap();

        assert!(snapshot.join("src/main.rs").exists());
        assert!(snapshot.join("src/deep/mod.rs").exists());
        assert!(snapshot.join("Cargo.toml").exists());
        let copied = std::fs::read_to_string(snapshot.join("src/main.rs")).unwrap();
        assert_eq!(copied, "fn main() {}");
    }

    #[tokio::test]
    async fn test_missing_paths_are_skipped() {
        let source = tempdir().unwrap();
        let backups = tempdir().unwrap();

        let snapshot = create_snapshot(
            source.path(),
            backups.path(),
            &["does-not-exist".to_string()],
        )
        .await
        .unwrap();

        assert!(snapshot.exists());
        assert!(!snapshot.join("does-not-exist").exists());
    }

    #[tokio::test]
    async fn test_snapshots_are_distinct_directories() {
        let source = tempdir().unwrap();
        let backups = tempdir().unwrap();
        std::fs::write(source.path().join("a.txt"), "x").unwrap();

        let first = create_snapshot(source.path(), backups.path(), &["a.txt".to_string()])
            .await
            .unwrap();
        let second = create_snapshot(source.path(), backups.path(), &["a.txt".to_string()])
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(list_snapshots(backups.path()).await.len(), 2);
    }
}
