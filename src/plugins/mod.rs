//! Plugin registry
//!
//! Plugins are directories under the plugins root, each carrying a
//! `manifest.json` and an optional `plugin.rhai` entry script. Manifests are
//! re-read from disk on every listing so filesystem edits show up without a
//! restart. A directory with a broken manifest is skipped, never fatal.

pub mod runner;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub use runner::{PluginRun, PluginRunResult, PluginRunner};

/// Entry script file name inside a plugin directory
pub const PLUGIN_ENTRY: &str = "plugin.rhai";

/// Declarative description of a plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    /// Static action requests proposed when no entry script exists
    #[serde(default)]
    pub actions: Vec<Value>,
    /// Static recommendations proposed when no entry script exists
    #[serde(default)]
    pub recommendations: Vec<Value>,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

/// Directory-backed plugin listing
pub struct PluginRegistry {
    dir: PathBuf,
}

impl PluginRegistry {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// All readable manifests, freshly loaded from disk
    pub fn list(&self) -> Vec<PluginManifest> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut manifests = Vec::new();
        for entry in entries.flatten() {
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let dir_name = entry.file_name().to_string_lossy().to_string();
            let manifest_path = entry.path().join("manifest.json");
            let Ok(raw) = std::fs::read_to_string(&manifest_path) else {
                continue;
            };
            let Ok(mut manifest) = serde_json::from_str::<PluginManifest>(&raw) else {
                continue;
            };
            if manifest.name.is_empty() {
                manifest.name = dir_name;
            }
            manifests.push(manifest);
        }
        manifests.sort_by(|a, b| a.name.cmp(&b.name));
        manifests
    }

    /// Look up one manifest by name
    pub fn find(&self, name: &str) -> Option<PluginManifest> {
        self.list().into_iter().find(|plugin| plugin.name == name)
    }

    /// Path the entry script would live at for a plugin
    pub fn entry_path(&self, name: &str) -> PathBuf {
        self.dir.join(name).join(PLUGIN_ENTRY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_plugin(dir: &Path, name: &str, manifest: &str) {
        let plugin_dir = dir.join(name);
        std::fs::create_dir_all(&plugin_dir).unwrap();
        std::fs::write(plugin_dir.join("manifest.json"), manifest).unwrap();
    }

    #[test]
    fn test_list_reads_manifests_fresh() {
        let dir = tempdir().unwrap();
        let registry = PluginRegistry::new(dir.path());
        assert!(registry.list().is_empty());

        write_plugin(
            dir.path(),
            "advisor",
            r#"{ "name": "advisor", "version": "1.0.0", "recommendations": ["log more dreams"] }"#,
        );
        let listed = registry.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].version, "1.0.0");
    }

    #[test]
    fn test_broken_manifest_is_skipped() {
        let dir = tempdir().unwrap();
        write_plugin(dir.path(), "broken", "{not json");
        write_plugin(dir.path(), "fine", r#"{ "name": "fine" }"#);
        let registry = PluginRegistry::new(dir.path());
        let listed = registry.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "fine");
    }

    #[test]
    fn test_manifest_name_defaults_to_directory() {
        let dir = tempdir().unwrap();
        write_plugin(dir.path(), "unnamed", r#"{ "description": "no name field" }"#);
        let registry = PluginRegistry::new(dir.path());
        assert_eq!(registry.list()[0].name, "unnamed");
    }

    #[test]
    fn test_find_unknown_plugin() {
        let dir = tempdir().unwrap();
        let registry = PluginRegistry::new(dir.path());
        assert!(registry.find("ghost").is_none());
    }
}
