//! Configuration management
//!
//! Loads gateway configuration from a TOML file with per-field defaults,
//! so a missing or partial config file always yields a runnable setup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory for all persisted state (mirrors, sqlite, backups, plugins)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// External LLM chat collaborator
    #[serde(default)]
    pub llm: LlmConfig,
    /// Peer service mesh
    #[serde(default)]
    pub mesh: MeshConfig,
    /// Plugin sandbox settings
    #[serde(default)]
    pub plugins: PluginConfig,
    /// Quest feed settings
    #[serde(default)]
    pub quests: QuestConfig,
    /// Backup snapshot settings
    #[serde(default)]
    pub backup: BackupConfig,
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lifelog-gateway")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
            mesh: MeshConfig::default(),
            plugins: PluginConfig::default(),
            quests: QuestConfig::default(),
            backup: BackupConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible chat completions endpoint
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// API key is taken from the environment or the key file, never the config
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(default = "default_llm_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
}

fn default_llm_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_llm_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    10
}

fn default_llm_max_tokens() -> u32 {
    900
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key: None,
            request_timeout_secs: default_llm_timeout_secs(),
            max_tokens: default_llm_max_tokens(),
        }
    }
}

/// Environment variable holding the LLM API key
pub const LLM_KEY_ENV: &str = "LIFELOG_LLM_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshConfig {
    /// Per-peer health probe timeout
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Background mesh watch interval
    #[serde(default = "default_watch_interval_secs")]
    pub watch_interval_secs: u64,
    /// Peers polled via `GET <base_url>/health`
    #[serde(default)]
    pub peers: Vec<PeerConfig>,
}

fn default_probe_timeout_ms() -> u64 {
    800
}

fn default_watch_interval_secs() -> u64 {
    60
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
            watch_interval_secs: default_watch_interval_secs(),
            peers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Hard wall-clock limit for a single plugin script run
    #[serde(default = "default_plugin_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_plugin_timeout_ms() -> u64 {
    2000
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_plugin_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestConfig {
    /// RSS feed used to seed news quests
    #[serde(default = "default_news_feed_url")]
    pub news_feed_url: String,
    #[serde(default = "default_news_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_news_feed_url() -> String {
    "https://news.ycombinator.com/rss".to_string()
}

fn default_news_timeout_secs() -> u64 {
    5
}

impl Default for QuestConfig {
    fn default() -> Self {
        Self {
            news_feed_url: default_news_feed_url(),
            fetch_timeout_secs: default_news_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Trees (relative to the working directory) copied into each snapshot
    #[serde(default = "default_backup_paths")]
    pub paths: Vec<String>,
}

fn default_backup_paths() -> Vec<String> {
    vec!["src".to_string(), "config".to_string(), "Cargo.toml".to_string()]
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            paths: default_backup_paths(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::with_env(Self::default()))
        }
    }

    /// Load configuration from a specific TOML file
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(Self::with_env(config))
    }

    fn with_env(mut config: Config) -> Config {
        if let Ok(key) = std::env::var(LLM_KEY_ENV) {
            if !key.trim().is_empty() {
                config.llm.api_key = Some(key.trim().to_string());
            }
        }
        config
    }

    /// Default config file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lifelog-gateway")
            .join("config.toml")
    }

    /// Directory holding the flat-file JSON mirrors
    pub fn analytics_dir(&self) -> PathBuf {
        self.data_dir.join("analytics")
    }

    /// Embedded relational store file
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("lifelog.sqlite")
    }

    /// Root of timestamped backup snapshots
    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }

    /// Directory of plugin folders (`<name>/manifest.json` + optional `plugin.rhai`)
    pub fn plugins_dir(&self) -> PathBuf {
        self.data_dir.join("plugins")
    }

    /// File the LLM API key is persisted to when set at runtime
    pub fn llm_key_path(&self) -> PathBuf {
        self.data_dir.join("llm.key")
    }
}
