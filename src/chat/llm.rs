//! External LLM chat client
//!
//! Thin client for an OpenAI-compatible chat completions endpoint. Calls are
//! bounded by a hard timeout and every failure is surfaced as an error for
//! the caller to convert into a typed fallback; nothing here retries.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::Duration;

use crate::config::{Config, LlmConfig};

/// One message on the completion wire
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// Chat completions client with a runtime-settable key
pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
    key_file: PathBuf,
    api_key: RwLock<Option<String>>,
}

impl LlmClient {
    pub fn new(config: &Config, client: reqwest::Client) -> Self {
        let key_file = config.llm_key_path();
        let api_key = config
            .llm
            .api_key
            .clone()
            .or_else(|| read_key_file(&key_file));
        Self {
            client,
            config: config.llm.clone(),
            key_file,
            api_key: RwLock::new(api_key),
        }
    }

    /// Whether a credential is currently available
    pub fn key_present(&self) -> bool {
        self.api_key
            .read()
            .expect("llm key lock poisoned")
            .is_some()
    }

    /// Set and persist the API key at runtime
    pub async fn set_api_key(&self, key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            bail!("apiKey required");
        }
        if let Some(parent) = self.key_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.key_file, key)
            .await
            .with_context(|| format!("Failed to persist key to {}", self.key_file.display()))?;
        *self.api_key.write().expect("llm key lock poisoned") = Some(key.to_string());
        Ok(())
    }

    /// Run one completion; the caller owns fallback behavior
    pub async fn complete(&self, system_prompt: &str, history: &[ChatMessage]) -> Result<String> {
        let api_key = self
            .api_key
            .read()
            .expect("llm key lock poisoned")
            .clone()
            .context("no LLM API key configured")?;

        let mut messages = vec![json!({ "role": "system", "content": system_prompt })];
        messages.extend(history.iter().map(|m| json!({ "role": m.role, "content": m.content })));

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .json(&json!({
                "model": self.config.model,
                "temperature": 0.7,
                "max_tokens": self.config.max_tokens,
                "messages": messages,
            }))
            .send()
            .await
            .context("LLM request failed")?;

        if !response.status().is_success() {
            bail!("LLM endpoint returned HTTP {}", response.status());
        }

        let payload: CompletionResponse =
            response.json().await.context("LLM response malformed")?;
        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .context("LLM response contained no content")
    }
}

fn read_key_file(path: &std::path::Path) -> Option<String> {
    let raw = std::fs::read_to_string(path).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.data_dir = dir.to_path_buf();
        config
    }

    #[tokio::test]
    async fn test_key_absent_by_default() {
        let dir = tempdir().unwrap();
        let client = LlmClient::new(&test_config(dir.path()), reqwest::Client::new());
        assert!(!client.key_present());
        assert!(client.complete("sys", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_set_api_key_persists_across_instances() {
        let dir = tempdir().unwrap();
        {
            let client = LlmClient::new(&test_config(dir.path()), reqwest::Client::new());
            client.set_api_key("secret-token").await.unwrap();
            assert!(client.key_present());
        }
        let client = LlmClient::new(&test_config(dir.path()), reqwest::Client::new());
        assert!(client.key_present());
    }

    #[tokio::test]
    async fn test_empty_key_is_rejected() {
        let dir = tempdir().unwrap();
        let client = LlmClient::new(&test_config(dir.path()), reqwest::Client::new());
        assert!(client.set_api_key("   ").await.is_err());
    }
}
