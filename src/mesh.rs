//! Service mesh registry and health scanning
//!
//! Tracks the gateway's own in-process services plus configured peer
//! services. Peers are polled via `GET <base_url>/health` with a hard
//! timeout; an unreachable peer is treated as offline, never retried.

use serde::Serialize;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

use crate::config::MeshConfig;
use crate::store::records::NewBacklogItem;
use crate::store::RecordStore;

/// A registered service: in-process (no base_url) or a remote peer
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub description: String,
    pub endpoints: Vec<String>,
}

/// Result of probing one peer
#[derive(Debug, Clone, Serialize)]
pub struct PeerCheck {
    pub name: String,
    pub base_url: String,
    pub ok: bool,
    pub note: String,
}

/// Full mesh scan outcome
#[derive(Debug, Clone, Serialize)]
pub struct MeshReport {
    pub checks: Vec<PeerCheck>,
    pub offline: Vec<PeerCheck>,
}

/// In-memory registry of everything the gateway fronts
pub struct MeshRegistry {
    services: Mutex<Vec<ServiceInfo>>,
    probe_timeout: Duration,
}

impl MeshRegistry {
    pub fn new(config: &MeshConfig) -> Self {
        let registry = Self {
            services: Mutex::new(Vec::new()),
            probe_timeout: Duration::from_millis(config.probe_timeout_ms),
        };
        for peer in &config.peers {
            registry.register(ServiceInfo {
                name: peer.name.clone(),
                base_url: Some(peer.base_url.clone()),
                description: peer.description.clone(),
                endpoints: Vec::new(),
            });
        }
        registry
    }

    pub fn register(&self, info: ServiceInfo) {
        let mut services = self.services.lock().expect("mesh registry poisoned");
        services.retain(|existing| existing.name != info.name);
        services.push(info);
    }

    pub fn all(&self) -> Vec<ServiceInfo> {
        self.services.lock().expect("mesh registry poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.services.lock().expect("mesh registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Probe every peer's health endpoint; in-process entries are skipped
    pub async fn scan(&self, client: &reqwest::Client) -> MeshReport {
        let peers: Vec<(String, String)> = self
            .all()
            .into_iter()
            .filter_map(|service| service.base_url.map(|url| (service.name, url)))
            .collect();

        let mut checks = Vec::with_capacity(peers.len());
        for (name, base_url) in peers {
            let url = format!("{}/health", base_url.trim_end_matches('/'));
            let check = match client.get(&url).timeout(self.probe_timeout).send().await {
                Ok(response) if response.status().is_success() => PeerCheck {
                    name,
                    base_url,
                    ok: true,
                    note: "online".to_string(),
                },
                Ok(response) => PeerCheck {
                    name,
                    base_url,
                    ok: false,
                    note: format!("HTTP {}", response.status().as_u16()),
                },
                Err(err) => PeerCheck {
                    name,
                    base_url,
                    ok: false,
                    note: if err.is_timeout() {
                        "timeout".to_string()
                    } else {
                        "unreachable".to_string()
                    },
                },
            };
            checks.push(check);
        }

        let offline = checks.iter().filter(|check| !check.ok).cloned().collect();
        MeshReport { checks, offline }
    }
}

/// Register the gateway's own domain services so the dashboard and the
/// evaluator see what this process fronts.
pub fn register_builtin_services(registry: &MeshRegistry) {
    let builtins = [
        ("Dream Journal", "Stores dreams and their symbols", vec!["/dreams"]),
        ("Emotional Resonance", "Emotion tracking and state", vec!["/emotions", "/emotions/state"]),
        ("Memory Palace", "Long-lived memory entries", vec!["/memories"]),
        ("Gratitude Log", "Gratitude entries", vec!["/gratitude"]),
        ("Backlog & Decisions", "Self-evolution backlog", vec!["/backlog", "/decisions"]),
        ("Quests", "Daily quests", vec!["/quests/today"]),
        ("Achievements & Arcs", "Progress tracking", vec!["/achievements", "/collective/arcs"]),
        ("Self Improvement", "Evaluator and applier", vec!["/self/improve", "/self/apply"]),
        ("Plugins", "Sandboxed plugin runner", vec!["/plugins", "/plugins/run"]),
    ];
    for (name, description, endpoints) in builtins {
        registry.register(ServiceInfo {
            name: name.to_string(),
            base_url: None,
            description: description.to_string(),
            endpoints: endpoints.into_iter().map(|e| e.to_string()).collect(),
        });
    }
}

/// Background watch: offline peers are surfaced as backlog items and mesh
/// events on every sweep.
pub fn spawn_mesh_watch(
    registry: Arc<MeshRegistry>,
    store: Arc<RecordStore>,
    client: reqwest::Client,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so startup stays quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let report = registry.scan(&client).await;
            for check in report.offline.iter().take(5) {
                let message = format!("Offline: {}", check.name);
                store
                    .add_backlog_item(NewBacklogItem {
                        title: message.clone(),
                        tag: "mesh".to_string(),
                        priority: "high".to_string(),
                        owner: "system".to_string(),
                        notes: check.note.clone(),
                    })
                    .await;
                store
                    .bus()
                    .publish("mesh", &message, json!({ "base_url": check.base_url }))
                    .await;
            }
            if !report.offline.is_empty() {
                warn!("Mesh watch found {} offline peers", report.offline.len());
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PeerConfig;

    fn test_config(peers: Vec<PeerConfig>) -> MeshConfig {
        MeshConfig {
            probe_timeout_ms: 200,
            watch_interval_secs: 60,
            peers,
        }
    }

    #[test]
    fn test_register_replaces_by_name() {
        let registry = MeshRegistry::new(&test_config(vec![]));
        registry.register(ServiceInfo {
            name: "svc".to_string(),
            base_url: None,
            description: "first".to_string(),
            endpoints: vec![],
        });
        registry.register(ServiceInfo {
            name: "svc".to_string(),
            base_url: None,
            description: "second".to_string(),
            endpoints: vec![],
        });
        let all = registry.all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].description, "second");
    }

    #[tokio::test]
    async fn test_scan_marks_unreachable_peer_offline() {
        let registry = MeshRegistry::new(&test_config(vec![PeerConfig {
            name: "ghost".to_string(),
            // Reserved TEST-NET address: nothing listens there.
            base_url: "http://192.0.2.1:9".to_string(),
            description: String::new(),
        }]));
        let client = reqwest::Client::new();
        let report = registry.scan(&client).await;
        assert_eq!(report.checks.len(), 1);
        assert!(!report.checks[0].ok);
        assert_eq!(report.offline.len(), 1);
    }

    #[tokio::test]
    async fn test_scan_skips_in_process_services() {
        let registry = MeshRegistry::new(&test_config(vec![]));
        register_builtin_services(&registry);
        let client = reqwest::Client::new();
        let report = registry.scan(&client).await;
        assert!(report.checks.is_empty());
        assert!(registry.len() >= 9);
    }
}
