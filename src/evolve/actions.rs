//! Action requests and the applier
//!
//! The wire shape is `{type, payload?}`; it parses into the `Action` tagged
//! union so dispatch is an exhaustive match and new kinds are compile-time
//! additions. Unknown or malformed requests fail closed per-action: the
//! batch continues and the failure is reported in that action's result.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::Config;
use crate::mesh::MeshRegistry;
use crate::store::records::*;
use crate::store::RecordStore;
use crate::types::now;

/// Largest accepted batch
pub const MAX_BATCH: usize = 20;

/// Wire form of one action request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl ActionRequest {
    pub fn bare(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            payload: None,
        }
    }

    pub fn with_payload(kind: &str, payload: Value) -> Self {
        Self {
            kind: kind.to_string(),
            payload: Some(payload),
        }
    }
}

/// Every action the applier understands
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SeedDream,
    SeedEmotion,
    SeedMemory,
    SeedGratitude,
    BacklogAdd {
        title: String,
        description: String,
        category: String,
    },
    BacklogStatus {
        id: String,
        status: BacklogStatus,
    },
    QuestsRefresh,
    MeshScan,
}

impl Action {
    /// Validate a wire request against the fixed enumeration
    pub fn parse(request: &ActionRequest) -> Result<Self, String> {
        let payload = request.payload.as_ref();
        match request.kind.as_str() {
            "seed.dream" => Ok(Action::SeedDream),
            "seed.emotion" => Ok(Action::SeedEmotion),
            "seed.memory" => Ok(Action::SeedMemory),
            "seed.gratitude" => Ok(Action::SeedGratitude),
            "backlog.add" => Ok(Action::BacklogAdd {
                title: payload
                    .and_then(|p| p.get("title"))
                    .and_then(Value::as_str)
                    .unwrap_or("Self-evolve task")
                    .to_string(),
                description: payload
                    .and_then(|p| p.get("description"))
                    .and_then(Value::as_str)
                    .unwrap_or("Auto-added from self/apply")
                    .to_string(),
                category: payload
                    .and_then(|p| p.get("category"))
                    .and_then(Value::as_str)
                    .unwrap_or("improve")
                    .to_string(),
            }),
            "backlog.status" => {
                let id = payload
                    .and_then(|p| p.get("id"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| "id/status required".to_string())?;
                let status_raw = payload
                    .and_then(|p| p.get("status"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| "id/status required".to_string())?;
                let status = BacklogStatus::parse(status_raw)
                    .ok_or_else(|| format!("invalid status {status_raw}"))?;
                Ok(Action::BacklogStatus {
                    id: id.to_string(),
                    status,
                })
            }
            "quests.refresh" => Ok(Action::QuestsRefresh),
            "mesh.scan" => Ok(Action::MeshScan),
            other => Err(format!("unknown action {other}")),
        }
    }
}

/// Per-action result inside a batch
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub action: ActionRequest,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Batch-level validation failures (per-action failures never surface here)
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("actions required")]
    EmptyBatch,
    #[error("too many actions (max {MAX_BATCH})")]
    BatchTooLarge,
    #[error("backup failed: {0}")]
    Backup(String),
}

/// Applier output: the pre-apply snapshot pointer plus per-action results
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub backup: Option<String>,
    pub results: Vec<ActionOutcome>,
}

/// Everything the applier needs to execute a batch
pub struct ApplyContext<'a> {
    pub store: &'a RecordStore,
    pub mesh: &'a MeshRegistry,
    pub client: &'a reqwest::Client,
    pub config: &'a Config,
}

/// Apply a batch of 1..=20 actions sequentially and independently.
///
/// Unless `backup` is false, a snapshot is captured before any action runs;
/// it is the sole recovery mechanism, a pointer for manual restore, not an
/// automatic rollback.
pub async fn apply_batch(
    ctx: &ApplyContext<'_>,
    actions: &[ActionRequest],
    backup: bool,
) -> Result<ApplyReport, ApplyError> {
    if actions.is_empty() {
        return Err(ApplyError::EmptyBatch);
    }
    if actions.len() > MAX_BATCH {
        return Err(ApplyError::BatchTooLarge);
    }

    let backup_path = if backup {
        let path = super::backup::create_snapshot(
            &std::env::current_dir().unwrap_or_else(|_| ".".into()),
            &ctx.config.backup_dir(),
            &ctx.config.backup.paths,
        )
        .await
        .map_err(|err| ApplyError::Backup(err.to_string()))?;
        Some(path.display().to_string())
    } else {
        None
    };

    let mut results = Vec::with_capacity(actions.len());
    for request in actions {
        let outcome = match Action::parse(request) {
            Ok(action) => apply_action(ctx, request, action).await,
            Err(error) => ActionOutcome {
                action: request.clone(),
                ok: false,
                error: Some(error),
                result: None,
            },
        };
        results.push(outcome);
    }

    Ok(ApplyReport {
        backup: backup_path,
        results,
    })
}

async fn apply_action(
    ctx: &ApplyContext<'_>,
    request: &ActionRequest,
    action: Action,
) -> ActionOutcome {
    let ok = |result: Value| ActionOutcome {
        action: request.clone(),
        ok: true,
        error: None,
        result: Some(result),
    };
    let fail = |error: String| ActionOutcome {
        action: request.clone(),
        ok: false,
        error: Some(error),
        result: None,
    };

    match action {
        Action::SeedDream => {
            let entry = ctx
                .store
                .record_dream(NewDream {
                    kind: DreamKind::Creative,
                    narrative: format!("Auto dream seed {}", now().to_rfc3339()),
                    symbols: vec!["self-improve".to_string()],
                    emotions: vec!["calm".to_string()],
                    insights: vec!["baseline".to_string()],
                    integration: None,
                })
                .await;
            ok(json!({ "dream": entry }))
        }
        Action::SeedEmotion => {
            let entry = ctx
                .store
                .record_emotion(NewEmotion {
                    primary_emotion: "curiosity".to_string(),
                    valence: 10.0,
                    arousal: 15.0,
                    intensity: 55.0,
                    context: "self-improve".to_string(),
                    tags: Vec::new(),
                    channel: Some("auto".to_string()),
                    notes: None,
                })
                .await;
            ok(json!({ "emotion": entry }))
        }
        Action::SeedMemory => {
            let entry = ctx
                .store
                .record_memory(NewMemory {
                    title: "Auto memory seed".to_string(),
                    content: "Self-improve baseline memory entry.".to_string(),
                    category: "reflection".to_string(),
                    tags: vec!["self-improve".to_string(), "bootstrap".to_string()],
                    significance: 50.0,
                })
                .await;
            ok(json!({ "memory": entry }))
        }
        Action::SeedGratitude => {
            let entry = ctx
                .store
                .record_gratitude("Gratitude for the self-improvement seed".to_string(), None)
                .await;
            ok(json!({ "gratitude": entry }))
        }
        Action::BacklogAdd {
            title,
            description,
            category,
        } => {
            let item = ctx
                .store
                .add_backlog_item(NewBacklogItem {
                    title,
                    tag: category,
                    priority: "medium".to_string(),
                    owner: "system".to_string(),
                    notes: description,
                })
                .await;
            ctx.store
                .log_decision(NewDecision {
                    title: "Backlog add (apply)".to_string(),
                    decision: item.id.clone(),
                    rationale: Some(item.title.clone()),
                    context: None,
                })
                .await;
            ok(json!({ "item": item }))
        }
        Action::BacklogStatus { id, status } => {
            match ctx.store.update_backlog_status(&id, status).await {
                Some(item) => {
                    ctx.store
                        .log_decision(NewDecision {
                            title: "Backlog update (apply)".to_string(),
                            decision: status.as_str().to_string(),
                            rationale: Some(item.id.clone()),
                            context: None,
                        })
                        .await;
                    ok(json!({ "item": item }))
                }
                None => fail("not found".to_string()),
            }
        }
        Action::QuestsRefresh => {
            let refreshed = ctx
                .store
                .refresh_quests(
                    ctx.client,
                    &ctx.config.quests.news_feed_url,
                    std::time::Duration::from_secs(ctx.config.quests.fetch_timeout_secs),
                )
                .await;
            ok(json!({ "added": refreshed.len() }))
        }
        Action::MeshScan => {
            let report = ctx.mesh.scan(ctx.client).await;
            for check in report.offline.iter().take(5) {
                ctx.store
                    .bus()
                    .publish(
                        "mesh",
                        &format!("Offline: {}", check.name),
                        json!({ "base_url": check.base_url }),
                    )
                    .await;
            }
            ok(json!({
                "checked": report.checks.len(),
                "offline": report.offline.len(),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_actions() {
        for kind in ["seed.dream", "seed.emotion", "seed.memory", "seed.gratitude", "quests.refresh", "mesh.scan"] {
            assert!(Action::parse(&ActionRequest::bare(kind)).is_ok(), "{kind}");
        }
    }

    #[test]
    fn test_parse_unknown_fails_closed() {
        let err = Action::parse(&ActionRequest::bare("seed.everything")).unwrap_err();
        assert_eq!(err, "unknown action seed.everything");
    }

    #[test]
    fn test_backlog_add_payload_defaults() {
        let action = Action::parse(&ActionRequest::bare("backlog.add")).unwrap();
        match action {
            Action::BacklogAdd { title, category, .. } => {
                assert_eq!(title, "Self-evolve task");
                assert_eq!(category, "improve");
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_backlog_status_requires_fields() {
        let missing = Action::parse(&ActionRequest::bare("backlog.status")).unwrap_err();
        assert_eq!(missing, "id/status required");

        let invalid = Action::parse(&ActionRequest::with_payload(
            "backlog.status",
            json!({ "id": "task-1", "status": "sideways" }),
        ))
        .unwrap_err();
        assert!(invalid.contains("invalid status"));

        let parsed = Action::parse(&ActionRequest::with_payload(
            "backlog.status",
            json!({ "id": "task-1", "status": "applied" }),
        ))
        .unwrap();
        assert_eq!(
            parsed,
            Action::BacklogStatus {
                id: "task-1".to_string(),
                status: BacklogStatus::Applied,
            }
        );
    }

    #[test]
    fn test_wire_roundtrip() {
        let request = ActionRequest::with_payload("backlog.add", json!({ "title": "x" }));
        let encoded = serde_json::to_string(&request).unwrap();
        assert!(encoded.contains(r#""type":"backlog.add""#));
        let decoded: ActionRequest = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.kind, "backlog.add");

        let bare: ActionRequest = serde_json::from_str(r#"{ "type": "seed.dream" }"#).unwrap();
        assert!(bare.payload.is_none());
    }
}
