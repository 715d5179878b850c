//! End-to-end tests through the HTTP router
//!
//! Each case builds a fresh gateway over a temp data directory and drives it
//! through the same axum router production uses.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use lifelog_gateway::config::Config;
use lifelog_gateway::server::{router, ServerState};

struct Gateway {
    state: ServerState,
    app: Router,
    _data: tempfile::TempDir,
}

async fn gateway() -> Gateway {
    let data = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = data.path().to_path_buf();
    // Keep snapshots small and hermetic in tests.
    config.backup.paths = vec!["Cargo.toml".to_string()];
    config.plugins.timeout_ms = 400;
    // An unroutable feed endpoint: quest refresh falls back to empty.
    config.quests.news_feed_url = "http://192.0.2.1:9/rss".to_string();
    config.quests.fetch_timeout_secs = 1;

    let state = ServerState::build(config).await.unwrap();
    let app = router(state.clone());
    Gateway {
        state,
        app,
        _data: data,
    }
}

async fn send(app: &Router, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_domain_mutation_returns_created_entry() {
    let gw = gateway().await;

    let (status, body) = send(
        &gw.app,
        "POST",
        "/dreams",
        Some(json!({ "kind": "lucid", "narrative": "walking through water" })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["dream"]["kind"], "lucid");
    assert!(body["dream"]["id"].as_str().unwrap().starts_with("dream-"));

    let (status, listed) = send(&gw.app, "GET", "/dreams?limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["dreams"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_validation_error_is_json_400() {
    let gw = gateway().await;
    let (status, body) = send(&gw.app, "POST", "/dreams", Some(json!({ "narrative": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_apply_batch_isolation_with_backup() {
    let gw = gateway().await;

    let (status, body) = send(
        &gw.app,
        "POST",
        "/self/apply",
        Some(json!({
            "actions": [
                { "type": "seed.dream" },
                { "type": "no.such.action" },
                { "type": "seed.gratitude" },
            ],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["ok"], true);
    assert_eq!(results[1]["ok"], false);
    assert_eq!(results[1]["error"], "unknown action no.such.action");
    assert_eq!(results[2]["ok"], true);

    // Both valid actions' effects are observable afterward.
    assert_eq!(body["metrics"]["dreams"], 1);
    assert_eq!(body["metrics"]["gratitudes"], 1);

    // Backup defaulted on: the snapshot directory exists and is non-empty.
    let backup_path = std::path::PathBuf::from(body["backup"].as_str().unwrap());
    assert!(backup_path.is_dir());
    assert!(std::fs::read_dir(&backup_path).unwrap().next().is_some());
}

#[tokio::test]
async fn test_apply_rejects_empty_and_oversized_batches() {
    let gw = gateway().await;

    let (status, body) = send(&gw.app, "POST", "/self/apply", Some(json!({ "actions": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "actions required");

    let (status, _) = send(&gw.app, "POST", "/self/apply", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let oversized: Vec<Value> = (0..21).map(|_| json!({ "type": "seed.dream" })).collect();
    let (status, body) = send(
        &gw.app,
        "POST",
        "/self/apply",
        Some(json!({ "actions": oversized })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "too many actions (max 20)");
}

#[tokio::test]
async fn test_apply_backup_false_skips_snapshot() {
    let gw = gateway().await;

    let (status, body) = send(
        &gw.app,
        "POST",
        "/self/apply",
        Some(json!({ "actions": [{ "type": "seed.memory" }], "backup": false })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["backup"].is_null());
    assert_eq!(body["results"][0]["ok"], true);
}

#[tokio::test]
async fn test_self_backup_creates_snapshot() {
    let gw = gateway().await;
    let (status, body) = send(&gw.app, "POST", "/self/backup", None).await;
    assert_eq!(status, StatusCode::OK);
    let path = std::path::PathBuf::from(body["backup"].as_str().unwrap());
    assert!(path.is_dir());
    assert!(path.join("Cargo.toml").exists());
}

#[tokio::test]
async fn test_threshold_suggestion_targets_only_dreams() {
    let gw = gateway().await;

    // dreams=0, emotions=5, memories>=5 (emotion auto-snapshots), gratitudes=5
    for i in 0..5 {
        send(
            &gw.app,
            "POST",
            "/emotions",
            Some(json!({ "primary_emotion": format!("emotion{i}"), "intensity": 40 })),
        )
        .await;
        send(
            &gw.app,
            "POST",
            "/gratitude",
            Some(json!({ "text": format!("grateful {i}") })),
        )
        .await;
    }

    let (status, body) = send(&gw.app, "GET", "/self/improve", None).await;
    assert_eq!(status, StatusCode::OK);

    let actions: Vec<&str> = body["recommendedActions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["type"].as_str().unwrap())
        .collect();
    let seeds: Vec<&&str> = actions.iter().filter(|a| a.starts_with("seed.")).collect();
    assert_eq!(seeds, vec![&"seed.dream"]);

    let dream_suggestions = body["suggestions"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|s| s["title"].as_str().unwrap().to_lowercase().contains("dream"))
        .count();
    assert_eq!(dream_suggestions, 1);
}

#[tokio::test]
async fn test_event_ring_bound_over_http() {
    let gw = gateway().await;

    for i in 0..60 {
        let (status, _) = send(
            &gw.app,
            "POST",
            "/events/broadcast",
            Some(json!({ "type": "test", "message": format!("event {i}") })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(gw.state.store.bus().len(), 50);

    let (status, body) = send(&gw.app, "GET", "/cross/status", None).await;
    assert_eq!(status, StatusCode::OK);
    let events = body["events"].as_array().unwrap();
    assert_eq!(events.len(), 20);
    assert_eq!(events[0]["message"], "event 59");
    assert_eq!(events[19]["message"], "event 40");
}

#[tokio::test]
async fn test_broadcast_requires_type() {
    let gw = gateway().await;
    let (status, body) = send(
        &gw.app,
        "POST",
        "/events/broadcast",
        Some(json!({ "message": "untyped" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "type required");
}

#[tokio::test]
async fn test_chat_command_routing_and_rewards() {
    let gw = gateway().await;

    let (status, body) = send(&gw.app, "POST", "/chat", Some(json!({ "message": "/STATUS" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["command"], "status");
    assert_eq!(body["reward"]["xp"], 8);

    let (status, body) = send(
        &gw.app,
        "POST",
        "/chat",
        Some(json!({ "message": "/dream lucid fly to moon" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["command"], "dream");

    let (_, dreams) = send(&gw.app, "GET", "/dreams", None).await;
    assert_eq!(dreams["dreams"][0]["kind"], "lucid");
    assert_eq!(dreams["dreams"][0]["narrative"], "fly to moon");
}

#[tokio::test]
async fn test_chat_free_text_rewards_dialog_without_llm_key() {
    let gw = gateway().await;

    let (status, body) = send(
        &gw.app,
        "POST",
        "/chat",
        Some(json!({ "message": "hello gateway" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("command").is_none());
    assert!(!body["response"].as_str().unwrap().is_empty());
    assert_eq!(body["reward"]["xp"], 5);
    assert_eq!(body["collective"]["id"], "dialog-100");

    let (_, profile) = send(&gw.app, "GET", "/profile", None).await;
    assert_eq!(profile["profile"]["last_message"], "hello gateway");
}

#[tokio::test]
async fn test_chat_requires_message() {
    let gw = gateway().await;
    let (status, body) = send(&gw.app, "POST", "/chat", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "message required");
}

#[tokio::test]
async fn test_plugin_run_unknown_is_404() {
    let gw = gateway().await;
    let (status, body) = send(
        &gw.app,
        "POST",
        "/plugins/run",
        Some(json!({ "name": "ghost" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not found");
}

#[tokio::test]
async fn test_plugin_timeout_does_not_take_down_the_host() {
    let gw = gateway().await;

    let plugin_dir = gw.state.config.plugins_dir().join("spinner");
    std::fs::create_dir_all(&plugin_dir).unwrap();
    std::fs::write(plugin_dir.join("manifest.json"), r#"{ "name": "spinner" }"#).unwrap();
    std::fs::write(plugin_dir.join("plugin.rhai"), "let x = 0; loop { x += 1; }").unwrap();

    let (status, body) = send(
        &gw.app,
        "POST",
        "/plugins/run",
        Some(json!({ "name": "spinner" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["error"], "plugin timed out");

    // The host keeps serving other requests afterwards.
    let (status, _) = send(&gw.app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_plugin_reads_context_and_proposes_actions() {
    let gw = gateway().await;

    let plugin_dir = gw.state.config.plugins_dir().join("advisor");
    std::fs::create_dir_all(&plugin_dir).unwrap();
    std::fs::write(plugin_dir.join("manifest.json"), r#"{ "name": "advisor" }"#).unwrap();
    std::fs::write(
        plugin_dir.join("plugin.rhai"),
        r#"
        let ctx = get_context();
        if ctx.backlog.len() < 3 {
            recommend(["backlog is shallow"]);
            actions([#{ "type": "backlog.add" }]);
        }
        "#,
    )
    .unwrap();

    let (status, body) = send(
        &gw.app,
        "POST",
        "/plugins/run",
        Some(json!({ "name": "advisor" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["recommendations"][0], "backlog is shallow");
    assert_eq!(body["result"]["actions"][0]["type"], "backlog.add");

    // Proposals alone mutate nothing; the applier is the only write path.
    let (_, backlog) = send(&gw.app, "GET", "/backlog", None).await;
    assert_eq!(backlog["backlog"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_backlog_status_roundtrip_over_http() {
    let gw = gateway().await;

    let (status, body) = send(
        &gw.app,
        "POST",
        "/backlog",
        Some(json!({ "title": "tighten mirrors" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["item"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &gw.app,
        "POST",
        "/backlog/status",
        Some(json!({ "id": id, "status": "applied" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["item"]["status"], "applied");

    let (status, _) = send(
        &gw.app,
        "POST",
        "/backlog/status",
        Some(json!({ "id": "task-none", "status": "applied" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_quest_refresh_feed_failure_is_typed_fallback() {
    let gw = gateway().await;
    let (status, body) = send(&gw.app, "POST", "/quests/refresh", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["quests"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_mutations_surface_as_chat_system_messages() {
    let gw = gateway().await;

    send(
        &gw.app,
        "POST",
        "/dreams",
        Some(json!({ "narrative": "quiet library" })),
    )
    .await;

    let (_, body) = send(&gw.app, "GET", "/chat/history", None).await;
    let history = body["history"].as_array().unwrap();
    assert!(history
        .iter()
        .any(|turn| turn["system"] == true && turn["content"].as_str().unwrap().contains("[dream]")));
}
