//! HTTP handlers
//!
//! Every error response is well-formed JSON with an `error` field. Validation
//! failures return 4xx before touching the store; dependency failures are
//! converted to typed fallbacks at the call sites, so a 500 only surfaces
//! for genuinely unexpected conditions.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::chat::command::{handle_command, parse_chat_command};
use crate::chat::ChatContext;
use crate::evolve::actions::{apply_batch, ActionRequest, ApplyContext, ApplyError, MAX_BATCH};
use crate::evolve::{backup, build_dashboard, build_metrics, evaluator};
use crate::store::records::*;
use crate::types::now;

use super::ServerState;

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
}

fn internal_error(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
        .into_response()
}

fn created(body: Value) -> Response {
    (StatusCode::CREATED, Json(body)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

// -- health & aggregates ---------------------------------------------------

pub async fn health(State(state): State<ServerState>) -> Response {
    let counts = state.store.counts().await;
    Json(json!({
        "status": "ok",
        "timestamp": now(),
        "services": state.mesh.len(),
        "dreams": counts.dreams,
        "emotions": counts.emotions,
        "storage": { "sqlite": state.store.sqlite_active() },
    }))
    .into_response()
}

pub async fn metrics(State(state): State<ServerState>) -> Response {
    let metrics =
        build_metrics(&state.store, &state.mesh, state.chat.llm().key_present()).await;
    Json(json!(metrics)).into_response()
}

pub async fn dashboard(State(state): State<ServerState>) -> Response {
    let dashboard = build_dashboard(&state.store, &state.mesh).await;
    Json(json!(dashboard)).into_response()
}

pub async fn mesh_scan(State(state): State<ServerState>) -> Response {
    let report = state.mesh.scan(&state.http_client).await;
    for check in report.offline.iter().take(5) {
        state
            .store
            .bus()
            .publish(
                "mesh",
                &format!("Offline: {}", check.name),
                json!({ "base_url": check.base_url }),
            )
            .await;
    }
    Json(json!(report)).into_response()
}

// -- self-improvement pipeline ---------------------------------------------

pub async fn self_improve(State(state): State<ServerState>) -> Response {
    let llm_key_present = state.chat.llm().key_present();
    let metrics = build_metrics(&state.store, &state.mesh, llm_key_present).await;
    let dashboard = build_dashboard(&state.store, &state.mesh).await;
    let evaluation = evaluator::evaluate(&metrics, &dashboard, llm_key_present);
    Json(json!({
        "suggestions": evaluation.suggestions,
        "recommendedActions": evaluation.recommended_actions,
        "metrics": metrics,
        "dashboard": dashboard,
    }))
    .into_response()
}

pub async fn self_apply(State(state): State<ServerState>, Json(body): Json<Value>) -> Response {
    let Some(actions_raw) = body.get("actions").and_then(Value::as_array) else {
        return bad_request("actions required");
    };
    if actions_raw.is_empty() {
        return bad_request("actions required");
    }
    if actions_raw.len() > MAX_BATCH {
        return bad_request("too many actions (max 20)");
    }
    let backup = body
        .get("backup")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    // Entries without a recognizable shape still travel through the batch so
    // they fail closed per-action instead of rejecting their siblings.
    let actions: Vec<ActionRequest> = actions_raw
        .iter()
        .map(|raw| ActionRequest {
            kind: raw
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            payload: raw.get("payload").cloned(),
        })
        .collect();

    let ctx = ApplyContext {
        store: &state.store,
        mesh: &state.mesh,
        client: &state.http_client,
        config: &state.config,
    };
    let report = match apply_batch(&ctx, &actions, backup).await {
        Ok(report) => report,
        Err(err @ (ApplyError::EmptyBatch | ApplyError::BatchTooLarge)) => {
            return bad_request(&err.to_string())
        }
        Err(err @ ApplyError::Backup(_)) => return internal_error(&err.to_string()),
    };

    let llm_key_present = state.chat.llm().key_present();
    let metrics_after = build_metrics(&state.store, &state.mesh, llm_key_present).await;
    let dashboard_after = build_dashboard(&state.store, &state.mesh).await;
    Json(json!({
        "backup": report.backup,
        "results": report.results,
        "metrics": metrics_after,
        "dashboard": dashboard_after,
    }))
    .into_response()
}

pub async fn self_backup(State(state): State<ServerState>) -> Response {
    let root = std::env::current_dir().unwrap_or_else(|_| ".".into());
    match backup::create_snapshot(&root, &state.config.backup_dir(), &state.config.backup.paths)
        .await
    {
        Ok(path) => Json(json!({ "backup": path.display().to_string() })).into_response(),
        Err(err) => internal_error(&format!("backup failed: {err}")),
    }
}

// -- plugins ---------------------------------------------------------------

pub async fn plugins_list(State(state): State<ServerState>) -> Response {
    Json(json!({ "plugins": state.plugins.list() })).into_response()
}

pub async fn plugins_run(State(state): State<ServerState>, Json(body): Json<Value>) -> Response {
    let Some(name) = body.get("name").and_then(Value::as_str).filter(|n| !n.is_empty()) else {
        return bad_request("name required");
    };

    // Read-only context snapshot handed into the sandbox.
    let context = json!({
        "profile": state.store.profile().state(),
        "backlog": state.store.list_backlog(20).await,
        "decisions": state.store.list_decisions(20).await,
        "services": state.mesh.all(),
    });

    match state.runner.run(&state.plugins, name, context).await {
        Some(run) => Json(json!(run)).into_response(),
        None => not_found("not found"),
    }
}

// -- cross events ----------------------------------------------------------

pub async fn cross_status(State(state): State<ServerState>) -> Response {
    let counts = state.store.counts().await;
    let links = json!([
        {
            "link": "Emotions -> Memory",
            "status": if counts.memories > 0 { "ok" } else { "missing" },
            "note": if counts.memories > 0 { "memories present" } else { "no memories stored" },
        },
        {
            "link": "Dreams -> Insights",
            "status": if counts.dreams > 0 { "ok" } else { "missing" },
            "note": if counts.dreams > 0 { "dreams present" } else { "no dreams recorded" },
        },
        {
            "link": "Decisions -> Backlog",
            "status": if counts.decisions > 0 { "ok" } else { "missing" },
            "note": if counts.decisions > 0 { "decisions present" } else { "no decisions logged" },
        },
    ]);
    Json(json!({ "links": links, "events": state.store.bus().list() })).into_response()
}

pub async fn events_broadcast(
    State(state): State<ServerState>,
    Json(body): Json<Value>,
) -> Response {
    let Some(kind) = body.get("type").and_then(Value::as_str).filter(|k| !k.is_empty()) else {
        return bad_request("type required");
    };
    let message = body.get("message").and_then(Value::as_str).unwrap_or("");
    let payload = body.get("payload").cloned().unwrap_or(json!({}));
    state.store.bus().publish(kind, message, payload).await;
    Json(json!({ "ok": true })).into_response()
}

// -- chat ------------------------------------------------------------------

pub async fn chat(State(state): State<ServerState>, Json(body): Json<Value>) -> Response {
    let Some(message) = body.get("message").and_then(Value::as_str).filter(|m| !m.trim().is_empty())
    else {
        return bad_request("message required");
    };

    if let Some(command) = parse_chat_command(message) {
        let reply =
            handle_command(&state.store, &state.mesh, &state.reflections, &command).await;
        state
            .store
            .profile()
            .update_context(Some(&command.command), Some(message));
        return Json(json!({
            "response": reply.text,
            "reward": reply.reward,
            "achievements": reply.achievements,
            "command": command.command,
        }))
        .into_response();
    }

    let context = ChatContext {
        profile: state.store.profile().state(),
        emotion: state.store.emotion_state().await,
        recent_dreams: state.store.list_dreams(3).await,
    };
    let reply = state.chat.chat(message, &context).await;

    let topic: String = message.chars().take(80).collect();
    state
        .store
        .profile()
        .update_context(Some(&topic), Some(message));
    let reward = state.store.profile().reward("dialog", 5);
    let collective = state.store.contribute_to_arc("dialog-100", 1.0).await;
    let achievements = if reward.level_up {
        vec![
            state
                .store
                .unlock_achievement("Level up!", "You reached a new gateway level.", "profile")
                .await,
        ]
    } else {
        Vec::new()
    };

    Json(json!({
        "response": reply,
        "reward": reward,
        "collective": collective,
        "achievements": achievements,
    }))
    .into_response()
}

pub async fn chat_history(
    State(state): State<ServerState>,
    Query(query): Query<LimitQuery>,
) -> Response {
    Json(json!({ "history": state.chat.history(query.limit.unwrap_or(20)) })).into_response()
}

pub async fn chat_clear(State(state): State<ServerState>) -> Response {
    state.chat.clear_history();
    Json(json!({ "success": true })).into_response()
}

pub async fn chat_set_api_key(
    State(state): State<ServerState>,
    Json(body): Json<Value>,
) -> Response {
    let Some(key) = body.get("apiKey").and_then(Value::as_str) else {
        return bad_request("apiKey required");
    };
    match state.chat.llm().set_api_key(key).await {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(err) => bad_request(&err.to_string()),
    }
}

// -- domain collections ----------------------------------------------------

pub async fn dreams_list(
    State(state): State<ServerState>,
    Query(query): Query<LimitQuery>,
) -> Response {
    Json(json!({ "dreams": state.store.list_dreams(query.limit.unwrap_or(10)).await }))
        .into_response()
}

pub async fn dreams_create(State(state): State<ServerState>, Json(body): Json<Value>) -> Response {
    let input: NewDream = match serde_json::from_value(body) {
        Ok(input) => input,
        Err(err) => return bad_request(&err.to_string()),
    };
    if input.narrative.trim().len() < 3 {
        return bad_request("narrative required");
    }
    let dream = state.store.record_dream(input).await;
    created(json!({ "dream": dream }))
}

pub async fn emotions_list(
    State(state): State<ServerState>,
    Query(query): Query<LimitQuery>,
) -> Response {
    Json(json!({ "emotions": state.store.list_emotions(query.limit.unwrap_or(10)).await }))
        .into_response()
}

pub async fn emotions_state(State(state): State<ServerState>) -> Response {
    Json(json!({ "state": state.store.emotion_state().await })).into_response()
}

pub async fn emotions_create(
    State(state): State<ServerState>,
    Json(body): Json<Value>,
) -> Response {
    let input: NewEmotion = match serde_json::from_value(body) {
        Ok(input) => input,
        Err(err) => return bad_request(&err.to_string()),
    };
    if input.primary_emotion.trim().len() < 2 {
        return bad_request("primary_emotion required");
    }
    let emotion = state.store.record_emotion(input).await;
    created(json!({ "emotion": emotion }))
}

pub async fn memories_list(
    State(state): State<ServerState>,
    Query(query): Query<LimitQuery>,
) -> Response {
    Json(json!({ "memories": state.store.list_memories(query.limit.unwrap_or(10)).await }))
        .into_response()
}

pub async fn memories_create(
    State(state): State<ServerState>,
    Json(body): Json<Value>,
) -> Response {
    let input: NewMemory = match serde_json::from_value(body) {
        Ok(input) => input,
        Err(err) => return bad_request(&err.to_string()),
    };
    if input.title.trim().is_empty() || input.content.trim().is_empty() {
        return bad_request("title and content required");
    }
    let memory = state.store.record_memory(input).await;
    created(json!({ "memory": memory }))
}

pub async fn gratitude_list(
    State(state): State<ServerState>,
    Query(query): Query<LimitQuery>,
) -> Response {
    Json(json!({ "gratitudes": state.store.list_gratitudes(query.limit.unwrap_or(5)).await }))
        .into_response()
}

pub async fn gratitude_create(
    State(state): State<ServerState>,
    Json(body): Json<Value>,
) -> Response {
    let Some(text) = body.get("text").and_then(Value::as_str).filter(|t| !t.trim().is_empty())
    else {
        return bad_request("text required");
    };
    let category = body
        .get("category")
        .and_then(Value::as_str)
        .map(|c| c.to_string());
    let gratitude = state.store.record_gratitude(text.to_string(), category).await;
    created(json!({ "gratitude": gratitude }))
}

pub async fn backlog_list(
    State(state): State<ServerState>,
    Query(query): Query<LimitQuery>,
) -> Response {
    Json(json!({ "backlog": state.store.list_backlog(query.limit.unwrap_or(50)).await }))
        .into_response()
}

pub async fn backlog_create(State(state): State<ServerState>, Json(body): Json<Value>) -> Response {
    let input: NewBacklogItem = match serde_json::from_value(body) {
        Ok(input) => input,
        Err(err) => return bad_request(&err.to_string()),
    };
    if input.title.trim().is_empty() {
        return bad_request("title required");
    }
    let item = state.store.add_backlog_item(input).await;
    created(json!({ "item": item }))
}

pub async fn backlog_status(State(state): State<ServerState>, Json(body): Json<Value>) -> Response {
    let (Some(id), Some(status_raw)) = (
        body.get("id").and_then(Value::as_str),
        body.get("status").and_then(Value::as_str),
    ) else {
        return bad_request("id and status required");
    };
    let Some(status) = BacklogStatus::parse(status_raw) else {
        return bad_request("invalid status");
    };
    match state.store.update_backlog_status(id, status).await {
        Some(item) => Json(json!({ "item": item })).into_response(),
        None => not_found("not found"),
    }
}

pub async fn decisions_list(
    State(state): State<ServerState>,
    Query(query): Query<LimitQuery>,
) -> Response {
    Json(json!({ "decisions": state.store.list_decisions(query.limit.unwrap_or(50)).await }))
        .into_response()
}

pub async fn decisions_create(
    State(state): State<ServerState>,
    Json(body): Json<Value>,
) -> Response {
    let input: NewDecision = match serde_json::from_value(body) {
        Ok(input) => input,
        Err(err) => return bad_request(&err.to_string()),
    };
    if input.title.trim().is_empty() || input.decision.trim().is_empty() {
        return bad_request("title and decision required");
    }
    let entry = state.store.log_decision(input).await;
    created(json!({ "entry": entry }))
}

pub async fn achievements_list(
    State(state): State<ServerState>,
    Query(query): Query<LimitQuery>,
) -> Response {
    Json(json!({ "achievements": state.store.list_achievements(query.limit.unwrap_or(50)).await }))
        .into_response()
}

pub async fn arcs_list(State(state): State<ServerState>) -> Response {
    Json(json!({ "arcs": state.store.list_arcs().await })).into_response()
}

pub async fn arcs_contribute(State(state): State<ServerState>, Json(body): Json<Value>) -> Response {
    let Some(id) = body.get("id").and_then(Value::as_str) else {
        return bad_request("id required");
    };
    let amount = body.get("amount").and_then(Value::as_f64).unwrap_or(1.0);
    match state.store.contribute_to_arc(id, amount).await {
        Some(arc) => Json(json!({ "arc": arc })).into_response(),
        None => not_found("arc not found"),
    }
}

pub async fn quests_today(State(state): State<ServerState>) -> Response {
    Json(json!({ "quests": state.store.open_quests().await })).into_response()
}

pub async fn quests_complete(
    State(state): State<ServerState>,
    Json(body): Json<Value>,
) -> Response {
    let Some(id) = body.get("id").and_then(Value::as_str) else {
        return bad_request("id required");
    };
    let Some(quest) = state.store.complete_quest(id).await else {
        return not_found("quest not found");
    };
    let reward = state.store.profile().reward_with(
        "quest",
        quest.reward_xp.max(5),
        None,
        Some(&quest.title),
    );
    Json(json!({ "quest": quest, "reward": reward })).into_response()
}

pub async fn quests_refresh(State(state): State<ServerState>) -> Response {
    let quests = state
        .store
        .refresh_quests(
            &state.http_client,
            &state.config.quests.news_feed_url,
            std::time::Duration::from_secs(state.config.quests.fetch_timeout_secs),
        )
        .await;
    Json(json!({ "quests": quests })).into_response()
}

pub async fn profile_get(State(state): State<ServerState>) -> Response {
    Json(json!({ "profile": state.store.profile().state() })).into_response()
}

pub async fn profile_update(State(state): State<ServerState>, Json(body): Json<Value>) -> Response {
    let (Some(arc), Some(action)) = (
        body.get("arc").and_then(Value::as_str),
        body.get("action").and_then(Value::as_str),
    ) else {
        return bad_request("arc & action required");
    };
    match action {
        "activate" => state.store.profile().activate_arc(arc),
        "pause" => state.store.profile().pause_arc(arc),
        _ => return bad_request("action must be activate or pause"),
    }
    Json(json!({ "profile": state.store.profile().state() })).into_response()
}

pub async fn profile_arcs(State(state): State<ServerState>) -> Response {
    Json(json!({ "arcs": state.store.profile().list_arcs() })).into_response()
}
