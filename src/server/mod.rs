//! HTTP server
//!
//! Builds the shared service objects, wires them into an axum router and
//! serves the gateway. No ambient globals: every handler works off the
//! injected `ServerState`.

pub mod http;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::chat::llm::LlmClient;
use crate::chat::reflect::Reflections;
use crate::chat::ChatService;
use crate::config::Config;
use crate::events::CrossEventBus;
use crate::mesh::{self, MeshRegistry};
use crate::plugins::{PluginRegistry, PluginRunner};
use crate::store::mirror::JsonMirror;
use crate::store::RecordStore;

/// Shared state injected into every handler
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub store: Arc<RecordStore>,
    pub mesh: Arc<MeshRegistry>,
    pub plugins: Arc<PluginRegistry>,
    pub runner: Arc<PluginRunner>,
    pub chat: Arc<ChatService>,
    pub reflections: Arc<Reflections>,
    pub http_client: reqwest::Client,
}

impl ServerState {
    /// Construct every service object and wire the event fan-out
    pub async fn build(config: Config) -> Result<Self> {
        let config = Arc::new(config);

        let bus_mirror = JsonMirror::open(config.analytics_dir()).await?;
        let bus = Arc::new(CrossEventBus::new(bus_mirror));

        let store = Arc::new(RecordStore::open(&config, bus.clone()).await?);

        let mesh = Arc::new(MeshRegistry::new(&config.mesh));
        mesh::register_builtin_services(&mesh);

        let http_client = reqwest::Client::new();
        let llm = LlmClient::new(&config, http_client.clone());
        let chat = Arc::new(ChatService::new(llm));
        bus.set_sink(chat.clone());

        tokio::fs::create_dir_all(config.plugins_dir()).await?;
        let plugins = Arc::new(PluginRegistry::new(config.plugins_dir()));
        let runner = Arc::new(PluginRunner::new(Duration::from_millis(
            config.plugins.timeout_ms,
        )));

        Ok(Self {
            config,
            store,
            mesh,
            plugins,
            runner,
            chat,
            reflections: Arc::new(Reflections::new()),
            http_client,
        })
    }
}

/// Assemble the full route table
pub fn router(state: ServerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(http::health))
        // self-improvement pipeline
        .route("/self/improve", get(http::self_improve))
        .route("/self/apply", post(http::self_apply))
        .route("/self/backup", post(http::self_backup))
        // plugins
        .route("/plugins", get(http::plugins_list))
        .route("/plugins/run", post(http::plugins_run))
        // cross events
        .route("/cross/status", get(http::cross_status))
        .route("/events/broadcast", post(http::events_broadcast))
        // chat
        .route("/chat", post(http::chat))
        .route("/chat/history", get(http::chat_history))
        .route("/chat/clear", post(http::chat_clear))
        .route("/chat/set-api-key", post(http::chat_set_api_key))
        // domain collections
        .route("/dreams", get(http::dreams_list).post(http::dreams_create))
        .route("/emotions", get(http::emotions_list).post(http::emotions_create))
        .route("/emotions/state", get(http::emotions_state))
        .route("/memories", get(http::memories_list).post(http::memories_create))
        .route("/gratitude", get(http::gratitude_list).post(http::gratitude_create))
        .route("/backlog", get(http::backlog_list).post(http::backlog_create))
        .route("/backlog/status", post(http::backlog_status))
        .route("/decisions", get(http::decisions_list).post(http::decisions_create))
        .route("/achievements", get(http::achievements_list))
        .route("/collective/arcs", get(http::arcs_list))
        .route("/collective/contribute", post(http::arcs_contribute))
        .route("/quests/today", get(http::quests_today))
        .route("/quests/complete", post(http::quests_complete))
        .route("/quests/refresh", post(http::quests_refresh))
        .route("/profile", get(http::profile_get).post(http::profile_update))
        .route("/profile/arcs", get(http::profile_arcs))
        // aggregates
        .route("/metrics", get(http::metrics))
        .route("/dashboard", get(http::dashboard))
        .route("/mesh/scan", get(http::mesh_scan))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start serving and spawn the background mesh watch
pub async fn start(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;

    let state = ServerState::build(config).await?;

    mesh::spawn_mesh_watch(
        state.mesh.clone(),
        state.store.clone(),
        state.http_client.clone(),
        Duration::from_secs(state.config.mesh.watch_interval_secs),
    );

    let app = router(state.clone());

    info!("Gateway listening on http://{addr}");
    println!("Lifelog gateway listening on http://{addr}");
    println!("  data dir: {}", state.config.data_dir.display());
    println!(
        "  storage: {}",
        if state.store.sqlite_active() {
            "sqlite + file mirror"
        } else {
            "file mirror only"
        }
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
