//! Self-improvement subsystem
//!
//! Snapshot builders feed the evaluator; the evaluator proposes action
//! requests; the applier executes them behind an optional backup snapshot.

pub mod actions;
pub mod backup;
pub mod evaluator;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::mesh::{MeshRegistry, ServiceInfo};
use crate::store::profile::ProfileState;
use crate::store::records::*;
use crate::store::RecordStore;

/// Profile slice of the metrics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct ProfileMetrics {
    pub level: i64,
    pub xp: i64,
    pub arcs: usize,
}

/// Storage health flags
#[derive(Debug, Clone, Serialize)]
pub struct StorageMetrics {
    pub sqlite: bool,
    pub llm_key: bool,
}

/// Counts-only view the evaluator thresholds run against
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub services: usize,
    pub dreams: usize,
    pub emotions: usize,
    pub memories: usize,
    pub gratitudes: usize,
    pub backlog: usize,
    pub decisions: usize,
    pub achievements: usize,
    pub collective_arcs: usize,
    pub quests_open: usize,
    pub profile: ProfileMetrics,
    pub storage: StorageMetrics,
}

pub async fn build_metrics(
    store: &RecordStore,
    mesh: &MeshRegistry,
    llm_key_present: bool,
) -> MetricsSnapshot {
    let counts = store.counts().await;
    let profile = store.profile().state();
    MetricsSnapshot {
        timestamp: Utc::now(),
        services: mesh.len(),
        dreams: counts.dreams,
        emotions: counts.emotions,
        memories: counts.memories,
        gratitudes: counts.gratitudes,
        backlog: counts.backlog,
        decisions: counts.decisions,
        achievements: counts.achievements,
        collective_arcs: counts.collective_arcs,
        quests_open: counts.quests_open,
        profile: ProfileMetrics {
            level: profile.level,
            xp: profile.xp,
            arcs: profile.arcs.len(),
        },
        storage: StorageMetrics {
            sqlite: store.sqlite_active(),
            llm_key: llm_key_present,
        },
    }
}

/// Emotion panel of the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct EmotionPanel {
    pub state: EmotionState,
    pub recent: Vec<EmotionEntry>,
}

/// Backlog + decisions panel
#[derive(Debug, Clone, Serialize)]
pub struct DevPanel {
    pub backlog: Vec<BacklogItem>,
    pub decisions: Vec<Decision>,
}

/// Aggregated recent-activity view across every domain
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub timestamp: DateTime<Utc>,
    pub dreams: Vec<Dream>,
    pub emotions: EmotionPanel,
    pub memories: Vec<Memory>,
    pub gratitudes: Vec<GratitudeEntry>,
    pub dev: DevPanel,
    pub services: Vec<ServiceInfo>,
    pub profile: ProfileState,
    pub achievements: Vec<Achievement>,
    pub collective: Vec<CollectiveArc>,
    pub quests: Vec<Quest>,
}

pub async fn build_dashboard(store: &RecordStore, mesh: &MeshRegistry) -> DashboardSnapshot {
    DashboardSnapshot {
        timestamp: Utc::now(),
        dreams: store.list_dreams(5).await,
        emotions: EmotionPanel {
            state: store.emotion_state().await,
            recent: store.list_emotions(10).await,
        },
        memories: store.list_memories(5).await,
        gratitudes: store.list_gratitudes(5).await,
        dev: DevPanel {
            backlog: store.list_backlog(20).await,
            decisions: store.list_decisions(10).await,
        },
        services: mesh.all(),
        profile: store.profile().state(),
        achievements: store.list_achievements(5).await,
        collective: store.list_arcs().await,
        quests: store.open_quests().await,
    }
}
