//! Domain record types
//!
//! Every persisted entity carries a globally unique string id and a creation
//! timestamp, both immutable after creation. Only explicit status/progress
//! fields are mutated in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Dream classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DreamKind {
    Lucid,
    Predictive,
    #[default]
    Creative,
    Integration,
    Shadow,
}

impl DreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DreamKind::Lucid => "lucid",
            DreamKind::Predictive => "predictive",
            DreamKind::Creative => "creative",
            DreamKind::Integration => "integration",
            DreamKind::Shadow => "shadow",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "lucid" => Some(DreamKind::Lucid),
            "predictive" => Some(DreamKind::Predictive),
            "creative" => Some(DreamKind::Creative),
            "integration" => Some(DreamKind::Integration),
            "shadow" => Some(DreamKind::Shadow),
            _ => None,
        }
    }
}

/// A journaled dream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dream {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub kind: DreamKind,
    pub narrative: String,
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub emotions: Vec<String>,
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration: Option<String>,
}

/// Input for recording a dream (id + timestamp are assigned by the store)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NewDream {
    #[serde(default)]
    pub kind: DreamKind,
    pub narrative: String,
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub emotions: Vec<String>,
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub integration: Option<String>,
}

/// A logged emotional state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionEntry {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub primary_emotion: String,
    pub valence: f64,
    pub arousal: f64,
    pub intensity: f64,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NewEmotion {
    pub primary_emotion: String,
    #[serde(default)]
    pub valence: f64,
    #[serde(default)]
    pub arousal: f64,
    #[serde(default = "default_intensity")]
    pub intensity: f64,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_intensity() -> f64 {
    50.0
}

/// Aggregate view over the most recent emotion entries
#[derive(Debug, Clone, Serialize)]
pub struct EmotionState {
    pub dominant: String,
    pub valence: f64,
    pub arousal: f64,
    pub trend: &'static str,
}

/// A stored memory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub content: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub significance: f64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NewMemory {
    pub title: String,
    pub content: String,
    #[serde(default = "default_memory_category")]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_significance")]
    pub significance: f64,
}

fn default_memory_category() -> String {
    "reflection".to_string()
}

fn default_significance() -> f64 {
    50.0
}

/// A gratitude entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GratitudeEntry {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Backlog item lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BacklogStatus {
    #[default]
    Open,
    Applied,
    Done,
    Rejected,
}

impl BacklogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BacklogStatus::Open => "open",
            BacklogStatus::Applied => "applied",
            BacklogStatus::Done => "done",
            BacklogStatus::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "open" => Some(BacklogStatus::Open),
            "applied" => Some(BacklogStatus::Applied),
            "done" => Some(BacklogStatus::Done),
            "rejected" => Some(BacklogStatus::Rejected),
            _ => None,
        }
    }
}

/// One entry in a backlog item's activity log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityNote {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// A self-evolution backlog item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacklogItem {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub status: BacklogStatus,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub activity: Vec<ActivityNote>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NewBacklogItem {
    pub title: String,
    #[serde(default = "default_backlog_tag")]
    pub tag: String,
    #[serde(default = "default_priority")]
    pub priority: String,
    #[serde(default = "default_owner")]
    pub owner: String,
    #[serde(default)]
    pub notes: String,
}

fn default_backlog_tag() -> String {
    "general".to_string()
}

fn default_priority() -> String {
    "medium".to_string()
}

fn default_owner() -> String {
    "unassigned".to_string()
}

/// A logged decision with rationale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub decision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NewDecision {
    pub title: String,
    pub decision: String,
    #[serde(default)]
    pub rationale: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

/// An unlocked achievement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub description: String,
    pub source: String,
}

/// A shared progress arc the whole collective contributes to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectiveArc {
    pub id: String,
    pub title: String,
    pub description: String,
    pub progress: f64,
    pub target: f64,
    pub contributors: u32,
    pub last_update: DateTime<Utc>,
}

/// Quest difficulty tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuestDifficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// Quest lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuestStatus {
    #[default]
    Open,
    Done,
    Expired,
}

/// A daily quest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quest {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub summary: String,
    pub category: String,
    pub difficulty: QuestDifficulty,
    pub source: String,
    pub status: QuestStatus,
    pub reward_xp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}
