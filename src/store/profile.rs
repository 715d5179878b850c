//! Profile & reward system
//!
//! Process-wide profile state: experience points, per-topic arcs, unlocked
//! artifacts and light conversational context. Every rewarded interaction
//! mutates the state; persistence is debounced through a single-writer task
//! so rapid-fire mutations collapse into one in-flight write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tracing::warn;

use super::mirror::JsonMirror;
use super::sqlite::SqliteStore;

const PROFILE_KEY: &str = "profile";
const MAX_TOPICS: usize = 5;

/// A named experience track accumulating XP independently
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileArc {
    pub id: String,
    pub title: String,
    pub xp: i64,
    pub active: bool,
}

/// The process-wide profile singleton state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileState {
    #[serde(default)]
    pub xp: i64,
    #[serde(default = "default_level")]
    pub level: i64,
    #[serde(default)]
    pub arcs: BTreeMap<String, ProfileArc>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default)]
    pub interactions: u64,
    #[serde(default = "Utc::now")]
    pub last_update: DateTime<Utc>,
    #[serde(default = "default_creator")]
    pub creator_name: String,
    #[serde(default)]
    pub last_topics: Vec<String>,
    #[serde(default)]
    pub last_message: String,
    #[serde(default)]
    pub last_chat_at: Option<DateTime<Utc>>,
}

fn default_level() -> i64 {
    1
}

fn default_creator() -> String {
    "Creator".to_string()
}

impl Default for ProfileState {
    fn default() -> Self {
        Self {
            xp: 0,
            level: 1,
            arcs: BTreeMap::new(),
            artifacts: Vec::new(),
            interactions: 0,
            last_update: Utc::now(),
            creator_name: default_creator(),
            last_topics: Vec::new(),
            last_message: String::new(),
            last_chat_at: None,
        }
    }
}

/// What a single rewarded interaction granted
#[derive(Debug, Clone, Serialize)]
pub struct RewardPacket {
    pub xp: i64,
    pub level: i64,
    pub level_up: bool,
    pub arc: String,
    pub arc_xp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Profile service with a coalescing single-writer persistence task
pub struct ProfileService {
    state: Arc<Mutex<ProfileState>>,
    generation: Arc<AtomicU64>,
    dirty_tx: mpsc::Sender<()>,
    saved_rx: watch::Receiver<u64>,
}

impl ProfileService {
    /// Load persisted state (relational backend wins, mirror is fallback)
    /// and start the writer task.
    pub async fn load(sqlite: Option<Arc<SqliteStore>>, mirror: JsonMirror) -> Self {
        let state = Arc::new(Mutex::new(Self::load_state(&sqlite, &mirror).await));
        let generation = Arc::new(AtomicU64::new(0));
        // Capacity 1: a save request issued while one is already queued is
        // coalesced into it; the writer snapshots the latest state anyway.
        let (dirty_tx, mut dirty_rx) = mpsc::channel::<()>(1);
        let (saved_tx, saved_rx) = watch::channel(0u64);

        let worker_state = state.clone();
        let worker_generation = generation.clone();
        tokio::spawn(async move {
            while dirty_rx.recv().await.is_some() {
                let (snapshot, gen) = {
                    let state = worker_state.lock().expect("profile state poisoned");
                    (state.clone(), worker_generation.load(Ordering::SeqCst))
                };
                let value = match serde_json::to_value(&snapshot) {
                    Ok(value) => value,
                    Err(err) => {
                        warn!("Failed to serialize profile state: {err}");
                        continue;
                    }
                };
                if let Some(sqlite) = &sqlite {
                    if let Err(err) = sqlite.save_state(PROFILE_KEY, &value).await {
                        warn!("Profile sqlite write failed: {err}");
                    }
                }
                if let Err(err) = mirror.write_value(PROFILE_KEY, &value).await {
                    warn!("Profile mirror write failed: {err}");
                }
                let _ = saved_tx.send(gen);
            }
        });

        Self {
            state,
            generation,
            dirty_tx,
            saved_rx,
        }
    }

    async fn load_state(sqlite: &Option<Arc<SqliteStore>>, mirror: &JsonMirror) -> ProfileState {
        if let Some(sqlite) = sqlite {
            if let Ok(Some(value)) = sqlite.load_state(PROFILE_KEY).await {
                if let Ok(state) = serde_json::from_value::<ProfileState>(value) {
                    return state;
                }
            }
        }
        mirror
            .read_value::<ProfileState>(PROFILE_KEY)
            .await
            .unwrap_or_default()
    }

    /// Current state snapshot
    pub fn state(&self) -> ProfileState {
        self.state.lock().expect("profile state poisoned").clone()
    }

    /// All arcs, in stable id order
    pub fn list_arcs(&self) -> Vec<ProfileArc> {
        self.state
            .lock()
            .expect("profile state poisoned")
            .arcs
            .values()
            .cloned()
            .collect()
    }

    /// Grant XP on an arc; the system's sole gamification mechanism
    pub fn reward(&self, arc_name: &str, xp: i64) -> RewardPacket {
        self.reward_with(arc_name, xp, None, None)
    }

    /// Grant XP with an optional artifact unlock and note
    pub fn reward_with(
        &self,
        arc_name: &str,
        xp: i64,
        artifact: Option<&str>,
        note: Option<&str>,
    ) -> RewardPacket {
        let packet = {
            let mut state = self.state.lock().expect("profile state poisoned");
            let level_before = state.level;
            let arc = get_or_create_arc(&mut state.arcs, arc_name);
            arc.xp += xp;
            let (arc_title, arc_xp) = (arc.title.clone(), arc.xp);
            state.xp += xp;
            state.interactions += 1;
            state.level = compute_level(state.xp);
            if let Some(artifact) = artifact {
                if !state.artifacts.iter().any(|a| a == artifact) {
                    state.artifacts.push(artifact.to_string());
                }
            }
            state.last_update = Utc::now();
            RewardPacket {
                xp,
                level: state.level,
                level_up: state.level > level_before,
                arc: arc_title,
                arc_xp,
                artifact: artifact.map(|a| a.to_string()),
                message: note.map(|n| n.to_string()),
            }
        };
        self.schedule_save();
        packet
    }

    /// Record conversational context from the latest interaction
    pub fn update_context(&self, topic: Option<&str>, message: Option<&str>) {
        {
            let mut state = self.state.lock().expect("profile state poisoned");
            let now = Utc::now();
            if let Some(message) = message {
                state.last_message = message.to_string();
                state.last_chat_at = Some(now);
            }
            if let Some(topic) = topic {
                let topic = topic.trim();
                if !topic.is_empty() {
                    state.last_topics.retain(|t| t != topic);
                    state.last_topics.insert(0, topic.to_string());
                    state.last_topics.truncate(MAX_TOPICS);
                    state.last_chat_at = Some(now);
                }
            }
            state.last_update = now;
        }
        self.schedule_save();
    }

    /// Mark an arc active (creating it if needed)
    pub fn activate_arc(&self, name: &str) {
        {
            let mut state = self.state.lock().expect("profile state poisoned");
            let arc = get_or_create_arc(&mut state.arcs, name);
            arc.active = true;
        }
        self.schedule_save();
    }

    /// Pause an existing arc; unknown names are ignored
    pub fn pause_arc(&self, name: &str) {
        let changed = {
            let mut state = self.state.lock().expect("profile state poisoned");
            match state.arcs.get_mut(&name.to_lowercase()) {
                Some(arc) => {
                    arc.active = false;
                    true
                }
                None => false,
            }
        };
        if changed {
            self.schedule_save();
        }
    }

    fn schedule_save(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        // Full channel means a write is already queued; it will pick up the
        // state this mutation just produced.
        let _ = self.dirty_tx.try_send(());
    }

    /// Wait until every mutation issued so far has been durably written
    pub async fn flush(&self) {
        let target = self.generation.load(Ordering::SeqCst);
        if target == 0 {
            return;
        }
        let _ = self.dirty_tx.try_send(());
        let mut saved_rx = self.saved_rx.clone();
        loop {
            if *saved_rx.borrow_and_update() >= target {
                return;
            }
            if saved_rx.changed().await.is_err() {
                return;
            }
        }
    }
}

fn get_or_create_arc<'a>(
    arcs: &'a mut BTreeMap<String, ProfileArc>,
    name: &str,
) -> &'a mut ProfileArc {
    let key = name.to_lowercase();
    arcs.entry(key.clone()).or_insert_with(|| ProfileArc {
        id: key,
        title: format_arc_title(name),
        xp: 0,
        active: true,
    })
}

fn format_arc_title(name: &str) -> String {
    name.split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn compute_level(xp: i64) -> i64 {
    xp / 100 + 1
}
