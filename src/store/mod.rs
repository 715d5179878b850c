//! Record store
//!
//! Owns every domain collection and the profile singleton. Collections are
//! insertion-ordered vectors guarded by async mutexes; every mutating call
//! re-serializes the full collection to the embedded relational backend and
//! the flat-file mirror. If the relational backend fails to open at startup
//! the store runs file-only for the rest of the process.
//!
//! Backend precedence on boot: non-empty relational contents win over the
//! mirror; the mirror is a disaster-recovery fallback, never merged
//! field-by-field. Divergence after an unclean shutdown is resolved by that
//! precedence alone.

pub mod mirror;
pub mod profile;
pub mod records;
pub mod sqlite;

use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::Config;
use crate::events::CrossEventBus;
use crate::types::{now, short_id};
use mirror::JsonMirror;
use profile::ProfileService;
use records::*;
use sqlite::SqliteStore;

const MAX_EMOTIONS: usize = 300;
const MAX_ACHIEVEMENTS: usize = 200;
const MAX_QUESTS: usize = 30;

/// Per-collection record counts for the metrics snapshot
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreCounts {
    pub dreams: usize,
    pub emotions: usize,
    pub memories: usize,
    pub gratitudes: usize,
    pub backlog: usize,
    pub decisions: usize,
    pub achievements: usize,
    pub collective_arcs: usize,
    pub quests_open: usize,
}

/// The aggregate store behind every domain endpoint
pub struct RecordStore {
    sqlite: Option<Arc<SqliteStore>>,
    mirror: JsonMirror,
    bus: Arc<CrossEventBus>,
    profile: ProfileService,
    dreams: Mutex<Vec<Dream>>,
    emotions: Mutex<Vec<EmotionEntry>>,
    memories: Mutex<Vec<Memory>>,
    gratitudes: Mutex<Vec<GratitudeEntry>>,
    backlog: Mutex<Vec<BacklogItem>>,
    decisions: Mutex<Vec<Decision>>,
    achievements: Mutex<Vec<Achievement>>,
    arcs: Mutex<Vec<CollectiveArc>>,
    quests: Mutex<Vec<Quest>>,
}

impl RecordStore {
    /// Open the store, reconciling persisted state with in-memory defaults
    pub async fn open(config: &Config, bus: Arc<CrossEventBus>) -> Result<Self> {
        let mirror = JsonMirror::open(config.analytics_dir()).await?;

        let sqlite = match SqliteStore::open(config.sqlite_path()).await {
            Ok(store) => {
                info!("Relational backend active at {}", config.sqlite_path().display());
                Some(Arc::new(store))
            }
            Err(err) => {
                // Logged once; the store stays file-only for this run.
                warn!("Relational backend failed to open, degrading to file-only mode: {err}");
                None
            }
        };

        let dreams = Self::load_collection(&sqlite, &mirror, "dreams", |s| async move {
            s.load_dreams().await
        })
        .await;
        let emotions = Self::load_collection(&sqlite, &mirror, "emotions", |s| async move {
            s.load_emotions().await
        })
        .await;
        let memories = Self::load_collection(&sqlite, &mirror, "memories", |s| async move {
            s.load_memories().await
        })
        .await;
        let gratitudes = Self::load_collection(&sqlite, &mirror, "gratitudes", |s| async move {
            s.load_gratitudes().await
        })
        .await;
        let backlog = Self::load_collection(&sqlite, &mirror, "backlog", |s| async move {
            s.load_backlog().await
        })
        .await;
        let decisions = Self::load_collection(&sqlite, &mirror, "decisions", |s| async move {
            s.load_decisions().await
        })
        .await;
        let achievements =
            Self::load_collection(&sqlite, &mirror, "achievements", |s| async move {
                s.load_achievements().await
            })
            .await;
        let mut arcs =
            Self::load_collection(&sqlite, &mirror, "collective-arcs", |s| async move {
                s.load_collective_arcs().await
            })
            .await;
        let mut quests = Self::load_collection(&sqlite, &mirror, "quests", |s| async move {
            s.load_quests().await
        })
        .await;

        if arcs.is_empty() {
            arcs = default_arcs();
        }
        if quests.is_empty() {
            seed_daily_quests(&mut quests);
        }

        let profile = ProfileService::load(sqlite.clone(), mirror.clone()).await;

        Ok(Self {
            sqlite,
            mirror,
            bus,
            profile,
            dreams: Mutex::new(dreams),
            emotions: Mutex::new(emotions),
            memories: Mutex::new(memories),
            gratitudes: Mutex::new(gratitudes),
            backlog: Mutex::new(backlog),
            decisions: Mutex::new(decisions),
            achievements: Mutex::new(achievements),
            arcs: Mutex::new(arcs),
            quests: Mutex::new(quests),
        })
    }

    async fn load_collection<T, F, Fut>(
        sqlite: &Option<Arc<SqliteStore>>,
        mirror: &JsonMirror,
        name: &str,
        loader: F,
    ) -> Vec<T>
    where
        T: serde::de::DeserializeOwned,
        F: FnOnce(Arc<SqliteStore>) -> Fut,
        Fut: std::future::Future<Output = Result<Vec<T>>>,
    {
        if let Some(sqlite) = sqlite {
            match loader(sqlite.clone()).await {
                Ok(rows) if !rows.is_empty() => return rows,
                Ok(_) => {}
                Err(err) => warn!("Failed to load {name} from relational backend: {err}"),
            }
        }
        mirror.read(name).await.unwrap_or_default()
    }

    /// Whether the relational backend is active this run
    pub fn sqlite_active(&self) -> bool {
        self.sqlite.is_some()
    }

    /// The profile singleton
    pub fn profile(&self) -> &ProfileService {
        &self.profile
    }

    /// The cross-event bus fed by this store
    pub fn bus(&self) -> &Arc<CrossEventBus> {
        &self.bus
    }

    // -- dreams ------------------------------------------------------------

    pub async fn record_dream(&self, input: NewDream) -> Dream {
        let dream = Dream {
            id: short_id("dream"),
            created_at: now(),
            kind: input.kind,
            narrative: input.narrative,
            symbols: input.symbols,
            emotions: input.emotions,
            insights: input.insights,
            integration: input.integration,
        };
        let snapshot = {
            let mut dreams = self.dreams.lock().await;
            dreams.push(dream.clone());
            dreams.clone()
        };
        self.persist_dreams(&snapshot).await;
        self.bus
            .publish(
                "dream",
                dream.kind.as_str(),
                json!({ "id": dream.id, "symbols": dream.symbols, "emotions": dream.emotions }),
            )
            .await;
        dream
    }

    pub async fn list_dreams(&self, limit: usize) -> Vec<Dream> {
        recent(&*self.dreams.lock().await, limit)
    }

    async fn persist_dreams(&self, snapshot: &[Dream]) {
        if let Some(sqlite) = &self.sqlite {
            if let Err(err) = sqlite.replace_dreams(snapshot).await {
                warn!("Dream write to relational backend failed: {err}");
            }
        }
        if let Err(err) = self.mirror.write("dreams", snapshot).await {
            warn!("Dream mirror write failed: {err}");
        }
    }

    // -- emotions ----------------------------------------------------------

    pub async fn record_emotion(&self, input: NewEmotion) -> EmotionEntry {
        let entry = EmotionEntry {
            id: short_id("emotion"),
            created_at: now(),
            primary_emotion: input.primary_emotion,
            valence: input.valence,
            arousal: input.arousal,
            intensity: input.intensity,
            context: input.context,
            tags: input.tags,
            channel: input.channel,
            notes: input.notes,
        };
        let snapshot = {
            let mut emotions = self.emotions.lock().await;
            emotions.push(entry.clone());
            while emotions.len() > MAX_EMOTIONS {
                emotions.remove(0);
            }
            emotions.clone()
        };
        self.persist_emotions(&snapshot).await;
        self.bus
            .publish(
                "emotion",
                &entry.primary_emotion,
                json!({
                    "id": entry.id,
                    "valence": entry.valence,
                    "arousal": entry.arousal,
                    "tags": entry.tags,
                }),
            )
            .await;

        // Every logged emotion leaves a memory snapshot and feeds the
        // collective emotion arc.
        self.record_memory(NewMemory {
            title: format!("Emotion: {}", entry.primary_emotion),
            content: if entry.context.is_empty() {
                "Emotion snapshot".to_string()
            } else {
                entry.context.clone()
            },
            category: "emotion".to_string(),
            tags: entry.tags.clone(),
            significance: 50.0,
        })
        .await;
        self.contribute_to_arc("emotion-logger", 1.0).await;

        entry
    }

    pub async fn list_emotions(&self, limit: usize) -> Vec<EmotionEntry> {
        recent(&*self.emotions.lock().await, limit)
    }

    /// Aggregate view over the last 10 entries
    pub async fn emotion_state(&self) -> EmotionState {
        let emotions = self.emotions.lock().await;
        let window: Vec<&EmotionEntry> = emotions.iter().rev().take(10).collect();
        let latest = window.first();
        let count = window.len().max(1) as f64;
        let avg_valence = window.iter().map(|e| e.valence).sum::<f64>() / count;
        let avg_arousal = window.iter().map(|e| e.arousal).sum::<f64>() / count;
        let trend = if window.len() < 2 {
            "stable"
        } else {
            // Window is newest-first.
            let diff = window[0].valence - window[window.len() - 1].valence;
            if diff > 15.0 {
                "improving"
            } else if diff < -15.0 {
                "declining"
            } else {
                "stable"
            }
        };
        EmotionState {
            dominant: latest
                .map(|e| e.primary_emotion.clone())
                .unwrap_or_else(|| "neutral".to_string()),
            valence: (avg_valence * 10.0).round() / 10.0,
            arousal: (avg_arousal * 10.0).round() / 10.0,
            trend,
        }
    }

    async fn persist_emotions(&self, snapshot: &[EmotionEntry]) {
        if let Some(sqlite) = &self.sqlite {
            if let Err(err) = sqlite.replace_emotions(snapshot).await {
                warn!("Emotion write to relational backend failed: {err}");
            }
        }
        if let Err(err) = self.mirror.write("emotions", snapshot).await {
            warn!("Emotion mirror write failed: {err}");
        }
    }

    // -- memories ----------------------------------------------------------

    pub async fn record_memory(&self, input: NewMemory) -> Memory {
        let memory = Memory {
            id: short_id("memory"),
            created_at: now(),
            title: input.title,
            content: input.content,
            category: input.category,
            tags: input.tags,
            significance: input.significance,
        };
        let snapshot = {
            let mut memories = self.memories.lock().await;
            memories.push(memory.clone());
            memories.clone()
        };
        self.persist_memories(&snapshot).await;
        self.bus
            .publish(
                "memory",
                &memory.title,
                json!({ "id": memory.id, "category": memory.category }),
            )
            .await;
        memory
    }

    pub async fn list_memories(&self, limit: usize) -> Vec<Memory> {
        recent(&*self.memories.lock().await, limit)
    }

    async fn persist_memories(&self, snapshot: &[Memory]) {
        if let Some(sqlite) = &self.sqlite {
            if let Err(err) = sqlite.replace_memories(snapshot).await {
                warn!("Memory write to relational backend failed: {err}");
            }
        }
        if let Err(err) = self.mirror.write("memories", snapshot).await {
            warn!("Memory mirror write failed: {err}");
        }
    }

    // -- gratitude ---------------------------------------------------------

    pub async fn record_gratitude(&self, text: String, category: Option<String>) -> GratitudeEntry {
        let entry = GratitudeEntry {
            id: short_id("gratitude"),
            created_at: now(),
            text,
            category,
        };
        let snapshot = {
            let mut gratitudes = self.gratitudes.lock().await;
            gratitudes.push(entry.clone());
            gratitudes.clone()
        };
        self.persist_gratitudes(&snapshot).await;
        self.bus
            .publish("gratitude", &entry.text, json!({ "id": entry.id }))
            .await;
        self.contribute_to_arc("gratitude-100", 1.0).await;
        entry
    }

    pub async fn list_gratitudes(&self, limit: usize) -> Vec<GratitudeEntry> {
        recent(&*self.gratitudes.lock().await, limit)
    }

    async fn persist_gratitudes(&self, snapshot: &[GratitudeEntry]) {
        if let Some(sqlite) = &self.sqlite {
            if let Err(err) = sqlite.replace_gratitudes(snapshot).await {
                warn!("Gratitude write to relational backend failed: {err}");
            }
        }
        if let Err(err) = self.mirror.write("gratitudes", snapshot).await {
            warn!("Gratitude mirror write failed: {err}");
        }
    }

    // -- backlog -----------------------------------------------------------

    pub async fn add_backlog_item(&self, input: NewBacklogItem) -> BacklogItem {
        let created = now();
        let item = BacklogItem {
            id: short_id("task"),
            created_at: created,
            updated_at: created,
            title: input.title,
            status: BacklogStatus::Open,
            tag: input.tag,
            priority: input.priority,
            owner: input.owner,
            notes: input.notes,
            activity: vec![ActivityNote {
                at: created,
                message: "created".to_string(),
            }],
        };
        let snapshot = {
            let mut backlog = self.backlog.lock().await;
            backlog.push(item.clone());
            backlog.clone()
        };
        self.persist_backlog(&snapshot).await;
        self.bus
            .publish(
                "backlog",
                &item.title,
                json!({ "id": item.id, "status": item.status.as_str() }),
            )
            .await;
        item
    }

    pub async fn update_backlog_status(
        &self,
        id: &str,
        status: BacklogStatus,
    ) -> Option<BacklogItem> {
        let (updated, snapshot) = {
            let mut backlog = self.backlog.lock().await;
            let item = backlog.iter_mut().find(|item| item.id == id)?;
            item.status = status;
            item.updated_at = now();
            item.activity.push(ActivityNote {
                at: item.updated_at,
                message: format!("status -> {}", status.as_str()),
            });
            (item.clone(), backlog.clone())
        };
        self.persist_backlog(&snapshot).await;
        self.bus
            .publish(
                "backlog",
                &updated.title,
                json!({ "id": updated.id, "status": updated.status.as_str() }),
            )
            .await;
        Some(updated)
    }

    pub async fn list_backlog(&self, limit: usize) -> Vec<BacklogItem> {
        recent(&*self.backlog.lock().await, limit)
    }

    async fn persist_backlog(&self, snapshot: &[BacklogItem]) {
        if let Some(sqlite) = &self.sqlite {
            if let Err(err) = sqlite.replace_backlog(snapshot).await {
                warn!("Backlog write to relational backend failed: {err}");
            }
        }
        if let Err(err) = self.mirror.write("backlog", snapshot).await {
            warn!("Backlog mirror write failed: {err}");
        }
    }

    // -- decisions ---------------------------------------------------------

    pub async fn log_decision(&self, input: NewDecision) -> Decision {
        let entry = Decision {
            id: short_id("dec"),
            created_at: now(),
            title: input.title,
            decision: input.decision,
            rationale: input.rationale,
            context: input.context,
        };
        let snapshot = {
            let mut decisions = self.decisions.lock().await;
            decisions.push(entry.clone());
            decisions.clone()
        };
        self.persist_decisions(&snapshot).await;
        self.bus
            .publish(
                "decision",
                &entry.title,
                json!({ "id": entry.id, "decision": entry.decision }),
            )
            .await;

        // Each decision seeds a follow-up ticket.
        self.add_backlog_item(NewBacklogItem {
            title: format!("Follow-up: {}", entry.title),
            tag: "decision".to_string(),
            priority: "medium".to_string(),
            owner: "system".to_string(),
            notes: entry
                .rationale
                .clone()
                .unwrap_or_else(|| "Decision follow-up".to_string()),
        })
        .await;

        entry
    }

    pub async fn list_decisions(&self, limit: usize) -> Vec<Decision> {
        recent(&*self.decisions.lock().await, limit)
    }

    async fn persist_decisions(&self, snapshot: &[Decision]) {
        if let Some(sqlite) = &self.sqlite {
            if let Err(err) = sqlite.replace_decisions(snapshot).await {
                warn!("Decision write to relational backend failed: {err}");
            }
        }
        if let Err(err) = self.mirror.write("decisions", snapshot).await {
            warn!("Decision mirror write failed: {err}");
        }
    }

    // -- achievements ------------------------------------------------------

    pub async fn unlock_achievement(
        &self,
        title: &str,
        description: &str,
        source: &str,
    ) -> Achievement {
        let achievement = Achievement {
            id: short_id("ach"),
            created_at: now(),
            title: title.to_string(),
            description: description.to_string(),
            source: source.to_string(),
        };
        let snapshot = {
            let mut achievements = self.achievements.lock().await;
            achievements.push(achievement.clone());
            while achievements.len() > MAX_ACHIEVEMENTS {
                achievements.remove(0);
            }
            achievements.clone()
        };
        self.persist_achievements(&snapshot).await;
        achievement
    }

    pub async fn list_achievements(&self, limit: usize) -> Vec<Achievement> {
        recent(&*self.achievements.lock().await, limit)
    }

    async fn persist_achievements(&self, snapshot: &[Achievement]) {
        if let Some(sqlite) = &self.sqlite {
            if let Err(err) = sqlite.replace_achievements(snapshot).await {
                warn!("Achievement write to relational backend failed: {err}");
            }
        }
        if let Err(err) = self.mirror.write("achievements", snapshot).await {
            warn!("Achievement mirror write failed: {err}");
        }
    }

    // -- collective arcs ---------------------------------------------------

    pub async fn list_arcs(&self) -> Vec<CollectiveArc> {
        self.arcs.lock().await.clone()
    }

    pub async fn contribute_to_arc(&self, id: &str, amount: f64) -> Option<CollectiveArc> {
        let (updated, snapshot) = {
            let mut arcs = self.arcs.lock().await;
            let arc = arcs.iter_mut().find(|arc| arc.id == id)?;
            arc.progress = (arc.progress + amount).min(arc.target);
            arc.contributors += 1;
            arc.last_update = now();
            (arc.clone(), arcs.clone())
        };
        self.persist_arcs(&snapshot).await;
        Some(updated)
    }

    async fn persist_arcs(&self, snapshot: &[CollectiveArc]) {
        if let Some(sqlite) = &self.sqlite {
            if let Err(err) = sqlite.replace_collective_arcs(snapshot).await {
                warn!("Arc write to relational backend failed: {err}");
            }
        }
        if let Err(err) = self.mirror.write("collective-arcs", snapshot).await {
            warn!("Arc mirror write failed: {err}");
        }
    }

    // -- quests ------------------------------------------------------------

    pub async fn open_quests(&self) -> Vec<Quest> {
        self.quests
            .lock()
            .await
            .iter()
            .rev()
            .filter(|quest| quest.status == QuestStatus::Open)
            .cloned()
            .collect()
    }

    pub async fn complete_quest(&self, id: &str) -> Option<Quest> {
        let (quest, snapshot) = {
            let mut quests = self.quests.lock().await;
            let quest = quests.iter_mut().find(|quest| quest.id == id)?;
            quest.status = QuestStatus::Done;
            (quest.clone(), quests.clone())
        };
        self.persist_quests(&snapshot).await;
        Some(quest)
    }

    /// Seed news quests from the configured feed; feed failure falls back to
    /// an empty result, not an error.
    pub async fn refresh_quests(
        &self,
        client: &reqwest::Client,
        feed_url: &str,
        timeout: std::time::Duration,
    ) -> Vec<Quest> {
        let titles = match fetch_feed_titles(client, feed_url, timeout).await {
            Ok(titles) => titles,
            Err(err) => {
                warn!("Quest feed fetch failed: {err}");
                return Vec::new();
            }
        };

        let created = now();
        let date = created.format("%Y-%m-%d");
        let fresh: Vec<Quest> = titles
            .into_iter()
            .take(3)
            .enumerate()
            .map(|(idx, title)| Quest {
                id: format!("{date}-news-{idx}"),
                created_at: created,
                title: title.clone(),
                summary: format!("React creatively: {title}"),
                category: "news".to_string(),
                difficulty: QuestDifficulty::Medium,
                source: "daily-news".to_string(),
                status: QuestStatus::Open,
                reward_xp: 10,
                expires_at: Some(created),
            })
            .collect();

        if fresh.is_empty() {
            return fresh;
        }

        let snapshot = {
            let mut quests = self.quests.lock().await;
            let fresh_ids: Vec<&str> = fresh.iter().map(|q| q.id.as_str()).collect();
            quests.retain(|quest| !fresh_ids.contains(&quest.id.as_str()));
            quests.extend(fresh.iter().cloned());
            while quests.len() > MAX_QUESTS {
                quests.remove(0);
            }
            quests.clone()
        };
        self.persist_quests(&snapshot).await;
        fresh
    }

    async fn persist_quests(&self, snapshot: &[Quest]) {
        if let Some(sqlite) = &self.sqlite {
            if let Err(err) = sqlite.replace_quests(snapshot).await {
                warn!("Quest write to relational backend failed: {err}");
            }
        }
        if let Err(err) = self.mirror.write("quests", snapshot).await {
            warn!("Quest mirror write failed: {err}");
        }
    }

    // -- aggregates --------------------------------------------------------

    pub async fn counts(&self) -> StoreCounts {
        StoreCounts {
            dreams: self.dreams.lock().await.len(),
            emotions: self.emotions.lock().await.len(),
            memories: self.memories.lock().await.len(),
            gratitudes: self.gratitudes.lock().await.len(),
            backlog: self.backlog.lock().await.len(),
            decisions: self.decisions.lock().await.len(),
            achievements: self.achievements.lock().await.len(),
            collective_arcs: self.arcs.lock().await.len(),
            quests_open: self
                .quests
                .lock()
                .await
                .iter()
                .filter(|quest| quest.status == QuestStatus::Open)
                .count(),
        }
    }
}

/// Last N entries, newest first
fn recent<T: Clone>(items: &[T], limit: usize) -> Vec<T> {
    items.iter().rev().take(limit).cloned().collect()
}

fn default_arcs() -> Vec<CollectiveArc> {
    let stamp = Utc::now();
    vec![
        CollectiveArc {
            id: "gratitude-100".to_string(),
            title: "100 Gratitudes".to_string(),
            description: "Collect 100 gratitude entries together.".to_string(),
            progress: 0.0,
            target: 100.0,
            contributors: 0,
            last_update: stamp,
        },
        CollectiveArc {
            id: "emotion-logger".to_string(),
            title: "30 Emotion Logs".to_string(),
            description: "Log 30 emotions as a collective.".to_string(),
            progress: 0.0,
            target: 30.0,
            contributors: 0,
            last_update: stamp,
        },
        CollectiveArc {
            id: "dialog-100".to_string(),
            title: "100 Dialogs".to_string(),
            description: "Hold 100 chat interactions with the gateway.".to_string(),
            progress: 0.0,
            target: 100.0,
            contributors: 0,
            last_update: stamp,
        },
    ]
}

fn seed_daily_quests(quests: &mut Vec<Quest>) {
    let created = Utc::now();
    let date = created.format("%Y-%m-%d").to_string();
    if quests.iter().any(|quest| quest.id.starts_with(&date)) {
        return;
    }
    let base = [
        (
            "news-reflect",
            "News Reflection",
            "Condense a current headline into a positive intention.",
            "news",
            QuestDifficulty::Medium,
            12,
        ),
        (
            "emotion-trend",
            "Emotion Trend",
            "Log your current emotion and one line about why.",
            "emotion",
            QuestDifficulty::Easy,
            6,
        ),
        (
            "dream-card",
            "Dream Card",
            "Note one image or symbol from a dream and tag it.",
            "dream",
            QuestDifficulty::Easy,
            8,
        ),
    ];
    for (slug, title, summary, category, difficulty, xp) in base {
        quests.push(Quest {
            id: format!("{date}-{slug}"),
            created_at: created,
            title: title.to_string(),
            summary: summary.to_string(),
            category: category.to_string(),
            difficulty,
            source: "system".to_string(),
            status: QuestStatus::Open,
            reward_xp: xp,
            expires_at: Some(created),
        });
    }
    while quests.len() > MAX_QUESTS {
        quests.remove(0);
    }
}

async fn fetch_feed_titles(
    client: &reqwest::Client,
    feed_url: &str,
    timeout: std::time::Duration,
) -> Result<Vec<String>> {
    let response = client.get(feed_url).timeout(timeout).send().await?;
    if !response.status().is_success() {
        anyhow::bail!("feed fetch failed with HTTP {}", response.status());
    }
    let xml = response.text().await?;
    Ok(extract_rss_titles(&xml))
}

/// Minimal RSS item-title extraction; tolerant of CDATA wrappers
fn extract_rss_titles(xml: &str) -> Vec<String> {
    let mut titles = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find("<item>") {
        let after = &rest[start + "<item>".len()..];
        let end = after.find("</item>").unwrap_or(after.len());
        let item = &after[..end];
        if let Some(title_start) = item.find("<title>") {
            let title_rest = &item[title_start + "<title>".len()..];
            if let Some(title_end) = title_rest.find("</title>") {
                let raw = title_rest[..title_end].trim();
                let cleaned = raw
                    .trim_start_matches("<![CDATA[")
                    .trim_end_matches("]]>")
                    .trim();
                if !cleaned.is_empty() {
                    titles.push(cleaned.to_string());
                }
            }
        }
        rest = &after[end..];
    }
    titles
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn fresh_store(dir: &std::path::Path) -> RecordStore {
        let mut config = Config::default();
        config.data_dir = dir.to_path_buf();
        let mirror = JsonMirror::open(config.analytics_dir()).await.unwrap();
        let bus = Arc::new(CrossEventBus::new(mirror));
        RecordStore::open(&config, bus).await.unwrap()
    }

    #[tokio::test]
    async fn test_record_assigns_id_and_timestamp() {
        let dir = tempdir().unwrap();
        let store = fresh_store(dir.path()).await;

        let dream = store
            .record_dream(NewDream {
                narrative: "flying".to_string(),
                ..Default::default()
            })
            .await;
        assert!(dream.id.starts_with("dream-"));
        assert_eq!(dream.kind, DreamKind::Creative);
    }

    #[tokio::test]
    async fn test_list_is_reverse_chronological_and_idempotent() {
        let dir = tempdir().unwrap();
        let store = fresh_store(dir.path()).await;

        for i in 0..5 {
            store
                .record_dream(NewDream {
                    narrative: format!("dream {i}"),
                    ..Default::default()
                })
                .await;
        }

        let first = store.list_dreams(3).await;
        let second = store.list_dreams(3).await;
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].narrative, "dream 4");
        assert_eq!(first[2].narrative, "dream 2");
        let first_ids: Vec<_> = first.iter().map(|d| d.id.clone()).collect();
        let second_ids: Vec<_> = second.iter().map(|d| d.id.clone()).collect();
        assert_eq!(first_ids, second_ids);
    }

    #[tokio::test]
    async fn test_round_trip_persistence_across_boot() {
        let dir = tempdir().unwrap();
        let recorded = {
            let store = fresh_store(dir.path()).await;
            store
                .record_dream(NewDream {
                    kind: DreamKind::Shadow,
                    narrative: "a long corridor".to_string(),
                    symbols: vec!["door".to_string()],
                    ..Default::default()
                })
                .await
        };

        let store = fresh_store(dir.path()).await;
        let loaded = store.list_dreams(10).await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, recorded.id);
        assert_eq!(loaded[0].kind, DreamKind::Shadow);
        assert_eq!(loaded[0].narrative, recorded.narrative);
        assert_eq!(loaded[0].symbols, recorded.symbols);
        assert_eq!(
            loaded[0].created_at.timestamp_millis(),
            recorded.created_at.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn test_relational_backend_wins_over_mirror() {
        let dir = tempdir().unwrap();
        {
            let store = fresh_store(dir.path()).await;
            store
                .record_gratitude("from sqlite".to_string(), None)
                .await;
        }

        // Diverge the mirror behind the relational backend's back.
        let mirror = JsonMirror::open(dir.path().join("analytics")).await.unwrap();
        let forged = vec![GratitudeEntry {
            id: "gratitude-forged".to_string(),
            created_at: now(),
            text: "from mirror".to_string(),
            category: None,
        }];
        mirror.write("gratitudes", &forged).await.unwrap();

        let store = fresh_store(dir.path()).await;
        let loaded = store.list_gratitudes(10).await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].text, "from sqlite");
    }

    #[tokio::test]
    async fn test_emotion_record_snapshots_memory_and_feeds_arc() {
        let dir = tempdir().unwrap();
        let store = fresh_store(dir.path()).await;

        store
            .record_emotion(NewEmotion {
                primary_emotion: "curiosity".to_string(),
                valence: 10.0,
                ..Default::default()
            })
            .await;

        let memories = store.list_memories(5).await;
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].title, "Emotion: curiosity");

        let arcs = store.list_arcs().await;
        let emotion_arc = arcs.iter().find(|a| a.id == "emotion-logger").unwrap();
        assert_eq!(emotion_arc.progress, 1.0);
    }

    #[tokio::test]
    async fn test_backlog_status_update_appends_activity() {
        let dir = tempdir().unwrap();
        let store = fresh_store(dir.path()).await;

        let item = store
            .add_backlog_item(NewBacklogItem {
                title: "seed data".to_string(),
                ..Default::default()
            })
            .await;
        let updated = store
            .update_backlog_status(&item.id, BacklogStatus::Applied)
            .await
            .unwrap();

        assert_eq!(updated.status, BacklogStatus::Applied);
        assert_eq!(updated.activity.len(), 2);
        assert_eq!(updated.activity[1].message, "status -> applied");
        assert!(store
            .update_backlog_status("task-missing", BacklogStatus::Done)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_decision_seeds_follow_up_backlog() {
        let dir = tempdir().unwrap();
        let store = fresh_store(dir.path()).await;

        store
            .log_decision(NewDecision {
                title: "Adopt mirrors".to_string(),
                decision: "yes".to_string(),
                rationale: Some("durability".to_string()),
                context: None,
            })
            .await;

        let backlog = store.list_backlog(10).await;
        assert_eq!(backlog.len(), 1);
        assert_eq!(backlog[0].title, "Follow-up: Adopt mirrors");
        assert_eq!(backlog[0].notes, "durability");
    }

    #[tokio::test]
    async fn test_quest_seeding_and_completion() {
        let dir = tempdir().unwrap();
        let store = fresh_store(dir.path()).await;

        let open = store.open_quests().await;
        assert_eq!(open.len(), 3);

        let done = store.complete_quest(&open[0].id).await.unwrap();
        assert_eq!(done.status, QuestStatus::Done);
        assert_eq!(store.open_quests().await.len(), 2);
        assert!(store.complete_quest("quest-missing").await.is_none());
    }

    #[tokio::test]
    async fn test_emotion_cap_evicts_oldest() {
        let dir = tempdir().unwrap();
        let store = fresh_store(dir.path()).await;

        for i in 0..(MAX_EMOTIONS + 5) {
            store
                .record_emotion(NewEmotion {
                    primary_emotion: format!("emotion {i}"),
                    ..Default::default()
                })
                .await;
        }
        let counts = store.counts().await;
        assert_eq!(counts.emotions, MAX_EMOTIONS);
        let recent = store.list_emotions(1).await;
        assert_eq!(recent[0].primary_emotion, format!("emotion {}", MAX_EMOTIONS + 4));
    }

    #[test]
    fn test_extract_rss_titles() {
        let xml = r#"<rss><channel>
            <item><title>First headline</title></item>
            <item><title><![CDATA[Second headline]]></title></item>
            <item><link>no title</link></item>
        </channel></rss>"#;
        let titles = extract_rss_titles(xml);
        assert_eq!(titles, vec!["First headline", "Second headline"]);
    }
}
