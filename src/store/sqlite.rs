//! Embedded relational backend
//!
//! Every mutating store call serializes the full in-memory collection into
//! SQLite in one transaction (delete + insert). Reads happen only at startup;
//! rows are coerced defensively so partial or foreign writes degrade to
//! defaults instead of failing the boot.

use anyhow::Result;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::records::*;
use crate::types::parse_timestamp;

/// SQLite-backed collection store
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at the given path
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS dreams (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                kind TEXT NOT NULL,
                narrative TEXT NOT NULL,
                symbols TEXT DEFAULT '[]',
                emotions TEXT DEFAULT '[]',
                insights TEXT DEFAULT '[]',
                integration TEXT
            );

            CREATE TABLE IF NOT EXISTS emotions (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                primary_emotion TEXT NOT NULL,
                valence REAL DEFAULT 0,
                arousal REAL DEFAULT 0,
                intensity REAL DEFAULT 0,
                context TEXT DEFAULT '',
                tags TEXT DEFAULT '[]',
                channel TEXT,
                notes TEXT
            );

            CREATE TABLE IF NOT EXISTS memories (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                category TEXT DEFAULT 'reflection',
                tags TEXT DEFAULT '[]',
                significance REAL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS gratitudes (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                text TEXT NOT NULL,
                category TEXT
            );

            CREATE TABLE IF NOT EXISTS backlog (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                title TEXT NOT NULL,
                status TEXT DEFAULT 'open',
                tag TEXT DEFAULT 'general',
                priority TEXT DEFAULT 'medium',
                owner TEXT DEFAULT 'unassigned',
                notes TEXT DEFAULT '',
                activity TEXT DEFAULT '[]'
            );

            CREATE TABLE IF NOT EXISTS decisions (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                title TEXT NOT NULL,
                decision TEXT NOT NULL,
                rationale TEXT,
                context TEXT
            );

            CREATE TABLE IF NOT EXISTS achievements (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT DEFAULT '',
                source TEXT DEFAULT 'system'
            );

            CREATE TABLE IF NOT EXISTS collective_arcs (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT DEFAULT '',
                progress REAL DEFAULT 0,
                target REAL DEFAULT 100,
                contributors INTEGER DEFAULT 0,
                last_update TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS quests (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                title TEXT NOT NULL,
                summary TEXT DEFAULT '',
                category TEXT DEFAULT 'general',
                difficulty TEXT DEFAULT 'medium',
                source TEXT DEFAULT 'system',
                status TEXT DEFAULT 'open',
                reward_xp INTEGER DEFAULT 5,
                expires_at TEXT
            );

            CREATE TABLE IF NOT EXISTS gateway_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
        "#,
        )?;

        Ok(())
    }

    pub async fn replace_dreams(&self, dreams: &[Dream]) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM dreams", [])?;
        {
            let mut stmt = tx.prepare_cached(
                r#"INSERT INTO dreams
                   (id, created_at, kind, narrative, symbols, emotions, insights, integration)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            )?;
            for dream in dreams {
                stmt.execute(params![
                    dream.id,
                    dream.created_at.to_rfc3339(),
                    dream.kind.as_str(),
                    dream.narrative,
                    serde_json::to_string(&dream.symbols)?,
                    serde_json::to_string(&dream.emotions)?,
                    serde_json::to_string(&dream.insights)?,
                    dream.integration,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub async fn load_dreams(&self) -> Result<Vec<Dream>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT id, created_at, kind, narrative, symbols, emotions, insights, integration
             FROM dreams ORDER BY rowid ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Dream {
                    id: row.get(0)?,
                    created_at: parse_timestamp(&row.get::<_, String>(1)?),
                    kind: DreamKind::parse(&row.get::<_, String>(2)?).unwrap_or_default(),
                    narrative: row.get(3)?,
                    symbols: json_column(row, 4),
                    emotions: json_column(row, 5),
                    insights: json_column(row, 6),
                    integration: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub async fn replace_emotions(&self, entries: &[EmotionEntry]) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM emotions", [])?;
        {
            let mut stmt = tx.prepare_cached(
                r#"INSERT INTO emotions
                   (id, created_at, primary_emotion, valence, arousal, intensity, context, tags, channel, notes)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
            )?;
            for entry in entries {
                stmt.execute(params![
                    entry.id,
                    entry.created_at.to_rfc3339(),
                    entry.primary_emotion,
                    entry.valence,
                    entry.arousal,
                    entry.intensity,
                    entry.context,
                    serde_json::to_string(&entry.tags)?,
                    entry.channel,
                    entry.notes,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub async fn load_emotions(&self) -> Result<Vec<EmotionEntry>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT id, created_at, primary_emotion, valence, arousal, intensity, context, tags, channel, notes
             FROM emotions ORDER BY rowid ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(EmotionEntry {
                    id: row.get(0)?,
                    created_at: parse_timestamp(&row.get::<_, String>(1)?),
                    primary_emotion: row.get(2)?,
                    valence: numeric_column(row, 3),
                    arousal: numeric_column(row, 4),
                    intensity: numeric_column(row, 5),
                    context: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                    tags: json_column(row, 7),
                    channel: row.get(8)?,
                    notes: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub async fn replace_memories(&self, entries: &[Memory]) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM memories", [])?;
        {
            let mut stmt = tx.prepare_cached(
                r#"INSERT INTO memories
                   (id, created_at, title, content, category, tags, significance)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            )?;
            for entry in entries {
                stmt.execute(params![
                    entry.id,
                    entry.created_at.to_rfc3339(),
                    entry.title,
                    entry.content,
                    entry.category,
                    serde_json::to_string(&entry.tags)?,
                    entry.significance,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub async fn load_memories(&self) -> Result<Vec<Memory>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT id, created_at, title, content, category, tags, significance
             FROM memories ORDER BY rowid ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Memory {
                    id: row.get(0)?,
                    created_at: parse_timestamp(&row.get::<_, String>(1)?),
                    title: row.get(2)?,
                    content: row.get(3)?,
                    category: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    tags: json_column(row, 5),
                    significance: numeric_column(row, 6),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub async fn replace_gratitudes(&self, entries: &[GratitudeEntry]) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM gratitudes", [])?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO gratitudes (id, created_at, text, category) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for entry in entries {
                stmt.execute(params![
                    entry.id,
                    entry.created_at.to_rfc3339(),
                    entry.text,
                    entry.category,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub async fn load_gratitudes(&self) -> Result<Vec<GratitudeEntry>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT id, created_at, text, category FROM gratitudes ORDER BY rowid ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(GratitudeEntry {
                    id: row.get(0)?,
                    created_at: parse_timestamp(&row.get::<_, String>(1)?),
                    text: row.get(2)?,
                    category: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub async fn replace_backlog(&self, items: &[BacklogItem]) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM backlog", [])?;
        {
            let mut stmt = tx.prepare_cached(
                r#"INSERT INTO backlog
                   (id, created_at, updated_at, title, status, tag, priority, owner, notes, activity)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
            )?;
            for item in items {
                stmt.execute(params![
                    item.id,
                    item.created_at.to_rfc3339(),
                    item.updated_at.to_rfc3339(),
                    item.title,
                    item.status.as_str(),
                    item.tag,
                    item.priority,
                    item.owner,
                    item.notes,
                    serde_json::to_string(&item.activity)?,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub async fn load_backlog(&self) -> Result<Vec<BacklogItem>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT id, created_at, updated_at, title, status, tag, priority, owner, notes, activity
             FROM backlog ORDER BY rowid ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(BacklogItem {
                    id: row.get(0)?,
                    created_at: parse_timestamp(&row.get::<_, String>(1)?),
                    updated_at: parse_timestamp(&row.get::<_, String>(2)?),
                    title: row.get(3)?,
                    status: BacklogStatus::parse(&row.get::<_, String>(4)?).unwrap_or_default(),
                    tag: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                    priority: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                    owner: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
                    notes: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
                    activity: json_column(row, 9),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub async fn replace_decisions(&self, entries: &[Decision]) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM decisions", [])?;
        {
            let mut stmt = tx.prepare_cached(
                r#"INSERT INTO decisions
                   (id, created_at, title, decision, rationale, context)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            )?;
            for entry in entries {
                stmt.execute(params![
                    entry.id,
                    entry.created_at.to_rfc3339(),
                    entry.title,
                    entry.decision,
                    entry.rationale,
                    entry.context,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub async fn load_decisions(&self) -> Result<Vec<Decision>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT id, created_at, title, decision, rationale, context
             FROM decisions ORDER BY rowid ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Decision {
                    id: row.get(0)?,
                    created_at: parse_timestamp(&row.get::<_, String>(1)?),
                    title: row.get(2)?,
                    decision: row.get(3)?,
                    rationale: row.get(4)?,
                    context: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub async fn replace_achievements(&self, entries: &[Achievement]) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM achievements", [])?;
        {
            let mut stmt = tx.prepare_cached(
                r#"INSERT INTO achievements
                   (id, created_at, title, description, source)
                   VALUES (?1, ?2, ?3, ?4, ?5)"#,
            )?;
            for entry in entries {
                stmt.execute(params![
                    entry.id,
                    entry.created_at.to_rfc3339(),
                    entry.title,
                    entry.description,
                    entry.source,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub async fn load_achievements(&self) -> Result<Vec<Achievement>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT id, created_at, title, description, source
             FROM achievements ORDER BY rowid ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Achievement {
                    id: row.get(0)?,
                    created_at: parse_timestamp(&row.get::<_, String>(1)?),
                    title: row.get(2)?,
                    description: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    source: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub async fn replace_collective_arcs(&self, arcs: &[CollectiveArc]) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM collective_arcs", [])?;
        {
            let mut stmt = tx.prepare_cached(
                r#"INSERT INTO collective_arcs
                   (id, title, description, progress, target, contributors, last_update)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            )?;
            for arc in arcs {
                stmt.execute(params![
                    arc.id,
                    arc.title,
                    arc.description,
                    arc.progress,
                    arc.target,
                    arc.contributors,
                    arc.last_update.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub async fn load_collective_arcs(&self) -> Result<Vec<CollectiveArc>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT id, title, description, progress, target, contributors, last_update
             FROM collective_arcs ORDER BY rowid ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(CollectiveArc {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    description: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    progress: numeric_column(row, 3),
                    target: numeric_column(row, 4),
                    contributors: row.get::<_, i64>(5).unwrap_or(0) as u32,
                    last_update: parse_timestamp(&row.get::<_, String>(6)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub async fn replace_quests(&self, quests: &[Quest]) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM quests", [])?;
        {
            let mut stmt = tx.prepare_cached(
                r#"INSERT INTO quests
                   (id, created_at, title, summary, category, difficulty, source, status, reward_xp, expires_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
            )?;
            for quest in quests {
                stmt.execute(params![
                    quest.id,
                    quest.created_at.to_rfc3339(),
                    quest.title,
                    quest.summary,
                    quest.category,
                    serde_plain(&quest.difficulty),
                    quest.source,
                    serde_plain(&quest.status),
                    quest.reward_xp,
                    quest.expires_at.map(|t| t.to_rfc3339()),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub async fn load_quests(&self) -> Result<Vec<Quest>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT id, created_at, title, summary, category, difficulty, source, status, reward_xp, expires_at
             FROM quests ORDER BY rowid ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Quest {
                    id: row.get(0)?,
                    created_at: parse_timestamp(&row.get::<_, String>(1)?),
                    title: row.get(2)?,
                    summary: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    category: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    difficulty: plain_column(row, 5),
                    source: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                    status: plain_column(row, 7),
                    reward_xp: row.get::<_, i64>(8).unwrap_or(0),
                    expires_at: row
                        .get::<_, Option<String>>(9)?
                        .map(|raw| parse_timestamp(&raw)),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Persist an opaque JSON state blob under a key (used by the profile)
    pub async fn save_state(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO gateway_state (key, value) VALUES (?1, ?2)",
            params![key, serde_json::to_string(value)?],
        )?;
        Ok(())
    }

    /// Load a JSON state blob; malformed stored JSON reads back as None
    pub async fn load_state(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached("SELECT value FROM gateway_state WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        if let Some(row) = rows.next()? {
            let raw: String = row.get(0)?;
            Ok(serde_json::from_str(&raw).ok())
        } else {
            Ok(None)
        }
    }
}

/// Deserialize a JSON-encoded column, failing soft to the default
fn json_column<T: serde::de::DeserializeOwned + Default>(row: &Row, idx: usize) -> T {
    row.get::<_, Option<String>>(idx)
        .ok()
        .flatten()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

/// Read a numeric column, coercing missing or foreign values to 0
fn numeric_column(row: &Row, idx: usize) -> f64 {
    row.get::<_, f64>(idx).unwrap_or(0.0)
}

/// Read a plain-string serde enum column, failing soft to the default
fn plain_column<T: serde::de::DeserializeOwned + Default>(row: &Row, idx: usize) -> T {
    row.get::<_, Option<String>>(idx)
        .ok()
        .flatten()
        .and_then(|raw| serde_json::from_value(serde_json::Value::String(raw)).ok())
        .unwrap_or_default()
}

/// Serialize a plain-string serde enum for storage
fn serde_plain<T: serde::Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{now, short_id};
    use tempfile::tempdir;

    fn sample_dream() -> Dream {
        Dream {
            id: short_id("dream"),
            created_at: now(),
            kind: DreamKind::Lucid,
            narrative: "flying over the city".to_string(),
            symbols: vec!["sky".to_string()],
            emotions: vec!["joy".to_string()],
            insights: vec![],
            integration: None,
        }
    }

    #[tokio::test]
    async fn test_replace_and_load_dreams() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("test.sqlite")).await.unwrap();

        let dreams = vec![sample_dream(), sample_dream()];
        store.replace_dreams(&dreams).await.unwrap();

        let loaded = store.load_dreams().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, dreams[0].id);
        assert_eq!(loaded[0].kind, DreamKind::Lucid);
        assert_eq!(loaded[0].symbols, vec!["sky".to_string()]);
    }

    #[tokio::test]
    async fn test_replace_is_full_rewrite() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("test.sqlite")).await.unwrap();

        store.replace_dreams(&[sample_dream(), sample_dream()]).await.unwrap();
        let remaining = vec![sample_dream()];
        store.replace_dreams(&remaining).await.unwrap();

        let loaded = store.load_dreams().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, remaining[0].id);
    }

    #[tokio::test]
    async fn test_malformed_json_column_fails_soft() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("test.sqlite")).await.unwrap();

        {
            let conn = store.conn.lock().await;
            conn.execute(
                "INSERT INTO dreams (id, created_at, kind, narrative, symbols) VALUES (?1, ?2, ?3, ?4, ?5)",
                params!["dream-x", now().to_rfc3339(), "creative", "text", "{broken"],
            )
            .unwrap();
        }

        let loaded = store.load_dreams().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].symbols.is_empty());
    }

    #[tokio::test]
    async fn test_foreign_numeric_value_coerces_to_zero() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("test.sqlite")).await.unwrap();

        {
            let conn = store.conn.lock().await;
            conn.execute(
                "INSERT INTO emotions (id, created_at, primary_emotion, valence) VALUES (?1, ?2, ?3, ?4)",
                params!["emotion-x", now().to_rfc3339(), "calm", "not-a-number"],
            )
            .unwrap();
        }

        let loaded = store.load_emotions().await.unwrap();
        assert_eq!(loaded[0].valence, 0.0);
    }

    #[tokio::test]
    async fn test_state_roundtrip() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("test.sqlite")).await.unwrap();

        let value = serde_json::json!({ "xp": 42, "level": 1 });
        store.save_state("profile", &value).await.unwrap();

        let loaded = store.load_state("profile").await.unwrap();
        assert_eq!(loaded, Some(value));
        assert_eq!(store.load_state("missing").await.unwrap(), None);
    }
}
