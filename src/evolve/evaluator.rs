//! Self-improvement evaluator
//!
//! A pure function over a metrics snapshot and the dashboard. Each check is
//! independent and appends at most one suggestion plus at most one action
//! request; the output order is check-declaration order.

use serde::Serialize;
use serde_json::json;

use super::actions::ActionRequest;
use super::{DashboardSnapshot, MetricsSnapshot};

const MIN_DREAMS: usize = 3;
const MIN_EMOTIONS: usize = 3;
const MIN_MEMORIES: usize = 1;
const MIN_GRATITUDES: usize = 1;
const MIN_BACKLOG: usize = 3;
const MIN_SERVICES: usize = 10;

/// Suggestion severity; ordering is for display only
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warn,
    Info,
}

/// One human-readable improvement suggestion
#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub severity: Severity,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub actions: Vec<String>,
}

/// Evaluator output: prose suggestions plus machine-applicable actions
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub suggestions: Vec<Suggestion>,
    #[serde(rename = "recommendedActions")]
    pub recommended_actions: Vec<ActionRequest>,
}

pub fn evaluate(
    metrics: &MetricsSnapshot,
    dashboard: &DashboardSnapshot,
    llm_key_present: bool,
) -> Evaluation {
    let mut suggestions = Vec::new();
    let mut recommended = Vec::new();

    if !llm_key_present {
        suggestions.push(Suggestion {
            severity: Severity::Warn,
            title: "LLM API key missing".to_string(),
            details: Some("Without a key, chat runs in fallback mode only.".to_string()),
            actions: vec![format!(
                "Set {} or POST /chat/set-api-key {{ apiKey }}",
                crate::config::LLM_KEY_ENV
            )],
        });
    }

    let low_data_checks: [(usize, usize, &str, &str, &str); 4] = [
        (
            metrics.dreams,
            MIN_DREAMS,
            "Few dreams recorded",
            "The dream journal has fewer than 3 entries.",
            "seed.dream",
        ),
        (
            metrics.emotions,
            MIN_EMOTIONS,
            "Little emotion data",
            "Fewer than 3 emotion logs.",
            "seed.emotion",
        ),
        (
            metrics.memories,
            MIN_MEMORIES,
            "Memory palace is empty",
            "No memories stored yet.",
            "seed.memory",
        ),
        (
            metrics.gratitudes,
            MIN_GRATITUDES,
            "Gratitude missing",
            "No gratitude entries yet.",
            "seed.gratitude",
        ),
    ];

    for (value, min, title, details, action) in low_data_checks {
        if value < min {
            suggestions.push(Suggestion {
                severity: Severity::Info,
                title: title.to_string(),
                details: Some(details.to_string()),
                actions: Vec::new(),
            });
            recommended.push(ActionRequest::bare(action));
        }
    }

    if dashboard.quests.is_empty() {
        suggestions.push(Suggestion {
            severity: Severity::Info,
            title: "No daily quests".to_string(),
            details: Some("Start new quests from news or seeds.".to_string()),
            actions: Vec::new(),
        });
        recommended.push(ActionRequest::bare("quests.refresh"));
    }

    if dashboard.dev.backlog.len() < MIN_BACKLOG {
        suggestions.push(Suggestion {
            severity: Severity::Info,
            title: "Backlog is shallow".to_string(),
            details: Some("Fill the backlog with self-evolve tickets.".to_string()),
            actions: Vec::new(),
        });
        recommended.push(ActionRequest::with_payload(
            "backlog.add",
            json!({
                "title": "Self-evolve seeds",
                "description": "Seed dreams, emotions, memories, gratitude and quests.",
            }),
        ));
    }

    if metrics.services < MIN_SERVICES {
        suggestions.push(Suggestion {
            severity: Severity::Warn,
            title: "Check the service mesh".to_string(),
            details: Some(format!(
                "Only {} services registered. Run a mesh scan.",
                metrics.services
            )),
            actions: Vec::new(),
        });
        recommended.push(ActionRequest::bare("mesh.scan"));
    }

    Evaluation {
        suggestions,
        recommended_actions: recommended,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolve::{
        DevPanel, EmotionPanel, ProfileMetrics, StorageMetrics,
    };
    use crate::store::profile::ProfileState;
    use crate::store::records::EmotionState;
    use chrono::Utc;

    fn metrics(dreams: usize, emotions: usize, memories: usize, gratitudes: usize) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            services: MIN_SERVICES,
            dreams,
            emotions,
            memories,
            gratitudes,
            backlog: 5,
            decisions: 0,
            achievements: 0,
            collective_arcs: 3,
            quests_open: 1,
            profile: ProfileMetrics { level: 1, xp: 0, arcs: 0 },
            storage: StorageMetrics { sqlite: true, llm_key: true },
        }
    }

    fn dashboard(backlog_len: usize, quests_len: usize) -> DashboardSnapshot {
        let quest = crate::store::records::Quest {
            id: "q".to_string(),
            created_at: Utc::now(),
            title: "t".to_string(),
            summary: String::new(),
            category: "news".to_string(),
            difficulty: Default::default(),
            source: "system".to_string(),
            status: Default::default(),
            reward_xp: 5,
            expires_at: None,
        };
        let backlog_item = crate::store::records::BacklogItem {
            id: "task-1".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            title: "t".to_string(),
            status: Default::default(),
            tag: String::new(),
            priority: String::new(),
            owner: String::new(),
            notes: String::new(),
            activity: Vec::new(),
        };
        DashboardSnapshot {
            timestamp: Utc::now(),
            dreams: Vec::new(),
            emotions: EmotionPanel {
                state: EmotionState {
                    dominant: "neutral".to_string(),
                    valence: 0.0,
                    arousal: 0.0,
                    trend: "stable",
                },
                recent: Vec::new(),
            },
            memories: Vec::new(),
            gratitudes: Vec::new(),
            dev: DevPanel {
                backlog: vec![backlog_item; backlog_len],
                decisions: Vec::new(),
            },
            services: Vec::new(),
            profile: ProfileState::default(),
            achievements: Vec::new(),
            collective: Vec::new(),
            quests: vec![quest; quests_len],
        }
    }

    #[test]
    fn test_only_dreams_below_threshold() {
        let evaluation = evaluate(&metrics(0, 5, 5, 5), &dashboard(5, 1), true);

        let dream_suggestions: Vec<_> = evaluation
            .suggestions
            .iter()
            .filter(|s| s.title.to_lowercase().contains("dream"))
            .collect();
        assert_eq!(dream_suggestions.len(), 1);

        let seeds: Vec<&str> = evaluation
            .recommended_actions
            .iter()
            .map(|a| a.kind.as_str())
            .collect();
        assert_eq!(seeds, vec!["seed.dream"]);
    }

    #[test]
    fn test_healthy_system_is_quiet() {
        let evaluation = evaluate(&metrics(5, 5, 5, 5), &dashboard(5, 1), true);
        assert!(evaluation.suggestions.is_empty());
        assert!(evaluation.recommended_actions.is_empty());
    }

    #[test]
    fn test_missing_llm_key_warns() {
        let evaluation = evaluate(&metrics(5, 5, 5, 5), &dashboard(5, 1), false);
        assert_eq!(evaluation.suggestions.len(), 1);
        assert_eq!(evaluation.suggestions[0].severity, Severity::Warn);
        // Guidance only; no machine action can supply a credential.
        assert!(evaluation.recommended_actions.is_empty());
    }

    #[test]
    fn test_zero_quests_recommends_refresh() {
        let evaluation = evaluate(&metrics(5, 5, 5, 5), &dashboard(5, 0), true);
        assert_eq!(evaluation.recommended_actions.len(), 1);
        assert_eq!(evaluation.recommended_actions[0].kind, "quests.refresh");
    }

    #[test]
    fn test_shallow_backlog_recommends_backlog_add() {
        let evaluation = evaluate(&metrics(5, 5, 5, 5), &dashboard(2, 1), true);
        assert_eq!(evaluation.recommended_actions.len(), 1);
        assert_eq!(evaluation.recommended_actions[0].kind, "backlog.add");
        assert!(evaluation.recommended_actions[0].payload.is_some());
    }

    #[test]
    fn test_sparse_mesh_warns_with_scan() {
        let mut sparse = metrics(5, 5, 5, 5);
        sparse.services = 2;
        let evaluation = evaluate(&sparse, &dashboard(5, 1), true);
        assert_eq!(evaluation.suggestions.len(), 1);
        assert_eq!(evaluation.suggestions[0].severity, Severity::Warn);
        assert_eq!(evaluation.recommended_actions[0].kind, "mesh.scan");
    }

    #[test]
    fn test_checks_are_independent_and_ordered() {
        let evaluation = evaluate(&metrics(0, 0, 0, 0), &dashboard(0, 0), false);
        let kinds: Vec<&str> = evaluation
            .recommended_actions
            .iter()
            .map(|a| a.kind.as_str())
            .collect();
        assert_eq!(
            kinds,
            vec![
                "seed.dream",
                "seed.emotion",
                "seed.memory",
                "seed.gratitude",
                "quests.refresh",
                "backlog.add",
            ]
        );
        assert_eq!(evaluation.suggestions.len(), 7);
    }

    #[test]
    fn test_severity_display_order() {
        assert!(Severity::Critical < Severity::Warn);
        assert!(Severity::Warn < Severity::Info);
    }
}
