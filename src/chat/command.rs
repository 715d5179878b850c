//! Slash-command router
//!
//! Parses a leading-`/` command out of free text and dispatches against a
//! finite table. Every dispatch, including the unknown-command fallback,
//! grants exactly one reward through the profile singleton.

use serde::Serialize;

use crate::evolve::{build_dashboard, DashboardSnapshot};
use crate::mesh::MeshRegistry;
use crate::store::profile::RewardPacket;
use crate::store::records::*;
use crate::store::RecordStore;

use super::reflect::{analyze_value, meta_reflection, mortality_reflection, Reflections};

/// A parsed slash command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCommand {
    pub command: String,
    pub args: String,
}

/// What a dispatched command produced
#[derive(Debug, Clone, Serialize)]
pub struct CommandReply {
    pub text: String,
    pub reward: RewardPacket,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub achievements: Vec<Achievement>,
}

impl CommandReply {
    fn text(text: impl Into<String>, reward: RewardPacket) -> Self {
        Self {
            text: text.into(),
            reward,
            achievements: Vec::new(),
        }
    }
}

/// `/dream lucid ...` → `{command: "dream", args: "lucid ..."}`; None unless
/// the text starts with `/`. Commands are case-folded.
pub fn parse_chat_command(text: &str) -> Option<ChatCommand> {
    let trimmed = text.trim();
    let rest = trimmed.strip_prefix('/')?;
    let (command, args) = match rest.split_once(' ') {
        Some((command, args)) => (command, args),
        None => (rest, ""),
    };
    Some(ChatCommand {
        command: command.to_lowercase(),
        args: args.trim().to_string(),
    })
}

/// Dispatch a parsed command against the store and reflection services
pub async fn handle_command(
    store: &RecordStore,
    mesh: &MeshRegistry,
    reflections: &Reflections,
    command: &ChatCommand,
) -> CommandReply {
    let profile = store.profile();
    let args = command.args.as_str();

    match command.command.as_str() {
        "status" => {
            let dashboard = build_dashboard(store, mesh).await;
            CommandReply::text(
                format_status_summary(&dashboard),
                profile.reward("insight", 8),
            )
        }
        "dream" => {
            if args.is_empty() {
                return CommandReply::text(
                    "Describe your dream after /dream.",
                    profile.reward("dream", 2),
                );
            }
            let (kind, narrative) = match args.split_once(' ') {
                Some((first, rest)) if DreamKind::parse(first).is_some() => {
                    (DreamKind::parse(first).unwrap_or_default(), rest.trim())
                }
                _ => match DreamKind::parse(args) {
                    Some(kind) => (kind, ""),
                    None => (DreamKind::Creative, args),
                },
            };
            if narrative.is_empty() {
                return CommandReply::text(
                    "Add a description after the dream type.",
                    profile.reward("dream", 1),
                );
            }
            let entry = store
                .record_dream(NewDream {
                    kind,
                    narrative: narrative.to_string(),
                    ..Default::default()
                })
                .await;
            CommandReply::text(
                format!("Dream {} saved ({}).", entry.id, entry.kind.as_str()),
                profile.reward("dream", 10),
            )
        }
        "dreams" => {
            let dreams = store.list_dreams(5).await;
            let text = if dreams.is_empty() {
                "No dreams recorded yet.".to_string()
            } else {
                dreams
                    .iter()
                    .map(|d| {
                        let head: String = d.narrative.chars().take(80).collect();
                        format!("- {} ({}) {}", d.id, d.kind.as_str(), head)
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            CommandReply::text(text, profile.reward("dream", 4))
        }
        "emotion" => {
            if args.is_empty() {
                return CommandReply::text(
                    "Use /emotion <feeling> <intensity 0-100> [note].",
                    profile.reward("emotion", 2),
                );
            }
            let mut parts = args.split_whitespace();
            let Some(emotion) = parts.next() else {
                return CommandReply::text("Name a feeling.", profile.reward("emotion", 1));
            };
            let intensity = parts
                .next()
                .and_then(|raw| raw.parse::<f64>().ok())
                .unwrap_or(50.0)
                .clamp(0.0, 100.0);
            let notes: String = parts.collect::<Vec<_>>().join(" ");
            let valence = ((intensity - 50.0) / 2.0).round();
            let entry = store
                .record_emotion(NewEmotion {
                    primary_emotion: emotion.to_string(),
                    valence,
                    arousal: valence,
                    intensity,
                    context: "chat".to_string(),
                    tags: Vec::new(),
                    channel: Some("chat".to_string()),
                    notes: if notes.is_empty() { None } else { Some(notes) },
                })
                .await;
            CommandReply::text(
                format!(
                    "Emotion {} registered (valence {}, intensity {}).",
                    entry.primary_emotion, entry.valence, entry.intensity
                ),
                profile.reward("emotion", 8),
            )
        }
        "gratitude" => {
            if args.is_empty() {
                return CommandReply::text(
                    "What are you grateful for? Use /gratitude <text>.",
                    profile.reward("heart", 2),
                );
            }
            let entry = store.record_gratitude(args.to_string(), None).await;
            CommandReply::text(
                format!("Gratitude saved: {}", entry.text),
                profile.reward("heart", 10),
            )
        }
        "memory" => {
            if args.is_empty() {
                return CommandReply::text(
                    "Use /memory <title> :: <content>.",
                    profile.reward("memory", 2),
                );
            }
            let (title, content) = match args.split_once("::") {
                Some((title, content)) => (title.trim(), content.trim()),
                None => (args, args),
            };
            let title: String = title.chars().take(80).collect();
            let entry = store
                .record_memory(NewMemory {
                    title: if title.is_empty() {
                        "Chat memory".to_string()
                    } else {
                        title
                    },
                    content: content.to_string(),
                    category: "chat".to_string(),
                    tags: Vec::new(),
                    significance: 60.0,
                })
                .await;
            CommandReply::text(
                format!("Memory {} saved: {}", entry.id, entry.title),
                profile.reward("memory", 9),
            )
        }
        "memories" => {
            let memories = store.list_memories(3).await;
            let text = if memories.is_empty() {
                "No memories yet.".to_string()
            } else {
                memories
                    .iter()
                    .map(|m| format!("- {} ({})", m.title, m.created_at.format("%Y-%m-%d %H:%M")))
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            CommandReply::text(text, profile.reward("memory", 4))
        }
        "quests" => {
            let quests = store.open_quests().await;
            if quests.is_empty() {
                return CommandReply::text("No quests active today.", profile.reward("quest", 2));
            }
            let text = quests
                .iter()
                .map(|q| format!("- {} ({:?}) {}", q.title, q.difficulty, q.summary))
                .collect::<Vec<_>>()
                .join("\n");
            CommandReply::text(text, profile.reward("quest", 4))
        }
        "quest" => {
            let mut parts = args.split_whitespace();
            if let (Some("complete"), Some(quest_id)) = (parts.next(), parts.next()) {
                let Some(quest) = store.complete_quest(quest_id).await else {
                    return CommandReply::text("Quest not found.", profile.reward("quest", 1));
                };
                let reward =
                    profile.reward_with("quest", quest.reward_xp.max(5), None, Some(&quest.title));
                let achievement = store
                    .unlock_achievement("Quest completed", &quest.title, "quest")
                    .await;
                return CommandReply {
                    text: format!("Quest \"{}\" completed. Thank you!", quest.title),
                    reward,
                    achievements: vec![achievement],
                };
            }
            CommandReply::text(
                "Use /quest complete <id> or /quests.",
                profile.reward("quest", 1),
            )
        }
        "game" => {
            if let Some(rest) = args.strip_prefix("complete") {
                let mut parts = rest.split_whitespace();
                let Some(challenge_id) = parts.next() else {
                    return CommandReply::text(
                        "Use /game complete <challengeId> [score].",
                        profile.reward("growth", 2),
                    );
                };
                let score = parts.next().and_then(|raw| raw.parse::<i64>().ok());
                let state = reflections.game.complete_challenge(challenge_id, score);
                return CommandReply::text(
                    format!(
                        "Challenge completed. Level {}, score {}.",
                        state.level, state.score
                    ),
                    profile.reward("growth", 12),
                );
            }
            let state = reflections.game.next_challenge();
            CommandReply::text(
                format!(
                    "New challenge ({}): {}",
                    state.challenge_id.as_deref().unwrap_or("-"),
                    state.current_challenge.as_deref().unwrap_or("-")
                ),
                profile.reward("growth", 6),
            )
        }
        "duality" => {
            let state = reflections.duality.state();
            CommandReply::text(
                format!(
                    "Duality\nMasculine {}% ({})\nFeminine {}% ({})\nHarmony {}% ({})",
                    state.masculine.intensity,
                    state.masculine.mode,
                    state.feminine.intensity,
                    state.feminine.mode,
                    state.harmony,
                    state.current_phase
                ),
                profile.reward("balance", 5),
            )
        }
        "meta" => {
            let reflection = meta_reflection();
            CommandReply::text(
                format!(
                    "Meta reflection ({})\nQuestion: {}\nInsight: {}",
                    reflection.theme, reflection.prompt, reflection.insight
                ),
                profile.reward("meta", 7),
            )
        }
        "value" => {
            if args.is_empty() {
                return CommandReply::text("Use /value <activity>.", profile.reward("purpose", 2));
            }
            let analysis = analyze_value(args);
            let dims = analysis
                .dimensions
                .iter()
                .map(|d| format!("{}: {}", d.name, d.score))
                .collect::<Vec<_>>()
                .join(" | ");
            CommandReply::text(
                format!(
                    "Value analysis for \"{}\"\nScore: {}\n{}\nRecommendation: {}",
                    analysis.activity, analysis.value_score, dims, analysis.recommendation
                ),
                profile.reward("purpose", 9),
            )
        }
        "mortality" => {
            let insight = mortality_reflection();
            CommandReply::text(
                format!(
                    "Memento mori\n{}\nPractices: {}",
                    insight.reminder,
                    insight.practices.join(" / ")
                ),
                profile.reward("soul", 8),
            )
        }
        "profile" => {
            let state = profile.state();
            let arcs = state
                .arcs
                .values()
                .filter(|arc| arc.active)
                .map(|arc| format!("{} ({} XP)", arc.title, arc.xp))
                .collect::<Vec<_>>()
                .join(", ");
            CommandReply::text(
                format!(
                    "Level {} | {} XP | {} interactions\nActive arcs: {}\nArtifacts: {}",
                    state.level,
                    state.xp,
                    state.interactions,
                    if arcs.is_empty() { "none" } else { arcs.as_str() },
                    state.artifacts.len()
                ),
                profile.reward("insight", 3),
            )
        }
        "arc" => {
            let mut parts = args.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some("activate"), Some(name)) => {
                    profile.activate_arc(name);
                    CommandReply::text(
                        format!("Arc {name} activated."),
                        profile.reward("meta", 3),
                    )
                }
                (Some("pause"), Some(name)) => {
                    profile.pause_arc(name);
                    CommandReply::text(format!("Arc {name} paused."), profile.reward("meta", 3))
                }
                _ => CommandReply::text(
                    "Use /arc activate|pause <name>.",
                    profile.reward("meta", 1),
                ),
            }
        }
        "help" => {
            let commands = [
                "/status",
                "/dream <type?> <text>",
                "/dreams",
                "/emotion <feeling> <intensity> [note]",
                "/gratitude <text>",
                "/memory <title :: content>",
                "/memories",
                "/quests | /quest complete <id>",
                "/game [complete <id> <score>]",
                "/duality",
                "/meta",
                "/value <activity>",
                "/mortality",
                "/profile",
                "/arc activate|pause <name>",
            ];
            CommandReply::text(
                format!("Available commands:\n{}", commands.join("\n")),
                profile.reward("exploration", 2),
            )
        }
        unknown => CommandReply::text(
            format!("I do not know the command \"/{unknown}\" yet."),
            profile.reward("exploration", 2),
        ),
    }
}

/// Condensed status line for `/status`
pub fn format_status_summary(dashboard: &DashboardSnapshot) -> String {
    let emotion = &dashboard.emotions.state;
    [
        format!(
            "Emotion: {} (valence {} | arousal {})",
            emotion.dominant, emotion.valence, emotion.arousal
        ),
        format!("Dreams: {} recent", dashboard.dreams.len()),
        format!("Gratitude: {} recent", dashboard.gratitudes.len()),
        format!(
            "Backlog: {} open items | {} decisions",
            dashboard.dev.backlog.len(),
            dashboard.dev.decisions.len()
        ),
        format!("Quests: {} open", dashboard.quests.len()),
        format!(
            "Profile: level {} | {} XP | {} arcs",
            dashboard.profile.level,
            dashboard.profile.xp,
            dashboard.profile.arcs.len()
        ),
        format!("Services: {}", dashboard.services.len()),
    ]
    .join("\n")
}
