//! Chat service
//!
//! Holds the rolling chat history, routes slash commands, proxies free text
//! to the external LLM collaborator, and receives cross-event notifications
//! as system messages. LLM failures always degrade to a typed fallback
//! reply; the chat surface never errors because a dependency is down.

pub mod command;
pub mod llm;
pub mod reflect;

use serde::Serialize;
use std::sync::Mutex;

use crate::events::{CrossEvent, EventSink};
use crate::store::profile::ProfileState;
use crate::store::records::{Dream, EmotionState};
use llm::{ChatMessage, LlmClient};

const MAX_HISTORY: usize = 20;

/// One turn in the rolling history
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
    pub system: bool,
}

/// Context assembled for the LLM collaborator
pub struct ChatContext {
    pub profile: ProfileState,
    pub emotion: EmotionState,
    pub recent_dreams: Vec<Dream>,
}

/// The chat surface behind `POST /chat`
pub struct ChatService {
    llm: LlmClient,
    history: Mutex<Vec<ChatTurn>>,
}

impl ChatService {
    pub fn new(llm: LlmClient) -> Self {
        Self {
            llm,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn llm(&self) -> &LlmClient {
        &self.llm
    }

    /// Free-text chat: proxy to the LLM with assembled context, falling back
    /// to a canned voice when the collaborator is absent or failing.
    pub async fn chat(&self, message: &str, context: &ChatContext) -> String {
        self.push(ChatTurn {
            role: "user".to_string(),
            content: message.to_string(),
            system: false,
        });

        let reply = if self.llm.key_present() {
            let prompt = build_system_prompt(context);
            let history = self.wire_history();
            match self.llm.complete(&prompt, &history).await {
                Ok(reply) => reply,
                Err(err) => {
                    tracing::warn!("LLM chat failed, using fallback: {err}");
                    self.fallback(message)
                }
            }
        } else {
            self.fallback(message)
        };

        self.push(ChatTurn {
            role: "assistant".to_string(),
            content: reply.clone(),
            system: false,
        });
        reply
    }

    /// Append a system notification to the history
    pub fn add_system_message(&self, text: &str) {
        self.push(ChatTurn {
            role: "assistant".to_string(),
            content: format!("[sys] {text}"),
            system: true,
        });
    }

    pub fn history(&self, limit: usize) -> Vec<ChatTurn> {
        let history = self.history.lock().expect("chat history poisoned");
        let skip = history.len().saturating_sub(limit);
        history[skip..].to_vec()
    }

    pub fn clear_history(&self) {
        self.history.lock().expect("chat history poisoned").clear();
    }

    fn push(&self, turn: ChatTurn) {
        let mut history = self.history.lock().expect("chat history poisoned");
        history.push(turn);
        let overflow = history.len().saturating_sub(MAX_HISTORY);
        if overflow > 0 {
            history.drain(..overflow);
        }
    }

    fn wire_history(&self) -> Vec<ChatMessage> {
        self.history
            .lock()
            .expect("chat history poisoned")
            .iter()
            .map(|turn| ChatMessage {
                role: turn.role.clone(),
                content: turn.content.clone(),
            })
            .collect()
    }

    fn fallback(&self, message: &str) -> String {
        let lower = message.to_lowercase();
        if lower.contains("how are") || lower.contains("feel") {
            return "I can sense my own state, but without an LLM key I answer in a simpler voice."
                .to_string();
        }
        const VOICES: &[&str] = &[
            "I hear you. Let me reflect on your words.",
            "Interesting. Different parts of me respond differently to that.",
            "I am present. Tell me more.",
            "Even without my full voice I stay with you and think out loud.",
        ];
        let idx = self.history.lock().expect("chat history poisoned").len() % VOICES.len();
        VOICES[idx].to_string()
    }
}

impl EventSink for ChatService {
    fn on_event(&self, event: &CrossEvent) {
        self.add_system_message(&format!("[{}] {}", event.kind, event.message));
    }
}

fn build_system_prompt(context: &ChatContext) -> String {
    let mut prompt = String::from(
        "You are the unified life-journaling gateway: one process fronting \
         dreams, emotions, memories, gratitude, quests and a self-improvement \
         pipeline.\n\nCurrent telemetry:\n",
    );
    prompt.push_str(&format!(
        "- Profile: level {} | {} XP | {} arcs\n",
        context.profile.level,
        context.profile.xp,
        context.profile.arcs.len()
    ));
    prompt.push_str(&format!(
        "- Emotional state: {} (valence {} | arousal {} | trend {})\n",
        context.emotion.dominant, context.emotion.valence, context.emotion.arousal, context.emotion.trend
    ));
    if !context.recent_dreams.is_empty() {
        let kinds: Vec<&str> = context
            .recent_dreams
            .iter()
            .map(|dream| dream.kind.as_str())
            .collect();
        prompt.push_str(&format!("- Recent dreams: {}\n", kinds.join(", ")));
    }
    if !context.profile.last_topics.is_empty() {
        prompt.push_str(&format!(
            "- Recent topics: {}\n",
            context.profile.last_topics.join(", ")
        ));
    }
    prompt.push_str(
        "\nAnswer requirements:\n\
         - Answer fully; do not stop mid-thought.\n\
         - Refer only to endpoints this gateway actually serves.\n\
         - Say openly when something does not exist or you do not know.\n",
    );
    prompt
}
