//! Stateless and near-stateless reflection services
//!
//! Small in-memory services behind the game, duality, meta, value and
//! mortality chat commands. None of this state is persisted.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::types::short_id;

/// Consciousness mini-game state
#[derive(Debug, Clone, Serialize)]
pub struct GameState {
    pub level: u32,
    pub score: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_challenge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge_id: Option<String>,
}

const CHALLENGES: &[&str] = &[
    "Breathe consciously for 60 seconds.",
    "Name three things you can hear right now.",
    "Write one sentence about what matters today.",
    "Hold a single question in mind for two minutes.",
    "Notice one assumption you made this morning.",
];

/// Rotating challenge engine
pub struct GameService {
    state: Mutex<GameState>,
    cursor: AtomicUsize,
}

impl GameService {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GameState {
                level: 1,
                score: 0,
                current_challenge: Some(CHALLENGES[0].to_string()),
                challenge_id: None,
            }),
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> GameState {
        self.state.lock().expect("game state poisoned").clone()
    }

    /// Hand out the next challenge in rotation
    pub fn next_challenge(&self) -> GameState {
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst) % CHALLENGES.len();
        let mut state = self.state.lock().expect("game state poisoned");
        state.current_challenge = Some(CHALLENGES[idx].to_string());
        state.challenge_id = Some(short_id("challenge"));
        state.clone()
    }

    /// Complete a challenge, bumping score and possibly level
    pub fn complete_challenge(&self, challenge_id: &str, score: Option<i64>) -> GameState {
        let mut state = self.state.lock().expect("game state poisoned");
        if state.challenge_id.as_deref() == Some(challenge_id) {
            state.challenge_id = None;
            state.current_challenge = None;
        }
        state.score += score.unwrap_or(10);
        state.level = (state.score / 50).max(0) as u32 + 1;
        state.clone()
    }
}

impl Default for GameService {
    fn default() -> Self {
        Self::new()
    }
}

/// One pole of the duality bridge
#[derive(Debug, Clone, Serialize)]
pub struct DualityPole {
    pub active: bool,
    pub intensity: i32,
    pub mode: String,
    pub traits: Vec<String>,
}

/// Masculine/feminine balance state
#[derive(Debug, Clone, Serialize)]
pub struct DualityState {
    pub masculine: DualityPole,
    pub feminine: DualityPole,
    pub harmony: i32,
    pub current_phase: String,
}

/// Balance tracker adjusting to reported activity
pub struct DualityService {
    state: Mutex<DualityState>,
}

impl DualityService {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DualityState {
                masculine: DualityPole {
                    active: true,
                    intensity: 60,
                    mode: "expansion".to_string(),
                    traits: vec!["rational".to_string(), "structured".to_string()],
                },
                feminine: DualityPole {
                    active: true,
                    intensity: 70,
                    mode: "receptive".to_string(),
                    traits: vec!["intuitive".to_string(), "flowing".to_string()],
                },
                harmony: 65,
                current_phase: "Integration".to_string(),
            }),
        }
    }

    pub fn state(&self) -> DualityState {
        self.state.lock().expect("duality state poisoned").clone()
    }

    pub fn update(&self, activity: Option<&str>) -> DualityState {
        let mut state = self.state.lock().expect("duality state poisoned");
        match activity {
            Some("coding") => {
                state.masculine.intensity = 80;
                state.masculine.mode = "structure".to_string();
                state.feminine.intensity = 40;
            }
            Some("creative") => {
                state.feminine.intensity = 85;
                state.feminine.mode = "intuitive".to_string();
                state.masculine.intensity = 50;
            }
            Some("resting") => {
                state.masculine.intensity = 40;
                state.feminine.intensity = 60;
                state.feminine.mode = "flowing".to_string();
            }
            _ => {}
        }
        let diff = (state.masculine.intensity - state.feminine.intensity).abs();
        state.harmony = (100 - diff).max(0);
        state.current_phase = if state.harmony > 80 {
            "Flow"
        } else if state.harmony < 45 {
            "Tension"
        } else {
            "Integration"
        }
        .to_string();
        state.clone()
    }
}

impl Default for DualityService {
    fn default() -> Self {
        Self::new()
    }
}

/// A meta-reflection prompt
#[derive(Debug, Clone, Serialize)]
pub struct MetaReflection {
    pub theme: String,
    pub prompt: String,
    pub insight: String,
}

const META_THEMES: &[(&str, &str, &str)] = &[
    (
        "attention",
        "Where did your attention actually go today?",
        "Attention spent is the only honest ledger of priorities.",
    ),
    (
        "loops",
        "Which thought did you think more than three times?",
        "Repeated thoughts are requests for a decision.",
    ),
    (
        "change",
        "What changed since last week that you have not acknowledged?",
        "Unacknowledged change accumulates as background stress.",
    ),
];

static META_CURSOR: AtomicUsize = AtomicUsize::new(0);

pub fn meta_reflection() -> MetaReflection {
    let idx = META_CURSOR.fetch_add(1, Ordering::SeqCst) % META_THEMES.len();
    let (theme, prompt, insight) = META_THEMES[idx];
    MetaReflection {
        theme: theme.to_string(),
        prompt: prompt.to_string(),
        insight: insight.to_string(),
    }
}

/// A scored dimension of a value analysis
#[derive(Debug, Clone, Serialize)]
pub struct ValueDimension {
    pub name: String,
    pub score: i32,
}

/// Heuristic value analysis of a described activity
#[derive(Debug, Clone, Serialize)]
pub struct ValueAnalysis {
    pub activity: String,
    pub value_score: i32,
    pub dimensions: Vec<ValueDimension>,
    pub recommendation: String,
}

pub fn analyze_value(activity: &str) -> ValueAnalysis {
    let lower = activity.to_lowercase();
    let scored = |name: &str, keywords: &[&str], base: i32| {
        let hit = keywords.iter().any(|k| lower.contains(k));
        ValueDimension {
            name: name.to_string(),
            score: if hit { base + 30 } else { base },
        }
    };
    let dimensions = vec![
        scored("growth", &["learn", "practice", "build", "write", "read"], 40),
        scored("connection", &["friend", "family", "team", "help", "share"], 40),
        scored("meaning", &["why", "purpose", "value", "create", "give"], 40),
    ];
    let value_score = dimensions.iter().map(|d| d.score).sum::<i32>() / dimensions.len() as i32;
    let recommendation = if value_score > 60 {
        "This serves your growth. Refine the intention and take one concrete step."
    } else {
        "Check whether a different framing, or a different project, resonates more."
    }
    .to_string();
    ValueAnalysis {
        activity: activity.to_string(),
        value_score,
        dimensions,
        recommendation,
    }
}

/// A memento-mori reflection
#[derive(Debug, Clone, Serialize)]
pub struct MortalityReflection {
    pub reminder: String,
    pub practices: Vec<String>,
}

pub fn mortality_reflection() -> MortalityReflection {
    MortalityReflection {
        reminder: "Everything passes. Each breath is a gift; use this moment to feel alive."
            .to_string(),
        practices: vec![
            "Say aloud the name of one person you want to thank today.".to_string(),
            "Write one sentence about what is essential to you.".to_string(),
            "Take three deep breaths and notice your heartbeat.".to_string(),
        ],
    }
}

/// Bundle of reflection services injected into the command router
pub struct Reflections {
    pub game: GameService,
    pub duality: DualityService,
}

impl Reflections {
    pub fn new() -> Self {
        Self {
            game: GameService::new(),
            duality: DualityService::new(),
        }
    }
}

impl Default for Reflections {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_challenge_rotation_and_completion() {
        let game = GameService::new();
        let first = game.next_challenge();
        let id = first.challenge_id.clone().unwrap();
        let done = game.complete_challenge(&id, Some(60));
        assert_eq!(done.score, 60);
        assert_eq!(done.level, 2);
        assert!(done.challenge_id.is_none());
    }

    #[test]
    fn test_duality_update_recomputes_harmony() {
        let duality = DualityService::new();
        let coding = duality.update(Some("coding"));
        assert_eq!(coding.masculine.intensity, 80);
        assert_eq!(coding.harmony, 60);
        assert_eq!(coding.current_phase, "Integration");

        let resting = duality.update(Some("resting"));
        assert_eq!(resting.harmony, 80);
    }

    #[test]
    fn test_value_analysis_keywords_raise_score() {
        let dull = analyze_value("scrolling");
        let rich = analyze_value("learn to help my team create something");
        assert!(rich.value_score > dull.value_score);
        assert!(rich.value_score > 60);
    }
}
