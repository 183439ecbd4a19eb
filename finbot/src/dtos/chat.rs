use crate::models::{ExpertiseLevel, Preferences, RiskTolerance, Role, Turn};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Longest accepted user message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Body of `POST /api/chat`.
#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 4000))]
    pub message: String,

    /// Overrides the stored preference when present.
    #[serde(default)]
    pub risk_tolerance: Option<RiskTolerance>,

    #[serde(default)]
    pub expertise_level: Option<ExpertiseLevel>,
}

impl ChatRequest {
    /// Merge any preference overrides into `current`.
    pub fn apply_preferences(&self, current: Preferences) -> Preferences {
        Preferences {
            risk_tolerance: self.risk_tolerance.or(current.risk_tolerance),
            expertise_level: self.expertise_level.or(current.expertise_level),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub follow_ups: Vec<String>,
    /// Transcript length after this exchange.
    pub turns: usize,
}

#[derive(Debug, Serialize)]
pub struct TurnDto {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&Turn> for TurnDto {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
            timestamp: turn.timestamp,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub turns: Vec<TurnDto>,
    pub preferences: Preferences,
}

/// Chat box submission.
#[derive(Debug, Deserialize)]
pub struct ChatForm {
    #[serde(default)]
    pub message: String,
}

/// Sidebar submission. Empty values mean "not specified".
#[derive(Debug, Deserialize)]
pub struct PreferencesForm {
    #[serde(default)]
    pub risk_tolerance: String,
    #[serde(default)]
    pub expertise_level: String,
}
