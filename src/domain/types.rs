use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Content shorter than this (in characters, after trimming) is never sent to the backend.
pub const MIN_CONTENT_LENGTH: usize = 20;

/// Upper bound on accepted content; longer text is rejected by the API and truncated in prompts.
pub const MAX_CONTENT_LENGTH: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Ragebait,
    Fearmongering,
    Hype,
    EngagementBait,
    Divisive,
    Genuine,
    Neutral,
}

impl Intent {
    pub const ALL: [Intent; 7] = [
        Intent::Ragebait,
        Intent::Fearmongering,
        Intent::Hype,
        Intent::EngagementBait,
        Intent::Divisive,
        Intent::Genuine,
        Intent::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Ragebait => "ragebait",
            Intent::Fearmongering => "fearmongering",
            Intent::Hype => "hype",
            Intent::EngagementBait => "engagement_bait",
            Intent::Divisive => "divisive",
            Intent::Genuine => "genuine",
            Intent::Neutral => "neutral",
        }
    }

    /// Case-insensitive lookup; the backend is free-form, so anything unknown yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Intent::ALL
            .into_iter()
            .find(|intent| intent.as_str() == normalized)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Blur,
    Tag,
    Hide,
    Pass,
}

impl Action {
    pub fn is_aggressive(&self) -> bool {
        matches!(self, Action::Blur | Action::Hide)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::Blur => "blur",
            Action::Tag => "tag",
            Action::Hide => "hide",
            Action::Pass => "pass",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub intent: Intent,
    pub confidence: f64,
    pub reasoning: String,
    pub action: Action,
    pub manipulation_score: f64,
}

impl ClassificationResult {
    pub fn too_short() -> Self {
        Self {
            intent: Intent::Neutral,
            confidence: 1.0,
            reasoning: "Content too short to classify".to_string(),
            action: Action::Pass,
            manipulation_score: 0.0,
        }
    }

    /// The fail-open payload: behaves exactly like "nothing detected".
    pub fn fail_open(reason: impl fmt::Display) -> Self {
        Self {
            intent: Intent::Neutral,
            confidence: 0.0,
            reasoning: format!("Classification failed: {reason}"),
            action: Action::Pass,
            manipulation_score: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub content: String,
    #[serde(default)]
    pub source: String,
}

impl ContentItem {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("content must not be empty")]
    Empty,
    #[error("content is {len} characters long, the limit is {max}")]
    TooLong { len: usize, max: usize },
}

/// Request-level bounds: non-empty and at most `MAX_CONTENT_LENGTH` characters.
pub fn validate_content(content: &str) -> Result<(), ContentError> {
    if content.is_empty() {
        return Err(ContentError::Empty);
    }
    let len = content.chars().count();
    if len > MAX_CONTENT_LENGTH {
        return Err(ContentError::TooLong {
            len,
            max: MAX_CONTENT_LENGTH,
        });
    }
    Ok(())
}

/// Cuts `text` down to the first `MAX_CONTENT_LENGTH` characters.
pub fn truncate_content(text: &str) -> String {
    text.chars().take(MAX_CONTENT_LENGTH).collect()
}

/// Character count of the trimmed text, the measure used by every length check.
pub fn content_length(text: &str) -> usize {
    text.trim().chars().count()
}

pub fn is_too_short(text: &str) -> bool {
    content_length(text) < MIN_CONTENT_LENGTH
}
