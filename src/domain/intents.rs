use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{Action, Intent};

/// Few-shot examples beyond this many per intent are dropped when loading.
pub const MAX_EXAMPLES_PER_INTENT: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentDefinition {
    pub description: String,
    pub action: Action,
    pub weight: f64,
    #[serde(default)]
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentCatalog {
    intents: BTreeMap<Intent, IntentDefinition>,
    rules: Vec<String>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read intent definitions from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("intent definitions are not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("weight {weight} for intent `{intent}` is outside [0, 1]")]
    InvalidWeight { intent: Intent, weight: f64 },
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[serde(default)]
    intents: BTreeMap<String, IntentDefinition>,
    #[serde(default)]
    rules: Vec<String>,
}

impl IntentCatalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Falls back to the built-in definitions when no file is configured or it cannot be used.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match Self::load(path) {
            Ok(catalog) => {
                tracing::info!(
                    target: "config",
                    path = %path.display(),
                    "intent definitions loaded"
                );
                catalog
            }
            Err(err) => {
                tracing::warn!(
                    target: "config",
                    error = %err,
                    "intent definitions unavailable, using defaults"
                );
                Self::default()
            }
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let parsed: RawCatalog = serde_json::from_str(raw)?;
        let mut catalog = Self::default();

        for (name, mut definition) in parsed.intents {
            let Some(intent) = Intent::parse(&name) else {
                tracing::warn!(target: "config", intent = %name, "skipping unknown intent");
                continue;
            };
            if !(0.0..=1.0).contains(&definition.weight) {
                return Err(CatalogError::InvalidWeight {
                    intent,
                    weight: definition.weight,
                });
            }
            definition.examples.truncate(MAX_EXAMPLES_PER_INTENT);
            catalog.intents.insert(intent, definition);
        }

        if !parsed.rules.is_empty() {
            catalog.rules = parsed.rules;
        }
        Ok(catalog)
    }

    pub fn definitions(&self) -> impl Iterator<Item = (Intent, &IntentDefinition)> {
        self.intents.iter().map(|(intent, def)| (*intent, def))
    }

    pub fn rules(&self) -> &[String] {
        &self.rules
    }

    pub fn weight(&self, intent: Intent) -> f64 {
        self.intents.get(&intent).map_or(0.0, |def| def.weight)
    }

    pub fn action(&self, intent: Intent) -> Action {
        self.intents.get(&intent).map_or(Action::Pass, |def| def.action)
    }
}

impl Default for IntentCatalog {
    fn default() -> Self {
        let intents = [
            (
                Intent::Ragebait,
                "Content designed to provoke anger or outrage",
                Action::Blur,
                0.9,
                &["This is EXACTLY why I hate them. Every. Single. Time."][..],
            ),
            (
                Intent::Fearmongering,
                "Exaggerated threats or doom content",
                Action::Tag,
                0.7,
                &[
                    "If you eat this one food you have 6 months to live. Share before it's deleted.",
                ][..],
            ),
            (
                Intent::Hype,
                "Manufactured urgency or FOMO triggers",
                Action::Tag,
                0.5,
                &["LAST CHANCE!!! Only 3 spots left, this changes EVERYTHING"][..],
            ),
            (
                Intent::EngagementBait,
                "Empty interaction requests",
                Action::Hide,
                0.6,
                &["Like if you agree, comment your zodiac sign, tag 3 friends!"][..],
            ),
            (
                Intent::Divisive,
                "Us-vs-them framing, tribal triggers",
                Action::Tag,
                0.7,
                &["Real Americans know the other side wants to destroy everything we love."][..],
            ),
            (
                Intent::Genuine,
                "Authentic insight or honest perspective",
                Action::Pass,
                0.0,
                &["I've been dealing with this for 10 years. Here's what helped me."][..],
            ),
            (
                Intent::Neutral,
                "Informational content, no manipulation",
                Action::Pass,
                0.0,
                &["The library will be closed on Monday for the public holiday."][..],
            ),
        ]
        .into_iter()
        .map(|(intent, description, action, weight, examples)| {
            (
                intent,
                IntentDefinition {
                    description: description.to_string(),
                    action,
                    weight,
                    examples: examples.iter().map(|ex| ex.to_string()).collect(),
                },
            )
        })
        .collect();

        let rules = [
            "Focus on HOW the content is framed, not the topic itself",
            "Political content can be genuine discussion OR ragebait - analyze the framing",
            "Questions asking for opinions are usually engagement_bait",
            "Sensational language often indicates manipulation",
            "Personal stories and specific experiences tend to be genuine",
            "Content that triggers strong immediate emotional reaction is likely manipulative",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        Self { intents, rules }
    }
}
