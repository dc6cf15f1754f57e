use serde::Serialize;

use crate::domain::{Action, ClassificationResult, Intent, Settings};

/// What the rendering layer should do with one piece of content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub action: Action,
    pub label: Option<Intent>,
    pub manipulation_score: f64,
    pub reasoning: String,
}

/// Labels are shown whenever tags are on; blur/hide additionally need the score to reach
/// the threshold and the matching toggle to be enabled, otherwise they fall back to a tag.
pub fn resolve_action(result: &ClassificationResult, settings: &Settings) -> Decision {
    let reasoning = result.reasoning.clone();
    if !settings.enabled || result.action == Action::Pass {
        return Decision {
            action: Action::Pass,
            label: None,
            manipulation_score: result.manipulation_score,
            reasoning,
        };
    }

    let label = settings.show_tags.then_some(result.intent);
    let toggle = match result.action {
        Action::Blur => settings.blur_ragebait,
        Action::Hide => settings.hide_engagement_bait,
        Action::Tag | Action::Pass => false,
    };
    let aggressive = result.action.is_aggressive()
        && toggle
        && result.manipulation_score >= settings.manipulation_threshold;

    let action = if aggressive {
        result.action
    } else if label.is_some() {
        Action::Tag
    } else {
        Action::Pass
    };

    Decision {
        action,
        label,
        manipulation_score: result.manipulation_score,
        reasoning,
    }
}
