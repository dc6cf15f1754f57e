use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub enabled: bool,
    pub show_tags: bool,
    pub blur_ragebait: bool,
    pub hide_engagement_bait: bool,
    pub manipulation_threshold: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            show_tags: true,
            blur_ragebait: true,
            hide_engagement_bait: true,
            manipulation_threshold: 0.6,
        }
    }
}

impl Settings {
    /// Brings externally supplied values back into range before they are published.
    pub fn normalized(mut self) -> Self {
        self.manipulation_threshold = if self.manipulation_threshold.is_nan() {
            Settings::default().manipulation_threshold
        } else {
            self.manipulation_threshold.clamp(0.0, 1.0)
        };
        self
    }
}
