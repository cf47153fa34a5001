use chrono::Duration;

use crate::eval::mistakes::{MistakePolicy, DEFAULT_MISTAKE_POLICY};
use crate::notify::reminder::DEFAULT_REMINDER_COOLDOWN_HOURS;

fn default_mistake_threshold() -> f64 {
    DEFAULT_MISTAKE_POLICY.threshold
}

fn default_mistake_min_attempts() -> Option<u32> {
    DEFAULT_MISTAKE_POLICY.min_attempts
}

fn default_reminder_cooldown_hours() -> i64 {
    DEFAULT_REMINDER_COOLDOWN_HOURS
}

fn default_leaderboard_size() -> u32 {
    20
}

/// Evaluation policy knobs of a deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_mistake_threshold")]
    pub mistake_threshold: f64,
    #[serde(default = "default_mistake_min_attempts")]
    pub mistake_min_attempts: Option<u32>,

    #[serde(default = "default_reminder_cooldown_hours")]
    pub reminder_cooldown_hours: i64,

    /// Leaderboard rows returned when a request doesn't ask for a page length.
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            mistake_threshold: default_mistake_threshold(),
            mistake_min_attempts: default_mistake_min_attempts(),
            reminder_cooldown_hours: default_reminder_cooldown_hours(),
            leaderboard_size: default_leaderboard_size(),
        }
    }
}

impl Settings {
    pub fn mistake_policy(&self) -> MistakePolicy {
        MistakePolicy {
            threshold: self.mistake_threshold,
            min_attempts: self.mistake_min_attempts,
        }
    }

    pub fn reminder_cooldown(&self) -> Duration {
        Duration::hours(self.reminder_cooldown_hours)
    }
}
