//! Raw authoring form of a policy

use serde::{Deserialize, Serialize};

/// Unvalidated policy input as the UI surfaces submit it: times as `HH:MM`
/// strings, days as comma-separated tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDraft {
    pub pattern: String,
    pub start: String,
    pub end: String,
    pub days: String,
}

impl PolicyDraft {
    pub fn new(
        pattern: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
        days: impl Into<String>,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            start: start.into(),
            end: end.into(),
            days: days.into(),
        }
    }
}
