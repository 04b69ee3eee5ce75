//! Validated policy record

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use warden_api::PolicyView;
use warden_util::{format_day_tokens, BlockWindow, PolicyId, UserId};

/// A validated block policy, ready for evaluation by the rule engine.
///
/// `url_pattern` is either a literal fragment matched as a substring of the
/// navigated URL, or a trailing-`*` wildcard meaning "this domain and
/// everything under it".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub id: PolicyId,
    pub url_pattern: String,
    pub window: BlockWindow,
    /// Informational only
    pub created_at: DateTime<Local>,
    /// The creating principal; no ownership enforcement
    pub owner: UserId,
}

impl PolicyRecord {
    /// Whether the pattern is a trailing-`*` wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.url_pattern.ends_with('*')
    }

    /// The pattern with a trailing `*` removed, if present.
    pub fn pattern_fragment(&self) -> &str {
        self.url_pattern
            .strip_suffix('*')
            .unwrap_or(&self.url_pattern)
    }

    /// Convert to the string-form wire view.
    pub fn to_view(&self) -> PolicyView {
        PolicyView {
            id: self.id,
            pattern: self.url_pattern.clone(),
            start: self.window.start.to_string(),
            end: self.window.end.to_string(),
            days: format_day_tokens(self.window.days),
            created_at: self.created_at,
            owner: self.owner,
        }
    }
}
