//! Network-filter rule types
//!
//! These mirror the browser's declarative rule shape: an id, a priority, a
//! redirect action, and a URL-filter condition scoped to top-level document
//! loads. Compiled rules are ephemeral; they are regenerated wholesale on
//! every pass and never persisted.

use serde::{Deserialize, Serialize};

/// Extension path of the interstitial page rules redirect to
pub const BLOCKED_PAGE_PATH: &str = "/blocked.html";

/// Resource scopes a rule condition can apply to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// A top-level document load (main frame navigation)
    MainFrame,
}

/// What the browser does when a rule's condition matches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    /// Redirect the navigation to a page bundled with the extension
    Redirect { extension_path: String },
}

/// Condition half of a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCondition {
    /// Browser URL-filter pattern (`*` wildcards)
    pub url_filter: String,
    pub resource_types: Vec<ResourceType>,
}

/// A network-filter rule, as compiled by the engine and as reported back
/// by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledRule {
    pub id: u32,
    pub priority: u32,
    pub action: RuleAction,
    pub condition: RuleCondition,
}

/// An installed rule has the same shape as a compiled one; the browser
/// reports back exactly what was added.
pub type InstalledRule = CompiledRule;

impl CompiledRule {
    /// A redirect-to-interstitial rule scoped to top-level navigations.
    pub fn redirect(id: u32, url_filter: impl Into<String>) -> Self {
        Self {
            id,
            priority: 1,
            action: RuleAction::Redirect {
                extension_path: BLOCKED_PAGE_PATH.to_string(),
            },
            condition: RuleCondition {
                url_filter: url_filter.into(),
                resource_types: vec![ResourceType::MainFrame],
            },
        }
    }
}
