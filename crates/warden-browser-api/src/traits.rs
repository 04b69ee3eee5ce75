//! Rule table trait definitions

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{CompiledRule, InstalledRule};

/// Errors from rule table operations
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Bridge closed")]
    Closed,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type BrowserResult<T> = Result<T, BrowserError>;

/// Identifier of a browser tab, as reported in navigation events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabId(pub i64);

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Events from the browser side
#[derive(Debug, Clone)]
pub enum BrowserEvent {
    /// A top-level navigation began loading
    NavigationStarted { tab: TabId, url: String },
}

/// The browser's dynamic rule table.
///
/// Individual calls are internally consistent on the browser side; no
/// transactions span calls, so a remove-then-add replacement is observably
/// non-atomic. Callers accept the sub-second empty window (the navigation
/// fallback check covers it).
#[async_trait]
pub trait RuleTable: Send + Sync {
    /// Currently installed dynamic rules
    async fn list_rules(&self) -> BrowserResult<Vec<InstalledRule>>;

    /// Remove rules by id; unknown ids are ignored
    async fn remove_rules(&self, ids: Vec<u32>) -> BrowserResult<()>;

    /// Install rules as a single batch
    async fn add_rules(&self, rules: Vec<CompiledRule>) -> BrowserResult<()>;

    /// Redirect an in-flight navigation (the fallback path)
    async fn redirect_navigation(&self, tab: TabId, target: String) -> BrowserResult<()>;

    /// Subscribe to browser events. Can only be called once.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<BrowserEvent>;

    /// Check if the browser side is reachable
    fn is_healthy(&self) -> bool {
        true
    }
}
