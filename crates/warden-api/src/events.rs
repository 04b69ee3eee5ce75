//! Event types for wardend -> client streaming

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::{ServiceStateSnapshot, API_VERSION};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: warden_util::now(),
            payload,
        }
    }
}

/// All possible events from the service to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Full state snapshot (sent on major changes)
    StateChanged(ServiceStateSnapshot),

    /// The stored policy set changed (create/update/delete/import)
    PoliciesChanged { policy_count: usize },

    /// A compile+synchronize pass completed
    RulesRefreshed { active_rules: usize },

    /// The navigation fallback check redirected a page load
    NavigationBlocked { url: String },

    /// Service is shutting down
    Shutdown,
}
