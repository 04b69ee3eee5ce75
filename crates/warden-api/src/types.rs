//! Shared types for the wardend API

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use warden_util::{PolicyId, UserId};

/// View of a block policy for UI display.
///
/// Times and days use the authoring string forms (`HH:MM`, comma-separated
/// day tokens); the typed forms never leave the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyView {
    pub id: PolicyId,
    pub pattern: String,
    pub start: String,
    pub end: String,
    pub days: String,
    pub created_at: DateTime<Local>,
    pub owner: UserId,
}

/// Snapshot of the service state for introspection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStateSnapshot {
    pub api_version: u32,
    /// Number of stored block policies
    pub policy_count: usize,
    /// Number of rules installed by the last completed pass
    pub active_rules: usize,
    /// When the last compile+synchronize pass completed
    pub last_pass_at: Option<DateTime<Local>>,
}

/// Health check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub live: bool,
    pub ready: bool,
    pub store_ok: bool,
    pub browser_ok: bool,
}
