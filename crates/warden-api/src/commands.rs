//! Command types for the wardend protocol

use serde::{Deserialize, Serialize};
use warden_util::{ClientId, PolicyId, UserId};

use crate::{HealthStatus, PolicyView, ServiceStateSnapshot, API_VERSION};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// The command
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Response payload or error
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    AuthFailed,
    PolicyNotFound,
    ValidationError,
    StoreError,
    BrowserError,
    RateLimited,
    InternalError,
}

/// All possible commands from clients
///
/// Policy fields travel as the raw authoring strings (`HH:MM` times,
/// comma-separated day tokens); the service validates them before anything
/// reaches the store or the rule engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Verify credentials for the popup login gate
    Authenticate { username: String, password: String },

    /// List all block policies
    ListPolicies,

    /// Create a new block policy
    AddPolicy {
        pattern: String,
        start: String,
        end: String,
        days: String,
        owner: UserId,
    },

    /// Update an existing policy in place (id and creation time preserved)
    UpdatePolicy {
        id: PolicyId,
        pattern: String,
        start: String,
        end: String,
        days: String,
    },

    /// Delete a policy
    DeletePolicy { id: PolicyId },

    /// Create many policies sharing one window and day set
    ImportPolicies {
        patterns: Vec<String>,
        start: String,
        end: String,
        days: String,
        owner: UserId,
    },

    /// Force an immediate compile+synchronize pass; the response is sent
    /// once the pass completes
    RefreshRules,

    /// Get current service state
    GetState,

    /// Get health status
    GetHealth,

    /// Subscribe to events (returns immediately, events stream separately)
    SubscribeEvents,

    /// Unsubscribe from events
    UnsubscribeEvents,

    /// Ping for keepalive
    Ping,
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    Authenticated { user_id: UserId },
    Policies(Vec<PolicyView>),
    PolicyAdded(PolicyView),
    PolicyUpdated(PolicyView),
    PolicyDeleted { id: PolicyId },
    Imported { count: usize },
    RulesRefreshed { active_rules: usize },
    State(ServiceStateSnapshot),
    Health(HealthStatus),
    Subscribed { client_id: ClientId },
    Unsubscribed,
    Pong,
}

/// Client connection info (set by the IPC layer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: ClientId,
    /// Unix UID if available
    pub uid: Option<u32>,
}

impl ClientInfo {
    pub fn new() -> Self {
        Self {
            client_id: ClientId::new(),
            uid: None,
        }
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialization() {
        let req = Request::new(1, Command::ListPolicies);
        let json = serde_json::to_string(&req).unwrap();
        let parsed: Request = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.request_id, 1);
        assert!(matches!(parsed.command, Command::ListPolicies));
    }

    #[test]
    fn add_policy_round_trip() {
        let req = Request::new(
            7,
            Command::AddPolicy {
                pattern: "facebook.com/*".into(),
                start: "09:00".into(),
                end: "17:00".into(),
                days: "Mo,Tu,We,Th,Fr".into(),
                owner: UserId::new(1),
            },
        );

        let json = serde_json::to_string(&req).unwrap();
        let parsed: Request = serde_json::from_str(&json).unwrap();

        match parsed.command {
            Command::AddPolicy { pattern, days, .. } => {
                assert_eq!(pattern, "facebook.com/*");
                assert_eq!(days, "Mo,Tu,We,Th,Fr");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn error_response_serialization() {
        let resp = Response::error(
            3,
            ErrorInfo::new(ErrorCode::ValidationError, "start must be before end"),
        );

        let json = serde_json::to_string(&resp).unwrap();
        let parsed: Response = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.request_id, 3);
        assert!(matches!(
            parsed.result,
            ResponseResult::Err(ErrorInfo {
                code: ErrorCode::ValidationError,
                ..
            })
        ));
    }
}
