//! Strongly-typed identifiers for wardend

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a block policy record.
///
/// Assigned by the store on creation as max-existing + 1, so ids are
/// monotonically increasing within a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyId(i64);

impl PolicyId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// The id that follows this one in store assignment order.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PolicyId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of a credential record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(i64);

impl UserId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Unique identifier for a connected IPC client
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_id_ordering() {
        let first = PolicyId::new(1);
        let second = first.next();

        assert!(second > first);
        assert_eq!(second.value(), 2);
    }

    #[test]
    fn client_id_uniqueness() {
        let c1 = ClientId::new();
        let c2 = ClientId::new();
        assert_ne!(c1, c2);
    }

    #[test]
    fn ids_serialize_deserialize() {
        let policy_id = PolicyId::new(42);
        let json = serde_json::to_string(&policy_id).unwrap();
        let parsed: PolicyId = serde_json::from_str(&json).unwrap();
        assert_eq!(policy_id, parsed);

        let user_id = UserId::new(1);
        let json = serde_json::to_string(&user_id).unwrap();
        let parsed: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(user_id, parsed);
    }
}
