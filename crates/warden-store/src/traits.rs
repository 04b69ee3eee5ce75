//! Store trait definitions

use tokio::sync::broadcast;
use warden_policy::PolicyRecord;
use warden_util::{BlockWindow, PolicyId, UserId};

use crate::{CredentialRecord, StoreResult};

/// Which logical collection changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    Policies,
    Users,
}

/// Main store trait.
///
/// Each collection is read and written wholesale as an ordered list, so a
/// mutation is read-modify-write under the implementation's own locking.
/// Mutations to a collection emit a `StoreChange` to all subscribers.
pub trait Store: Send + Sync {
    // Block policies

    /// All policy records in storage order
    fn list_policies(&self) -> StoreResult<Vec<PolicyRecord>>;

    /// Create a policy; the id is max-existing + 1
    fn create_policy(
        &self,
        url_pattern: String,
        window: BlockWindow,
        owner: UserId,
    ) -> StoreResult<PolicyRecord>;

    /// Update a policy in place, preserving id, creation time, and owner
    fn update_policy(
        &self,
        id: PolicyId,
        url_pattern: String,
        window: BlockWindow,
    ) -> StoreResult<PolicyRecord>;

    /// Delete a policy. Idempotent; returns whether a record was removed.
    fn delete_policy(&self, id: PolicyId) -> StoreResult<bool>;

    /// Create many policies sharing one window, ids assigned sequentially
    fn import_policies(
        &self,
        url_patterns: Vec<String>,
        window: BlockWindow,
        owner: UserId,
    ) -> StoreResult<Vec<PolicyRecord>>;

    // Credentials

    /// All credential records
    fn list_users(&self) -> StoreResult<Vec<CredentialRecord>>;

    /// Create a credential record (password stored hashed)
    fn create_user(&self, username: &str, password: &str) -> StoreResult<CredentialRecord>;

    /// Check a username/password pair against stored records
    fn authenticate(&self, username: &str, password: &str)
        -> StoreResult<Option<CredentialRecord>>;

    // Change notifications

    /// Subscribe to collection change events
    fn subscribe_changes(&self) -> broadcast::Receiver<StoreChange>;

    // Health

    /// Check if the store is healthy
    fn is_healthy(&self) -> bool;
}
