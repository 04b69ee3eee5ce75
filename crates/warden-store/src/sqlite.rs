//! SQLite-backed store implementation
//!
//! The schema is deliberately a namespaced key-value table: each logical
//! collection lives under one fixed key as a wholesale JSON list, matching
//! the layout the popup surfaces were written against. Rule-set sizes are
//! small, so read-modify-write of the whole list is cheap.

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info};
use warden_policy::PolicyRecord;
use warden_util::{BlockWindow, PolicyId, UserId};

use crate::{
    hash_password, CredentialRecord, Store, StoreChange, StoreError, StoreResult,
    DEFAULT_ADMIN_PASSWORD, DEFAULT_ADMIN_USER,
};

/// Storage key for the policy collection
pub const POLICIES_KEY: &str = "block_policies";

/// Storage key for the credential collection
pub const USERS_KEY: &str = "users";

/// SQLite-backed store
pub struct SqliteStore {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<StoreChange>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        let (changes, _) = broadcast::channel(16);
        let store = Self {
            conn: Mutex::new(conn),
            changes,
        };
        store.init_schema()?;
        store.ensure_default_user()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value_json TEXT NOT NULL
            );
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }

    /// Seed the default admin credential if the collection is empty.
    fn ensure_default_user(&self) -> StoreResult<()> {
        if self.list_users()?.is_empty() {
            self.create_user(DEFAULT_ADMIN_USER, DEFAULT_ADMIN_PASSWORD)?;
            info!(username = DEFAULT_ADMIN_USER, "Seeded default credential");
        }
        Ok(())
    }

    fn read_list<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Vec<T>> {
        let conn = self.conn.lock().unwrap();

        let json: Option<String> = conn
            .query_row(
                "SELECT value_json FROM kv WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn write_list<T: Serialize>(&self, key: &str, list: &[T]) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let json = serde_json::to_string(list)?;

        conn.execute(
            "INSERT INTO kv (key, value_json) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value_json = ?2",
            params![key, json],
        )?;

        Ok(())
    }

    fn notify(&self, change: StoreChange) {
        // No subscribers is fine (e.g. during tests or startup)
        let _ = self.changes.send(change);
    }

    fn next_policy_id(policies: &[PolicyRecord]) -> PolicyId {
        policies
            .iter()
            .map(|p| p.id)
            .max()
            .map(|id| id.next())
            .unwrap_or_else(|| PolicyId::new(1))
    }
}

impl Store for SqliteStore {
    fn list_policies(&self) -> StoreResult<Vec<PolicyRecord>> {
        self.read_list(POLICIES_KEY)
    }

    fn create_policy(
        &self,
        url_pattern: String,
        window: BlockWindow,
        owner: UserId,
    ) -> StoreResult<PolicyRecord> {
        let mut policies = self.list_policies()?;

        let record = PolicyRecord {
            id: Self::next_policy_id(&policies),
            url_pattern,
            window,
            created_at: warden_util::now(),
            owner,
        };

        policies.push(record.clone());
        self.write_list(POLICIES_KEY, &policies)?;
        self.notify(StoreChange::Policies);

        debug!(policy_id = %record.id, pattern = %record.url_pattern, "Policy created");
        Ok(record)
    }

    fn update_policy(
        &self,
        id: PolicyId,
        url_pattern: String,
        window: BlockWindow,
    ) -> StoreResult<PolicyRecord> {
        let mut policies = self.list_policies()?;

        let record = policies
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("policy {}", id)))?;

        record.url_pattern = url_pattern;
        record.window = window;
        let updated = record.clone();

        self.write_list(POLICIES_KEY, &policies)?;
        self.notify(StoreChange::Policies);

        debug!(policy_id = %id, "Policy updated");
        Ok(updated)
    }

    fn delete_policy(&self, id: PolicyId) -> StoreResult<bool> {
        let mut policies = self.list_policies()?;
        let before = policies.len();
        policies.retain(|p| p.id != id);
        let removed = policies.len() != before;

        if removed {
            self.write_list(POLICIES_KEY, &policies)?;
            self.notify(StoreChange::Policies);
            debug!(policy_id = %id, "Policy deleted");
        }

        Ok(removed)
    }

    fn import_policies(
        &self,
        url_patterns: Vec<String>,
        window: BlockWindow,
        owner: UserId,
    ) -> StoreResult<Vec<PolicyRecord>> {
        let mut policies = self.list_policies()?;
        let mut next_id = Self::next_policy_id(&policies);

        let mut imported = Vec::with_capacity(url_patterns.len());
        for pattern in url_patterns {
            let record = PolicyRecord {
                id: next_id,
                url_pattern: pattern.trim().to_string(),
                window,
                created_at: warden_util::now(),
                owner,
            };
            next_id = next_id.next();
            policies.push(record.clone());
            imported.push(record);
        }

        self.write_list(POLICIES_KEY, &policies)?;
        self.notify(StoreChange::Policies);

        debug!(count = imported.len(), "Policies imported");
        Ok(imported)
    }

    fn list_users(&self) -> StoreResult<Vec<CredentialRecord>> {
        self.read_list(USERS_KEY)
    }

    fn create_user(&self, username: &str, password: &str) -> StoreResult<CredentialRecord> {
        let mut users = self.list_users()?;

        let next_id = users
            .iter()
            .map(|u| u.id)
            .max_by_key(|id| id.value())
            .map(|id| id.next())
            .unwrap_or_else(|| UserId::new(1));

        let record = CredentialRecord {
            id: next_id,
            username: username.to_string(),
            password_hash: hash_password(password),
            created_at: warden_util::now(),
        };

        users.push(record.clone());
        self.write_list(USERS_KEY, &users)?;
        self.notify(StoreChange::Users);

        Ok(record)
    }

    fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> StoreResult<Option<CredentialRecord>> {
        let users = self.list_users()?;
        let hash = hash_password(password);

        Ok(users
            .into_iter()
            .find(|u| u.username == username && u.password_hash == hash))
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    fn is_healthy(&self) -> bool {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .is_ok()
    }
}
