//! Credential records for the popup login gate
//!
//! The hash here is the legacy single-hash scheme carried over from the
//! authoring surface: a 31-multiplier rolling hash over UTF-16 code units,
//! rendered as a decimal string. It has no real security value and is kept
//! only for compatibility with the stored records.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use warden_util::UserId;

/// Username seeded on first store open
pub const DEFAULT_ADMIN_USER: &str = "admin";

/// Password seeded on first store open
pub const DEFAULT_ADMIN_PASSWORD: &str = "adminlock";

/// A stored credential record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Local>,
}

/// Hash a password with the legacy rolling hash.
pub fn hash_password(password: &str) -> String {
    let mut hash: i32 = 0;
    for unit in password.encode_utf16() {
        hash = hash.wrapping_mul(31).wrapping_add(unit as i32);
    }
    hash.to_string()
}
