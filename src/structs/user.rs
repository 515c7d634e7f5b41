use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role granted to back-office administrators.
pub const ROLE_ADMIN: &str = "ROLE_ADMIN";
/// Role granted to platform owners.
pub const ROLE_SUPER_ADMIN: &str = "ROLE_SUPER_ADMIN";

/// Identity of the logged in user, decoded from the credential's payload.
/// Claims are never stored on their own: they are rebuilt every time the credential changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Expiry of the credential, in seconds since the unix epoch.
    pub expires: u64,
    /// When the credential was issued, if the backend says so.
    pub issued_at: Option<u64>,
    /// Roles or authorities, normalized to a flat list.
    pub roles: Vec<String>,
    pub user_id: Option<i64>,
    pub email: Option<String>,
    pub username: Option<String>,
    /// Customer account the user belongs to.
    pub client_id: Option<i64>,
    /// Shop the user is attached to.
    pub store_id: Option<i64>,
    pub language: Option<String>,

    /// Every claim of the payload, including the ones not mapped above.
    #[serde(default)]
    pub raw: Map<String, Value>,
}

impl Claims {
    /// A credential is expired from its `exp` second onwards.
    pub fn is_expired_at(&self, now_millis: u64) -> bool {
        now_millis >= self.expires_at_millis()
    }

    pub fn expires_at_millis(&self) -> u64 {
        self.expires.saturating_mul(1000)
    }

    /// Milliseconds left before expiry, zero once expired.
    pub fn remaining_millis(&self, now_millis: u64) -> u64 {
        self.expires_at_millis().saturating_sub(now_millis)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|role| self.has_role(role))
    }

    /// Reads a claim the mapping does not cover.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.raw.get(name)
    }
}
