//! Credential decoding.
//!
//! The client never verifies signatures; it only reads the payload segment of the
//! JWT. Backends disagree on claim names, so the names are supplied through a
//! [`ClaimMapping`] instead of being baked into a struct.

use base64::prelude::*;
use serde_json::{Map, Value};

use crate::errors::ClientError;
use crate::structs::user::Claims;

/// Names of the payload fields the client reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimMapping {
    pub expires: String,
    pub issued_at: String,
    /// A string, an array of strings or an array of `{ "authority": ... }` objects.
    pub roles: String,
    pub user_id: String,
    pub email: String,
    pub username: String,
    pub client_id: String,
    pub store_id: String,
    pub language: String,
}

impl ClaimMapping {
    /// Tokens issued by the admin manager backend.
    pub fn symfony() -> Self {
        Self {
            expires: "exp".to_string(),
            issued_at: "iat".to_string(),
            roles: "roles".to_string(),
            user_id: "id".to_string(),
            email: "email".to_string(),
            username: "username".to_string(),
            client_id: "id_client".to_string(),
            store_id: "magasin_id".to_string(),
            language: "language".to_string(),
        }
    }

    /// Tokens issued by the ordering backend.
    pub fn spring() -> Self {
        Self {
            expires: "exp".to_string(),
            issued_at: "iat".to_string(),
            roles: "ROLE".to_string(),
            user_id: "USER_ID".to_string(),
            email: "email".to_string(),
            username: "sub".to_string(),
            client_id: "CLIENT_ID".to_string(),
            store_id: "STORE_ID".to_string(),
            language: "LANGUAGE".to_string(),
        }
    }

    /// Looks a preset up by name, as used by `COCKTAIL_CLAIMS`.
    pub fn preset(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "symfony" => Some(Self::symfony()),
            "spring" => Some(Self::spring()),
            _ => None,
        }
    }

    /// Decodes the claims of `token` according to this mapping.
    pub fn decode(&self, token: &str) -> Result<Claims, ClientError> {
        let payload = decode_payload(token)?;

        let expires = read_u64(payload.get(&self.expires)).ok_or(ClientError::MalformedCredential)?;

        Ok(Claims {
            expires,
            issued_at: read_u64(payload.get(&self.issued_at)),
            roles: read_roles(payload.get(&self.roles)),
            user_id: read_i64(payload.get(&self.user_id)),
            email: read_string(payload.get(&self.email)),
            username: read_string(payload.get(&self.username)),
            client_id: read_i64(payload.get(&self.client_id)),
            store_id: read_i64(payload.get(&self.store_id)),
            language: read_string(payload.get(&self.language)),
            raw: payload,
        })
    }
}

impl Default for ClaimMapping {
    fn default() -> Self {
        Self::symfony()
    }
}

/// Removes an optional `Bearer ` prefix and surrounding whitespace.
pub fn strip_bearer(token: &str) -> &str {
    let token = token.trim();
    token.strip_prefix("Bearer ").unwrap_or(token).trim()
}

/// Decodes the payload segment of a JWT into a JSON object.
pub fn decode_payload(token: &str) -> Result<Map<String, Value>, ClientError> {
    let mut segments = strip_bearer(token).split('.');

    let payload = match (segments.next(), segments.next()) {
        (Some(header), Some(payload)) if !header.is_empty() && !payload.is_empty() => payload,
        _ => return Err(ClientError::MalformedCredential),
    };

    // Some issuers keep the padding, and a few use the standard alphabet
    let payload = payload.trim_end_matches('=');
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| BASE64_STANDARD_NO_PAD.decode(payload))
        .or(Err(ClientError::MalformedCredential))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(ClientError::MalformedCredential),
    }
}

fn read_u64(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn read_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn read_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn read_roles(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(role)) => role
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(role) => Some(role.clone()),
                Value::Object(obj) => obj
                    .get("authority")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Builds an unsigned token around `payload`.
#[cfg(test)]
pub(crate) fn forge_token(payload: &Value) -> String {
    let header = BASE64_URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = BASE64_URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.c2lnbmF0dXJl")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use testresult::TestResult;

    #[test]
    fn decodes_symfony_payload() -> TestResult {
        let token = forge_token(&json!({
            "iat": 1_700_000_000,
            "exp": 1_700_003_600,
            "roles": ["ROLE_USER", "ROLE_SUPER_ADMIN"],
            "username": "marie",
            "id": 12,
            "email": "marie@example.com",
            "id_client": 3,
            "magasin_id": 5,
            "language": "fr",
        }));

        let claims = ClaimMapping::symfony().decode(&token)?;

        assert_eq!(claims.expires, 1_700_003_600);
        assert_eq!(claims.issued_at, Some(1_700_000_000));
        assert_eq!(claims.roles, vec!["ROLE_USER", "ROLE_SUPER_ADMIN"]);
        assert_eq!(claims.username.as_deref(), Some("marie"));
        assert_eq!(claims.user_id, Some(12));
        assert_eq!(claims.client_id, Some(3));
        assert_eq!(claims.store_id, Some(5));
        assert_eq!(claims.language.as_deref(), Some("fr"));
        Ok(())
    }

    #[test]
    fn decodes_spring_payload_with_bearer_prefix() -> TestResult {
        let token = forge_token(&json!({
            "exp": 1_700_003_600,
            "ROLE": "ROLE_ADMIN",
            "USER_ID": "42",
            "email": "bar@example.com",
            "sub": "bar@example.com",
        }));

        let claims = ClaimMapping::spring().decode(&format!("Bearer {token}"))?;

        assert_eq!(claims.roles, vec!["ROLE_ADMIN"]);
        assert_eq!(claims.user_id, Some(42));
        assert_eq!(claims.email.as_deref(), Some("bar@example.com"));
        assert!(claims.get("sub").is_some());
        Ok(())
    }

    #[test]
    fn reads_authority_objects() -> TestResult {
        let mapping = ClaimMapping {
            roles: "authorities".to_string(),
            ..ClaimMapping::spring()
        };
        let token = forge_token(&json!({
            "exp": 10,
            "authorities": [{ "authority": "ROLE_USER" }, { "authority": "ROLE_ADMIN" }],
        }));

        assert_eq!(mapping.decode(&token)?.roles, vec!["ROLE_USER", "ROLE_ADMIN"]);
        Ok(())
    }

    #[test]
    fn rejects_malformed_tokens() {
        let mapping = ClaimMapping::default();

        assert_eq!(mapping.decode(""), Err(ClientError::MalformedCredential));
        assert_eq!(mapping.decode("not-a-jwt"), Err(ClientError::MalformedCredential));
        assert_eq!(mapping.decode("a.!!!.c"), Err(ClientError::MalformedCredential));

        let not_json = format!("a.{}.c", BASE64_URL_SAFE_NO_PAD.encode("hello"));
        assert_eq!(mapping.decode(&not_json), Err(ClientError::MalformedCredential));
    }

    #[test]
    fn missing_expiry_is_malformed() {
        let token = forge_token(&json!({ "username": "marie" }));

        assert_eq!(
            ClaimMapping::symfony().decode(&token),
            Err(ClientError::MalformedCredential)
        );
    }

    #[test]
    fn tolerates_padding() -> TestResult {
        let body = BASE64_URL_SAFE.encode(json!({ "exp": 5 }).to_string());
        let claims = ClaimMapping::symfony().decode(&format!("eyJ9.{body}.sig"))?;

        assert_eq!(claims.expires, 5);
        Ok(())
    }

    #[test]
    fn presets_by_name() {
        assert_eq!(ClaimMapping::preset("Spring"), Some(ClaimMapping::spring()));
        assert_eq!(ClaimMapping::preset(" symfony "), Some(ClaimMapping::symfony()));
        assert_eq!(ClaimMapping::preset("ldap"), None);
    }
}
