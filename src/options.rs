use std::env;
use std::path::PathBuf;

use reqwest::Url;

use crate::claims::ClaimMapping;
use crate::errors::ClientError;

/// How the credential travels on authenticated calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthHeader {
    /// `Authorization: Bearer <token>`
    Bearer,
    /// The raw token under a custom header, e.g. `x-auth-token`.
    Raw(String),
}

impl AuthHeader {
    pub fn render(&self, token: &str) -> (String, String) {
        match self {
            AuthHeader::Bearer => ("Authorization".to_string(), format!("Bearer {token}")),
            AuthHeader::Raw(name) => (name.clone(), token.to_string()),
        }
    }
}

/// Where a freshly logged in user lands when no return path was recorded.
/// Rules are checked in order; the first role the user holds wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Landing {
    pub rules: Vec<(String, String)>,
    pub default: String,
}

impl Landing {
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            default: default.into(),
        }
    }

    pub fn role(mut self, role: impl Into<String>, path: impl Into<String>) -> Self {
        self.rules.push((role.into(), path.into()));
        self
    }

    pub fn for_roles(&self, roles: &[String]) -> &str {
        self.rules
            .iter()
            .find(|(role, _)| roles.iter().any(|r| r == role))
            .map(|(_, path)| path.as_str())
            .unwrap_or(&self.default)
    }
}

impl Default for Landing {
    fn default() -> Self {
        Landing::new("/")
            .role("ROLE_SUPER_ADMIN", "/dashboard")
            .role("ROLE_ADMIN", "/dashboard")
    }
}

/// Cocktail client options. Pass this into `Client::new()`.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Base URL of the REST API, e.g. `https://api.example.com/`.
    pub base_url: String,
    /// Path of the auth endpoint, relative to `base_url`.
    pub auth_path: String,
    /// Name of the login field in the auth request body.
    pub login_field: String,
    /// Name of the password field in the auth request body.
    pub password_field: String,
    pub auth_header: AuthHeader,
    /// Claim names used by the backend issuing the tokens.
    pub claims: ClaimMapping,
    /// Path of the login view; every forced logout lands here.
    pub login_path: String,
    pub landing: Landing,
    /// File holding the credential. `None` keeps it in memory.
    pub storage_path: Option<PathBuf>,
    /// Whether the client should echo notices to the console.
    pub debug: bool,
}

impl ClientOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_path: "auth-tokens-admin-manager".to_string(),
            login_field: "login".to_string(),
            password_field: "password".to_string(),
            auth_header: AuthHeader::Bearer,
            claims: ClaimMapping::default(),
            login_path: "/login".to_string(),
            landing: Landing::default(),
            storage_path: None,
            debug: false,
        }
    }

    /// Reads options from the environment, loading a `.env` file first if present.
    ///
    /// `COCKTAIL_API_URL` is required. `COCKTAIL_AUTH_PATH`, `COCKTAIL_TOKEN_FILE`,
    /// `COCKTAIL_AUTH_HEADER`, `COCKTAIL_CLAIMS` (`symfony` or `spring`) and
    /// `COCKTAIL_DEBUG` are optional.
    pub fn from_env() -> Result<Self, ClientError> {
        let _ = dotenvy::dotenv();

        let base_url = env::var("COCKTAIL_API_URL")
            .map_err(|_| ClientError::InvalidOptions("COCKTAIL_API_URL is not set".to_string()))?;

        let mut options = Self::new(base_url);

        if let Ok(path) = env::var("COCKTAIL_AUTH_PATH") {
            options.auth_path = path;
        }

        if let Ok(path) = env::var("COCKTAIL_TOKEN_FILE") {
            options.storage_path = Some(PathBuf::from(path));
        }

        if let Ok(header) = env::var("COCKTAIL_AUTH_HEADER") {
            if !header.eq_ignore_ascii_case("authorization") {
                options.auth_header = AuthHeader::Raw(header);
            }
        }

        if let Ok(name) = env::var("COCKTAIL_CLAIMS") {
            options.claims = ClaimMapping::preset(&name).ok_or_else(|| {
                ClientError::InvalidOptions(format!("unknown claim preset \"{name}\""))
            })?;
        }

        if let Ok(debug) = env::var("COCKTAIL_DEBUG") {
            options.debug = matches!(debug.trim(), "1" | "true" | "yes");
        }

        Ok(options)
    }

    /// Checks the options and returns the parsed base URL.
    pub fn validate(&self) -> Result<Url, ClientError> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::InvalidOptions(format!("base_url: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::InvalidOptions(
                "base_url must be an http(s) URL".to_string(),
            ));
        }

        if self.auth_path.trim().is_empty() {
            return Err(ClientError::InvalidOptions("auth_path is empty".to_string()));
        }

        if !self.login_path.starts_with('/') {
            return Err(ClientError::InvalidOptions(
                "login_path must start with /".to_string(),
            ));
        }

        if let AuthHeader::Raw(name) = &self.auth_header {
            if name.trim().is_empty() {
                return Err(ClientError::InvalidOptions("auth header name is empty".to_string()));
            }
        }

        Ok(url)
    }
}
