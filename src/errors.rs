use reqwest::StatusCode;
use thiserror::Error;

/// Cocktail client errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The options passed to `Client::new()` are not usable.
    #[error("Invalid client options: {0}")]
    InvalidOptions(String),

    /// The stored credential expired before the request was sent.
    /// The session has been cleared and the request was never dispatched.
    #[error("Session expired, please log in again.")]
    CredentialExpired,
    /// The API answered an authenticated call with 401: Unauthorized.
    /// The session has been cleared.
    #[error("Session rejected by the server, please log in again.")]
    Unauthorized,
    /// The credential could not be decoded into claims.
    #[error("Invalid or malformed token.")]
    MalformedCredential,

    /// Failed to send a request to the API, or the connection dropped.
    #[error("Network error: {0}")]
    Network(String),

    /// The auth endpoint returned a 401: the login or the password is wrong.
    #[error("Invalid login or password.")]
    InvalidCredentials,
    /// The auth endpoint returned a 403: the account exists but may not log in.
    #[error("This account is not allowed to log in.")]
    AccountForbidden,
    /// The API refused the request. `message` is meant for the user.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// Failed to decode an API response.
    #[error("Failed to decode API response.")]
    FailedToDecode,

    /// Failed to read or write the credential slot.
    #[error("Credential storage error: {0}")]
    Storage(String),
}

impl ClientError {
    /// Builds the user-facing error for a non-success status outside of the auth flow.
    pub fn from_status(status: StatusCode) -> Self {
        let message = match status {
            StatusCode::BAD_REQUEST => "Bad request.",
            StatusCode::FORBIDDEN => "You are not allowed to do this.",
            StatusCode::NOT_FOUND => "Resource not found.",
            StatusCode::CONFLICT => "This entry already exists.",
            StatusCode::UNPROCESSABLE_ENTITY => "Some fields are invalid.",
            StatusCode::TOO_MANY_REQUESTS => "You are being rate limited.",
            s if s.is_server_error() => "Server error.",
            _ => "Unexpected response from the server.",
        };

        ClientError::Rejected {
            status: status.as_u16(),
            message: message.to_string(),
        }
    }

    /// Whether this error tore down the session (expired, rejected or malformed credential).
    pub fn ends_session(&self) -> bool {
        matches!(
            self,
            ClientError::CredentialExpired
                | ClientError::Unauthorized
                | ClientError::MalformedCredential
        )
    }
}
