// Error handling module
// Defines the client error taxonomy and auth failure classification

use std::fmt;

use thiserror::Error;

/// Message used when the server gives nothing better
pub const GENERIC_MESSAGE: &str = "An error occurred";

/// Classified authentication failures with fixed user-facing messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// Wrong login or password at sign-in
    InvalidCredentials,
    /// Login already registered
    LoginExists,
    /// Email already registered
    EmailExists,
    /// Refresh artifact missing, expired or revoked
    SessionExpired,
    /// Anything the server reported that we cannot place
    Unknown,
}

impl AuthErrorKind {
    /// Parse a server error code
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "invalid_credentials" => Some(Self::InvalidCredentials),
            "login_exists" => Some(Self::LoginExists),
            "email_exists" => Some(Self::EmailExists),
            "refresh_invalid_or_expired" => Some(Self::SessionExpired),
            _ => None,
        }
    }

    /// Wire code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::LoginExists => "login_exists",
            Self::EmailExists => "email_exists",
            Self::SessionExpired => "refresh_invalid_or_expired",
            Self::Unknown => "unknown",
        }
    }

    /// Fixed message shown to the user
    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "Invalid login or password",
            Self::LoginExists => "This login is already taken",
            Self::EmailExists => "This email is already taken",
            Self::SessionExpired => "Session expired, please sign in again",
            Self::Unknown => "An authentication error occurred",
        }
    }
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Credential-exchange endpoints whose failures get classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEndpoint {
    SignIn,
    SignUp,
    Refresh,
}

/// Errors surfaced to callers of the API client
#[derive(Error, Debug)]
pub enum ApiError {
    /// Classified authentication failure
    #[error("Authentication failed: {0}")]
    AuthError(AuthErrorKind),

    /// 401 that could not be recovered by refreshing
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Non-success HTTP status other than a recoverable 401
    #[error("API error: {status} - {message}")]
    HttpError { status: u16, message: String },

    /// Network-level failure, no HTTP status available
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// HTTP status, if the failure came with one
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Auth kind, if this is a classified auth failure
    pub fn auth_kind(&self) -> Option<AuthErrorKind> {
        match self {
            ApiError::AuthError(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Human-readable message for display
    pub fn user_message(&self) -> String {
        match self {
            ApiError::AuthError(kind) => kind.message().to_string(),
            ApiError::Unauthorized { .. } => AuthErrorKind::SessionExpired.message().to_string(),
            ApiError::HttpError { message, .. } if !message.is_empty() => message.clone(),
            ApiError::ValidationError(msg) => msg.clone(),
            _ => GENERIC_MESSAGE.to_string(),
        }
    }
}

/// Map a failure from a credential-exchange endpoint onto an auth kind
///
/// Server codes win; otherwise a 401 on sign-in means bad credentials and on
/// refresh an expired session. Transport and unrelated statuses pass through.
pub fn classify_auth_error(endpoint: AuthEndpoint, err: ApiError) -> ApiError {
    let (status, message) = match &err {
        ApiError::Unauthorized { message } => (401, message.as_str()),
        ApiError::HttpError { status, message } => (*status, message.as_str()),
        _ => return err,
    };

    if let Some(kind) = AuthErrorKind::from_code(message) {
        return ApiError::AuthError(kind);
    }

    match (endpoint, status) {
        (AuthEndpoint::SignIn, 401) => ApiError::AuthError(AuthErrorKind::InvalidCredentials),
        (AuthEndpoint::Refresh, 400 | 401 | 403) => {
            ApiError::AuthError(AuthErrorKind::SessionExpired)
        }
        _ => err,
    }
}

/// Pull a message out of an error response body
///
/// Accepts a JSON string, a JSON object with `message` or `error`, or plain
/// text. Empty bodies yield the generic message.
pub fn extract_message(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return GENERIC_MESSAGE.to_string();
    }

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::String(s)) => s,
        Ok(serde_json::Value::Object(map)) => ["message", "error"]
            .iter()
            .filter_map(|key| map.get(*key).and_then(|v| v.as_str()))
            .find(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| GENERIC_MESSAGE.to_string()),
        _ => trimmed.to_string(),
    }
}

/// Result type alias for API operations
pub type Result<T> = std::result::Result<T, ApiError>;
