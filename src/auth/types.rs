// Authentication types

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

const LOGIN_MIN: usize = 3;
const LOGIN_MAX: usize = 50;
const PASSWORD_MIN: usize = 6;
const PASSWORD_MAX: usize = 128;
const EMAIL_MIN: usize = 3;
const EMAIL_MAX: usize = 254;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Sign-in request body
#[derive(Debug, Clone, Serialize)]
pub struct SigninRequest {
    pub login: String,
    pub password: String,
}

impl SigninRequest {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        validate_login(&self.login)?;
        validate_password(&self.password)
    }
}

/// Sign-up request body
#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub login: String,
    pub email: String,
    pub password: String,
}

impl SignupRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_login(&self.login)?;

        let len = self.email.chars().count();
        if !(EMAIL_MIN..=EMAIL_MAX).contains(&len) {
            return Err(ApiError::ValidationError(format!(
                "Email must be between {} and {} characters",
                EMAIL_MIN, EMAIL_MAX
            )));
        }
        if !EMAIL_PATTERN.is_match(&self.email) {
            return Err(ApiError::ValidationError(
                "Invalid email format".to_string(),
            ));
        }

        validate_password(&self.password)
    }
}

fn validate_login(login: &str) -> Result<(), ApiError> {
    let len = login.chars().count();
    if !(LOGIN_MIN..=LOGIN_MAX).contains(&len) {
        return Err(ApiError::ValidationError(format!(
            "Login must be between {} and {} characters",
            LOGIN_MIN, LOGIN_MAX
        )));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    let len = password.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
        return Err(ApiError::ValidationError(format!(
            "Password must be between {} and {} characters",
            PASSWORD_MIN, PASSWORD_MAX
        )));
    }
    Ok(())
}

/// Credential-exchange response (sign-in and refresh)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
    pub token_type: Option<String>,
    /// Lifetime in milliseconds, informational only
    pub expires_in: Option<u64>,
}

/// User role as reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Admin,
    Guest,
}

/// Profile returned by `/user/me`
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub login: String,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub role: Vec<UserRole>,
}

/// Minimal identity kept for rehydration after a restart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub login: String,
    #[serde(default)]
    pub roles: Vec<UserRole>,
    pub signed_in_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            roles: Vec::new(),
            signed_in_at: Utc::now(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(&UserRole::Admin)
    }
}

/// Current session state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    SignedOut,
    SignedIn(Identity),
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::SignedIn(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(login: &str, email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            login: login.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_signin_validation() {
        assert!(SigninRequest::new("alice", "secret123").validate().is_ok());
        assert!(SigninRequest::new("al", "secret123").validate().is_err());
        assert!(SigninRequest::new("alice", "12345").validate().is_err());
        assert!(SigninRequest::new("a".repeat(51), "secret123")
            .validate()
            .is_err());
    }

    #[test]
    fn test_signup_validation() {
        assert!(signup("alice", "alice@example.com", "secret123")
            .validate()
            .is_ok());

        let err = signup("alice", "alice@example", "secret123")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));

        assert!(signup("alice", "a b@example.com", "secret123")
            .validate()
            .is_err());
    }

    #[test]
    fn test_token_response_parsing() {
        let resp: TokenResponse = serde_json::from_str(
            r#"{"accessToken":"tok1","tokenType":"Bearer","expiresIn":900000}"#,
        )
        .unwrap();
        assert_eq!(resp.access_token, "tok1");
        assert_eq!(resp.expires_in, Some(900000));

        let resp: TokenResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.access_token.is_empty());
    }

    #[test]
    fn test_identity_roles() {
        let mut identity = Identity::new("alice");
        assert!(!identity.is_admin());
        identity.roles = vec![UserRole::Guest, UserRole::Admin];
        assert!(identity.is_admin());

        let user: User =
            serde_json::from_str(r#"{"id":7,"login":"bob","mail":"b@x.io","role":["GUEST"]}"#)
                .unwrap();
        assert_eq!(user.role, vec![UserRole::Guest]);
    }

    #[test]
    fn test_session_state() {
        assert!(!SessionState::default().is_authenticated());
        assert!(SessionState::SignedIn(Identity::new("alice")).is_authenticated());
    }
}
