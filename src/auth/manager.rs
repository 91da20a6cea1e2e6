use anyhow::Context;
use std::sync::Arc;

use super::refresh::RefreshCoordinator;
use super::session::Session;
use super::types::{Identity, SessionState, SigninRequest, SignupRequest, TokenResponse, User};
use crate::error::{classify_auth_error, ApiError, AuthEndpoint, Result};
use crate::http_client::{ApiRequest, StorehouseHttpClient};

/// Authentication manager
///
/// Owns the operations that move the session between signed-out and
/// signed-in. Credential exchanges go through the pipeline as exempt requests.
pub struct AuthManager {
    http: Arc<StorehouseHttpClient>,
    session: Arc<Session>,
    refresher: Arc<RefreshCoordinator>,
}

impl AuthManager {
    pub fn new(
        http: Arc<StorehouseHttpClient>,
        session: Arc<Session>,
        refresher: Arc<RefreshCoordinator>,
    ) -> Self {
        Self {
            http,
            session,
            refresher,
        }
    }

    /// Sign in and establish the session
    ///
    /// A failure is classified and leaves the session untouched.
    pub async fn sign_in(&self, credentials: &SigninRequest) -> Result<Identity> {
        credentials.validate()?;
        tracing::info!(login = %credentials.login, "Signing in");

        let body = serde_json::to_value(credentials).context("Failed to encode sign-in request")?;
        let response: TokenResponse = self
            .http
            .send_json(ApiRequest::post("/auth/signin").json(body).exempt())
            .await
            .map_err(|e| classify_auth_error(AuthEndpoint::SignIn, e))?;

        if response.access_token.is_empty() {
            return Err(ApiError::Internal(anyhow::anyhow!(
                "Sign-in response does not contain accessToken"
            )));
        }

        let identity = Identity::new(credentials.login.clone());
        self.session
            .establish(identity.clone(), response.access_token);

        tracing::info!(login = %identity.login, "Signed in");
        Ok(identity)
    }

    /// Register a new account; does not sign in
    pub async fn sign_up(&self, data: &SignupRequest) -> Result<()> {
        data.validate()?;
        tracing::info!(login = %data.login, "Registering account");

        let body = serde_json::to_value(data).context("Failed to encode sign-up request")?;
        self.http
            .send_empty(ApiRequest::post("/auth/signup").json(body).exempt())
            .await
            .map_err(|e| classify_auth_error(AuthEndpoint::SignUp, e))
    }

    /// Invalidate the server session (best effort) and clear local state
    ///
    /// The logout call carries the bearer token but never triggers a refresh.
    pub async fn sign_out(&self) {
        if let Err(e) = self
            .http
            .send_empty(ApiRequest::post("/auth/logout").no_retry())
            .await
        {
            tracing::debug!(error = %e, "Logout request failed, clearing session anyway");
        }
        self.session.teardown();
    }

    /// Restore a persisted session at startup
    ///
    /// Returns `Ok(false)` when no identity was persisted. A failed refresh
    /// clears the session and is returned to the caller.
    pub async fn initialize(&self) -> Result<bool> {
        let Some(identity) = self.session.persisted_identity() else {
            tracing::debug!("No persisted session");
            return Ok(false);
        };

        tracing::debug!(login = %identity.login, "Restoring persisted session");
        match self.refresher.refresh().await {
            Ok(_) => {
                self.session.resume(identity);
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not restore session");
                self.session.teardown();
                Err(e.into())
            }
        }
    }

    /// Fetch the profile of the signed-in user and record its roles
    pub async fn current_user(&self) -> Result<User> {
        let user: User = self.http.send_json(ApiRequest::get("/user/me")).await?;

        if let Some(mut identity) = self.session.identity() {
            identity.roles = user.role.clone();
            self.session.update_identity(identity);
        }

        Ok(user)
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.session.identity()
    }

    pub fn is_admin(&self) -> bool {
        self.session.is_admin()
    }
}
