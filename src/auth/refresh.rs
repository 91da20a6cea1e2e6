// Single-flight access token refresh

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use reqwest::Client;
use std::sync::Arc;
use thiserror::Error;

use super::session::Session;
use super::types::TokenResponse;
use crate::error::{extract_message, ApiError, AuthErrorKind};

/// Outcome of a failed credential exchange
///
/// Cloneable so every caller joined to one exchange receives the same value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RefreshError {
    /// Server refused the session artifact
    #[error("Refresh rejected: {0}")]
    Rejected(AuthErrorKind),

    #[error("Refresh request failed: {0}")]
    Transport(String),

    #[error("Refresh failed: {status} - {message}")]
    Server { status: u16, message: String },

    #[error("Refresh response is malformed: {0}")]
    Malformed(String),

    #[error("Refresh task aborted: {0}")]
    Aborted(String),
}

impl From<RefreshError> for ApiError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Rejected(kind) => ApiError::AuthError(kind),
            RefreshError::Transport(msg) => ApiError::Transport(msg),
            RefreshError::Server { status, message } => ApiError::HttpError { status, message },
            other => ApiError::Internal(anyhow::anyhow!(other)),
        }
    }
}

type RefreshOutcome = Result<String, RefreshError>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Refresh lifecycle
enum Phase {
    Idle,
    Refreshing {
        episode: u64,
        result: SharedRefresh,
    },
    Failed(RefreshError),
}

struct RefreshState {
    phase: Phase,
    episodes: u64,
}

impl RefreshState {
    /// Settle `episode` unless a newer one has taken its place
    fn settle(&mut self, episode: u64, outcome: &RefreshOutcome) {
        if let Phase::Refreshing { episode: current, .. } = self.phase {
            if current == episode {
                self.phase = match outcome {
                    Ok(_) => Phase::Idle,
                    Err(e) => Phase::Failed(e.clone()),
                };
            }
        }
    }
}

/// Guarantees at most one credential exchange in flight
///
/// Concurrent callers join the pending exchange and observe its result. The
/// exchange runs on its own task, so it completes and updates the session
/// even if every caller has gone away.
pub struct RefreshCoordinator {
    client: Client,
    refresh_url: String,
    session: Arc<Session>,
    state: Arc<Mutex<RefreshState>>,
}

impl RefreshCoordinator {
    /// `client` must share the cookie jar that carries the session artifact
    pub fn new(client: Client, api_url: &str, session: Arc<Session>) -> Self {
        Self {
            client,
            refresh_url: format!("{}/auth/refresh", api_url.trim_end_matches('/')),
            session,
            state: Arc::new(Mutex::new(RefreshState {
                phase: Phase::Idle,
                episodes: 0,
            })),
        }
    }

    /// Obtain a fresh token, joining an exchange already in flight
    pub async fn refresh(&self) -> RefreshOutcome {
        let pending = {
            let mut state = self.state.lock();
            self.join_or_start(&mut state)
        };
        pending.await
    }

    /// Like [`refresh`](Self::refresh), for a caller whose request was
    /// rejected with `rejected`
    ///
    /// If an exchange settled after that request went out, the token store
    /// already holds its result and no new exchange is started.
    pub async fn refresh_after(&self, rejected: Option<&str>) -> RefreshOutcome {
        let pending = {
            let mut state = self.state.lock();
            if !matches!(state.phase, Phase::Refreshing { .. }) {
                if let Some(current) = self.session.tokens().get() {
                    if rejected != Some(current.as_str()) {
                        tracing::debug!("Token already refreshed by another request");
                        return Ok(current);
                    }
                }
            }
            self.join_or_start(&mut state)
        };
        pending.await
    }

    /// Whether an exchange is currently in flight
    pub fn is_refreshing(&self) -> bool {
        matches!(self.state.lock().phase, Phase::Refreshing { .. })
    }

    /// Failure of the most recent exchange, cleared by the next success
    pub fn last_failure(&self) -> Option<RefreshError> {
        match &self.state.lock().phase {
            Phase::Failed(e) => Some(e.clone()),
            _ => None,
        }
    }

    fn join_or_start(&self, state: &mut RefreshState) -> SharedRefresh {
        if let Phase::Refreshing { result, .. } = &state.phase {
            tracing::debug!("Joining in-flight token refresh");
            return result.clone();
        }

        state.episodes += 1;
        let episode = state.episodes;

        let client = self.client.clone();
        let url = self.refresh_url.clone();
        let session = self.session.clone();
        let task_state = self.state.clone();

        let task = tokio::spawn(async move {
            let outcome = exchange(&client, &url).await;

            match &outcome {
                Ok(token) => {
                    session.tokens().set(token.clone());
                    session.persist_cookies();
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Refresh failed, signing out");
                    session.teardown();
                }
            }

            task_state.lock().settle(episode, &outcome);
            outcome
        });

        let abort_state = self.state.clone();
        let abort_session = self.session.clone();
        let result = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let outcome = Err(RefreshError::Aborted(e.to_string()));
                    abort_session.teardown();
                    abort_state.lock().settle(episode, &outcome);
                    outcome
                }
            }
        }
        .boxed()
        .shared();

        state.phase = Phase::Refreshing {
            episode,
            result: result.clone(),
        };
        result
    }
}

/// Exchange the session artifact for a new access token
///
/// Sends no body and no bearer token; the cookie jar carries the session
/// artifact. Goes straight to the transport so a 401 here can never re-enter
/// the pipeline's refresh path.
async fn exchange(client: &Client, url: &str) -> RefreshOutcome {
    tracing::info!("Refreshing access token...");

    let response = client
        .post(url)
        .send()
        .await
        .map_err(|e| RefreshError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = extract_message(&body);
        tracing::warn!(status = status.as_u16(), body = %message, "Refresh endpoint refused");

        return Err(match status.as_u16() {
            400 | 401 | 403 => RefreshError::Rejected(
                AuthErrorKind::from_code(&message).unwrap_or(AuthErrorKind::SessionExpired),
            ),
            code => RefreshError::Server {
                status: code,
                message,
            },
        });
    }

    let data: TokenResponse = response
        .json()
        .await
        .map_err(|e| RefreshError::Malformed(e.to_string()))?;

    if data.access_token.is_empty() {
        return Err(RefreshError::Malformed(
            "response does not contain accessToken".to_string(),
        ));
    }

    tracing::info!("Access token refreshed");
    Ok(data.access_token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::slot::MemorySlot;
    use crate::auth::types::Identity;
    use reqwest::cookie::Jar;
    use reqwest::Url;

    fn coordinator(api_url: &str) -> (RefreshCoordinator, Arc<Session>) {
        let jar = Arc::new(Jar::default());
        let origin = Url::parse(&format!("{}/", api_url)).unwrap();
        let session = Arc::new(Session::open(
            Arc::new(MemorySlot::new()),
            jar.clone(),
            origin,
        ));
        let client = Client::builder().cookie_provider(jar).build().unwrap();
        (
            RefreshCoordinator::new(client, api_url, session.clone()),
            session,
        )
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_share_one_exchange() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/refresh")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"accessToken":"tok2","tokenType":"Bearer","expiresIn":900000}"#)
            .expect(1)
            .create_async()
            .await;

        let (coordinator, session) = coordinator(&server.url());

        let results =
            futures::future::join_all((0..5).map(|_| coordinator.refresh())).await;

        for result in results {
            assert_eq!(result.unwrap(), "tok2");
        }
        mock.assert_async().await;
        assert_eq!(session.tokens().get().as_deref(), Some("tok2"));
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_concurrent_failures_share_one_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/refresh")
            .with_status(401)
            .with_body("refresh_invalid_or_expired")
            .expect(1)
            .create_async()
            .await;

        let (coordinator, session) = coordinator(&server.url());
        session.establish(Identity::new("alice"), "tok1");

        let results =
            futures::future::join_all((0..3).map(|_| coordinator.refresh())).await;

        for result in results {
            assert_eq!(
                result.unwrap_err(),
                RefreshError::Rejected(AuthErrorKind::SessionExpired)
            );
        }
        mock.assert_async().await;
        assert!(!session.is_authenticated());
        assert_eq!(session.tokens().get(), None);
        assert_eq!(
            coordinator.last_failure(),
            Some(RefreshError::Rejected(AuthErrorKind::SessionExpired))
        );
    }

    #[tokio::test]
    async fn test_settled_refresh_allows_a_new_episode() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/refresh")
            .with_status(200)
            .with_body(r#"{"accessToken":"tok2"}"#)
            .expect(2)
            .create_async()
            .await;

        let (coordinator, _session) = coordinator(&server.url());

        assert_eq!(coordinator.refresh().await.unwrap(), "tok2");
        assert_eq!(coordinator.refresh().await.unwrap(), "tok2");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_after_reuses_newer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/refresh")
            .expect(0)
            .create_async()
            .await;

        let (coordinator, session) = coordinator(&server.url());
        session.tokens().set("tok2");

        let token = coordinator.refresh_after(Some("tok1")).await.unwrap();
        assert_eq!(token, "tok2");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_ends_session() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/refresh")
            .with_status(503)
            .with_body(r#"{"error":"maintenance"}"#)
            .create_async()
            .await;

        let (coordinator, session) = coordinator(&server.url());
        session.establish(Identity::new("alice"), "tok1");

        let err = coordinator.refresh_after(Some("tok1")).await.unwrap_err();
        assert_eq!(
            err,
            RefreshError::Server {
                status: 503,
                message: "maintenance".to_string()
            }
        );
        assert!(!session.is_authenticated());
        assert_eq!(session.tokens().get(), None);
        assert_eq!(
            coordinator.last_failure(),
            Some(RefreshError::Server {
                status: 503,
                message: "maintenance".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_unreachable_refresh_endpoint_ends_session() {
        let (coordinator, session) = coordinator("http://127.0.0.1:1");
        session.establish(Identity::new("alice"), "tok1");

        let err = coordinator.refresh_after(Some("tok1")).await.unwrap_err();
        assert!(matches!(err, RefreshError::Transport(_)));
        assert!(!session.is_authenticated());
        assert_eq!(session.tokens().get(), None);
    }

    #[tokio::test]
    async fn test_exchange_sends_no_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/refresh")
            .match_header("authorization", mockito::Matcher::Missing)
            .match_body("")
            .with_status(200)
            .with_body(r#"{"accessToken":"tok2"}"#)
            .expect(1)
            .create_async()
            .await;

        let (coordinator, session) = coordinator(&server.url());
        session.establish(Identity::new("alice"), "tok1");

        assert_eq!(coordinator.refresh().await.unwrap(), "tok2");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_access_token_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/refresh")
            .with_status(200)
            .with_body(r#"{"tokenType":"Bearer"}"#)
            .create_async()
            .await;

        let (coordinator, _session) = coordinator(&server.url());
        let err = coordinator.refresh().await.unwrap_err();
        assert!(matches!(err, RefreshError::Malformed(_)));
    }

    #[test]
    fn test_refresh_error_conversion() {
        let err: ApiError = RefreshError::Rejected(AuthErrorKind::SessionExpired).into();
        assert_eq!(err.auth_kind(), Some(AuthErrorKind::SessionExpired));

        let err: ApiError = RefreshError::Transport("refused".to_string()).into();
        assert!(matches!(err, ApiError::Transport(_)));
    }
}
