use anyhow::Context;
use bytes::Bytes;
use reqwest::cookie::Jar;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{RefreshCoordinator, Session};
use crate::error::{extract_message, ApiError, Result};

/// Whether a request takes part in the refresh-and-retry protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPolicy {
    /// Carries the bearer token; a 401 triggers one refresh and one retry
    Protected,
    /// Carries the bearer token; a 401 is returned as is
    NoRetry,
    /// Credential-exchange endpoints: no token, no recovery
    Exempt,
}

/// Value of one multipart field
#[derive(Debug, Clone)]
pub enum FormValue {
    Text(String),
    File {
        file_name: String,
        mime: Option<String>,
        data: Bytes,
    },
}

/// Multipart field kept as data so the form can be rebuilt for a retry
#[derive(Debug, Clone)]
pub struct FormField {
    pub name: String,
    pub value: FormValue,
}

impl FormField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FormValue::Text(value.into()),
        }
    }

    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: Option<String>,
        data: Bytes,
    ) -> Self {
        Self {
            name: name.into(),
            value: FormValue::File {
                file_name: file_name.into(),
                mime,
                data,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart(Vec<FormField>),
}

/// Description of one API call, replayable for the single retry
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    pub policy: AuthPolicy,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };

        Self {
            method,
            path,
            query: Vec::new(),
            body: RequestBody::Empty,
            policy: AuthPolicy::Protected,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn multipart(mut self, fields: Vec<FormField>) -> Self {
        self.body = RequestBody::Multipart(fields);
        self
    }

    /// Opt out of bearer auth and refresh recovery
    pub fn exempt(mut self) -> Self {
        self.policy = AuthPolicy::Exempt;
        self
    }

    /// Keep the bearer token but skip refresh recovery
    pub fn no_retry(mut self) -> Self {
        self.policy = AuthPolicy::NoRetry;
        self
    }
}

/// Authenticated request pipeline for the Storehouse API
///
/// Attaches the bearer token, normalizes failures into [`ApiError`] and
/// recovers a 401 with exactly one refresh and one resend.
pub struct StorehouseHttpClient {
    /// Shared HTTP client with connection pooling and the session cookie jar
    client: Client,

    /// API base URL without trailing slash
    api_url: String,

    session: Arc<Session>,

    refresher: Arc<RefreshCoordinator>,
}

impl StorehouseHttpClient {
    pub fn new(
        client: Client,
        api_url: &str,
        session: Arc<Session>,
        refresher: Arc<RefreshCoordinator>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            session,
            refresher,
        }
    }

    /// Build the transport shared by the pipeline and the refresh coordinator
    pub fn build_transport(
        cookies: Arc<Jar>,
        connect_timeout: u64,
        request_timeout: u64,
    ) -> anyhow::Result<Client> {
        Client::builder()
            .cookie_provider(cookies)
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Execute a request, returning the successful response
    pub async fn execute(&self, request: &ApiRequest) -> Result<Response> {
        tracing::debug!(
            method = %request.method,
            path = %request.path,
            policy = ?request.policy,
            "Sending API request"
        );

        let token = match request.policy {
            AuthPolicy::Protected | AuthPolicy::NoRetry => self.session.tokens().get(),
            AuthPolicy::Exempt => None,
        };

        let response = self.send_once(request, token.as_deref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED
            || request.policy != AuthPolicy::Protected
        {
            return Self::check(response).await;
        }

        let original = Self::into_error(response).await;
        tracing::info!(
            method = %request.method,
            path = %request.path,
            "Received 401, refreshing access token"
        );

        let fresh = match self.refresher.refresh_after(token.as_deref()).await {
            Ok(fresh) => fresh,
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed, returning original 401");
                return Err(original);
            }
        };

        let response = self.send_once(request, Some(&fresh)).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let err = Self::into_error(response).await;
            tracing::warn!(
                method = %request.method,
                path = %request.path,
                "Request still unauthorized after refresh, signing out"
            );
            self.session.teardown();
            return Err(err);
        }

        Self::check(response).await
    }

    /// Execute and decode a JSON body
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let response = self.execute(&request).await?;
        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse response from {}", request.path))
            .map_err(ApiError::from)
    }

    /// Execute and discard the body
    pub async fn send_empty(&self, request: ApiRequest) -> Result<()> {
        self.execute(&request).await.map(|_| ())
    }

    /// Execute and return the raw body
    pub async fn send_bytes(&self, request: ApiRequest) -> Result<Bytes> {
        let response = self.execute(&request).await?;
        response
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(format!("Failed to read response body: {}", e)))
    }

    /// One transport round trip
    async fn send_once(&self, request: &ApiRequest, token: Option<&str>) -> Result<Response> {
        let url = format!("{}{}", self.api_url, request.path);
        let mut builder = self.client.request(request.method.clone(), &url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(fields) => builder.multipart(build_form(fields)?),
        };

        match builder.send().await {
            Ok(response) => {
                tracing::debug!(status = %response.status(), url = %url, "Received HTTP response");
                Ok(response)
            }
            Err(e) => {
                let error_kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connection_failed"
                } else if e.is_request() {
                    "request_error"
                } else if e.is_body() {
                    "body_error"
                } else {
                    "unknown"
                };

                tracing::warn!(
                    error_kind = error_kind,
                    error = %e,
                    url = %url,
                    "HTTP request error"
                );

                Err(ApiError::Transport(format!(
                    "HTTP request failed: {} (kind: {})",
                    e, error_kind
                )))
            }
        }
    }

    async fn check(response: Response) -> Result<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::into_error(response).await)
        }
    }

    /// Normalize a non-success response
    async fn into_error(response: Response) -> ApiError {
        let status = response.status();
        let url = response.url().clone();
        let body = response.text().await.unwrap_or_default();
        let message = extract_message(&body);

        tracing::debug!(
            status = status.as_u16(),
            url = %url,
            response_body = %body,
            "HTTP request failed with error response"
        );

        if status == StatusCode::UNAUTHORIZED {
            ApiError::Unauthorized { message }
        } else {
            ApiError::HttpError {
                status: status.as_u16(),
                message,
            }
        }
    }
}

fn build_form(fields: &[FormField]) -> Result<Form> {
    let mut form = Form::new();
    for field in fields {
        form = match &field.value {
            FormValue::Text(text) => form.text(field.name.clone(), text.clone()),
            FormValue::File {
                file_name,
                mime,
                data,
            } => {
                let mut part = Part::bytes(data.to_vec()).file_name(file_name.clone());
                if let Some(mime) = mime {
                    part = part.mime_str(mime).map_err(|e| {
                        ApiError::ValidationError(format!("Invalid content type {}: {}", mime, e))
                    })?;
                }
                form.part(field.name.clone(), part)
            }
        };
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let req = ApiRequest::get("storages")
            .query("parent_id", "abc")
            .exempt();
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.path, "/storages");
        assert_eq!(req.query, vec![("parent_id".to_string(), "abc".to_string())]);
        assert_eq!(req.policy, AuthPolicy::Exempt);

        let req = ApiRequest::post("/auth/signin").json(serde_json::json!({"login": "alice"}));
        assert_eq!(req.policy, AuthPolicy::Protected);
        assert!(matches!(req.body, RequestBody::Json(_)));

        let req = ApiRequest::post("/auth/logout").no_retry();
        assert_eq!(req.policy, AuthPolicy::NoRetry);
    }

    #[test]
    fn test_build_form_rejects_bad_mime() {
        let fields = vec![FormField::file(
            "file",
            "photo.png",
            Some("not a mime".to_string()),
            Bytes::from_static(b"png"),
        )];
        assert!(matches!(
            build_form(&fields),
            Err(ApiError::ValidationError(_))
        ));

        let fields = vec![
            FormField::text("name", "bolt"),
            FormField::file(
                "file",
                "photo.png",
                Some("image/png".to_string()),
                Bytes::from_static(b"png"),
            ),
        ];
        assert!(build_form(&fields).is_ok());
    }
}
