// Wiring of the session, refresh coordinator, pipeline and resource handles

use anyhow::Result;
use reqwest::cookie::Jar;
use std::sync::Arc;

use crate::api::{ObjectApi, StorageApi, TemplateApi, UnitApi};
use crate::auth::{AuthManager, DurableSlot, RefreshCoordinator, Session, SqliteSlot};
use crate::config::Config;
use crate::http_client::StorehouseHttpClient;

/// Everything one client process shares
///
/// The session, the refresh coordinator and the pipeline are built once and
/// handed out as `Arc`s so every resource handle observes the same token.
pub struct AppContext {
    pub config: Config,
    auth: AuthManager,
    http: Arc<StorehouseHttpClient>,
}

impl AppContext {
    /// Build the context over the SQLite session database
    pub fn new(config: Config) -> Result<Self> {
        let slot = Arc::new(SqliteSlot::open(&config.session_db)?);
        Self::with_slot(config, slot)
    }

    /// Build the context over any durable slot
    pub fn with_slot(config: Config, slot: Arc<dyn DurableSlot>) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let origin = config.cookie_origin()?;

        let client = StorehouseHttpClient::build_transport(
            jar.clone(),
            config.http_connect_timeout,
            config.http_request_timeout,
        )?;

        let session = Arc::new(Session::open(slot, jar, origin));
        let refresher = Arc::new(RefreshCoordinator::new(
            client.clone(),
            &config.api_url,
            session.clone(),
        ));
        let http = Arc::new(StorehouseHttpClient::new(
            client,
            &config.api_url,
            session.clone(),
            refresher.clone(),
        ));
        let auth = AuthManager::new(http.clone(), session, refresher);

        tracing::debug!(api_url = %config.api_url, "Client context initialized");

        Ok(Self { config, auth, http })
    }

    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    pub fn http(&self) -> &Arc<StorehouseHttpClient> {
        &self.http
    }

    pub fn storages(&self) -> StorageApi {
        StorageApi::new(self.http.clone())
    }

    pub fn objects(&self) -> ObjectApi {
        ObjectApi::new(self.http.clone())
    }

    pub fn templates(&self) -> TemplateApi {
        TemplateApi::new(self.http.clone())
    }

    pub fn units(&self) -> UnitApi {
        UnitApi::new(self.http.clone())
    }
}
