use std::sync::Arc;
use uuid::Uuid;

use super::to_body;
use crate::error::Result;
use crate::http_client::{ApiRequest, StorehouseHttpClient};
use crate::models::{Storage, StorageCreate, StorageUpdate};

/// `/storages` resource
#[derive(Clone)]
pub struct StorageApi {
    http: Arc<StorehouseHttpClient>,
}

impl StorageApi {
    pub fn new(http: Arc<StorehouseHttpClient>) -> Self {
        Self { http }
    }

    /// All storages, or the direct children of `parent`
    pub async fn list(&self, parent: Option<Uuid>) -> Result<Vec<Storage>> {
        let mut request = ApiRequest::get("/storages");
        if let Some(parent) = parent {
            request = request.query("parent_id", parent);
        }
        self.http.send_json(request).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Storage> {
        self.http
            .send_json(ApiRequest::get(format!("/storages/{}", id)))
            .await
    }

    pub async fn create(&self, data: &StorageCreate) -> Result<Storage> {
        data.validate()?;
        let request = ApiRequest::post("/storages").json(to_body(data)?);
        let storage: Storage = self.http.send_json(request).await?;
        tracing::info!(id = %storage.id, name = %storage.name, "Storage created");
        Ok(storage)
    }

    pub async fn update(&self, id: Uuid, data: &StorageUpdate) -> Result<Storage> {
        data.validate()?;
        let request = ApiRequest::patch(format!("/storages/{}", id)).json(to_body(data)?);
        self.http.send_json(request).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.http
            .send_empty(ApiRequest::delete(format!("/storages/{}", id)))
            .await?;
        tracing::info!(id = %id, "Storage deleted");
        Ok(())
    }
}
