use std::sync::Arc;
use uuid::Uuid;

use super::to_body;
use crate::error::Result;
use crate::http_client::{ApiRequest, StorehouseHttpClient};
use crate::models::{ObjectTemplate, TemplateCreate, TemplateQuery, TemplateUpdate};

/// `/templates` resource
#[derive(Clone)]
pub struct TemplateApi {
    http: Arc<StorehouseHttpClient>,
}

impl TemplateApi {
    pub fn new(http: Arc<StorehouseHttpClient>) -> Self {
        Self { http }
    }

    pub async fn list(&self, query: &TemplateQuery) -> Result<Vec<ObjectTemplate>> {
        let request = query
            .pairs()
            .into_iter()
            .fold(ApiRequest::get("/templates"), |req, (k, v)| req.query(k, v));
        self.http.send_json(request).await
    }

    pub async fn get(&self, id: Uuid) -> Result<ObjectTemplate> {
        self.http
            .send_json(ApiRequest::get(format!("/templates/{}", id)))
            .await
    }

    pub async fn create(&self, data: &TemplateCreate) -> Result<ObjectTemplate> {
        data.validate()?;
        let request = ApiRequest::post("/templates").json(to_body(data)?);
        self.http.send_json(request).await
    }

    pub async fn update(&self, id: Uuid, data: &TemplateUpdate) -> Result<ObjectTemplate> {
        let request = ApiRequest::patch(format!("/templates/{}", id)).json(to_body(data)?);
        self.http.send_json(request).await
    }

    /// Marks the template deleted; existing objects keep referring to it
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.http
            .send_empty(ApiRequest::delete(format!("/templates/{}", id)))
            .await
    }
}
