use bytes::Bytes;
use std::sync::Arc;
use uuid::Uuid;

use super::to_body;
use crate::error::Result;
use crate::http_client::{ApiRequest, FormField, StorehouseHttpClient};
use crate::models::{ObjectCreate, ObjectQuery, ObjectUpdate, StorageObject};

/// `/objects` resource
#[derive(Clone)]
pub struct ObjectApi {
    http: Arc<StorehouseHttpClient>,
}

impl ObjectApi {
    pub fn new(http: Arc<StorehouseHttpClient>) -> Self {
        Self { http }
    }

    pub async fn list(&self, query: &ObjectQuery) -> Result<Vec<StorageObject>> {
        let request = query
            .pairs()
            .into_iter()
            .fold(ApiRequest::get("/objects"), |req, (k, v)| req.query(k, v));
        self.http.send_json(request).await
    }

    pub async fn get(&self, id: Uuid) -> Result<StorageObject> {
        self.http
            .send_json(ApiRequest::get(format!("/objects/{}", id)))
            .await
    }

    pub async fn create(&self, data: &ObjectCreate) -> Result<StorageObject> {
        data.validate()?;
        let request = ApiRequest::post("/objects").json(to_body(data)?);
        let object: StorageObject = self.http.send_json(request).await?;
        tracing::info!(id = %object.id, name = %object.name, "Object created");
        Ok(object)
    }

    pub async fn update(&self, id: Uuid, data: &ObjectUpdate) -> Result<StorageObject> {
        data.validate()?;
        let request = ApiRequest::patch(format!("/objects/{}", id)).json(to_body(data)?);
        self.http.send_json(request).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.http
            .send_empty(ApiRequest::delete(format!("/objects/{}", id)))
            .await
    }

    /// QR code image identifying the object
    pub async fn qr_code(&self, id: Uuid) -> Result<Bytes> {
        self.http
            .send_bytes(ApiRequest::get(format!("/objects/{}/qrcode", id)))
            .await
    }

    pub async fn photo(&self, id: Uuid) -> Result<Bytes> {
        self.http
            .send_bytes(ApiRequest::get(format!("/objects/{}/image", id)))
            .await
    }

    pub async fn upload_photo(
        &self,
        id: Uuid,
        file_name: &str,
        mime: Option<&str>,
        data: Bytes,
    ) -> Result<()> {
        let fields = vec![FormField::file(
            "photo",
            file_name,
            mime.map(str::to_string),
            data,
        )];
        self.http
            .send_empty(ApiRequest::post(format!("/objects/{}/image", id)).multipart(fields))
            .await
    }
}
