use std::sync::Arc;

use crate::error::Result;
use crate::http_client::{ApiRequest, StorehouseHttpClient};
use crate::models::Unit;

/// `/units` resource
#[derive(Clone)]
pub struct UnitApi {
    http: Arc<StorehouseHttpClient>,
}

impl UnitApi {
    pub fn new(http: Arc<StorehouseHttpClient>) -> Self {
        Self { http }
    }

    pub async fn list(&self) -> Result<Vec<Unit>> {
        self.http.send_json(ApiRequest::get("/units")).await
    }
}
