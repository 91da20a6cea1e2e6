// Typed handles over the authenticated pipeline, one per resource

mod objects;
mod storages;
mod templates;
mod units;

pub use objects::ObjectApi;
pub use storages::StorageApi;
pub use templates::TemplateApi;
pub use units::UnitApi;

use anyhow::Context;
use serde::Serialize;

use crate::error::Result;

/// Encode a request DTO for the pipeline
fn to_body<T: Serialize>(dto: &T) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(dto).context("Failed to encode request body")?)
}
