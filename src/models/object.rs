use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{validate_name, EntityRef, Unit};
use crate::error::ApiError;

pub const NAME_MAX_LENGTH: usize = 100;

/// Physical object registered against a template
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StorageObject {
    pub id: Uuid,
    pub name: String,
    #[serde(default, alias = "template_id")]
    pub template: Option<EntityRef>,
    #[serde(default, alias = "storage_id")]
    pub storage: Option<EntityRef>,
    #[serde(default)]
    pub size: f64,
    #[serde(default)]
    pub unit: Option<Unit>,
    /// Attribute values; the server may send them as a JSON-encoded string
    #[serde(default)]
    pub attributes: Value,
    #[serde(default, alias = "photoUrl")]
    pub photo_url: Option<String>,
    #[serde(default, alias = "is_decommissioned")]
    pub decommissioned: bool,
}

impl StorageObject {
    pub fn template_id(&self) -> Option<Uuid> {
        self.template.map(|t| t.id())
    }

    pub fn storage_id(&self) -> Option<Uuid> {
        self.storage.map(|s| s.id())
    }

    /// Attributes as an object, decoding the string form when needed
    pub fn attribute_map(&self) -> Map<String, Value> {
        match &self.attributes {
            Value::Object(map) => map.clone(),
            Value::String(raw) => match serde_json::from_str(raw) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            },
            _ => Map::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectCreate {
    pub name: String,
    pub template_id: Uuid,
    pub storage_id: Uuid,
    pub size: f64,
    pub unit_id: Uuid,
    pub attributes: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

impl ObjectCreate {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_name("Object name", &self.name, NAME_MAX_LENGTH)?;
        validate_size(self.size)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ObjectUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_decommissioned: Option<bool>,
}

impl ObjectUpdate {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(name) = &self.name {
            validate_name("Object name", name, NAME_MAX_LENGTH)?;
        }
        if let Some(size) = self.size {
            validate_size(size)?;
        }
        Ok(())
    }
}

fn validate_size(size: f64) -> Result<(), ApiError> {
    if size < 0.0 || !size.is_finite() {
        return Err(ApiError::ValidationError(
            "Size can't be negative".to_string(),
        ));
    }
    Ok(())
}

/// Filters for listing objects
#[derive(Debug, Clone, Default)]
pub struct ObjectQuery {
    pub storage_id: Option<Uuid>,
    pub template_id: Option<Uuid>,
    pub decommissioned: Option<bool>,
}

impl ObjectQuery {
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(id) = self.storage_id {
            pairs.push(("storage_id", id.to_string()));
        }
        if let Some(id) = self.template_id {
            pairs.push(("template_id", id.to_string()));
        }
        if let Some(flag) = self.decommissioned {
            pairs.push(("decommissioned", flag.to_string()));
        }
        pairs
    }
}
