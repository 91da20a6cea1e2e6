use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::validate_name;
use crate::error::ApiError;

pub const NAME_MAX_LENGTH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttributeType {
    Text,
    Number,
    Date,
    File,
    Boolean,
}

/// One attribute definition in a template schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateAttribute {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AttributeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

/// Object template
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObjectTemplate {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Attribute schema; stored server-side as JSON text
    #[serde(default)]
    pub schema: Value,
    #[serde(default, alias = "isDeleted", alias = "is_deleted")]
    pub deleted: bool,
}

impl ObjectTemplate {
    /// Typed schema, decoding the string form when needed
    pub fn attributes(&self) -> BTreeMap<String, TemplateAttribute> {
        let decoded;
        let schema = match &self.schema {
            Value::String(raw) => {
                decoded = serde_json::from_str::<Value>(raw).unwrap_or(Value::Null);
                &decoded
            }
            other => other,
        };

        serde_json::from_value(schema.clone()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateCreate {
    pub name: String,
    pub description: String,
    pub schema: BTreeMap<String, TemplateAttribute>,
}

impl TemplateCreate {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_name("Template name", &self.name, NAME_MAX_LENGTH)?;
        validate_name("Template description", &self.description, 255)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TemplateUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_deleted: Option<bool>,
}

/// Filters for listing templates
#[derive(Debug, Clone, Default)]
pub struct TemplateQuery {
    pub deleted: Option<bool>,
    pub name: Option<String>,
}

impl TemplateQuery {
    /// Only templates still in use
    pub fn active() -> Self {
        Self {
            deleted: Some(false),
            name: None,
        }
    }

    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(flag) = self.deleted {
            pairs.push(("is_deleted", flag.to_string()));
        }
        if let Some(name) = &self.name {
            pairs.push(("name", name.clone()));
        }
        pairs
    }
}
