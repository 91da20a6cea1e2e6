// Data models for the Storehouse API

pub mod object;
pub mod storage;
pub mod template;
pub mod unit;

pub use object::{ObjectCreate, ObjectQuery, ObjectUpdate, StorageObject};
pub use storage::{Storage, StorageCreate, StorageUpdate};
pub use template::{AttributeType, ObjectTemplate, TemplateAttribute, TemplateCreate, TemplateQuery, TemplateUpdate};
pub use unit::Unit;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9\sа-яА-ЯёЁ]+$").expect("valid name regex"));

/// Reference to a related entity; the server sends either the bare id or the
/// embedded entity, of which only the id is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityRef {
    Id(Uuid),
    Embedded { id: Uuid },
}

impl EntityRef {
    pub fn id(&self) -> Uuid {
        match self {
            EntityRef::Id(id) | EntityRef::Embedded { id } => *id,
        }
    }
}

/// Names accept letters, digits and spaces only, as the server enforces
pub(crate) fn validate_name(field: &str, value: &str, max_len: usize) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::ValidationError(format!("{} cannot be blank", field)));
    }
    if value.chars().count() > max_len {
        return Err(ApiError::ValidationError(format!(
            "{} must not exceed {} characters",
            field, max_len
        )));
    }
    if !NAME_PATTERN.is_match(value) {
        return Err(ApiError::ValidationError(format!(
            "{}: only letters, numbers and spaces allowed",
            field
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ref_forms() {
        let id = Uuid::new_v4();
        let bare: EntityRef = serde_json::from_value(serde_json::json!(id)).unwrap();
        let embedded: EntityRef =
            serde_json::from_value(serde_json::json!({"id": id, "name": "Shelf"})).unwrap();
        assert_eq!(bare.id(), id);
        assert_eq!(embedded.id(), id);
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Name", "Shelf 2", 50).is_ok());
        assert!(validate_name("Name", "Полка 3", 50).is_ok());
        assert!(validate_name("Name", "   ", 50).is_err());
        assert!(validate_name("Name", "Shelf #2", 50).is_err());
        assert!(validate_name("Name", &"x".repeat(51), 50).is_err());
    }
}
