use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{validate_name, EntityRef, Unit};
use crate::error::ApiError;

pub const NAME_MAX_LENGTH: usize = 50;
pub const CAPACITY_MIN: f64 = 1.0;
pub const CAPACITY_MAX: f64 = 999_999.0;

/// Storage location; parents form a forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Storage {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub capacity: f64,
    /// Current fill level, in the storage's unit
    #[serde(default)]
    pub fullness: f64,
    #[serde(default)]
    pub unit: Option<Unit>,
    #[serde(default, alias = "parentId")]
    pub parent_id: Option<Uuid>,
    #[serde(default, skip_serializing)]
    pub parent: Option<EntityRef>,
    #[serde(default, alias = "isDeleted", alias = "is_deleted")]
    pub deleted: bool,
}

impl Storage {
    /// Parent id from whichever form the server used
    pub fn parent(&self) -> Option<Uuid> {
        self.parent_id.or_else(|| self.parent.map(|p| p.id()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageCreate {
    pub name: String,
    pub capacity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
}

impl StorageCreate {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_name("Storage name", &self.name, NAME_MAX_LENGTH)?;
        validate_capacity(self.capacity)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StorageUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
}

impl StorageUpdate {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(name) = &self.name {
            validate_name("Storage name", name, NAME_MAX_LENGTH)?;
        }
        if let Some(capacity) = self.capacity {
            validate_capacity(capacity)?;
        }
        Ok(())
    }
}

fn validate_capacity(capacity: f64) -> Result<(), ApiError> {
    if !(CAPACITY_MIN..=CAPACITY_MAX).contains(&capacity) {
        return Err(ApiError::ValidationError(format!(
            "Capacity must be between {} and {}",
            CAPACITY_MIN, CAPACITY_MAX
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parent_from_embedded_entity() {
        let parent = Uuid::new_v4();
        let storage: Storage = serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "name": "Shelf",
            "capacity": 10.0,
            "unit": {"id": Uuid::new_v4(), "name": "Pieces", "symbol": "pcs"},
            "parent": {"id": parent, "name": "Room"},
            "createdBy": Uuid::new_v4(),
            "deleted": false
        }))
        .unwrap();
        assert_eq!(storage.parent(), Some(parent));
        assert_eq!(storage.fullness, 0.0);
    }

    #[test]
    fn test_parent_from_flat_id() {
        let parent = Uuid::new_v4();
        let storage: Storage = serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "name": "Shelf",
            "parentId": parent
        }))
        .unwrap();
        assert_eq!(storage.parent(), Some(parent));
    }

    #[test]
    fn test_create_validation_and_wire_names() {
        let create = StorageCreate {
            name: "Main hall".to_string(),
            capacity: 100.0,
            unit_id: None,
            parent_id: Some(Uuid::nil()),
        };
        assert!(create.validate().is_ok());
        let value = serde_json::to_value(&create).unwrap();
        assert!(value.get("parent_id").is_some());
        assert!(value.get("unit_id").is_none());

        let too_small = StorageCreate {
            capacity: 0.5,
            ..create
        };
        assert!(too_small.validate().is_err());
    }

    #[test]
    fn test_update_serializes_only_present_fields() {
        let update = StorageUpdate {
            capacity: Some(20.0),
            ..Default::default()
        };
        assert!(update.validate().is_ok());
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({"capacity": 20.0}));
    }
}
