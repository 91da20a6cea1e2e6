use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Measurement unit (pieces, kilograms, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub symbol: String,
}
