use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A generic entity persisted by a repository adapter.
///
/// All addon data flows through this type. The `data` field holds an
/// arbitrary JSON object whose structure is defined by the owning addon;
/// the adapters never interpret it beyond (de)serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub data: serde_json::Value,
}

impl Entity {
    /// Creates an entity with an explicit id.
    pub fn new(id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Creates an entity with no id yet; the backend assigns one on save.
    pub fn unsaved(data: serde_json::Value) -> Self {
        Self {
            id: String::new(),
            data,
        }
    }

    /// Assigns a UUID v7 id if none is set, returning the effective id.
    /// Called by adapters on `save` so returned entities always carry a key.
    pub fn ensure_id(&mut self) -> &str {
        if self.id.is_empty() {
            self.id = Uuid::now_v7().to_string();
        }
        &self.id
    }

    /// Extract a string value from `data` using a JSON pointer (e.g., "/title").
    pub fn get_str(&self, pointer: &str) -> Option<&str> {
        self.data.pointer(pointer).and_then(|v| v.as_str())
    }

    /// Extract a boolean value from `data` using a JSON pointer.
    pub fn get_bool(&self, pointer: &str) -> Option<bool> {
        self.data.pointer(pointer).and_then(|v| v.as_bool())
    }

    /// Extract a numeric value from `data` using a JSON pointer.
    pub fn get_number(&self, pointer: &str) -> Option<f64> {
        self.data.pointer(pointer).and_then(|v| v.as_f64())
    }

    /// Merges a partial field update into `data`, shallow per top-level key.
    /// Fails if `data` is not a JSON object.
    pub fn merge_fields(
        &mut self,
        fields: &serde_json::Map<String, serde_json::Value>,
    ) -> crate::Result<()> {
        let obj = self
            .data
            .as_object_mut()
            .ok_or(crate::Error::NonObjectData)?;
        for (key, value) in fields {
            obj.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}
