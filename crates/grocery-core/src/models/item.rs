//! Grocery item model

use serde::{Deserialize, Serialize};

use super::{null_as_default, Category, EntityKind, ItemId, ListId, Record};

/// A single line on a grocery list
///
/// Quantity, unit, notes and price are free text as entered by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroceryItem {
    pub id: ItemId,
    pub list_id: ListId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub quantity: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub unit: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: Category,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_completed: bool,
    /// Lower sorts first
    #[serde(default, deserialize_with = "null_as_default")]
    pub priority: i32,
    /// Creation timestamp (Unix ms)
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    #[serde(default, deserialize_with = "null_as_default")]
    pub updated_at: i64,
    /// Soft delete flag for sync
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_deleted: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub on_offer: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub price: String,
}

impl GroceryItem {
    /// Create a new item on `list_id` stamped with the current time
    #[must_use]
    pub fn new(list_id: ListId, name: impl Into<String>) -> Self {
        Self::new_at(list_id, name, chrono::Utc::now().timestamp_millis())
    }

    /// Create a new item on `list_id` stamped with `now_ms`
    #[must_use]
    pub fn new_at(list_id: ListId, name: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id: ItemId::new(),
            list_id,
            name: name.into(),
            quantity: String::new(),
            unit: String::new(),
            notes: String::new(),
            category: Category::default(),
            is_completed: false,
            priority: 0,
            created_at: now_ms,
            updated_at: now_ms,
            is_deleted: false,
            on_offer: false,
            price: String::new(),
        }
    }

    /// Copy this item onto another list under a fresh id
    #[must_use]
    pub fn copy_to(&self, list_id: ListId, now_ms: i64) -> Self {
        Self {
            id: ItemId::new(),
            list_id,
            created_at: now_ms,
            updated_at: now_ms,
            is_deleted: false,
            ..self.clone()
        }
    }
}

impl Record for GroceryItem {
    const KIND: EntityKind = EntityKind::Item;

    fn id_str(&self) -> &str {
        self.id.as_str()
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn is_deleted(&self) -> bool {
        self.is_deleted
    }
}
