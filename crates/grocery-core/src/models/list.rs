//! Grocery list model

use serde::{Deserialize, Serialize};

use super::{null_as_default, EntityKind, ListCategory, ListId, Record};

/// User id stamped on lists when none is configured
pub const DEFAULT_USER_ID: &str = "shared-user";

/// A named grocery list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroceryList {
    pub id: ListId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Owning user, stamped when the list is created locally
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: ListCategory,
    /// Creation timestamp (Unix ms)
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    #[serde(default, deserialize_with = "null_as_default")]
    pub updated_at: i64,
    /// Soft delete flag for sync
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_deleted: bool,
}

impl GroceryList {
    /// Create a new list stamped with the current time
    #[must_use]
    pub fn new(name: impl Into<String>, category: ListCategory) -> Self {
        Self::new_at(name, category, chrono::Utc::now().timestamp_millis())
    }

    /// Create a new list stamped with `now_ms`
    #[must_use]
    pub fn new_at(name: impl Into<String>, category: ListCategory, now_ms: i64) -> Self {
        Self {
            id: ListId::new(),
            name: name.into(),
            user_id: None,
            category,
            created_at: now_ms,
            updated_at: now_ms,
            is_deleted: false,
        }
    }
}

impl Record for GroceryList {
    const KIND: EntityKind = EntityKind::List;

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
