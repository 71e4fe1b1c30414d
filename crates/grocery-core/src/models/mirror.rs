//! Pending backend writes

use serde::{Deserialize, Serialize};

use super::{GroceryItem, GroceryList, ItemId, ListId};

/// A local write that still has to reach the backend
///
/// Stored as JSON in the outbox so it survives restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MirrorOp {
    UpsertList { list: GroceryList },
    DeleteList { id: ListId },
    UpsertItem { item: GroceryItem },
    DeleteItem { id: ItemId },
    ClearCompleted { list_id: ListId },
}

impl MirrorOp {
    /// Record key used to supersede older pending writes for the same record.
    ///
    /// Upserts and deletes of one record share a key; a newer op replaces an
    /// older one still waiting in the outbox.
    #[must_use]
    pub fn record_key(&self) -> String {
        match self {
            Self::UpsertList { list } => format!("list:{}", list.id),
            Self::DeleteList { id } => format!("list:{id}"),
            Self::UpsertItem { item } => format!("item:{}", item.id),
            Self::DeleteItem { id } => format!("item:{id}"),
            Self::ClearCompleted { list_id } => format!("list:{list_id}:completed"),
        }
    }

    /// Short name for logs
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::UpsertList { .. } => "upsert_list",
            Self::DeleteList { .. } => "delete_list",
            Self::UpsertItem { .. } => "upsert_item",
            Self::DeleteItem { .. } => "delete_item",
            Self::ClearCompleted { .. } => "clear_completed",
        }
    }

    #[must_use]
    pub const fn is_delete(&self) -> bool {
        matches!(
            self,
            Self::DeleteList { .. } | Self::DeleteItem { .. } | Self::ClearCompleted { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListCategory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_upsert_and_delete_share_key() {
        let list = GroceryList::new_at("Weekly", ListCategory::Rema, 1);
        let upsert = MirrorOp::UpsertList { list: list.clone() };
        let delete = MirrorOp::DeleteList {
            id: list.id.clone(),
        };
        assert_eq!(upsert.record_key(), delete.record_key());

        let clear = MirrorOp::ClearCompleted { list_id: list.id };
        assert_ne!(clear.record_key(), delete.record_key());
    }

    #[test]
    fn test_payload_round_trips_through_json() {
        let op = MirrorOp::DeleteItem {
            id: ItemId::from("I9"),
        };
        let json = serde_json::to_string(&op).unwrap();
        assert!(json.contains("\"op\":\"delete_item\""));
        let back: MirrorOp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, op);
    }
}
