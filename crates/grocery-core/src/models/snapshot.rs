//! Full backend snapshot

use serde::{Deserialize, Serialize};

use super::{null_as_default, GroceryItem, GroceryList};

/// Every list and item the backend knows about for one user, tombstones included
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    #[serde(default, deserialize_with = "null_as_default")]
    pub lists: Vec<GroceryList>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<GroceryItem>,
}

impl SyncSnapshot {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lists.is_empty() && self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_collections_decode_empty() {
        let snapshot: SyncSnapshot = serde_json::from_str(r#"{"lists":null}"#).unwrap();
        assert!(snapshot.is_empty());
    }
}
