//! Data models for the grocery engine

mod category;
mod ids;
mod item;
mod list;
mod mirror;
mod snapshot;

pub use category::{Category, ListCategory};
pub use ids::{ItemId, ListId};
pub use item::GroceryItem;
pub use list::{GroceryList, DEFAULT_USER_ID};
pub use mirror::MirrorOp;
pub use snapshot::SyncSnapshot;

use serde::{Deserialize, Deserializer};
use std::fmt;

/// The two synchronized record kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    List,
    Item,
}

impl EntityKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Item => "item",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record that takes part in last-write-wins merging
pub trait Record: Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id_str(&self) -> &str;

    /// Last modification time in Unix ms
    fn updated_at(&self) -> i64;

    fn is_deleted(&self) -> bool;
}

/// Decode `null` as the type's default value.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
