//! grocery-core - Core library for grocery lists
//!
//! This crate contains the models, local store, backend client and sync
//! engine shared by every grocery front end. Writes land locally first and are
//! mirrored to the backend through a durable outbox; full syncs pull the
//! backend snapshot and merge it with last-write-wins.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod repository;
pub mod state;
pub mod sync;
pub mod util;

#[cfg(test)]
mod testing;

pub use config::EngineConfig;
pub use db::EntityStore;
pub use error::{Error, Result};
pub use models::{Category, GroceryItem, GroceryList, ItemId, ListCategory, ListId};
pub use remote::{HttpRemoteClient, RemoteApi, RemoteError};
pub use repository::{ClearAllReport, Repository};
pub use state::SyncState;
pub use sync::{SyncError, SyncOutcome, SyncReport};
