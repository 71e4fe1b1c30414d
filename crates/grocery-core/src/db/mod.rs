//! Database layer for the grocery engine

mod connection;
mod live;
mod migrations;
mod outbox;
mod store;
mod sync_state;
mod tables;

pub use connection::Database;
pub use live::LiveQuery;
pub use outbox::{OutboxEntry, SqliteOutbox};
pub use store::{EntityStore, StoreTx};
pub use sync_state::{SqliteSyncStateRepository, SyncStamp, SyncStateRepository};
pub use tables::Table;
