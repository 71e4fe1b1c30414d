//! Backend access
//!
//! [`RemoteApi`] is the seam between the sync engine and the HTTP backend.
//! [`HttpRemoteClient`] is the production implementation.

mod http;

pub use http::HttpRemoteClient;

use std::future::Future;

use thiserror::Error;

use crate::models::{GroceryItem, GroceryList, ItemId, ListId, SyncSnapshot};

/// Failure of a single backend call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Connection, timeout or transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status
    #[error("Backend error: {message}")]
    Http { status: u16, message: String },

    /// The response body could not be decoded
    #[error("Invalid backend payload: {0}")]
    Decode(String),

    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
}

impl RemoteError {
    /// Whether the backend reported the target as missing
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Http { status: 404, .. })
    }

    /// Whether the backend refused the request itself
    ///
    /// Only 4xx answers count, except timeouts and rate limiting. Network
    /// failures, 5xx answers and unreadable replies may succeed later.
    pub const fn is_rejection(&self) -> bool {
        match self {
            Self::Http { status, .. } => {
                *status >= 400 && *status < 500 && *status != 408 && *status != 429
            }
            Self::Network(_) | Self::Decode(_) | Self::InvalidConfiguration(_) => false,
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Operations the backend exposes
///
/// `create_*` calls are upserts on the backend and serve both creates and
/// updates. Implementations do not retry.
pub trait RemoteApi: Send + Sync + 'static {
    /// Every list and item for `user_id`, tombstones included
    fn fetch_snapshot(&self, user_id: &str)
        -> impl Future<Output = RemoteResult<SyncSnapshot>> + Send;

    fn create_list(
        &self,
        list: &GroceryList,
    ) -> impl Future<Output = RemoteResult<GroceryList>> + Send;

    fn delete_list(&self, id: &ListId) -> impl Future<Output = RemoteResult<()>> + Send;

    fn create_item(
        &self,
        item: &GroceryItem,
    ) -> impl Future<Output = RemoteResult<GroceryItem>> + Send;

    fn delete_item(&self, id: &ItemId) -> impl Future<Output = RemoteResult<()>> + Send;

    /// Physically remove the completed items of a list
    fn clear_completed(&self, list_id: &ListId) -> impl Future<Output = RemoteResult<()>> + Send;

    /// Wipe every list and item of `user_id`; the backend answers with a message
    fn clear_all(
        &self,
        user_id: &str,
        confirm_token: &str,
    ) -> impl Future<Output = RemoteResult<String>> + Send;
}
