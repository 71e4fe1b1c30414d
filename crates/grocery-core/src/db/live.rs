//! Live query subscriptions

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::Result;

type Fetch<T> = Arc<dyn Fn() -> Result<T> + Send + Sync>;

/// A query that re-emits its result whenever the underlying collection changes
///
/// The first call to [`LiveQuery::next`] yields the current value. Each later
/// call waits for a committed write to the watched table and yields the fresh
/// value. Several writes between two calls collapse into one emission.
/// Dropping the query unsubscribes.
pub struct LiveQuery<T> {
    changes: watch::Receiver<u64>,
    fetch: Fetch<T>,
    primed: bool,
}

impl<T: Send + 'static> LiveQuery<T> {
    pub(crate) fn new(changes: watch::Receiver<u64>, fetch: Fetch<T>) -> Self {
        Self {
            changes,
            fetch,
            primed: false,
        }
    }

    /// Wait for the next value
    ///
    /// Returns `None` if the change feed has closed.
    pub async fn next(&mut self) -> Option<Result<T>> {
        if self.primed {
            self.changes.changed().await.ok()?;
        }
        self.primed = true;
        self.changes.mark_unchanged();

        let fetch = Arc::clone(&self.fetch);
        Some(match tokio::task::spawn_blocking(move || fetch()).await {
            Ok(result) => result,
            Err(error) => Err(error.into()),
        })
    }

    /// Run the query now on the calling thread
    pub fn current(&self) -> Result<T> {
        (self.fetch)()
    }

    /// Stop listening for changes
    pub fn cancel(self) {}
}

impl<T> fmt::Debug for LiveQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveQuery")
            .field("revision", &*self.changes.borrow())
            .field("primed", &self.primed)
            .finish_non_exhaustive()
    }
}
