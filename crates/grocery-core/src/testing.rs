//! In-memory backend for tests

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::models::{GroceryItem, GroceryList, ItemId, ListId, SyncSnapshot};
use crate::remote::{RemoteApi, RemoteError, RemoteResult};

#[derive(Default)]
struct FakeState {
    lists: BTreeMap<String, GroceryList>,
    items: BTreeMap<String, GroceryItem>,
    fail_snapshot: Option<RemoteError>,
    fail_writes: Option<RemoteError>,
    fetch_delay: Option<Duration>,
    clear_all_calls: Vec<(String, String)>,
}

/// A backend that keeps lists and items in memory
///
/// Deletes are soft (the record stays with `is_deleted` set), missing
/// targets answer 404, and failures can be injected per call family.
#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<FakeState>,
    snapshot_fetches: AtomicUsize,
    list_writes: AtomicUsize,
    item_writes: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Replace everything the backend holds
    pub fn set_snapshot(&self, snapshot: SyncSnapshot) {
        let mut state = self.state();
        state.lists = snapshot
            .lists
            .into_iter()
            .map(|list| (list.id.to_string(), list))
            .collect();
        state.items = snapshot
            .items
            .into_iter()
            .map(|item| (item.id.to_string(), item))
            .collect();
    }

    pub fn list(&self, id: &ListId) -> Option<GroceryList> {
        self.state().lists.get(id.as_str()).cloned()
    }

    pub fn item(&self, id: &ItemId) -> Option<GroceryItem> {
        self.state().items.get(id.as_str()).cloned()
    }

    pub fn fail_snapshot(&self, error: Option<RemoteError>) {
        self.state().fail_snapshot = error;
    }

    /// Fail every create, delete and clear call
    pub fn fail_writes(&self, error: Option<RemoteError>) {
        self.state().fail_writes = error;
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        self.state().fetch_delay = Some(delay);
    }

    pub fn snapshot_fetches(&self) -> usize {
        self.snapshot_fetches.load(Ordering::SeqCst)
    }

    /// Successful list creates and deletes
    pub fn list_writes(&self) -> usize {
        self.list_writes.load(Ordering::SeqCst)
    }

    /// Successful item creates and deletes
    pub fn item_writes(&self) -> usize {
        self.item_writes.load(Ordering::SeqCst)
    }

    pub fn clear_all_calls(&self) -> Vec<(String, String)> {
        self.state().clear_all_calls.clone()
    }

    fn check_writes(&self) -> RemoteResult<()> {
        self.state().fail_writes.clone().map_or(Ok(()), Err)
    }
}

fn not_found(what: &str) -> RemoteError {
    RemoteError::Http {
        status: 404,
        message: format!("{what} not found (404)"),
    }
}

impl RemoteApi for FakeRemote {
    async fn fetch_snapshot(&self, _user_id: &str) -> RemoteResult<SyncSnapshot> {
        self.snapshot_fetches.fetch_add(1, Ordering::SeqCst);
        let delay = self.state().fetch_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state();
        if let Some(error) = state.fail_snapshot.clone() {
            return Err(error);
        }
        Ok(SyncSnapshot {
            lists: state.lists.values().cloned().collect(),
            items: state.items.values().cloned().collect(),
        })
    }

    async fn create_list(&self, list: &GroceryList) -> RemoteResult<GroceryList> {
        self.check_writes()?;
        self.state()
            .lists
            .insert(list.id.to_string(), list.clone());
        self.list_writes.fetch_add(1, Ordering::SeqCst);
        Ok(list.clone())
    }

    async fn delete_list(&self, id: &ListId) -> RemoteResult<()> {
        self.check_writes()?;
        let mut state = self.state();
        let list = state
            .lists
            .get_mut(id.as_str())
            .ok_or_else(|| not_found("list"))?;
        list.is_deleted = true;
        self.list_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_item(&self, item: &GroceryItem) -> RemoteResult<GroceryItem> {
        self.check_writes()?;
        self.state()
            .items
            .insert(item.id.to_string(), item.clone());
        self.item_writes.fetch_add(1, Ordering::SeqCst);
        Ok(item.clone())
    }

    async fn delete_item(&self, id: &ItemId) -> RemoteResult<()> {
        self.check_writes()?;
        let mut state = self.state();
        let item = state
            .items
            .get_mut(id.as_str())
            .ok_or_else(|| not_found("item"))?;
        item.is_deleted = true;
        self.item_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear_completed(&self, list_id: &ListId) -> RemoteResult<()> {
        self.check_writes()?;
        self.state()
            .items
            .retain(|_, item| !(item.list_id == *list_id && item.is_completed));
        Ok(())
    }

    async fn clear_all(&self, user_id: &str, confirm_token: &str) -> RemoteResult<String> {
        self.check_writes()?;
        let mut state = self.state();
        state
            .clear_all_calls
            .push((user_id.to_string(), confirm_token.to_string()));
        state.lists.clear();
        state.items.clear();
        Ok("All data cleared".to_string())
    }
}
