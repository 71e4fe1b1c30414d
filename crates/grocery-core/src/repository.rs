//! Repository facade used by presentation code
//!
//! Every write commits locally together with its outbox entry, then the
//! mirror is dispatched in the background. Callers never wait on the backend
//! for a write; they wait only for the local commit.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::clock::{ClockSource, SystemClock};
use crate::config::EngineConfig;
use crate::db::{EntityStore, LiveQuery, StoreTx};
use crate::error::{Error, Result};
use crate::models::{
    EntityKind, GroceryItem, GroceryList, ItemId, ListCategory, ListId, MirrorOp,
};
use crate::remote::{HttpRemoteClient, RemoteApi};
use crate::state::SyncState;
use crate::sync::{MirrorDispatcher, SyncCoordinator, SyncOutcome, SyncReport};

/// Result of wiping all data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearAllReport {
    pub lists_removed: usize,
    pub items_removed: usize,
    /// Whether the backend confirmed its wipe
    pub remote_cleared: bool,
    /// Backend reply, or the error when the backend wipe failed
    pub remote_message: Option<String>,
}

/// Entry point for reading and changing grocery data
pub struct Repository<R> {
    store: EntityStore,
    remote: Arc<R>,
    mirrors: MirrorDispatcher<R>,
    coordinator: SyncCoordinator<R>,
    clock: Arc<dyn ClockSource>,
    config: EngineConfig,
}

impl Repository<HttpRemoteClient> {
    /// Build a repository that talks to the configured HTTP backend
    pub fn connect(store: EntityStore, config: EngineConfig) -> Result<Self> {
        let remote = HttpRemoteClient::new(config.api_base_url.clone(), config.request_timeout)?;
        Ok(Self::new(store, Arc::new(remote), config))
    }
}

impl<R: RemoteApi> Repository<R> {
    pub fn new(store: EntityStore, remote: Arc<R>, config: EngineConfig) -> Self {
        Self::with_clock(store, remote, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: EntityStore,
        remote: Arc<R>,
        config: EngineConfig,
        clock: Arc<dyn ClockSource>,
    ) -> Self {
        let mirrors = MirrorDispatcher::new(
            store.clone(),
            Arc::clone(&remote),
            config.mirror_concurrency,
            config.max_mirror_attempts,
        );
        let coordinator = SyncCoordinator::new(
            store.clone(),
            Arc::clone(&remote),
            mirrors.clone(),
            Arc::clone(&clock),
            config.min_sync_interval,
        );
        Self {
            store,
            remote,
            mirrors,
            coordinator,
            clock,
            config,
        }
    }

    pub const fn store(&self) -> &EntityStore {
        &self.store
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Commit `f` and its mirror ops in one transaction, then dispatch the mirrors
    async fn write<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&StoreTx<'_>, i64) -> Result<(T, Vec<MirrorOp>)> + Send + 'static,
    {
        let now = self.clock.now_ms();
        let (value, queued) = self
            .store
            .call(move |store| {
                store.transaction(|tx| {
                    let (value, ops) = f(tx, now)?;
                    let mut queued = Vec::with_capacity(ops.len());
                    for op in ops {
                        let entry_id = tx.enqueue_mirror(&op, now)?;
                        queued.push((entry_id, op));
                    }
                    Ok((value, queued))
                })
            })
            .await?;

        for (entry_id, op) in queued {
            self.mirrors.dispatch(entry_id, op);
        }
        Ok(value)
    }

    // ----- reads -----

    pub async fn lists(&self) -> Result<Vec<GroceryList>> {
        self.store.call(EntityStore::lists).await
    }

    pub async fn items(&self, list_id: &ListId) -> Result<Vec<GroceryItem>> {
        let list_id = list_id.clone();
        self.store.call(move |store| store.items(&list_id)).await
    }

    /// A live (non-deleted) list
    pub async fn get_list(&self, id: &ListId) -> Result<GroceryList> {
        let id = id.clone();
        self.store.call(move |store| store.read(|tx| live_list(tx, &id))).await
    }

    /// A live (non-deleted) item
    pub async fn get_item(&self, id: &ItemId) -> Result<GroceryItem> {
        let id = id.clone();
        self.store.call(move |store| store.read(|tx| live_item(tx, &id))).await
    }

    pub fn watch_lists(&self) -> LiveQuery<Vec<GroceryList>> {
        self.store.watch_lists()
    }

    pub fn watch_items(&self, list_id: ListId) -> LiveQuery<Vec<GroceryItem>> {
        self.store.watch_items(list_id)
    }

    pub fn watch_open_item_count(&self, list_id: ListId) -> LiveQuery<usize> {
        self.store.watch_open_item_count(list_id)
    }

    // ----- list writes -----

    pub async fn create_list(&self, name: &str, category: ListCategory) -> Result<GroceryList> {
        let name = required_name(name, "List name")?;
        let user_id = self.config.user_id.clone();
        self.write(move |tx, now| {
            let mut list = GroceryList::new_at(name, category, now);
            list.user_id = Some(user_id);
            tx.upsert(&list)?;
            tracing::debug!("Created list {}", list.id);
            Ok((list.clone(), vec![MirrorOp::UpsertList { list }]))
        })
        .await
    }

    /// Replace a list's editable fields (name, category)
    pub async fn save_list(&self, list: GroceryList) -> Result<GroceryList> {
        let name = required_name(&list.name, "List name")?;
        let user_id = self.config.user_id.clone();
        self.write(move |tx, now| {
            let existing = live_list(tx, &list.id)?;
            let saved = GroceryList {
                name,
                user_id: list.user_id.or(existing.user_id).or(Some(user_id)),
                created_at: existing.created_at,
                updated_at: now,
                is_deleted: false,
                ..list
            };
            tx.upsert(&saved)?;
            Ok((saved.clone(), vec![MirrorOp::UpsertList { list: saved }]))
        })
        .await
    }

    /// Soft-delete a list; its items stay but are no longer reachable
    pub async fn delete_list(&self, id: &ListId) -> Result<()> {
        let id = id.clone();
        self.write(move |tx, now| {
            live_list(tx, &id)?;
            tx.soft_delete::<GroceryList>(&id, now)?;
            Ok(((), vec![MirrorOp::DeleteList { id }]))
        })
        .await
    }

    /// Copy a list and its live items under fresh ids
    pub async fn duplicate_list(
        &self,
        id: &ListId,
        new_name: &str,
        category: ListCategory,
    ) -> Result<GroceryList> {
        let name = required_name(new_name, "List name")?;
        let source_id = id.clone();
        let user_id = self.config.user_id.clone();
        self.write(move |tx, now| {
            live_list(tx, &source_id)?;
            let mut copy = GroceryList::new_at(name, category, now);
            copy.user_id = Some(user_id);
            tx.upsert(&copy)?;

            let items = tx.items(&source_id)?;
            let mut ops = Vec::with_capacity(items.len() + 1);
            ops.push(MirrorOp::UpsertList { list: copy.clone() });
            for item in &items {
                let item = item.copy_to(copy.id.clone(), now);
                tx.upsert(&item)?;
                ops.push(MirrorOp::UpsertItem { item });
            }

            tracing::debug!(
                "Duplicated list {source_id} as {} with {} item(s)",
                copy.id,
                items.len()
            );
            Ok((copy, ops))
        })
        .await
    }

    // ----- item writes -----

    /// Add a new item to an existing list
    ///
    /// The id must be unused, tombstones included; edits go through
    /// [`Repository::update_item`].
    pub async fn add_item(&self, item: GroceryItem) -> Result<GroceryItem> {
        let name = required_name(&item.name, "Item name")?;
        self.write(move |tx, now| {
            if tx.get_by_id::<GroceryItem>(&item.id)?.is_some() {
                return Err(Error::InvalidInput(format!("item {} already exists", item.id)));
            }
            live_list(tx, &item.list_id)?;
            let created_at = if item.created_at > 0 {
                item.created_at
            } else {
                now
            };
            let item = GroceryItem {
                name,
                created_at,
                updated_at: now,
                is_deleted: false,
                ..item
            };
            tx.upsert(&item)?;
            Ok((item.clone(), vec![MirrorOp::UpsertItem { item }]))
        })
        .await
    }

    /// Replace an item's fields
    pub async fn update_item(&self, item: GroceryItem) -> Result<GroceryItem> {
        let name = required_name(&item.name, "Item name")?;
        self.write(move |tx, now| {
            let existing = live_item(tx, &item.id)?;
            if item.list_id != existing.list_id {
                live_list(tx, &item.list_id)?;
            }
            let item = GroceryItem {
                name,
                created_at: existing.created_at,
                updated_at: now,
                is_deleted: false,
                ..item
            };
            tx.upsert(&item)?;
            Ok((item.clone(), vec![MirrorOp::UpsertItem { item }]))
        })
        .await
    }

    pub async fn set_item_completed(&self, id: &ItemId, completed: bool) -> Result<GroceryItem> {
        let id = id.clone();
        self.write(move |tx, now| {
            let mut item = live_item(tx, &id)?;
            item.is_completed = completed;
            item.updated_at = now;
            tx.upsert(&item)?;
            Ok((item.clone(), vec![MirrorOp::UpsertItem { item }]))
        })
        .await
    }

    /// Move an item to another live list
    pub async fn move_item(&self, id: &ItemId, to_list: &ListId) -> Result<GroceryItem> {
        let id = id.clone();
        let to_list = to_list.clone();
        self.write(move |tx, now| {
            let mut item = live_item(tx, &id)?;
            live_list(tx, &to_list)?;
            item.list_id = to_list;
            item.updated_at = now;
            tx.upsert(&item)?;
            Ok((item.clone(), vec![MirrorOp::UpsertItem { item }]))
        })
        .await
    }

    /// Soft-delete an item
    pub async fn delete_item(&self, id: &ItemId) -> Result<()> {
        let id = id.clone();
        self.write(move |tx, now| {
            live_item(tx, &id)?;
            tx.soft_delete::<GroceryItem>(&id, now)?;
            Ok(((), vec![MirrorOp::DeleteItem { id }]))
        })
        .await
    }

    /// Physically remove the completed items of a list, here and on the backend
    ///
    /// Pending mirror writes for the removed items are dropped so they cannot
    /// recreate them remotely.
    pub async fn clear_completed(&self, list_id: &ListId) -> Result<usize> {
        let list_id = list_id.clone();
        self.write(move |tx, _now| {
            let outbox = tx.outbox();
            for id in tx.completed_item_ids(&list_id)? {
                outbox.discard(&format!("item:{id}"))?;
            }
            let removed = tx.clear_completed(&list_id)?;
            tracing::debug!("Cleared {removed} completed item(s) from list {list_id}");
            Ok((removed, vec![MirrorOp::ClearCompleted { list_id }]))
        })
        .await
    }

    /// Wipe every list and item locally, then ask the backend to do the same
    ///
    /// A backend failure is reported in the result, not as an error: the
    /// local wipe has already happened.
    pub async fn clear_all_data(&self) -> Result<ClearAllReport> {
        let (items_removed, lists_removed) = self
            .store
            .call(|store| {
                store.transaction(|tx| {
                    let items = tx.hard_delete_all(EntityKind::Item)?;
                    let lists = tx.hard_delete_all(EntityKind::List)?;
                    let discarded = tx.outbox().clear()?;
                    if discarded > 0 {
                        tracing::info!("Discarded {discarded} pending mirror write(s)");
                    }
                    Ok((items, lists))
                })
            })
            .await?;

        // Deliveries already on the wire must not land after the remote wipe
        self.mirrors.flush().await;

        let (remote_cleared, remote_message) = match self
            .remote
            .clear_all(&self.config.user_id, &self.config.clear_all_token)
            .await
        {
            Ok(message) => {
                tracing::info!("Backend data cleared: {message}");
                (true, Some(message))
            }
            Err(error) => {
                tracing::warn!("Local data cleared but backend wipe failed: {error}");
                (false, Some(error.to_string()))
            }
        };

        Ok(ClearAllReport {
            lists_removed,
            items_removed,
            remote_cleared,
            remote_message,
        })
    }

    // ----- sync -----

    pub async fn smart_sync(&self) -> Result<SyncOutcome> {
        Ok(self.coordinator.smart_sync(&self.config.user_id).await?)
    }

    pub async fn force_full_sync(&self) -> Result<SyncReport> {
        Ok(self.coordinator.force_full_sync(&self.config.user_id).await?)
    }

    pub fn sync_state(&self) -> SyncState {
        self.coordinator.state()
    }

    pub fn subscribe_sync_state(&self) -> watch::Receiver<SyncState> {
        self.coordinator.subscribe_state()
    }

    /// Completion time of the last successful sync (Unix ms)
    pub async fn last_sync_time(&self) -> Result<Option<i64>> {
        self.coordinator.last_sync_time().await
    }

    pub async fn last_sync_duration(&self) -> Result<Option<Duration>> {
        self.coordinator.last_sync_duration().await
    }

    /// Mirror writes still waiting for the backend
    pub async fn pending_mirrors(&self) -> Result<usize> {
        self.store.call(EntityStore::outbox_len).await
    }

    /// Wait for every running mirror delivery to finish
    pub async fn flush_mirrors(&self) {
        self.mirrors.flush().await;
    }
}

fn required_name(name: &str, what: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput(format!("{what} must not be empty")));
    }
    Ok(name.to_string())
}

fn live_list(tx: &StoreTx<'_>, id: &ListId) -> Result<GroceryList> {
    tx.get_by_id::<GroceryList>(id)?
        .filter(|list| !list.is_deleted)
        .ok_or_else(|| Error::NotFound(format!("list {id}")))
}

fn live_item(tx: &StoreTx<'_>, id: &ItemId) -> Result<GroceryItem> {
    tx.get_by_id::<GroceryItem>(id)?
        .filter(|item| !item.is_deleted)
        .ok_or_else(|| Error::NotFound(format!("item {id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{Category, SyncSnapshot};
    use crate::remote::RemoteError;
    use crate::testing::FakeRemote;
    use pretty_assertions::assert_eq;

    const START: i64 = 1_700_000_000_000;

    struct Harness {
        repo: Repository<FakeRemote>,
        remote: Arc<FakeRemote>,
        clock: Arc<ManualClock>,
    }

    fn harness() -> Harness {
        let store = EntityStore::open_in_memory().unwrap();
        let remote = Arc::new(FakeRemote::new());
        let clock = Arc::new(ManualClock::new(START));
        let config = EngineConfig::new("http://localhost:8080")
            .unwrap()
            .with_user_id("household");
        let repo = Repository::with_clock(
            store,
            Arc::clone(&remote),
            config,
            Arc::clone(&clock) as Arc<dyn ClockSource>,
        );
        Harness {
            repo,
            remote,
            clock,
        }
    }

    fn server_error() -> RemoteError {
        RemoteError::Http {
            status: 500,
            message: "Internal error".to_string(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_list_commits_and_mirrors() {
        let h = harness();

        let list = h
            .repo
            .create_list("  Weekly shop ", ListCategory::Coop)
            .await
            .unwrap();
        h.repo.flush_mirrors().await;

        assert_eq!(list.name, "Weekly shop");
        assert_eq!(list.user_id.as_deref(), Some("household"));
        assert_eq!(list.created_at, START);
        assert_eq!(h.repo.get_list(&list.id).await.unwrap(), list);
        assert_eq!(h.remote.list(&list.id), Some(list));
        assert_eq!(h.repo.pending_mirrors().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_blank_names_are_rejected() {
        let h = harness();

        let error = h
            .repo
            .create_list("   ", ListCategory::Rema)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));

        let list = h.repo.create_list("Weekly", ListCategory::Rema).await.unwrap();
        let error = h
            .repo
            .add_item(GroceryItem::new(list.id.clone(), ""))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
        assert!(h.repo.items(&list.id).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_add_item_requires_live_list() {
        let h = harness();

        let error = h
            .repo
            .add_item(GroceryItem::new(ListId::from("missing"), "Milk"))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));

        let list = h.repo.create_list("Weekly", ListCategory::Rema).await.unwrap();
        h.repo.delete_list(&list.id).await.unwrap();
        let error = h
            .repo
            .add_item(GroceryItem::new(list.id.clone(), "Milk"))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_add_item_refuses_existing_id() {
        let h = harness();
        let list = h.repo.create_list("Weekly", ListCategory::Rema).await.unwrap();
        let milk = h
            .repo
            .add_item(GroceryItem::new(list.id.clone(), "Milk"))
            .await
            .unwrap();
        h.repo.delete_item(&milk.id).await.unwrap();

        let error = h
            .repo
            .add_item(GroceryItem {
                name: "Oat milk".to_string(),
                ..milk.clone()
            })
            .await
            .unwrap_err();

        assert!(matches!(error, Error::InvalidInput(_)));
        let stored = h.repo.store().get_by_id::<GroceryItem>(&milk.id).unwrap().unwrap();
        assert!(stored.is_deleted);
        assert_eq!(stored.name, "Milk");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_list_is_soft_and_mirrored() {
        let h = harness();
        let list = h.repo.create_list("Weekly", ListCategory::Rema).await.unwrap();
        h.repo.flush_mirrors().await;

        h.clock.advance(1_000);
        h.repo.delete_list(&list.id).await.unwrap();
        h.repo.flush_mirrors().await;

        assert!(h.repo.lists().await.unwrap().is_empty());
        assert!(matches!(
            h.repo.get_list(&list.id).await.unwrap_err(),
            Error::NotFound(_)
        ));
        let tombstone = h
            .repo
            .store()
            .get_by_id::<GroceryList>(&list.id)
            .unwrap()
            .unwrap();
        assert!(tombstone.is_deleted);
        assert_eq!(tombstone.updated_at, START + 1_000);
        assert!(h.remote.list(&list.id).unwrap().is_deleted);

        let error = h.repo.delete_list(&list.id).await.unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_duplicate_list_copies_live_items() {
        let h = harness();
        let source = h.repo.create_list("Weekly", ListCategory::Rema).await.unwrap();
        let mut milk = GroceryItem::new(source.id.clone(), "Milk");
        milk.quantity = "2".to_string();
        milk.unit = "l".to_string();
        milk.category = Category::Mejeri;
        milk.is_completed = true;
        milk.on_offer = true;
        let milk = h.repo.add_item(milk).await.unwrap();
        let bread = h
            .repo
            .add_item(GroceryItem::new(source.id.clone(), "Bread"))
            .await
            .unwrap();
        h.repo.delete_item(&bread.id).await.unwrap();

        h.clock.advance(5_000);
        let copy = h
            .repo
            .duplicate_list(&source.id, "Weekend", ListCategory::Coop)
            .await
            .unwrap();
        h.repo.flush_mirrors().await;

        assert_ne!(copy.id, source.id);
        assert_eq!(copy.category, ListCategory::Coop);
        let items = h.repo.items(&copy.id).await.unwrap();
        assert_eq!(items.len(), 1);
        let copied = &items[0];
        assert_ne!(copied.id, milk.id);
        assert_eq!(copied.name, "Milk");
        assert_eq!(copied.quantity, "2");
        assert_eq!(copied.unit, "l");
        assert_eq!(copied.category, Category::Mejeri);
        assert!(copied.is_completed);
        assert!(copied.on_offer);
        assert_eq!(copied.created_at, START + 5_000);
        assert_eq!(copied.updated_at, START + 5_000);

        assert!(h.remote.list(&copy.id).is_some());
        assert!(h.remote.item(&copied.id).is_some());
        assert_eq!(h.repo.items(&source.id).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_item_edits_stamp_updated_at() {
        let h = harness();
        let weekly = h.repo.create_list("Weekly", ListCategory::Rema).await.unwrap();
        let party = h.repo.create_list("Party", ListCategory::Andre).await.unwrap();
        let item = h
            .repo
            .add_item(GroceryItem::new(weekly.id.clone(), "Chips"))
            .await
            .unwrap();

        h.clock.advance(10);
        let item = h.repo.set_item_completed(&item.id, true).await.unwrap();
        assert!(item.is_completed);
        assert_eq!(item.updated_at, START + 10);

        h.clock.advance(10);
        let moved = h.repo.move_item(&item.id, &party.id).await.unwrap();
        assert_eq!(moved.list_id, party.id);
        assert_eq!(moved.updated_at, START + 20);
        assert_eq!(moved.created_at, START);
        assert!(h.repo.items(&weekly.id).await.unwrap().is_empty());

        let error = h
            .repo
            .move_item(&item.id, &ListId::from("nowhere"))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_quick_edits_mirror_the_newest_version() {
        let h = harness();
        let list = h.repo.create_list("Weekly", ListCategory::Rema).await.unwrap();
        let mut item = h
            .repo
            .add_item(GroceryItem::new(list.id.clone(), "Milk"))
            .await
            .unwrap();

        item.name = "Oat milk".to_string();
        h.clock.advance(1);
        h.repo.update_item(item.clone()).await.unwrap();
        item.name = "Skim milk".to_string();
        h.clock.advance(1);
        h.repo.update_item(item.clone()).await.unwrap();
        h.repo.flush_mirrors().await;

        let remote = h.remote.item(&item.id).unwrap();
        assert_eq!(remote.name, "Skim milk");
        assert_eq!(remote.updated_at, START + 2);
        assert_eq!(h.repo.pending_mirrors().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_mirror_is_delivered_by_next_sync() {
        let h = harness();
        h.remote.fail_writes(Some(server_error()));
        let list = h.repo.create_list("Weekly", ListCategory::Rema).await.unwrap();
        h.repo.flush_mirrors().await;

        assert!(h.remote.list(&list.id).is_none());
        assert_eq!(h.repo.pending_mirrors().await.unwrap(), 1);

        h.remote.fail_writes(None);
        let report = h.repo.force_full_sync().await.unwrap();

        assert_eq!(report.mirrors_delivered, 1);
        assert_eq!(h.remote.list(&list.id), Some(list));
        assert_eq!(h.repo.pending_mirrors().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_offline_edit_outlives_many_failed_syncs() {
        let h = harness();
        h.remote
            .fail_writes(Some(RemoteError::Network("connection refused".into())));
        let list = h.repo.create_list("Weekly", ListCategory::Rema).await.unwrap();

        for _ in 0..10 {
            h.clock.advance(30_000);
            assert!(!h.repo.smart_sync().await.unwrap().was_skipped());
        }
        assert_eq!(h.repo.pending_mirrors().await.unwrap(), 1);

        h.remote.fail_writes(None);
        let report = h.repo.force_full_sync().await.unwrap();

        assert_eq!(report.mirrors_delivered, 1);
        assert_eq!(h.remote.list(&list.id), Some(list));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_clear_completed_drops_pending_item_writes() {
        let h = harness();
        h.remote.fail_writes(Some(server_error()));
        let list = h.repo.create_list("Weekly", ListCategory::Rema).await.unwrap();
        let done = h
            .repo
            .add_item(GroceryItem::new(list.id.clone(), "Eggs"))
            .await
            .unwrap();
        let open = h
            .repo
            .add_item(GroceryItem::new(list.id.clone(), "Butter"))
            .await
            .unwrap();
        h.repo.set_item_completed(&done.id, true).await.unwrap();
        h.repo.flush_mirrors().await;
        assert_eq!(h.repo.pending_mirrors().await.unwrap(), 3);

        let removed = h.repo.clear_completed(&list.id).await.unwrap();
        h.repo.flush_mirrors().await;

        assert_eq!(removed, 1);
        assert!(h.repo.store().get_by_id::<GroceryItem>(&done.id).unwrap().is_none());
        // list, open item and the clear itself
        assert_eq!(h.repo.pending_mirrors().await.unwrap(), 3);

        h.remote.fail_writes(None);
        h.repo.force_full_sync().await.unwrap();

        assert!(h.remote.item(&done.id).is_none());
        assert!(h.remote.item(&open.id).is_some());
        let items = h.repo.items(&list.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, open.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_clear_all_wipes_both_sides() {
        let h = harness();
        let list = h.repo.create_list("Weekly", ListCategory::Rema).await.unwrap();
        h.repo
            .add_item(GroceryItem::new(list.id.clone(), "Milk"))
            .await
            .unwrap();
        h.repo
            .add_item(GroceryItem::new(list.id.clone(), "Eggs"))
            .await
            .unwrap();

        let report = h.repo.clear_all_data().await.unwrap();

        assert_eq!(
            report,
            ClearAllReport {
                lists_removed: 1,
                items_removed: 2,
                remote_cleared: true,
                remote_message: Some("All data cleared".to_string()),
            }
        );
        assert!(h.repo.lists().await.unwrap().is_empty());
        assert_eq!(h.repo.pending_mirrors().await.unwrap(), 0);
        assert_eq!(
            h.remote.clear_all_calls(),
            vec![(
                "household".to_string(),
                "CLEAR_GROCERY_DATA_2025".to_string()
            )]
        );
        assert!(h.remote.list(&list.id).is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_clear_all_reports_backend_failure() {
        let h = harness();
        h.repo.create_list("Weekly", ListCategory::Rema).await.unwrap();
        h.repo.flush_mirrors().await;
        h.remote.fail_writes(Some(server_error()));

        let report = h.repo.clear_all_data().await.unwrap();

        assert_eq!(report.lists_removed, 1);
        assert!(!report.remote_cleared);
        assert!(report.remote_message.unwrap().contains("Internal error"));
        assert!(h.repo.lists().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remote_newer_list_wins_on_sync() {
        let h = harness();
        let mut local = GroceryList::new_at("Weekly", ListCategory::Rema, 1_000);
        local.id = ListId::from("L1");
        h.repo.store().upsert(&local).unwrap();

        let mut remote = local.clone();
        remote.name = "Weekly (shared)".to_string();
        remote.updated_at = 2_000;
        h.remote.set_snapshot(SyncSnapshot {
            lists: vec![remote.clone()],
            items: vec![],
        });

        h.repo.force_full_sync().await.unwrap();

        assert_eq!(h.repo.get_list(&local.id).await.unwrap(), remote);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_local_offline_edit_survives_stale_snapshot() {
        let h = harness();
        let mut list = GroceryList::new_at("Weekly", ListCategory::Rema, 1);
        list.id = ListId::from("L1");
        h.repo.store().upsert(&list).unwrap();
        let mut local = GroceryItem::new_at(list.id.clone(), "Oat milk", 5_000);
        local.id = ItemId::from("I1");
        h.repo.store().upsert(&local).unwrap();

        let mut stale = local.clone();
        stale.name = "Milk".to_string();
        stale.updated_at = 4_000;
        h.remote.set_snapshot(SyncSnapshot {
            lists: vec![list],
            items: vec![stale],
        });

        h.repo.force_full_sync().await.unwrap();

        assert_eq!(h.repo.get_item(&local.id).await.unwrap(), local);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_smart_sync_within_interval_skips_backend() {
        let h = harness();

        assert!(!h.repo.smart_sync().await.unwrap().was_skipped());
        h.clock.advance(10_000);
        let second = h.repo.smart_sync().await.unwrap();

        assert!(second.was_skipped());
        assert_eq!(h.remote.snapshot_fetches(), 1);
        assert_eq!(h.repo.last_sync_time().await.unwrap(), Some(START));
        assert_eq!(h.repo.sync_state(), SyncState::Synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sync_state_subscribers_see_result() {
        let h = harness();
        let mut state = h.repo.subscribe_sync_state();
        assert_eq!(*state.borrow_and_update(), SyncState::Idle);

        h.repo.force_full_sync().await.unwrap();
        assert!(state.has_changed().unwrap());
        assert_eq!(*state.borrow_and_update(), SyncState::Synced);

        h.remote
            .fail_snapshot(Some(RemoteError::Network("offline".into())));
        assert!(h.repo.force_full_sync().await.is_err());
        assert_eq!(*state.borrow_and_update(), SyncState::Failed);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_item_count_follows_completion() {
        let h = harness();
        let list = h.repo.create_list("Weekly", ListCategory::Rema).await.unwrap();
        let mut count = h.repo.watch_open_item_count(list.id.clone());
        assert_eq!(count.next().await.unwrap().unwrap(), 0);

        let item = h
            .repo
            .add_item(GroceryItem::new(list.id.clone(), "Milk"))
            .await
            .unwrap();
        assert_eq!(count.next().await.unwrap().unwrap(), 1);

        h.repo.set_item_completed(&item.id, true).await.unwrap();
        assert_eq!(count.next().await.unwrap().unwrap(), 0);
    }
}
