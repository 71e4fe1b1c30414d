//! Entity store: durable lists and items with change notification

use std::cell::Cell;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::watch;

use super::live::LiveQuery;
use super::outbox::{OutboxEntry, SqliteOutbox};
use super::sync_state::{SqliteSyncStateRepository, SyncStamp, SyncStateRepository};
use super::tables::Table;
use super::Database;
use crate::error::Result;
use crate::models::{EntityKind, GroceryItem, GroceryList, ItemId, ListId, MirrorOp};

/// Reads and writes against one open connection or transaction
///
/// Remembers which collections were written so the owning [`EntityStore`]
/// can notify subscribers after commit.
pub struct StoreTx<'a> {
    conn: &'a Connection,
    lists_dirty: Cell<bool>,
    items_dirty: Cell<bool>,
}

impl<'a> StoreTx<'a> {
    const fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            lists_dirty: Cell::new(false),
            items_dirty: Cell::new(false),
        }
    }

    fn touch(&self, kind: EntityKind) {
        match kind {
            EntityKind::List => self.lists_dirty.set(true),
            EntityKind::Item => self.items_dirty.set(true),
        }
    }

    /// Non-deleted lists, most recently updated first
    pub fn lists(&self) -> Result<Vec<GroceryList>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM grocery_lists WHERE is_deleted = 0 ORDER BY updated_at DESC, id ASC",
            GroceryList::COLUMNS
        ))?;
        let lists = stmt
            .query_map([], GroceryList::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(lists)
    }

    /// Non-deleted items of a list by priority, then creation time
    pub fn items(&self, list_id: &ListId) -> Result<Vec<GroceryItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM grocery_items
             WHERE list_id = ?1 AND is_deleted = 0
             ORDER BY priority ASC, created_at ASC, id ASC",
            GroceryItem::COLUMNS
        ))?;
        let items = stmt
            .query_map(params![list_id.as_str()], GroceryItem::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    /// Number of non-deleted, not yet completed items on a list
    pub fn open_item_count(&self, list_id: &ListId) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM grocery_items
             WHERE list_id = ?1 AND is_deleted = 0 AND is_completed = 0",
            params![list_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Look up a record by id, tombstones included
    pub fn get_by_id<T: Table>(&self, id: impl AsRef<str>) -> Result<Option<T>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {} FROM {} WHERE id = ?1", T::COLUMNS, T::TABLE),
                params![id.as_ref()],
                T::from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Insert or fully replace a record
    pub fn upsert<T: Table>(&self, record: &T) -> Result<()> {
        record.upsert(self.conn)?;
        self.touch(T::KIND);
        Ok(())
    }

    /// Mark a record deleted at `timestamp`
    ///
    /// Returns whether a row changed.
    pub fn soft_delete<T: Table>(&self, id: impl AsRef<str>, timestamp: i64) -> Result<bool> {
        let rows = self.conn.execute(
            &format!(
                "UPDATE {} SET is_deleted = 1, updated_at = ?2 WHERE id = ?1",
                T::TABLE
            ),
            params![id.as_ref(), timestamp],
        )?;
        if rows > 0 {
            self.touch(T::KIND);
        }
        Ok(rows > 0)
    }

    /// Physically remove every row of one kind
    ///
    /// Wiping lists takes all items along.
    pub fn hard_delete_all(&self, kind: EntityKind) -> Result<usize> {
        let table = match kind {
            EntityKind::List => GroceryList::TABLE,
            EntityKind::Item => GroceryItem::TABLE,
        };
        let rows = self.conn.execute(&format!("DELETE FROM {table}"), [])?;
        self.touch(kind);
        if kind == EntityKind::List {
            self.touch(EntityKind::Item);
        }
        Ok(rows)
    }

    /// Ids of the completed items of a list, tombstones excluded
    pub fn completed_item_ids(&self, list_id: &ListId) -> Result<Vec<ItemId>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM grocery_items WHERE list_id = ?1 AND is_completed = 1 AND is_deleted = 0",
        )?;
        let ids = stmt
            .query_map(params![list_id.as_str()], |row| {
                row.get::<_, String>(0).map(ItemId::from)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    /// Physically remove completed items of a list
    pub fn clear_completed(&self, list_id: &ListId) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM grocery_items WHERE list_id = ?1 AND is_completed = 1",
            params![list_id.as_str()],
        )?;
        if rows > 0 {
            self.touch(EntityKind::Item);
        }
        Ok(rows)
    }

    /// Physically remove a list and, by cascade, its items
    pub fn delete_list_permanently(&self, id: &ListId) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM grocery_lists WHERE id = ?1",
            params![id.as_str()],
        )?;
        if rows > 0 {
            self.touch(EntityKind::List);
            self.touch(EntityKind::Item);
        }
        Ok(rows > 0)
    }

    /// Queue a backend write in the same transaction as the local change
    pub fn enqueue_mirror(&self, op: &MirrorOp, now_ms: i64) -> Result<i64> {
        SqliteOutbox::new(self.conn).enqueue(op, now_ms)
    }

    pub const fn outbox(&self) -> SqliteOutbox<'a> {
        SqliteOutbox::new(self.conn)
    }

    pub const fn sync_state(&self) -> SqliteSyncStateRepository<'a> {
        SqliteSyncStateRepository::new(self.conn)
    }

    #[cfg(test)]
    pub(crate) const fn raw(&self) -> &'a Connection {
        self.conn
    }
}

struct Inner {
    conn: Mutex<Connection>,
    lists_changed: watch::Sender<u64>,
    items_changed: watch::Sender<u64>,
}

/// Shared handle to the local database
///
/// Cheap to clone. Every method is blocking; async callers go through
/// [`EntityStore::call`].
#[derive(Clone)]
pub struct EntityStore {
    inner: Arc<Inner>,
}

impl EntityStore {
    /// Open (or create) a file-backed store
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    /// Open an in-memory store (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    #[must_use]
    pub fn new(database: Database) -> Self {
        let (lists_changed, _) = watch::channel(0);
        let (items_changed, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                conn: Mutex::new(database.into_connection()),
                lists_changed,
                items_changed,
            }),
        }
    }

    // A panic mid-transaction rolls the transaction back, so the connection
    // is still consistent after poisoning.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.inner
            .conn
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, lists: bool, items: bool) {
        if lists {
            self.inner.lists_changed.send_modify(|rev| *rev += 1);
        }
        if items {
            self.inner.items_changed.send_modify(|rev| *rev += 1);
        }
    }

    /// Run `f` inside one transaction
    ///
    /// Commits when `f` succeeds and rolls back otherwise. Subscribers are
    /// notified once, after commit.
    pub fn transaction<T>(&self, f: impl FnOnce(&StoreTx<'_>) -> Result<T>) -> Result<T> {
        let (value, lists, items) = {
            let mut conn = self.lock();
            let tx = conn.transaction()?;
            let store_tx = StoreTx::new(&tx);
            let value = f(&store_tx)?;
            let (lists, items) = (store_tx.lists_dirty.get(), store_tx.items_dirty.get());
            tx.commit()?;
            (value, lists, items)
        };
        self.notify(lists, items);
        Ok(value)
    }

    /// Run read-only work against the connection
    pub fn read<T>(&self, f: impl FnOnce(&StoreTx<'_>) -> Result<T>) -> Result<T> {
        let conn = self.lock();
        f(&StoreTx::new(&conn))
    }

    /// Run blocking store work on the blocking thread pool
    pub async fn call<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Self) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(&store)).await?
    }

    pub fn lists(&self) -> Result<Vec<GroceryList>> {
        self.read(|tx| tx.lists())
    }

    pub fn items(&self, list_id: &ListId) -> Result<Vec<GroceryItem>> {
        self.read(|tx| tx.items(list_id))
    }

    pub fn open_item_count(&self, list_id: &ListId) -> Result<usize> {
        self.read(|tx| tx.open_item_count(list_id))
    }

    pub fn get_by_id<T: Table>(&self, id: impl AsRef<str>) -> Result<Option<T>> {
        self.read(|tx| tx.get_by_id(id))
    }

    pub fn upsert<T: Table>(&self, record: &T) -> Result<()> {
        self.transaction(|tx| tx.upsert(record))
    }

    pub fn soft_delete<T: Table>(&self, id: impl AsRef<str>, timestamp: i64) -> Result<bool> {
        self.transaction(|tx| tx.soft_delete::<T>(id, timestamp))
    }

    pub fn hard_delete_all(&self, kind: EntityKind) -> Result<usize> {
        self.transaction(|tx| tx.hard_delete_all(kind))
    }

    pub fn clear_completed(&self, list_id: &ListId) -> Result<usize> {
        self.transaction(|tx| tx.clear_completed(list_id))
    }

    pub fn delete_list_permanently(&self, id: &ListId) -> Result<bool> {
        self.transaction(|tx| tx.delete_list_permanently(id))
    }

    /// Live view of [`EntityStore::lists`]
    #[must_use]
    pub fn watch_lists(&self) -> LiveQuery<Vec<GroceryList>> {
        let store = self.clone();
        LiveQuery::new(
            self.inner.lists_changed.subscribe(),
            Arc::new(move || store.lists()),
        )
    }

    /// Live view of [`EntityStore::items`]
    #[must_use]
    pub fn watch_items(&self, list_id: ListId) -> LiveQuery<Vec<GroceryItem>> {
        let store = self.clone();
        LiveQuery::new(
            self.inner.items_changed.subscribe(),
            Arc::new(move || store.items(&list_id)),
        )
    }

    /// Live view of [`EntityStore::open_item_count`]
    #[must_use]
    pub fn watch_open_item_count(&self, list_id: ListId) -> LiveQuery<usize> {
        let store = self.clone();
        LiveQuery::new(
            self.inner.items_changed.subscribe(),
            Arc::new(move || store.open_item_count(&list_id)),
        )
    }

    pub fn sync_stamp(&self) -> Result<Option<SyncStamp>> {
        self.read(|tx| tx.sync_state().load())
    }

    pub fn save_sync_stamp(&self, stamp: SyncStamp) -> Result<()> {
        self.transaction(|tx| tx.sync_state().save(stamp))
    }

    pub fn pending_mirrors(&self, limit: usize) -> Result<Vec<OutboxEntry>> {
        self.read(|tx| tx.outbox().pending(limit))
    }

    pub fn outbox_len(&self) -> Result<usize> {
        self.read(|tx| tx.outbox().len())
    }

    pub fn mirror_exists(&self, id: i64) -> Result<bool> {
        self.read(|tx| tx.outbox().exists(id))
    }

    pub fn complete_mirror(&self, id: i64) -> Result<()> {
        self.read(|tx| tx.outbox().complete(id))
    }

    pub fn record_mirror_failure(&self, id: i64, error: &str) -> Result<Option<u32>> {
        self.read(|tx| tx.outbox().record_failure(id, error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, GroceryItem, ItemId, ListCategory};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn list(name: &str, updated_at: i64) -> GroceryList {
        let mut list = GroceryList::new_at(name, ListCategory::Rema, updated_at);
        list.updated_at = updated_at;
        list
    }

    fn item(list_id: &ListId, name: &str, priority: i32, created_at: i64) -> GroceryItem {
        let mut item = GroceryItem::new_at(list_id.clone(), name, created_at);
        item.priority = priority;
        item
    }

    #[test]
    fn test_lists_newest_first_without_tombstones() {
        let store = EntityStore::open_in_memory().unwrap();
        let old = list("Old", 100);
        let new = list("New", 200);
        let gone = list("Gone", 300);
        store.upsert(&old).unwrap();
        store.upsert(&new).unwrap();
        store.upsert(&gone).unwrap();
        assert!(store.soft_delete::<GroceryList>(&gone.id, 400).unwrap());

        let names: Vec<String> = store.lists().unwrap().into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["New", "Old"]);

        let tombstone: GroceryList = store.get_by_id(&gone.id).unwrap().unwrap();
        assert!(tombstone.is_deleted);
        assert_eq!(tombstone.updated_at, 400);
    }

    #[test]
    fn test_items_ordered_by_priority_then_creation() {
        let store = EntityStore::open_in_memory().unwrap();
        let parent = list("Weekly", 1);
        store.upsert(&parent).unwrap();
        store.upsert(&item(&parent.id, "b", 1, 20)).unwrap();
        store.upsert(&item(&parent.id, "a", 1, 10)).unwrap();
        store.upsert(&item(&parent.id, "top", 0, 30)).unwrap();

        let names: Vec<String> = store
            .items(&parent.id)
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["top", "a", "b"]);
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let store = EntityStore::open_in_memory().unwrap();
        let mut milk = item(&ListId::from("L1"), "Milk", 0, 5);
        milk.category = Category::Mejeri;
        store.upsert(&milk).unwrap();
        store.upsert(&milk).unwrap();

        let stored: GroceryItem = store.get_by_id(&milk.id).unwrap().unwrap();
        assert_eq!(stored, milk);
        assert_eq!(store.items(&ListId::from("L1")).unwrap().len(), 1);
    }

    #[test]
    fn test_replacing_list_keeps_items() {
        let store = EntityStore::open_in_memory().unwrap();
        let mut parent = list("Weekly", 1);
        store.upsert(&parent).unwrap();
        store.upsert(&item(&parent.id, "Eggs", 0, 1)).unwrap();

        parent.name = "Weekend".into();
        parent.updated_at = 2;
        store.upsert(&parent).unwrap();

        assert_eq!(store.items(&parent.id).unwrap().len(), 1);
    }

    #[test]
    fn test_permanent_list_delete_cascades() {
        let store = EntityStore::open_in_memory().unwrap();
        let parent = list("Weekly", 1);
        let other = list("Other", 1);
        store.upsert(&parent).unwrap();
        store.upsert(&other).unwrap();
        let eggs = item(&parent.id, "Eggs", 0, 1);
        store.upsert(&eggs).unwrap();
        store.upsert(&item(&other.id, "Milk", 0, 1)).unwrap();

        assert!(store.delete_list_permanently(&parent.id).unwrap());

        assert!(store.get_by_id::<GroceryItem>(&eggs.id).unwrap().is_none());
        assert_eq!(store.items(&other.id).unwrap().len(), 1);
    }

    #[test]
    fn test_soft_delete_list_keeps_items() {
        let store = EntityStore::open_in_memory().unwrap();
        let parent = list("Weekly", 1);
        store.upsert(&parent).unwrap();
        store.upsert(&item(&parent.id, "Eggs", 0, 1)).unwrap();

        store.soft_delete::<GroceryList>(&parent.id, 9).unwrap();
        assert_eq!(store.items(&parent.id).unwrap().len(), 1);
    }

    #[test]
    fn test_clear_completed_only_touches_one_list() {
        let store = EntityStore::open_in_memory().unwrap();
        let parent = list("Weekly", 1);
        let mut done = item(&parent.id, "Done", 0, 1);
        done.is_completed = true;
        let open = item(&parent.id, "Open", 0, 2);
        let mut elsewhere = item(&ListId::from("other"), "Elsewhere", 0, 3);
        elsewhere.is_completed = true;
        for record in [&done, &open, &elsewhere] {
            store.upsert(record).unwrap();
        }

        assert_eq!(store.clear_completed(&parent.id).unwrap(), 1);
        assert_eq!(store.open_item_count(&parent.id).unwrap(), 1);
        assert!(store
            .get_by_id::<GroceryItem>(&elsewhere.id)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_hard_delete_lists_removes_items() {
        let store = EntityStore::open_in_memory().unwrap();
        let parent = list("Weekly", 1);
        store.upsert(&parent).unwrap();
        store.upsert(&item(&parent.id, "Eggs", 0, 1)).unwrap();

        assert_eq!(store.hard_delete_all(EntityKind::List).unwrap(), 1);
        assert!(store.items(&parent.id).unwrap().is_empty());
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let store = EntityStore::open_in_memory().unwrap();
        let parent = list("Weekly", 1);

        let result: Result<()> = store.transaction(|tx| {
            tx.upsert(&parent)?;
            Err(crate::Error::InvalidInput("abort".into()))
        });
        assert!(result.is_err());
        assert!(store.lists().unwrap().is_empty());
    }

    #[test]
    fn test_item_may_arrive_before_its_list() {
        let store = EntityStore::open_in_memory().unwrap();
        let orphan = item(&ListId::from("late-list"), "Eggs", 0, 1);
        store.upsert(&orphan).unwrap();
        assert!(store
            .get_by_id::<GroceryItem>(ItemId::from(orphan.id.as_str()))
            .unwrap()
            .is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_live_lists_emit_on_change() {
        let store = EntityStore::open_in_memory().unwrap();
        let mut live = store.watch_lists();

        assert!(live.next().await.unwrap().unwrap().is_empty());

        store
            .call(|store| store.upsert(&list("Weekly", 1)))
            .await
            .unwrap();

        let lists = tokio::time::timeout(Duration::from_secs(5), live.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(lists.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_live_items_ignore_list_writes() {
        let store = EntityStore::open_in_memory().unwrap();
        let parent = list("Weekly", 1);
        let mut live = store.watch_open_item_count(parent.id.clone());
        assert_eq!(live.next().await.unwrap().unwrap(), 0);

        store.upsert(&parent).unwrap();
        let pending = tokio::time::timeout(Duration::from_millis(100), live.next()).await;
        assert!(pending.is_err(), "list write must not wake item watchers");

        store.upsert(&item(&parent.id, "Eggs", 0, 1)).unwrap();
        let count = tokio::time::timeout(Duration::from_secs(5), live.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_live_query_current_and_cancel() {
        let store = EntityStore::open_in_memory().unwrap();
        let live = store.watch_lists();
        assert_eq!(store.inner.lists_changed.receiver_count(), 1);

        store.upsert(&list("Weekly", 1)).unwrap();
        assert_eq!(live.current().unwrap().len(), 1);

        live.cancel();
        assert_eq!(store.inner.lists_changed.receiver_count(), 0);
    }
}
