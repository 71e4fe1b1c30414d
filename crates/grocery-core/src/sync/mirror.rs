//! Delivery of queued mirror writes to the backend
//!
//! Every local write commits together with an outbox entry. The dispatcher
//! sends entries on a bounded number of concurrent tasks. Deliveries for the
//! same record run one after another, and an entry that was superseded by a
//! newer write for its record is skipped instead of sent.
//!
//! Entries that fail because the backend is unreachable or erroring stay
//! queued for as long as it takes. Only entries the backend keeps rejecting
//! with a 4xx answer are given up on.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use crate::db::EntityStore;
use crate::error::Result;
use crate::models::MirrorOp;
use crate::remote::{RemoteApi, RemoteResult};

/// Entries loaded per drain pass
const DRAIN_BATCH: usize = 500;

/// What happened to one outbox entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// A newer write for the same record replaced it
    Superseded,
    /// Still queued for a later attempt
    Failed,
    /// Gave up after the backend rejected it too many times
    Dropped,
}

/// Tallies of one outbox drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub delivered: usize,
    pub superseded: usize,
    pub failed: usize,
    pub dropped: usize,
}

impl DrainReport {
    fn record(&mut self, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered => self.delivered += 1,
            DeliveryOutcome::Superseded => self.superseded += 1,
            DeliveryOutcome::Failed => self.failed += 1,
            DeliveryOutcome::Dropped => self.dropped += 1,
        }
    }
}

type RecordLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

struct Inner<R> {
    store: EntityStore,
    remote: Arc<R>,
    permits: Semaphore,
    max_attempts: u32,
    claimed: Arc<Mutex<HashSet<i64>>>,
    record_locks: RecordLocks,
    in_flight: Arc<watch::Sender<usize>>,
}

/// Bounded, per-record ordered delivery of outbox entries
pub struct MirrorDispatcher<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for MirrorDispatcher<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: RemoteApi> MirrorDispatcher<R> {
    pub fn new(store: EntityStore, remote: Arc<R>, concurrency: usize, max_attempts: u32) -> Self {
        let (in_flight, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                store,
                remote,
                permits: Semaphore::new(concurrency.max(1)),
                max_attempts: max_attempts.max(1),
                claimed: Arc::new(Mutex::new(HashSet::new())),
                record_locks: Mutex::new(HashMap::new()),
                in_flight: Arc::new(in_flight),
            }),
        }
    }

    /// Deliver one freshly queued entry in the background
    ///
    /// Does nothing if the entry is already being delivered. Must be called
    /// from within a tokio runtime.
    pub fn dispatch(&self, entry_id: i64, op: MirrorOp) {
        let Some(claim) = Claim::take(&self.inner.claimed, entry_id) else {
            return;
        };
        let tracker = InFlight::start(&self.inner.in_flight);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let _tracker = tracker;
            inner.deliver(claim, op).await;
        });
    }

    /// Attempt every queued entry not already being delivered and wait for
    /// the attempts to finish
    pub async fn drain(&self) -> Result<DrainReport> {
        let entries = self
            .inner
            .store
            .call(|store| store.pending_mirrors(DRAIN_BATCH))
            .await?;

        let mut tasks = JoinSet::new();
        for entry in entries {
            let Some(claim) = Claim::take(&self.inner.claimed, entry.id) else {
                continue;
            };
            let tracker = InFlight::start(&self.inner.in_flight);
            let inner = Arc::clone(&self.inner);
            tasks.spawn(async move {
                let _tracker = tracker;
                inner.deliver(claim, entry.op).await
            });
        }

        let mut report = DrainReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => report.record(outcome),
                Err(error) => {
                    tracing::warn!("Mirror delivery task failed: {error}");
                    report.failed += 1;
                }
            }
        }

        if report != DrainReport::default() {
            tracing::info!(
                "Outbox drained: {} delivered, {} superseded, {} failed, {} dropped",
                report.delivered,
                report.superseded,
                report.failed,
                report.dropped
            );
        }
        Ok(report)
    }

    /// Wait until no delivery is running
    pub async fn flush(&self) {
        let mut in_flight = self.inner.in_flight.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = in_flight.wait_for(|count| *count == 0).await;
    }

    /// Number of deliveries currently running or waiting for a permit
    pub fn in_flight(&self) -> usize {
        *self.inner.in_flight.borrow()
    }
}

impl<R: RemoteApi> Inner<R> {
    async fn deliver(&self, claim: Claim, op: MirrorOp) -> DeliveryOutcome {
        let entry_id = claim.id;
        let record_key = op.record_key();
        let record_lock = self.record_lock(&record_key);

        let outcome = {
            let _record_guard = record_lock.lock().await;
            match self.permits.acquire().await {
                Ok(_permit) => self.deliver_locked(entry_id, &op).await,
                Err(_) => DeliveryOutcome::Failed,
            }
        };

        self.release_record_lock(&record_key, record_lock);
        outcome
    }

    async fn deliver_locked(&self, entry_id: i64, op: &MirrorOp) -> DeliveryOutcome {
        match self
            .store
            .call(move |store| store.mirror_exists(entry_id))
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("Skipping superseded mirror {} ({entry_id})", op.label());
                return DeliveryOutcome::Superseded;
            }
            Err(error) => {
                tracing::warn!("Could not check outbox entry {entry_id}: {error}");
                return DeliveryOutcome::Failed;
            }
        }

        match self.send(op).await {
            Ok(()) => {
                tracing::debug!("Mirrored {} ({entry_id})", op.label());
                self.complete(entry_id).await;
                DeliveryOutcome::Delivered
            }
            Err(error) if op.is_delete() && error.is_not_found() => {
                tracing::debug!("Backend already lacks target of {} ({entry_id})", op.label());
                self.complete(entry_id).await;
                DeliveryOutcome::Delivered
            }
            Err(error) => {
                let message = error.to_string();
                let recorded = {
                    let message = message.clone();
                    self.store
                        .call(move |store| store.record_mirror_failure(entry_id, &message))
                        .await
                };
                match recorded {
                    Ok(Some(attempts))
                        if error.is_rejection() && attempts >= self.max_attempts =>
                    {
                        tracing::error!(
                            "Dropping mirror {} ({entry_id}) after {attempts} attempts: {message}",
                            op.label()
                        );
                        self.complete(entry_id).await;
                        DeliveryOutcome::Dropped
                    }
                    Ok(Some(attempts)) => {
                        tracing::warn!(
                            "Mirror {} ({entry_id}) failed, attempt {attempts}: {message}",
                            op.label()
                        );
                        DeliveryOutcome::Failed
                    }
                    Ok(None) => DeliveryOutcome::Superseded,
                    Err(store_error) => {
                        tracing::warn!(
                            "Mirror {} ({entry_id}) failed: {message}; recording failed: {store_error}",
                            op.label()
                        );
                        DeliveryOutcome::Failed
                    }
                }
            }
        }
    }

    async fn send(&self, op: &MirrorOp) -> RemoteResult<()> {
        match op {
            MirrorOp::UpsertList { list } => self.remote.create_list(list).await.map(|_| ()),
            MirrorOp::DeleteList { id } => self.remote.delete_list(id).await,
            MirrorOp::UpsertItem { item } => self.remote.create_item(item).await.map(|_| ()),
            MirrorOp::DeleteItem { id } => self.remote.delete_item(id).await,
            MirrorOp::ClearCompleted { list_id } => self.remote.clear_completed(list_id).await,
        }
    }

    async fn complete(&self, entry_id: i64) {
        if let Err(error) = self
            .store
            .call(move |store| store.complete_mirror(entry_id))
            .await
        {
            tracing::warn!("Could not remove outbox entry {entry_id}: {error}");
        }
    }

    fn record_lock(&self, record_key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .record_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(record_key.to_string()).or_default())
    }

    fn release_record_lock(&self, record_key: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self
            .record_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Only the map and this caller hold it: nobody is waiting
        if Arc::strong_count(&lock) == 2 {
            locks.remove(record_key);
        }
    }
}

/// Exclusive right to deliver one outbox entry
struct Claim {
    id: i64,
    claimed: Arc<Mutex<HashSet<i64>>>,
}

impl Claim {
    fn take(claimed: &Arc<Mutex<HashSet<i64>>>, id: i64) -> Option<Self> {
        let inserted = claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
        inserted.then(|| Self {
            id,
            claimed: Arc::clone(claimed),
        })
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

/// Counts a delivery as running until dropped
struct InFlight {
    counter: Arc<watch::Sender<usize>>,
}

impl InFlight {
    fn start(counter: &Arc<watch::Sender<usize>>) -> Self {
        counter.send_modify(|count| *count += 1);
        Self {
            counter: Arc::clone(counter),
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.counter
            .send_modify(|count| *count = count.saturating_sub(1));
    }
}
