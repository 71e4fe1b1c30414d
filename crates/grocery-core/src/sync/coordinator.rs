//! Sync coordinator: throttling, single-flight and the full sync pipeline

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::merge::merge_snapshot;
use super::mirror::MirrorDispatcher;
use super::single_flight::SingleFlight;
use super::{SyncError, SyncOutcome, SyncReport};
use crate::clock::ClockSource;
use crate::db::{EntityStore, SyncStamp};
use crate::remote::RemoteApi;
use crate::state::SyncState;
use crate::util::duration_millis;

/// Runs full syncs for one local store against one backend
///
/// At most one full sync per user id is in flight; concurrent callers share
/// its result. The sync state is published on a watch channel.
pub struct SyncCoordinator<R> {
    store: EntityStore,
    remote: Arc<R>,
    mirrors: MirrorDispatcher<R>,
    clock: Arc<dyn ClockSource>,
    min_sync_interval: Duration,
    flights: SingleFlight<String, Result<SyncReport, SyncError>>,
    state: watch::Sender<SyncState>,
}

impl<R: RemoteApi> SyncCoordinator<R> {
    pub fn new(
        store: EntityStore,
        remote: Arc<R>,
        mirrors: MirrorDispatcher<R>,
        clock: Arc<dyn ClockSource>,
        min_sync_interval: Duration,
    ) -> Self {
        let (state, _) = watch::channel(SyncState::Idle);
        Self {
            store,
            remote,
            mirrors,
            clock,
            min_sync_interval,
            flights: SingleFlight::new(),
            state,
        }
    }

    /// Run a full sync unless the last successful one finished less than
    /// the minimum interval ago
    pub async fn smart_sync(&self, user_id: &str) -> Result<SyncOutcome, SyncError> {
        let stamp = self
            .store
            .call(|store| store.sync_stamp())
            .await
            .map_err(SyncError::storage)?;

        if let Some(stamp) = stamp {
            let since_last_ms = self.clock.now_ms() - stamp.last_sync_time_ms;
            // A stamp from the future means the clock moved back; sync anyway
            if (0..duration_millis(self.min_sync_interval)).contains(&since_last_ms) {
                tracing::debug!("Skipping sync, last sync {since_last_ms}ms ago");
                return Ok(SyncOutcome::Skipped { since_last_ms });
            }
        }

        self.force_full_sync(user_id).await.map(SyncOutcome::Completed)
    }

    /// Drain the outbox, pull the backend snapshot and merge it
    pub async fn force_full_sync(&self, user_id: &str) -> Result<SyncReport, SyncError> {
        self.flights
            .run(user_id.to_string(), || self.run_full_sync(user_id))
            .await
    }

    async fn run_full_sync(&self, user_id: &str) -> Result<SyncReport, SyncError> {
        let running = RunningSync::start(&self.state);
        let result = self.sync_once(user_id).await;
        running.finish();

        match &result {
            Ok(report) => {
                self.state.send_replace(SyncState::Synced);
                tracing::info!(
                    "Sync complete in {}ms: lists +{} ~{} ={}, items +{} ~{} ={}, {} mirror(s) pending",
                    report.duration_ms,
                    report.lists.inserted,
                    report.lists.updated,
                    report.lists.skipped,
                    report.items.inserted,
                    report.items.updated,
                    report.items.skipped,
                    report.mirrors_pending
                );
            }
            Err(error) => {
                self.state.send_replace(SyncState::Failed);
                tracing::warn!("Sync failed: {error}");
            }
        }

        result
    }

    async fn sync_once(&self, user_id: &str) -> Result<SyncReport, SyncError> {
        let started_ms = self.clock.now_ms();

        let mirrors_delivered = match self.mirrors.drain().await {
            Ok(drained) => drained.delivered,
            Err(error) => {
                tracing::warn!("Could not drain outbox before sync: {error}");
                0
            }
        };

        let snapshot = self.remote.fetch_snapshot(user_id).await?;
        tracing::debug!(
            "Fetched snapshot with {} list(s) and {} item(s)",
            snapshot.lists.len(),
            snapshot.items.len()
        );

        let (lists, items) = self
            .store
            .call(move |store| merge_snapshot(store, &snapshot))
            .await
            .map_err(SyncError::merge)?;

        let completed_at_ms = self.clock.now_ms();
        let stamp = SyncStamp {
            last_sync_time_ms: completed_at_ms,
            last_sync_duration_ms: (completed_at_ms - started_ms).max(0),
        };
        self.store
            .call(move |store| store.save_sync_stamp(stamp))
            .await
            .map_err(SyncError::storage)?;

        let mirrors_pending = match self.store.call(|store| store.outbox_len()).await {
            Ok(pending) => pending,
            Err(error) => {
                tracing::debug!("Could not count pending mirrors: {error}");
                0
            }
        };

        Ok(SyncReport {
            lists,
            items,
            mirrors_delivered,
            mirrors_pending,
            completed_at_ms,
            duration_ms: stamp.last_sync_duration_ms,
        })
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Subscribe to sync state changes
    pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Completion time of the last successful sync (Unix ms)
    pub async fn last_sync_time(&self) -> crate::Result<Option<i64>> {
        let stamp = self.store.call(|store| store.sync_stamp()).await?;
        Ok(stamp.map(|stamp| stamp.last_sync_time_ms))
    }

    /// Duration of the last successful sync
    pub async fn last_sync_duration(&self) -> crate::Result<Option<Duration>> {
        let stamp = self.store.call(|store| store.sync_stamp()).await?;
        Ok(stamp.map(|stamp| {
            Duration::from_millis(u64::try_from(stamp.last_sync_duration_ms).unwrap_or(0))
        }))
    }
}

/// Publishes `Syncing` while alive
///
/// A sync future dropped before it finished puts the state back to `Idle`.
struct RunningSync<'a> {
    state: &'a watch::Sender<SyncState>,
    finished: bool,
}

impl<'a> RunningSync<'a> {
    fn start(state: &'a watch::Sender<SyncState>) -> Self {
        state.send_replace(SyncState::Syncing);
        Self {
            state,
            finished: false,
        }
    }

    /// The caller publishes the outcome itself
    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for RunningSync<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!("Sync abandoned before completion");
            self.state.send_replace(SyncState::Idle);
        }
    }
}
