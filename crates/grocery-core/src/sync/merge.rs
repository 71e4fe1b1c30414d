//! Last-write-wins merge of a backend snapshot

use super::MergeCounts;
use crate::db::{EntityStore, StoreTx, Table};
use crate::error::Result;
use crate::models::{Record, SyncSnapshot};

/// How one incoming record is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    Insert,
    Replace,
    KeepLocal,
}

/// Compare an incoming record with the local copy
///
/// Ties keep the local copy, so re-applying a snapshot changes nothing.
pub fn decide<T: Record>(local: Option<&T>, remote: &T) -> MergeDecision {
    match local {
        None => MergeDecision::Insert,
        Some(local) if remote.updated_at() > local.updated_at() => MergeDecision::Replace,
        Some(_) => MergeDecision::KeepLocal,
    }
}

/// Apply incoming records of one kind inside an open transaction
pub fn merge_records<T: Table>(tx: &StoreTx<'_>, incoming: &[T]) -> Result<MergeCounts> {
    let mut counts = MergeCounts::default();

    for remote in incoming {
        let local = tx.get_by_id::<T>(remote.id_str())?;
        match decide(local.as_ref(), remote) {
            MergeDecision::Insert => {
                tx.upsert(remote)?;
                counts.inserted += 1;
            }
            MergeDecision::Replace => {
                tx.upsert(remote)?;
                counts.updated += 1;
            }
            MergeDecision::KeepLocal => counts.skipped += 1,
        }
    }

    Ok(counts)
}

/// Merge lists, then items, in one transaction
///
/// Returns `(lists, items)` tallies. Nothing is written if any record fails.
pub fn merge_snapshot(
    store: &EntityStore,
    snapshot: &SyncSnapshot,
) -> Result<(MergeCounts, MergeCounts)> {
    store.transaction(|tx| {
        let lists = merge_records(tx, &snapshot.lists)?;
        let items = merge_records(tx, &snapshot.items)?;
        Ok((lists, items))
    })
}
