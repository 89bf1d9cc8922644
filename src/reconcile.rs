//! Reconciliation of freshly parsed feed events against the local store.
//!
//! The pass is idempotent: events are inserted when unknown, updated only
//! when the remote side is newer (or when either side lacks a timestamp,
//! which is treated as changed), and left alone otherwise. Local events
//! whose UID no longer appears in the feed are deleted afterwards.

use std::collections::HashSet;

use crate::error::AppResult;
use crate::models::{ReconcileStats, RemoteEvent};

/// What reconciliation needs to know about an already stored event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEvent {
    pub uid: String,
    /// LAST-MODIFIED recorded at the previous sync; `None` when the feed
    /// never provided one.
    pub last_modified: Option<i64>,
}

/// Event storage as seen by the reconciler. Exception instances live inside
/// their master row and never appear as their own UIDs, so they are neither
/// returned by `find_by_uid` for other masters nor candidates for
/// `delete_events_not_in`.
pub trait LocalEventStore {
    fn find_by_uid(&self, uid: &str) -> AppResult<Option<LocalEvent>>;

    /// Stores a new event with its exceptions.
    fn insert_event(&mut self, event: &RemoteEvent) -> AppResult<()>;

    /// Replaces a stored event and its exceptions.
    fn update_event(&mut self, event: &RemoteEvent) -> AppResult<()>;

    /// Deletes every master event whose UID is not in `keep_uids` and
    /// returns how many were removed.
    fn delete_events_not_in(&mut self, keep_uids: &HashSet<String>) -> AppResult<usize>;
}

/// Merges `events` into `store`.
///
/// With `ignore_last_modified` set every known event is rewritten
/// unconditionally; this backs forced re-syncs where the local copy may be
/// damaged.
///
/// A failure to insert or update a single event is logged and counted as
/// skipped so the rest of the feed still lands; a failure during orphan
/// deletion aborts the pass.
pub fn reconcile(
    store: &mut dyn LocalEventStore,
    events: &[RemoteEvent],
    ignore_last_modified: bool,
) -> AppResult<ReconcileStats> {
    let mut stats = ReconcileStats::default();
    let mut seen_uids: HashSet<String> = HashSet::new();

    for event in events {
        seen_uids.insert(event.uid.clone());

        match store.find_by_uid(&event.uid)? {
            None => {
                log::debug!("{} not in local calendar, adding", event.uid);
                match store.insert_event(event) {
                    Ok(()) => stats.inserted += 1,
                    Err(e) => {
                        log::warn!("Couldn't add event {} to local calendar: {e}", event.uid);
                        stats.skipped += 1;
                    }
                }
            }

            Some(local) => {
                let changed = if ignore_last_modified {
                    true
                } else {
                    match (effective_last_modified(event), local.last_modified) {
                        (Some(remote), Some(local_ts)) => remote > local_ts,
                        // either side has no timestamp, assume changed
                        _ => true,
                    }
                };

                if changed {
                    log::debug!("{} has been updated, updating in local calendar", event.uid);
                    match store.update_event(event) {
                        Ok(()) => stats.updated += 1,
                        Err(e) => {
                            log::warn!(
                                "Couldn't update event {} in local calendar: {e}",
                                event.uid
                            );
                            stats.skipped += 1;
                        }
                    }
                } else {
                    log::debug!("{} has not been modified since last sync", event.uid);
                    stats.skipped += 1;
                }
            }
        }
    }

    stats.deleted = store.delete_events_not_in(&seen_uids)?;

    log::info!(
        "Reconciliation done: {} added, {} updated, {} skipped, {} deleted",
        stats.inserted,
        stats.updated,
        stats.skipped,
        stats.deleted
    );
    Ok(stats)
}

/// The timestamp of the most recently modified part of the series. An
/// exception without its own LAST-MODIFIED makes the whole series
/// undatable, so the result is `None` and the caller treats it as changed.
fn effective_last_modified(event: &RemoteEvent) -> Option<i64> {
    let mut effective = event.last_modified?;
    for exception in &event.exceptions {
        match exception.last_modified {
            Some(ts) => effective = effective.max(ts),
            None => return None,
        }
    }
    Some(effective)
}
