//! Sync orchestration.
//!
//! One pass per subscription: fetch with the stored conditional-request
//! tokens, parse, reconcile into the subscription's local calendar, then
//! persist the new tokens and status. A failing subscription is recorded
//! and never stops the rest of the batch.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;

use crate::database::Database;
use crate::error::{AppResult, SyncError};
use crate::fetch::{fetch, FetchOutcome, FetchRequest, Transport};
use crate::models::{BatchResult, Credential, Subscription, SyncResult};
use crate::parser::parse_calendar;
use crate::reconcile::reconcile;

/// What a candidate feed looks like, reported by [`validate_feed`] without
/// touching storage.
#[derive(Debug, Clone)]
pub struct FeedInfo {
    /// Canonical URL after permanent redirects.
    pub url: String,
    pub name: Option<String>,
    pub color: Option<i32>,
    pub event_count: usize,
}

/// Fetches and parses a feed once, unconditionally, to check that it is
/// usable before subscribing to it.
pub fn validate_feed(
    transport: &dyn Transport,
    uri: &str,
    credential: Option<&Credential>,
) -> AppResult<FeedInfo> {
    let request = FetchRequest {
        uri,
        credential,
        if_none_match: None,
        if_modified_since: None,
    };
    let fetched = fetch(transport, &request)?;
    let resource = match fetched.outcome {
        FetchOutcome::Success(resource) => resource,
        FetchOutcome::NotModified => {
            return Err(SyncError::network(
                "Server answered 304 to an unconditional request",
            ))
        }
    };

    let charset = resource.charset();
    let parsed = parse_calendar(&resource.data, charset.as_deref())?;
    Ok(FeedInfo {
        url: fetched
            .permanent_url
            .map(|url| url.to_string())
            .unwrap_or_else(|| uri.to_string()),
        name: parsed.metadata.name,
        color: parsed.metadata.color,
        event_count: parsed.events.len(),
    })
}

pub struct SyncEngine<'a> {
    db: &'a Database,
    transport: &'a dyn Transport,
}

impl<'a> SyncEngine<'a> {
    pub fn new(db: &'a Database, transport: &'a dyn Transport) -> Self {
        Self { db, transport }
    }

    /// Syncs every subscription in turn. `cancel` is checked between
    /// subscriptions; a pass that already started runs to completion.
    ///
    /// With `force_resync` the stored conditional-request tokens are ignored
    /// and every event is rewritten even if unchanged.
    pub fn sync_all(&self, force_resync: bool, cancel: &AtomicBool) -> AppResult<BatchResult> {
        let removed = self.db.delete_orphan_calendars()?;
        if removed > 0 {
            log::info!("Removed {removed} orphaned local calendar(s)");
        }

        let subscriptions = self.db.get_subscriptions()?;
        log::info!("Synchronizing {} subscription(s)", subscriptions.len());

        let mut batch = BatchResult::default();
        for subscription in subscriptions {
            if cancel.load(Ordering::Relaxed) {
                log::info!("Sync cancelled, stopping batch");
                batch.cancelled = true;
                break;
            }
            batch
                .results
                .push(self.sync_subscription(&subscription, force_resync));
        }
        Ok(batch)
    }

    /// Syncs one subscription and records the outcome on its row.
    pub fn sync_subscription(
        &self,
        subscription: &Subscription,
        force_resync: bool,
    ) -> SyncResult {
        log::info!(
            "Synchronizing \"{}\" ({})",
            subscription.display_name,
            subscription.url
        );

        match self.run_pass(subscription, force_resync) {
            Ok(result) => result,
            Err(e) => {
                let message = e.to_string();
                log::warn!("Sync of {} failed: {message}", subscription.url);
                let now = Utc::now().timestamp_millis();
                if let Err(db_err) = self.db.update_sync_error(subscription.id, &message, now) {
                    log::error!(
                        "Couldn't record sync error for subscription {}: {db_err}",
                        subscription.id
                    );
                }
                SyncResult::with_error(subscription.id, message)
            }
        }
    }

    fn run_pass(&self, subscription: &Subscription, force_resync: bool) -> AppResult<SyncResult> {
        let calendar_id = self.db.ensure_calendar(subscription)?;
        let credential = self.db.get_credential(subscription.id)?;

        let request = FetchRequest {
            uri: &subscription.url,
            credential: credential.as_ref(),
            if_none_match: if force_resync {
                None
            } else {
                subscription.etag.as_deref()
            },
            if_modified_since: if force_resync || subscription.last_modified == 0 {
                None
            } else {
                Some(subscription.last_modified)
            },
        };
        let fetched = fetch(self.transport, &request)?;

        if let Some(url) = &fetched.permanent_url {
            log::info!(
                "Got permanent redirect, updating subscription {} URL to {url}",
                subscription.id
            );
            self.db.update_subscription_url(subscription.id, url.as_str())?;
        }

        let now = Utc::now().timestamp_millis();
        match fetched.outcome {
            FetchOutcome::NotModified => {
                log::info!("Calendar has not been modified since last sync");
                self.db.update_sync_success(
                    subscription.id,
                    subscription.etag.as_deref(),
                    subscription.last_modified,
                    now,
                )?;
                Ok(SyncResult::not_modified(subscription.id))
            }

            FetchOutcome::Success(resource) => {
                let charset = resource.charset();
                let parsed = parse_calendar(&resource.data, charset.as_deref())?;

                // local files carry no NAME property; their file name steps in
                let mut metadata = parsed.metadata;
                if metadata.name.is_none() {
                    metadata.name = resource.display_name.clone();
                }
                self.db
                    .apply_calendar_metadata(calendar_id, subscription, &metadata)?;

                let mut events = parsed.events;
                for event in &mut events {
                    event.apply_preferences(subscription);
                }

                let mut store = self.db.event_store(calendar_id);
                let stats = reconcile(&mut store, &events, force_resync)?;

                self.db.update_sync_success(
                    subscription.id,
                    resource.etag.as_deref(),
                    resource.last_modified.unwrap_or(0),
                    now,
                )?;
                Ok(SyncResult::with_stats(subscription.id, stats))
            }
        }
    }
}
