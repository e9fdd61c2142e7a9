// Where a sync cycle gets its data from
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ghnotify_cache::{CacheEntry, StarEvent};

use crate::Result;

/// Upstream source of notifications and star events
///
/// The GitHub implementation lives in `providers`; tests plug in fakes.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// The current unread set. All or nothing.
    async fn fetch_notifications(&self) -> Result<Vec<CacheEntry>>;

    /// Identifiers (owner/name) that need a per-resource event fetch
    async fn fetch_resource_ids(&self) -> Result<Vec<String>>;

    /// Events on one resource strictly newer than `since`, newest first
    async fn fetch_paginated_events(
        &self,
        resource_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<StarEvent>>;
}
