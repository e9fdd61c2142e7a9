// Bounded worker pool that fetches star events for every repository
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ghnotify_cache::StarEvent;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::{source::EventSource, Result};

/// Parallel repository fetches. Keeps us well clear of GitHub's abuse
/// detection while still finishing a few hundred repos quickly.
pub const DEFAULT_WORKERS: usize = 6;

/// Fans per-resource event fetches out over a fixed pool of workers
pub struct EventFetcher {
    source: Arc<dyn EventSource>,
    workers: usize,
}

impl EventFetcher {
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self {
            source,
            workers: DEFAULT_WORKERS,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Every event newer than `since` across all resources, newest first.
    ///
    /// Failing to list resources is fatal. A single resource failing is
    /// logged and skipped, so the result may be partial.
    pub async fn fetch_all_events(&self, since: DateTime<Utc>) -> Result<Vec<StarEvent>> {
        let resources = self.source.fetch_resource_ids().await?;
        if resources.is_empty() {
            debug!("No repositories to check for stars");
            return Ok(Vec::new());
        }

        let total = resources.len();
        let worker_count = self.workers.min(total);
        info!(
            "Checking {} repositories for stars with {} workers",
            total, worker_count
        );

        // Fill the queue up front and drop the sender so workers see the
        // end of the queue once it drains.
        let (tx, rx) = mpsc::channel(total);
        for resource in resources {
            // Capacity is `total`, so this never waits
            if tx.send(resource).await.is_err() {
                break;
            }
        }
        drop(tx);

        let queue = Arc::new(Mutex::new(rx));
        let collected = Arc::new(Mutex::new(Vec::new()));
        let completed = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));

        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            let source = Arc::clone(&self.source);
            let queue = Arc::clone(&queue);
            let collected = Arc::clone(&collected);
            let completed = Arc::clone(&completed);
            let failed = Arc::clone(&failed);

            workers.spawn(async move {
                loop {
                    // Hold the queue lock only long enough to take one item
                    let next = queue.lock().await.recv().await;
                    let Some(resource) = next else {
                        break;
                    };

                    match source.fetch_paginated_events(&resource, since).await {
                        Ok(mut events) => {
                            if !events.is_empty() {
                                debug!(
                                    "Worker {}: {} new stars on {}",
                                    worker_id,
                                    events.len(),
                                    resource
                                );
                                collected.lock().await.append(&mut events);
                            }
                        }
                        Err(e) => {
                            let kind = e.kind();
                            warn!(
                                repository = %resource,
                                kind = %kind,
                                "{}: {}",
                                kind.hint(),
                                e
                            );
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }

                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!("Progress: {}/{} repositories", done, total);
                }
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!("Star fetch worker panicked: {}", e);
            }
        }

        let mut events = std::mem::take(&mut *collected.lock().await);
        events.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));

        info!(
            "Fetched {} stars from {} repositories ({} failed)",
            events.len(),
            completed.load(Ordering::Relaxed),
            failed.load(Ordering::Relaxed)
        );

        Ok(events)
    }
}
