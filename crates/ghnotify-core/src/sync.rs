// One sync cycle: refresh notifications, then (maybe) star events
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use ghnotify_cache::{Cache, CacheEntry, StarEvent};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::SyncConfig;
use crate::fan_out::EventFetcher;
use crate::source::EventSource;
use crate::Result;

/// Knobs for a single cycle
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Refresh the notification list
    pub notifications: bool,
    /// Run the star phase
    pub events: bool,
    /// Only keep notifications updated within this window
    pub since: Option<Duration>,
    /// Minimum gap between two star phases. Zero disables the guard.
    pub event_cooldown: Duration,
    /// Look-back for the very first star phase
    pub initial_event_window: Duration,
    pub workers: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            notifications: true,
            events: true,
            since: None,
            event_cooldown: Duration::minutes(60),
            initial_event_window: Duration::hours(4),
            workers: crate::fan_out::DEFAULT_WORKERS,
        }
    }
}

impl TryFrom<&SyncConfig> for SyncOptions {
    type Error = crate::Error;

    fn try_from(config: &SyncConfig) -> Result<Self> {
        Ok(Self {
            event_cooldown: config.event_cooldown()?,
            initial_event_window: config.initial_event_window()?,
            workers: config.workers,
            ..Self::default()
        })
    }
}

/// What happened to the star phase this cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EventPhase {
    Fetched { cutoff: DateTime<Utc> },
    CoolingDown { next_at: DateTime<Utc> },
    Disabled,
}

/// Items seen for the first time this cycle
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub new_notifications: Vec<CacheEntry>,
    pub new_events: Vec<StarEvent>,
    pub event_phase: EventPhase,
}

pub struct SyncEngine {
    source: Arc<dyn EventSource>,
    options: SyncOptions,
}

impl SyncEngine {
    pub fn new(source: Arc<dyn EventSource>, options: SyncOptions) -> Self {
        Self { source, options }
    }

    /// Run one cycle against `cache`. Saving is left to the caller.
    ///
    /// Notification fetch failures and repository listing failures abort
    /// the cycle; per-repository star failures do not.
    pub async fn run(&self, cache: &mut Cache, now: DateTime<Utc>) -> Result<SyncOutcome> {
        let mut new_notifications = Vec::new();

        if self.options.notifications {
            let mut fetched = self.source.fetch_notifications().await?;
            debug!("Fetched {} notifications", fetched.len());

            if let Some(since) = self.options.since {
                let cutoff = now - since;
                fetched.retain(|n| n.updated_at > cutoff);
                debug!("{} notifications updated since {}", fetched.len(), cutoff);
            }

            new_notifications = cache.merge_notifications(fetched);
            info!("{} new notifications", new_notifications.len());
        }

        let event_phase = if !self.options.events {
            EventPhase::Disabled
        } else if let Some(next_at) = self.cooldown_until(cache.last_event_sync, now) {
            info!("Skipping star check until {}", next_at);
            EventPhase::CoolingDown { next_at }
        } else {
            EventPhase::Fetched {
                cutoff: self.event_cutoff(cache.last_event_sync, now),
            }
        };

        let mut new_events = Vec::new();
        if let EventPhase::Fetched { cutoff } = event_phase {
            if cache.last_event_sync.is_none() {
                info!("First star sync, looking back to {}", cutoff);
            }

            let fetched = EventFetcher::new(Arc::clone(&self.source))
                .with_workers(self.options.workers)
                .fetch_all_events(cutoff)
                .await?;

            new_events = cache.merge_events(fetched);
            cache.last_event_sync = Some(now);
            info!("{} new stars", new_events.len());
        }

        Ok(SyncOutcome {
            new_notifications,
            new_events,
            event_phase,
        })
    }

    /// When the cool-down is still running, the moment it ends
    pub fn cooldown_until(
        &self,
        last_event_sync: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let last = last_event_sync?;
        if self.options.event_cooldown <= Duration::zero() {
            return None;
        }
        let next_at = last + self.options.event_cooldown;
        (now < next_at).then_some(next_at)
    }

    /// Stars at or before this instant are considered already seen
    pub fn event_cutoff(
        &self,
        last_event_sync: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        last_event_sync.unwrap_or(now - self.options.initial_event_window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use async_trait::async_trait;
    use ghnotify_api::ApiError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSource {
        notifications: Vec<CacheEntry>,
        events: Vec<StarEvent>,
        notifications_fail: bool,
        event_cutoffs: Mutex<Vec<DateTime<Utc>>>,
    }

    #[async_trait]
    impl EventSource for FakeSource {
        async fn fetch_notifications(&self) -> Result<Vec<CacheEntry>> {
            if self.notifications_fail {
                return Err(ApiError::Unauthorized.into());
            }
            Ok(self.notifications.clone())
        }

        async fn fetch_resource_ids(&self) -> Result<Vec<String>> {
            Ok(vec!["octo/widgets".into()])
        }

        async fn fetch_paginated_events(
            &self,
            _resource_id: &str,
            since: DateTime<Utc>,
        ) -> Result<Vec<StarEvent>> {
            self.event_cutoffs.lock().unwrap().push(since);
            Ok(self
                .events
                .iter()
                .filter(|e| e.occurred_at > since)
                .cloned()
                .collect())
        }
    }

    fn now() -> DateTime<Utc> {
        "2024-05-01T12:00:00Z".parse().unwrap()
    }

    fn entry(id: &str, updated_minutes_ago: i64) -> CacheEntry {
        CacheEntry {
            id: id.into(),
            repository: "octo/widgets".into(),
            title: format!("Thread {}", id),
            reason: "subscribed".into(),
            kind: "Issue".into(),
            source_url: String::new(),
            display_url: String::new(),
            fetched_at: now(),
            updated_at: now() - Duration::minutes(updated_minutes_ago),
        }
    }

    fn star(id: &str, minutes_ago: i64) -> StarEvent {
        StarEvent {
            id: id.into(),
            repository: "octo/widgets".into(),
            actor: "hubot".into(),
            occurred_at: now() - Duration::minutes(minutes_ago),
            notified: false,
        }
    }

    fn engine(source: Arc<FakeSource>, options: SyncOptions) -> SyncEngine {
        SyncEngine::new(source, options)
    }

    #[test]
    fn test_options_from_config() {
        let config = SyncConfig {
            workers: 2,
            event_cooldown_minutes: 15,
            initial_event_window_hours: 1,
        };
        let options = SyncOptions::try_from(&config).unwrap();
        assert_eq!(options.workers, 2);
        assert_eq!(options.event_cooldown, Duration::minutes(15));
        assert_eq!(options.initial_event_window, Duration::hours(1));

        let defaults = SyncOptions::try_from(&SyncConfig::default()).unwrap();
        assert_eq!(defaults.event_cooldown, SyncOptions::default().event_cooldown);
        assert_eq!(defaults.initial_event_window, SyncOptions::default().initial_event_window);
    }

    #[test]
    fn test_out_of_range_config_is_error() {
        let config = SyncConfig {
            event_cooldown_minutes: u64::MAX,
            ..SyncConfig::default()
        };
        assert!(matches!(
            SyncOptions::try_from(&config),
            Err(Error::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_first_sync_uses_initial_window() {
        let source = Arc::new(FakeSource {
            notifications: vec![entry("a", 5)],
            events: vec![star("recent", 30), star("ancient", 60 * 24)],
            ..Default::default()
        });
        let mut cache = Cache::new();

        let outcome = engine(source.clone(), SyncOptions::default())
            .run(&mut cache, now())
            .await
            .unwrap();

        let cutoff = now() - Duration::hours(4);
        assert_eq!(outcome.event_phase, EventPhase::Fetched { cutoff });
        assert_eq!(source.event_cutoffs.lock().unwrap().as_slice(), &[cutoff]);
        assert_eq!(outcome.new_events.len(), 1);
        assert_eq!(outcome.new_events[0].id, "recent");
        assert_eq!(outcome.new_notifications.len(), 1);
        assert_eq!(cache.last_event_sync, Some(now()));
        assert!(cache.last_sync.is_some());
    }

    #[tokio::test]
    async fn test_cooldown_skips_event_phase() {
        let source = Arc::new(FakeSource {
            events: vec![star("recent", 1)],
            ..Default::default()
        });
        let mut cache = Cache::new();
        let last = now() - Duration::minutes(20);
        cache.last_event_sync = Some(last);

        let outcome = engine(source.clone(), SyncOptions::default())
            .run(&mut cache, now())
            .await
            .unwrap();

        assert_eq!(
            outcome.event_phase,
            EventPhase::CoolingDown {
                next_at: last + Duration::minutes(60)
            }
        );
        assert!(outcome.new_events.is_empty());
        assert!(source.event_cutoffs.lock().unwrap().is_empty());
        assert_eq!(cache.last_event_sync, Some(last));
    }

    #[tokio::test]
    async fn test_after_cooldown_uses_last_event_sync_as_cutoff() {
        let source = Arc::new(FakeSource {
            events: vec![star("new", 10), star("seen", 120)],
            ..Default::default()
        });
        let mut cache = Cache::new();
        let last = now() - Duration::minutes(90);
        cache.last_event_sync = Some(last);

        let outcome = engine(source.clone(), SyncOptions::default())
            .run(&mut cache, now())
            .await
            .unwrap();

        assert_eq!(outcome.event_phase, EventPhase::Fetched { cutoff: last });
        let ids: Vec<_> = outcome.new_events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["new"]);
        assert_eq!(cache.last_event_sync, Some(now()));
    }

    #[tokio::test]
    async fn test_zero_cooldown_always_fetches() {
        let source = Arc::new(FakeSource::default());
        let mut cache = Cache::new();
        cache.last_event_sync = Some(now() - Duration::minutes(1));

        let options = SyncOptions {
            event_cooldown: Duration::zero(),
            ..SyncOptions::default()
        };
        let outcome = engine(source, options).run(&mut cache, now()).await.unwrap();

        assert!(matches!(outcome.event_phase, EventPhase::Fetched { .. }));
    }

    #[tokio::test]
    async fn test_events_disabled_and_since_filter() {
        let source = Arc::new(FakeSource {
            notifications: vec![entry("fresh", 10), entry("stale", 300)],
            ..Default::default()
        });
        let mut cache = Cache::new();

        let options = SyncOptions {
            events: false,
            since: Some(Duration::minutes(60)),
            ..SyncOptions::default()
        };
        let outcome = engine(source.clone(), options)
            .run(&mut cache, now())
            .await
            .unwrap();

        assert_eq!(outcome.event_phase, EventPhase::Disabled);
        assert_eq!(outcome.new_notifications.len(), 1);
        assert_eq!(cache.notifications()[0].id, "fresh");
        assert!(cache.last_event_sync.is_none());
        assert!(source.event_cutoffs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_events_only_leaves_notifications_alone() {
        let source = Arc::new(FakeSource {
            notifications: vec![entry("ignored", 1)],
            ..Default::default()
        });
        let mut cache = Cache::new();
        cache.merge_notifications(vec![entry("kept", 30)]);

        let options = SyncOptions {
            notifications: false,
            ..SyncOptions::default()
        };
        let outcome = engine(source, options).run(&mut cache, now()).await.unwrap();

        assert!(outcome.new_notifications.is_empty());
        assert_eq!(cache.notifications().len(), 1);
        assert_eq!(cache.notifications()[0].id, "kept");
    }

    #[tokio::test]
    async fn test_notification_failure_aborts_cycle() {
        let source = Arc::new(FakeSource {
            notifications_fail: true,
            events: vec![star("recent", 1)],
            ..Default::default()
        });
        let mut cache = Cache::new();

        let err = engine(source.clone(), SyncOptions::default())
            .run(&mut cache, now())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Api(ApiError::Unauthorized)));
        assert!(source.event_cutoffs.lock().unwrap().is_empty());
        assert!(cache.last_event_sync.is_none());
    }
}
