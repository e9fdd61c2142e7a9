// Notification cache: data model, merge rules, eviction and persistence
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CacheError, Result};

/// Fallback cap when the stored document has no (or a zero) limit.
pub const DEFAULT_MAX_ENTRIES: usize = 500;

/// Notifications older than this are dropped on save.
pub const NOTIFICATION_MAX_AGE_DAYS: i64 = 30;

/// Star events older than this are dropped on save.
pub const EVENT_MAX_AGE_DAYS: i64 = 7;

pub const FORMAT_VERSION: &str = "1.0";

pub const CACHE_FILE_NAME: &str = "notifications.json";

/// One unread GitHub notification thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub id: String,
    /// owner/name
    pub repository: String,
    pub title: String,
    pub reason: String,
    /// Subject type ("Issue", "PullRequest", ...). May be empty.
    #[serde(rename = "type", default)]
    pub kind: String,
    pub source_url: String,
    pub display_url: String,
    /// When we saw it
    pub fetched_at: DateTime<Utc>,
    /// When GitHub last touched it
    pub updated_at: DateTime<Utc>,
}

/// Someone starred one of the user's repositories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarEvent {
    /// Stargazer edge cursor - stable and unique per star
    pub id: String,
    pub repository: String,
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub notified: bool,
}

/// The whole persisted document.
///
/// `notifications` mirrors the server-side unread set and is replaced on
/// every refresh; `events` accumulates across refreshes. Limits are only
/// enforced by [`Cache::save`], so an in-memory cache can be over the cap
/// between merges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cache {
    pub format_version: String,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_event_sync: Option<DateTime<Utc>>,
    pub notifications: Vec<CacheEntry>,
    pub events: Vec<StarEvent>,
    pub max_entries: usize,
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache {
    pub fn new() -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            last_sync: None,
            last_event_sync: None,
            notifications: Vec::new(),
            events: Vec::new(),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    /// Path of the cache document inside `dir`
    pub fn file_path(dir: &Path) -> PathBuf {
        dir.join(CACHE_FILE_NAME)
    }

    /// Load the cache from `dir`.
    ///
    /// A missing file is a fresh cache, not an error. A file that exists
    /// but doesn't parse is an error - we never silently throw away state.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = Self::file_path(dir);

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No cache file yet, starting empty");
                return Ok(Self::new());
            }
            Err(source) => return Err(CacheError::Read { path, source }),
        };

        let mut cache: Cache = serde_json::from_str(&contents)
            .map_err(|source| CacheError::Parse { path: path.clone(), source })?;

        // Older documents may predate the limit
        if cache.max_entries == 0 {
            cache.max_entries = DEFAULT_MAX_ENTRIES;
        }

        debug!(
            path = %path.display(),
            notifications = cache.notifications.len(),
            events = cache.events.len(),
            "Cache loaded"
        );

        Ok(cache)
    }

    /// Evict, then write the whole document to `dir` atomically.
    pub fn save(&mut self, dir: &Path) -> Result<()> {
        ensure_dir(dir)?;

        self.evict(Utc::now());

        let json = serde_json::to_string_pretty(self).map_err(CacheError::Serialize)?;

        let path = Self::file_path(dir);
        let temp_path = path.with_extension("json.tmp");

        // Write atomically via temp file
        write_file(&temp_path, json.as_bytes())
            .map_err(|source| CacheError::Write { path: temp_path.clone(), source })?;
        if let Err(source) = fs::rename(&temp_path, &path) {
            // Don't leave a stale temp file next to the cache
            let _ = fs::remove_file(&temp_path);
            return Err(CacheError::Write { path, source });
        }

        debug!(
            path = %path.display(),
            notifications = self.notifications.len(),
            events = self.events.len(),
            "Cache saved"
        );

        Ok(())
    }

    /// Replace the stored notifications with `fetched` and return the ones
    /// we hadn't seen before.
    ///
    /// Anything stored but missing from `fetched` was read or resolved on
    /// GitHub, so it drops out.
    pub fn merge_notifications(&mut self, fetched: Vec<CacheEntry>) -> Vec<CacheEntry> {
        self.last_sync = Some(Utc::now());

        let known: HashSet<&str> = self.notifications.iter().map(|n| n.id.as_str()).collect();

        let fresh: Vec<CacheEntry> = fetched
            .iter()
            .filter(|n| !known.contains(n.id.as_str()))
            .cloned()
            .collect();

        self.notifications = fetched;
        fresh
    }

    /// Append events we haven't stored yet and return exactly those.
    pub fn merge_events(&mut self, fetched: Vec<StarEvent>) -> Vec<StarEvent> {
        let mut known: HashSet<String> = self.events.iter().map(|e| e.id.clone()).collect();

        let mut fresh = Vec::new();
        for event in fetched {
            if known.insert(event.id.clone()) {
                self.events.push(event.clone());
                fresh.push(event);
            }
        }

        fresh
    }

    /// Flag stored events as already alerted on
    pub fn mark_events_notified(&mut self, ids: &[String]) {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        for event in &mut self.events {
            if ids.contains(event.id.as_str()) {
                event.notified = true;
            }
        }
    }

    pub fn notifications(&self) -> &[CacheEntry] {
        &self.notifications
    }

    pub fn events(&self) -> &[StarEvent] {
        &self.events
    }

    /// Forget everything, including both sync timestamps
    pub fn clear(&mut self) {
        self.notifications.clear();
        self.events.clear();
        self.last_sync = None;
        self.last_event_sync = None;
    }

    /// Apply the age cutoffs and the size cap as of `now`.
    ///
    /// Runs as part of [`Cache::save`]; exposed so callers can prune
    /// without touching disk.
    pub fn evict(&mut self, now: DateTime<Utc>) {
        let max = self.max_entries;

        let notification_cutoff = now - Duration::days(NOTIFICATION_MAX_AGE_DAYS);
        let before = self.notifications.len();
        self.notifications.retain(|n| n.fetched_at >= notification_cutoff);
        self.notifications
            .sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        self.notifications.truncate(max);

        let event_cutoff = now - Duration::days(EVENT_MAX_AGE_DAYS);
        let events_before = self.events.len();
        self.events.retain(|e| e.occurred_at >= event_cutoff);
        self.events.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        self.events.truncate(max);

        let dropped_notifications = before - self.notifications.len();
        let dropped_events = events_before - self.events.len();
        if dropped_notifications > 0 || dropped_events > 0 {
            debug!(dropped_notifications, dropped_events, max_entries = max, "Evicted cache entries");
        }
    }
}

/// Default cache location: ~/.cache/gh-notify (XDG cache dir on Linux)
pub fn default_cache_dir() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|dir| dir.join("gh-notify"))
        .ok_or(CacheError::NoCacheDir)
}

fn ensure_dir(dir: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }

    builder.create(dir).map_err(|source| CacheError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
