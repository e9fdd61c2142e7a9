// Subcommand handlers
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use ghnotify_api::GitHubClient;
use ghnotify_cache::{Cache, CacheEntry, StarEvent};
use ghnotify_core::{config, Config, EventPhase, GitHubProvider, SyncEngine, SyncOptions};
use serde::Serialize;
use tracing::{debug, info};

/// Resolved config and cache location shared by every subcommand
pub struct Context {
    pub config: Config,
    pub cache_dir: PathBuf,
}

impl Context {
    pub fn new(config_path: Option<&Path>, cache_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let config = Config::load(config_path).context("failed to load config")?;
        let cache_dir = match cache_dir {
            Some(dir) => dir,
            None => config.cache_dir()?,
        };
        Ok(Self { config, cache_dir })
    }

    fn load_cache(&self) -> anyhow::Result<Cache> {
        let mut cache = Cache::load(&self.cache_dir).context("failed to load cache")?;
        if let Some(max) = self.config.cache.max_entries.filter(|&m| m > 0) {
            cache.max_entries = max;
        }
        debug!(
            "Cache loaded from {}: {} notifications, {} stars",
            self.cache_dir.display(),
            cache.notifications().len(),
            cache.events().len()
        );
        Ok(cache)
    }
}

pub struct SyncArgs {
    pub notifications: bool,
    pub events: bool,
    pub since_minutes: Option<u64>,
    pub json: bool,
}

/// What `sync --json` prints
#[derive(Debug, Serialize)]
struct SyncReport<'a> {
    new_notifications: &'a [CacheEntry],
    new_events: &'a [StarEvent],
    event_phase: &'a EventPhase,
    total_notifications: usize,
    total_events: usize,
}

pub async fn sync(ctx: &Context, args: SyncArgs) -> anyhow::Result<()> {
    info!("Starting sync, cache dir {}", ctx.cache_dir.display());
    let mut cache = ctx.load_cache()?;

    let mut options = SyncOptions::try_from(&ctx.config.sync)?;
    options.notifications = args.notifications;
    options.events = args.events;
    // 0 means no filter
    options.since = args
        .since_minutes
        .filter(|&m| m > 0)
        .map(|m| {
            config::duration_from_minutes(m)
                .ok_or_else(|| anyhow::anyhow!("--since is out of range: {} minutes", m))
        })
        .transpose()?;

    let token = ctx.config.resolve_token()?;
    let client = GitHubClient::new(&token, &ctx.config.endpoints(), ctx.config.retry_config()?)
        .context("failed to create GitHub client")?;
    let login = client
        .authenticated_user()
        .await
        .context("GitHub authentication failed")?;
    debug!("Authenticated as {}", login);

    let engine = SyncEngine::new(Arc::new(GitHubProvider::new(client)), options);
    let outcome = engine.run(&mut cache, Utc::now()).await?;

    // Everything printed below counts as surfaced
    let surfaced: Vec<String> = outcome.new_events.iter().map(|e| e.id.clone()).collect();
    cache.mark_events_notified(&surfaced);

    cache.save(&ctx.cache_dir).context("failed to save cache")?;

    if args.json {
        let report = SyncReport {
            new_notifications: &outcome.new_notifications,
            new_events: &outcome.new_events,
            event_phase: &outcome.event_phase,
            total_notifications: cache.notifications().len(),
            total_events: cache.events().len(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for n in &outcome.new_notifications {
        println!("{}", format_notification(n));
    }
    for e in &outcome.new_events {
        println!("{}", format_event(e));
    }
    if let EventPhase::CoolingDown { next_at } = outcome.event_phase {
        debug!("Next star check after {}", format_time(next_at));
    }

    Ok(())
}

/// Which cached notifications `list` shows
#[derive(Debug, Default)]
pub struct ListFilter {
    /// Case-insensitive substring of owner/name
    pub repository: Option<String>,
    /// Exact reason, as GitHub spells it
    pub reason: Option<String>,
}

impl ListFilter {
    fn matches(&self, n: &CacheEntry) -> bool {
        let repo_ok = self.repository.as_deref().map_or(true, |wanted| {
            n.repository.to_lowercase().contains(&wanted.to_lowercase())
        });
        let reason_ok = self.reason.as_deref().map_or(true, |wanted| n.reason == wanted);
        repo_ok && reason_ok
    }
}

/// Notifications in the order `list` numbers them: newest update first
fn listed_notifications<'a>(cache: &'a Cache, filter: &ListFilter) -> Vec<&'a CacheEntry> {
    let mut listed: Vec<&CacheEntry> = cache
        .notifications()
        .iter()
        .filter(|n| filter.matches(n))
        .collect();
    listed.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    listed
}

pub fn list(ctx: &Context, limit: usize, events: bool, filter: &ListFilter) -> anyhow::Result<()> {
    let cache = ctx.load_cache()?;

    if events {
        let stored = cache.events();
        if stored.is_empty() {
            println!("No stars cached.");
            return Ok(());
        }
        for e in stored.iter().take(limit) {
            println!("{}", format_event(e));
        }
        print_shown(stored.len().min(limit), stored.len(), "stars");
    } else {
        let listed = listed_notifications(&cache, filter);
        if listed.is_empty() {
            println!("No notifications found.");
            return Ok(());
        }
        for (i, n) in listed.iter().take(limit).enumerate() {
            println!("{:>3}. {}", i + 1, format_notification(n));
        }
        print_shown(listed.len().min(limit), listed.len(), "notifications");
    }

    Ok(())
}

/// The `number`th notification as `list` (unfiltered) prints it, 1-based
fn notification_to_open(cache: &Cache, number: usize) -> anyhow::Result<&CacheEntry> {
    if number < 1 {
        anyhow::bail!("notification number must be greater than 0");
    }

    let listed = listed_notifications(cache, &ListFilter::default());
    if listed.is_empty() {
        anyhow::bail!("no notifications found. Run 'gh-notify sync' first");
    }

    let entry = listed.get(number - 1).copied().ok_or_else(|| {
        anyhow::anyhow!(
            "notification number {} not found. Only {} notifications available",
            number,
            listed.len()
        )
    })?;

    if entry.display_url.is_empty() {
        anyhow::bail!("no URL available for notification {}", number);
    }
    Ok(entry)
}

pub fn open_notification(ctx: &Context, number: usize) -> anyhow::Result<()> {
    let cache = ctx.load_cache()?;
    let entry = notification_to_open(&cache, number)?;

    debug!("Opening {} ({})", entry.display_url, entry.title);
    open::that(&entry.display_url)
        .with_context(|| format!("failed to open {}", entry.display_url))?;

    println!("✓ Opened notification: {}", entry.title);
    Ok(())
}

fn print_shown(shown: usize, total: usize, what: &str) {
    if shown < total {
        println!("\nShowing {} {} (limited from {} total)", shown, what, total);
    } else {
        println!("\nShowing {} {}", shown, what);
    }
}

pub fn clear(ctx: &Context, force: bool) -> anyhow::Result<()> {
    let mut cache = ctx.load_cache()?;
    let notifications = cache.notifications().len();
    let events = cache.events().len();

    if notifications == 0
        && events == 0
        && cache.last_sync.is_none()
        && cache.last_event_sync.is_none()
    {
        println!("Cache is already empty.");
        return Ok(());
    }

    if !force {
        print!(
            "This will clear {} cached notifications and {} stars.\nAre you sure? [y/N]: ",
            notifications, events
        );
        io::stdout().flush()?;

        let stdin = io::stdin();
        if !confirmed(&mut stdin.lock())? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    cache.clear();
    cache
        .save(&ctx.cache_dir)
        .context("failed to save cleared cache")?;

    println!(
        "✓ Cache cleared ({} notifications, {} stars removed)",
        notifications, events
    );
    Ok(())
}

fn confirmed(input: &mut impl BufRead) -> io::Result<bool> {
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

pub fn status(ctx: &Context) -> anyhow::Result<()> {
    let cache = ctx.load_cache()?;

    println!("Cache file: {}", Cache::file_path(&ctx.cache_dir).display());
    println!("Cached notifications: {}", cache.notifications().len());
    println!("Cached stars: {}", cache.events().len());
    println!("Last sync: {}", format_optional_time(cache.last_sync));
    println!("Last star sync: {}", format_optional_time(cache.last_event_sync));

    if let Some(last) = cache.last_event_sync {
        let next = last + ctx.config.sync.event_cooldown()?;
        if next > Utc::now() {
            println!("Next star check: {}", format_time(next));
        }
    }

    let recent = cache.notifications();
    if !recent.is_empty() {
        println!("\nRecent notifications:");
        for n in recent.iter().take(5) {
            println!("  • {}: {}", n.repository, truncate(&n.title, 60));
        }
        if recent.len() > 5 {
            println!("  ... and {} more", recent.len() - 5);
        }
    }

    Ok(())
}

fn format_notification(n: &CacheEntry) -> String {
    let kind = if n.kind.is_empty() { "-" } else { n.kind.as_str() };
    format!(
        "[{}] {} {}: {} {}",
        n.reason, kind, n.repository, n.title, n.display_url
    )
}

fn format_event(e: &StarEvent) -> String {
    format!(
        "★ {} starred {} ({})",
        e.actor,
        e.repository,
        format_time(e.occurred_at)
    )
}

fn format_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn format_optional_time(t: Option<DateTime<Utc>>) -> String {
    t.map(format_time).unwrap_or_else(|| "Never".to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
