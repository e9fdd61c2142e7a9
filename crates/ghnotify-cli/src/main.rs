use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "gh-notify")]
#[command(version, about = "Sync GitHub notifications and stars into a local cache", long_about = None)]
struct Cli {
    /// Cache directory (default: ~/.cache/gh-notify)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Config file (default: ~/.config/gh-notify/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Fetch notifications and stars, print what's new
    Sync {
        /// Only check for new stars
        #[arg(long, conflicts_with = "no_events")]
        events_only: bool,

        /// Skip star tracking
        #[arg(long)]
        no_events: bool,

        /// Only keep notifications updated in the last N minutes
        #[arg(long, value_name = "MINUTES")]
        since: Option<u64>,

        /// Print a JSON document instead of one line per item
        #[arg(long)]
        json: bool,
    },
    /// Show cached notifications
    List {
        /// Maximum number of items to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// Show cached stars instead
        #[arg(long)]
        events: bool,

        /// Filter by repository name (partial, case-insensitive)
        #[arg(short, long)]
        repository: Option<String>,

        /// Filter by notification reason (e.g. mention, review_requested)
        #[arg(long)]
        reason: Option<String>,
    },
    /// Open the Nth notification from `list` in the browser
    Open {
        /// Notification number as shown by `list`
        number: usize,
    },
    /// Empty the cache
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Show last sync times and cache size
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `sync --json` output stays parseable
    let default_filter = if cli.verbose {
        "ghnotify=debug,gh_notify=debug"
    } else {
        "ghnotify=info,gh_notify=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let ctx = commands::Context::new(cli.config.as_deref(), cli.cache_dir)?;

    match cli.command {
        Commands::Sync {
            events_only,
            no_events,
            since,
            json,
        } => {
            let args = commands::SyncArgs {
                notifications: !events_only,
                events: !no_events,
                since_minutes: since,
                json,
            };
            commands::sync(&ctx, args).await
        }
        Commands::List {
            limit,
            events,
            repository,
            reason,
        } => {
            let filter = commands::ListFilter { repository, reason };
            commands::list(&ctx, limit, events, &filter)
        }
        Commands::Open { number } => commands::open_notification(&ctx, number),
        Commands::Clear { force } => commands::clear(&ctx, force),
        Commands::Status => commands::status(&ctx),
    }
}
