// Sync engine: config, the event source seam, the star fan-out, one sync cycle
pub mod config;
pub mod error;
pub mod fan_out;
pub mod providers;
pub mod source;
pub mod sync;

pub use config::Config;
pub use error::Error;
pub use fan_out::{EventFetcher, DEFAULT_WORKERS};
pub use providers::GitHubProvider;
pub use source::EventSource;
pub use sync::{EventPhase, SyncEngine, SyncOptions, SyncOutcome};

/// Result type alias because typing Result<T, Error> everywhere is tedious
pub type Result<T> = std::result::Result<T, Error>;
