// On-disk notification cache
// One JSON document per cache directory, rewritten wholesale on every save

pub mod cache;
pub mod error;

pub use cache::{
    default_cache_dir, Cache, CacheEntry, StarEvent, CACHE_FILE_NAME, DEFAULT_MAX_ENTRIES,
    EVENT_MAX_AGE_DAYS, FORMAT_VERSION, NOTIFICATION_MAX_AGE_DAYS,
};
pub use error::{CacheError, Result};
