// GitHub API client: transports, typed fetches, and the rate-limit retry layer
pub mod error;
pub mod github;
pub mod http;
pub mod notifications;
pub mod retry;
pub mod stargazers;
pub mod transport;
pub mod urls;

// Re-export common types
pub use error::{classify, classify_message, ApiError, ErrorKind, Result};
pub use github::{Endpoints, GitHubClient};
pub use notifications::Notification;
pub use retry::{with_retry, ResilientTransport, RetryConfig};
pub use stargazers::Stargazer;
pub use transport::{GraphQlTransport, RestTransport};
pub use urls::{api_url_to_web, split_full_name};
