// Event source implementations
pub mod github;

pub use github::GitHubProvider;
