// Raw transports the client is built on.
// Both hand back untyped JSON; typed decoding happens in the client.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Authenticated REST access: GET a path relative to the API root
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RestTransport: Send + Sync {
    async fn get(&self, path: &str) -> Result<Value>;
}

/// Authenticated GraphQL access. Returns the `data` member of the response.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GraphQlTransport: Send + Sync {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value>;
}
