// GitHub API client - REST for notifications, GraphQL for repositories and stars
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::error::{ApiError, Result};
use crate::http::{
    build_http_client, HttpGraphQlTransport, HttpRestTransport, GITHUB_API_BASE,
    GITHUB_GRAPHQL_URL,
};
use crate::retry::{ResilientTransport, RetryConfig};
use crate::transport::{GraphQlTransport, RestTransport};

/// Where to send requests (override for GitHub Enterprise)
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub api_url: String,
    pub graphql_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_url: GITHUB_API_BASE.to_string(),
            graphql_url: GITHUB_GRAPHQL_URL.to_string(),
        }
    }
}

/// Cheap to clone; transports are shared behind `Arc`s so the client can
/// be handed to every fetch worker.
#[derive(Clone)]
pub struct GitHubClient {
    pub(crate) rest: Arc<dyn RestTransport>,
    pub(crate) graphql: Arc<dyn GraphQlTransport>,
}

#[derive(Debug, Deserialize)]
struct User {
    login: String,
}

impl GitHubClient {
    /// Client for an already-issued token. Every GraphQL query goes
    /// through the rate-limit retry layer.
    pub fn new(token: &str, endpoints: &Endpoints, retry: RetryConfig) -> Result<Self> {
        let http = build_http_client(token)?;

        let rest = HttpRestTransport::new(http.clone(), endpoints.api_url.clone());
        let graphql = ResilientTransport::new(
            HttpGraphQlTransport::new(http, endpoints.graphql_url.clone()),
            retry,
        );

        Ok(Self::with_transports(Arc::new(rest), Arc::new(graphql)))
    }

    /// Build on top of caller-supplied transports
    pub fn with_transports(
        rest: Arc<dyn RestTransport>,
        graphql: Arc<dyn GraphQlTransport>,
    ) -> Self {
        Self { rest, graphql }
    }

    /// Login of the token's owner; doubles as an auth check
    pub async fn authenticated_user(&self) -> Result<String> {
        let raw = self.rest.get("user").await?;
        let user: User = serde_json::from_value(raw)
            .map_err(|e| ApiError::Schema(format!("user: {}", e)))?;

        debug!(login = %user.login, "Authenticated");
        Ok(user.login)
    }
}
