// reqwest-backed transports for api.github.com
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT},
    Client, Response, StatusCode,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{ApiError, Result};
use crate::transport::{GraphQlTransport, RestTransport};

pub const GITHUB_API_BASE: &str = "https://api.github.com";
pub const GITHUB_GRAPHQL_URL: &str = "https://api.github.com/graphql";
const GITHUB_API_VERSION: &str = "2022-11-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a reqwest client that sends the token on every request
pub fn build_http_client(token: &str) -> Result<Client> {
    let mut headers = HeaderMap::new();

    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| ApiError::Other(format!("Invalid token header: {}", e)))?,
    );
    headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
    headers.insert(
        "X-GitHub-Api-Version",
        HeaderValue::from_static(GITHUB_API_VERSION),
    );
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("gh-notify/", env!("CARGO_PKG_VERSION"))),
    );

    let client = Client::builder()
        .default_headers(headers)
        .timeout(REQUEST_TIMEOUT)
        .build()?;

    Ok(client)
}

pub struct HttpRestTransport {
    client: Client,
    base_url: String,
}

impl HttpRestTransport {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl RestTransport for HttpRestTransport {
    async fn get(&self, path: &str) -> Result<Value> {
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        debug!(url = %url, "GET");

        let response = self.client.get(&url).send().await?;
        let response = check_response(response).await?;
        Ok(response.json().await?)
    }
}

pub struct HttpGraphQlTransport {
    client: Client,
    endpoint: String,
}

impl HttpGraphQlTransport {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlErrorBody>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorBody {
    message: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

#[async_trait]
impl GraphQlTransport for HttpGraphQlTransport {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value> {
        let body = json!({ "query": query, "variables": variables });

        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let response = check_response(response).await?;
        let parsed: GraphQlResponse = response.json().await?;

        into_data(parsed)
    }
}

fn into_data(parsed: GraphQlResponse) -> Result<Value> {
    if !parsed.errors.is_empty() {
        let kind = parsed.errors.iter().find_map(|e| e.kind.clone());
        let message = parsed
            .errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ApiError::GraphQl { message, kind });
    }

    parsed
        .data
        .ok_or_else(|| ApiError::Schema("GraphQL response has neither data nor errors".into()))
}

/// Check response status and convert errors
async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let quota_exhausted = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "0");
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();

    Err(status_error(status, quota_exhausted, url, body))
}

fn status_error(status: StatusCode, quota_exhausted: bool, url: String, body: String) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        StatusCode::NOT_FOUND => ApiError::NotFound(url),
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited { message: body },
        StatusCode::FORBIDDEN if quota_exhausted => ApiError::RateLimited { message: body },
        status => ApiError::Http {
            status: status.as_u16(),
            message: body,
        },
    }
}
