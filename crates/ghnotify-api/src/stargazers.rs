// Repository listing and per-repository star history over GraphQL
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{ApiError, Result};
use crate::github::GitHubClient;
use crate::urls::split_full_name;

/// Hard cap on pages per repository so one huge repo can't eat the quota
pub const MAX_PAGES: usize = 10;
pub const PER_PAGE: u32 = 100;

const REPOSITORIES_QUERY: &str = r#"
query($first: Int!, $cursor: String) {
  viewer {
    repositories(first: $first, after: $cursor, ownerAffiliations: OWNER) {
      nodes {
        nameWithOwner
      }
      pageInfo {
        hasNextPage
        endCursor
      }
    }
  }
}"#;

const STARGAZERS_QUERY: &str = r#"
query($owner: String!, $name: String!, $first: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    stargazers(first: $first, after: $cursor, orderBy: {field: STARRED_AT, direction: DESC}) {
      edges {
        starredAt
        cursor
        node {
          login
        }
      }
      pageInfo {
        hasNextPage
        endCursor
      }
    }
  }
}"#;

/// A single star on one of the viewer's repositories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stargazer {
    /// Edge cursor, unique per star
    pub cursor: String,
    pub login: String,
    /// owner/name
    pub repository: String,
    pub starred_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    #[serde(default)]
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepositoriesData {
    viewer: Viewer,
}

#[derive(Debug, Deserialize)]
struct Viewer {
    repositories: RepositoryConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryConnection {
    #[serde(default)]
    nodes: Vec<RepositoryNode>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryNode {
    name_with_owner: String,
}

#[derive(Debug, Deserialize)]
struct StargazersData {
    repository: Option<StarredRepository>,
}

#[derive(Debug, Deserialize)]
struct StarredRepository {
    stargazers: StargazerConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StargazerConnection {
    #[serde(default)]
    edges: Vec<StargazerEdge>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StargazerEdge {
    starred_at: DateTime<Utc>,
    cursor: String,
    node: StargazerNode,
}

#[derive(Debug, Deserialize)]
struct StargazerNode {
    login: String,
}

impl GitHubClient {
    /// Names (owner/name) of every repository the viewer owns
    pub async fn fetch_repositories(&self) -> Result<Vec<String>> {
        let mut repositories = Vec::new();
        let mut cursor: Option<String> = None;

        for page in 0..MAX_PAGES {
            let mut variables = json!({ "first": PER_PAGE });
            if let Some(cursor) = &cursor {
                variables["cursor"] = json!(cursor);
            }

            let data = self.graphql.execute(REPOSITORIES_QUERY, variables).await?;
            let data: RepositoriesData = serde_json::from_value(data)?;
            let connection = data.viewer.repositories;

            repositories.extend(connection.nodes.into_iter().map(|n| n.name_with_owner));

            match (connection.page_info.has_next_page, connection.page_info.end_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }

            if page + 1 == MAX_PAGES {
                warn!(count = repositories.len(), "Repository list truncated at page limit");
            }
        }

        debug!(count = repositories.len(), "Fetched repository list");
        Ok(repositories)
    }

    /// Stars on `repository` strictly newer than `since`, newest first.
    ///
    /// GitHub returns stargazers ordered by `starredAt` descending, so the
    /// first edge at or before `since` means everything after it is old
    /// too and we stop paging right there.
    pub async fn fetch_stargazers(
        &self,
        repository: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Stargazer>> {
        let (owner, name) = split_full_name(repository)
            .ok_or_else(|| ApiError::InvalidRepository(repository.to_string()))?;

        let mut stars = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0;

        loop {
            let mut variables = json!({ "owner": owner, "name": name, "first": PER_PAGE });
            if let Some(cursor) = &cursor {
                variables["cursor"] = json!(cursor);
            }

            let data = self.graphql.execute(STARGAZERS_QUERY, variables).await?;
            pages += 1;

            let data: StargazersData = serde_json::from_value(data)?;
            let connection = data
                .repository
                .ok_or_else(|| ApiError::NotFound(repository.to_string()))?
                .stargazers;

            let mut reached_cutoff = false;
            for edge in connection.edges {
                if edge.starred_at <= since {
                    reached_cutoff = true;
                    break;
                }
                stars.push(Stargazer {
                    cursor: edge.cursor,
                    login: edge.node.login,
                    repository: repository.to_string(),
                    starred_at: edge.starred_at,
                });
            }

            if reached_cutoff || !connection.page_info.has_next_page {
                break;
            }

            if pages >= MAX_PAGES {
                warn!(repository, pages, "Stopped paging stargazers at page limit");
                break;
            }

            match connection.page_info.end_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!(repository, pages, stars = stars.len(), "Fetched stargazers");
        Ok(stars)
    }
}
