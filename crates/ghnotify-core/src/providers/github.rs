// GitHub provider - bridges the API client with the EventSource trait
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ghnotify_api::{api_url_to_web, GitHubClient, Notification, Stargazer};
use ghnotify_cache::{CacheEntry, StarEvent};

use crate::{source::EventSource, Result};

/// Wrapper around GitHubClient that implements EventSource
pub struct GitHubProvider {
    client: GitHubClient,
}

impl GitHubProvider {
    pub fn new(client: GitHubClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventSource for GitHubProvider {
    async fn fetch_notifications(&self) -> Result<Vec<CacheEntry>> {
        let fetched_at = Utc::now();
        let notifications = self.client.fetch_notifications().await?;

        Ok(notifications
            .into_iter()
            .map(|n| notification_to_entry(n, fetched_at))
            .collect())
    }

    async fn fetch_resource_ids(&self) -> Result<Vec<String>> {
        Ok(self.client.fetch_repositories().await?)
    }

    async fn fetch_paginated_events(
        &self,
        resource_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<StarEvent>> {
        let stars = self.client.fetch_stargazers(resource_id, since).await?;
        Ok(stars.into_iter().map(stargazer_to_event).collect())
    }
}

/// Convert a GitHub notification thread to a cache entry
fn notification_to_entry(n: Notification, fetched_at: DateTime<Utc>) -> CacheEntry {
    let source_url = n.subject.url.unwrap_or_default();
    // Subjects without a URL (e.g. some check suites) link to the repo
    let display_url = if source_url.is_empty() {
        n.repository.html_url.clone()
    } else {
        api_url_to_web(&source_url)
    };

    CacheEntry {
        id: n.id,
        repository: n.repository.full_name,
        title: n.subject.title,
        reason: n.reason,
        kind: n.subject.subject_type,
        source_url,
        display_url,
        fetched_at,
        updated_at: n.updated_at,
    }
}

fn stargazer_to_event(star: Stargazer) -> StarEvent {
    StarEvent {
        id: star.cursor,
        repository: star.repository,
        actor: star.login,
        occurred_at: star.starred_at,
        notified: false,
    }
}
