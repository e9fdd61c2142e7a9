use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ApiError, Result};
use crate::github::GitHubClient;

/// Unread notifications, newest first. GitHub caps a page at 50.
const NOTIFICATIONS_PATH: &str = "notifications?per_page=50";

/// GitHub notification thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub repository: NotificationRepository,
    pub subject: NotificationSubject,
    pub reason: String,
    #[serde(default)]
    pub unread: bool,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_read_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: String,
}

/// Minimal repository info in notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRepository {
    pub full_name: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub html_url: String,
}

/// Subject of the notification (Issue, PR, etc.)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSubject {
    pub title: String,
    #[serde(rename = "type", default)]
    pub subject_type: String, // "Issue", "PullRequest", "Commit", "Release"
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub latest_comment_url: Option<String>,
}

impl GitHubClient {
    /// Fetch the current unread set in one call.
    ///
    /// The payload is decoded strictly: a record that doesn't match the
    /// schema fails the whole fetch instead of being quietly dropped.
    pub async fn fetch_notifications(&self) -> Result<Vec<Notification>> {
        let raw = self.rest.get(NOTIFICATIONS_PATH).await?;
        let notifications: Vec<Notification> = serde_json::from_value(raw)?;

        if let Some(position) = notifications.iter().position(|n| n.id.is_empty()) {
            return Err(ApiError::Schema(format!(
                "notification at index {} has an empty id",
                position
            )));
        }

        debug!(count = notifications.len(), "Fetched notifications");
        Ok(notifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockGraphQlTransport, MockRestTransport};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn client_returning(payload: Value) -> GitHubClient {
        let mut rest = MockRestTransport::new();
        rest.expect_get()
            .withf(|path| path.starts_with("notifications"))
            .times(1)
            .returning(move |_| Ok(payload.clone()));

        GitHubClient::with_transports(Arc::new(rest), Arc::new(MockGraphQlTransport::new()))
    }

    fn thread(id: &str) -> Value {
        json!({
            "id": id,
            "unread": true,
            "reason": "review_requested",
            "updated_at": "2024-05-01T10:00:00Z",
            "last_read_at": null,
            "url": format!("https://api.github.com/notifications/threads/{}", id),
            "repository": {
                "id": 1,
                "full_name": "octo/widgets",
                "private": false,
                "html_url": "https://github.com/octo/widgets"
            },
            "subject": {
                "title": "Add sprockets",
                "url": "https://api.github.com/repos/octo/widgets/pulls/7",
                "latest_comment_url": null,
                "type": "PullRequest"
            }
        })
    }

    #[tokio::test]
    async fn test_fetch_notifications_decodes_payload() {
        let client = client_returning(json!([thread("1"), thread("2")]));

        let notifications = client.fetch_notifications().await.unwrap();

        assert_eq!(notifications.len(), 2);
        let first = &notifications[0];
        assert_eq!(first.id, "1");
        assert_eq!(first.repository.full_name, "octo/widgets");
        assert_eq!(first.subject.subject_type, "PullRequest");
        assert_eq!(first.reason, "review_requested");
    }

    #[tokio::test]
    async fn test_missing_subject_type_is_empty() {
        let mut payload = thread("1");
        payload["subject"].as_object_mut().unwrap().remove("type");
        let client = client_returning(json!([payload]));

        let notifications = client.fetch_notifications().await.unwrap();
        assert_eq!(notifications[0].subject.subject_type, "");
    }

    #[tokio::test]
    async fn test_malformed_record_fails_fetch() {
        let mut broken = thread("2");
        broken["updated_at"] = json!("yesterday-ish");
        let client = client_returning(json!([thread("1"), broken]));

        assert!(matches!(
            client.fetch_notifications().await,
            Err(ApiError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_id_is_schema_error() {
        let client = client_returning(json!([thread("")]));

        assert!(matches!(
            client.fetch_notifications().await,
            Err(ApiError::Schema(_))
        ));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let mut rest = MockRestTransport::new();
        rest.expect_get().returning(|_| Err(ApiError::Unauthorized));
        let client =
            GitHubClient::with_transports(Arc::new(rest), Arc::new(MockGraphQlTransport::new()));

        assert!(matches!(
            client.fetch_notifications().await,
            Err(ApiError::Unauthorized)
        ));
    }
}
