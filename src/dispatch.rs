//! Dispatch sink — publishes resolved notifications to the pub/sub
//! endpoint.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::error::DispatchError;
use crate::notification::Notification;

/// Topic-naming rule enforced by the HTTP endpoint.
static TOPIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-_A-Za-z0-9]{1,64}$").expect("static regex"));

/// Where resolved notifications go.
///
/// The session calls `send` at most once per accepted message, only
/// after every prior stage succeeded. Topic-name validity is the sink's
/// rule, so recipient resolution consults `is_valid_topic` instead of
/// re-implementing it.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    fn is_valid_topic(&self, topic: &str) -> bool;

    async fn send(&self, notification: &Notification) -> Result<(), DispatchError>;
}

/// HTTP dispatcher — POSTs the body to `{base_url}/{topic}` with the
/// title carried in the `Title` header.
pub struct HttpDispatcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDispatcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn publish_url(&self, topic: &str) -> String {
        format!("{}/{topic}", self.base_url)
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    fn is_valid_topic(&self, topic: &str) -> bool {
        TOPIC_RE.is_match(topic)
    }

    async fn send(&self, notification: &Notification) -> Result<(), DispatchError> {
        let mut request = self
            .client
            .post(self.publish_url(&notification.topic))
            .body(notification.body.clone());
        if !notification.title.is_empty() {
            request = request.header("Title", notification.title.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| DispatchError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DispatchError::Rejected {
                topic: notification.topic.clone(),
                status: response.status().as_u16(),
            });
        }

        tracing::debug!(
            topic = %notification.topic,
            bytes = notification.body.len(),
            "notification published"
        );
        Ok(())
    }
}
