//! HTTP status source
//!
//! Lets a poller running outside the service process watch items through the
//! public API instead of a shared store handle.

use crate::error::{CalliopeError, Result};
use crate::pipeline::poller::StatusSource;
use crate::types::{ContentId, ContentItem};
use async_trait::async_trait;
use std::time::Duration;

/// Default per-request timeout in milliseconds
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Status source backed by the content API
pub struct HttpStatusSource {
    base_url: String,
    client: reqwest::Client,
    request_timeout: Duration,
}

impl HttpStatusSource {
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT_MS)
    }

    /// Build a source with a custom per-request timeout
    ///
    /// A stalled read costs one errored attempt instead of hanging the poll
    /// loop past its attempt budget.
    pub fn with_timeout(base_url: &str, timeout_ms: u64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            request_timeout: Duration::from_millis(timeout_ms),
        }
    }

    fn item_url(&self, id: ContentId) -> String {
        format!("{}/content/{}", self.base_url, id)
    }
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch(&self, id: ContentId) -> Result<ContentItem> {
        let response = self
            .client
            .get(self.item_url(id))
            .timeout(self.request_timeout)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CalliopeError::ContentNotFound(id.to_string()));
        }
        if !response.status().is_success() {
            return Err(CalliopeError::Other(format!(
                "status read for {} returned {}",
                id,
                response.status()
            )));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_url_building() {
        let source = HttpStatusSource::new("http://localhost:9000/");
        let id = ContentId::new();
        assert_eq!(
            source.item_url(id),
            format!("http://localhost:9000/content/{}", id)
        );
    }
}
