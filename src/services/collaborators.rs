//! Seams to the external systems the pipeline drives.
//!
//! Crawling, test case writing and PDF rendering live outside this server.
//! The pipeline only sees these traits; HTTP-backed implementations are in
//! [`crate::services::remote`].

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::models::{AuthConfig, CrawlOutput, JobResult, UiElement, WebsiteContext};

/// Errors raised by external collaborators.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{operation} timed out after {}s", after.as_secs_f64())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("{service} request failed: {message}")]
    Request {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned an unusable response: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

/// Opens the target page and reports its interactive elements.
#[async_trait]
pub trait SiteCrawler: Send + Sync {
    async fn crawl(
        &self,
        url: &str,
        auth: Option<&AuthConfig>,
    ) -> Result<CrawlOutput, CollaboratorError>;
}

/// Writes one Markdown test case block for one element.
#[async_trait]
pub trait TestCaseWriter: Send + Sync {
    async fn write_test_case(
        &self,
        element: &UiElement,
        context: Option<&WebsiteContext>,
    ) -> Result<String, CollaboratorError>;
}

/// Renders a completed result as PDF bytes.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(&self, result: &JobResult) -> Result<Vec<u8>, CollaboratorError>;
}

/// Bound `future` by `after`, mapping expiry to [`CollaboratorError::Timeout`].
pub async fn with_timeout<T, F>(
    operation: &'static str,
    after: Duration,
    future: F,
) -> Result<T, CollaboratorError>
where
    F: Future<Output = Result<T, CollaboratorError>>,
{
    tokio::time::timeout(after, future)
        .await
        .map_err(|_| CollaboratorError::Timeout { operation, after })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_reported_with_operation() {
        let err = with_timeout("crawl", Duration::from_secs(5), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, CollaboratorError>(())
        })
        .await
        .unwrap_err();

        assert!(matches!(err, CollaboratorError::Timeout { operation: "crawl", .. }));
        assert_eq!(err.to_string(), "crawl timed out after 5s");
    }

    #[tokio::test]
    async fn test_inner_result_passes_through() {
        let value = with_timeout("write", Duration::from_secs(1), async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);

        let err = with_timeout::<(), _>("write", Duration::from_secs(1), async {
            Err(CollaboratorError::NotConfigured("writer"))
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "writer is not configured");
    }
}
