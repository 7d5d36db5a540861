//! Fake collaborators.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use qadoc_lib::models::{AuthConfig, CrawlOutput, JobResult, UiElement, WebsiteContext};
use qadoc_lib::services::{CollaboratorError, PdfRenderer, SiteCrawler, TestCaseWriter};

/// A page element as the crawler would report it.
pub fn element(id: &str, element_type: &str, text: &str) -> UiElement {
    UiElement {
        element_id: id.to_string(),
        element_type: element_type.to_string(),
        selector: format!("#{}", id),
        attributes: BTreeMap::from([("id".to_string(), id.to_string())]),
        visible_text: Some(text.to_string()),
        position: None,
    }
}

/// A shop page with `count` buttons.
pub fn shop_page(count: usize) -> CrawlOutput {
    CrawlOutput {
        page_title: "Example Shop".to_string(),
        elements: (1..=count)
            .map(|i| element(&format!("btn-{}", i), "button", &format!("Button {}", i)))
            .collect(),
    }
}

/// Crawler returning a fixed page, optionally after a delay or with an error.
pub struct FakeCrawler {
    output: CrawlOutput,
    delay: Option<Duration>,
    error: Option<String>,
}

impl FakeCrawler {
    pub fn returning(output: CrawlOutput) -> Self {
        Self {
            output,
            delay: None,
            error: None,
        }
    }

    pub fn hanging(delay: Duration) -> Self {
        Self {
            output: CrawlOutput::default(),
            delay: Some(delay),
            error: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            output: CrawlOutput::default(),
            delay: None,
            error: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl SiteCrawler for FakeCrawler {
    async fn crawl(
        &self,
        _url: &str,
        _auth: Option<&AuthConfig>,
    ) -> Result<CrawlOutput, CollaboratorError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.error {
            Some(message) => Err(CollaboratorError::Request {
                service: "crawler",
                message: message.clone(),
            }),
            None => Ok(self.output.clone()),
        }
    }
}

/// Writer producing one Markdown block per element. Elements listed in
/// `failing` are rejected.
#[derive(Default)]
pub struct FakeWriter {
    failing: HashSet<String>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub calls: AtomicUsize,
}

impl FakeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(ids: &[&str]) -> Self {
        Self {
            failing: ids.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

pub fn block_for(element: &UiElement) -> String {
    format!(
        "* **Feature Tested:** Checkout\n\
         * **Title:** Press {text}\n\
         * **Type:** Functional\n\
         * **Priority:** High\n\
         * **Description:** Checks that {selector} responds.\n\
         * **Primary Element:** `{selector}`\n\
         * **Steps:**\n\
         \x20   1. **Action:** Click `{selector}`\n\
         \x20      **Expected Result:** The page reacts.\n",
        text = element.visible_text.as_deref().unwrap_or("element"),
        selector = element.selector,
    )
}

#[async_trait]
impl TestCaseWriter for FakeWriter {
    async fn write_test_case(
        &self,
        element: &UiElement,
        _context: Option<&WebsiteContext>,
    ) -> Result<String, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&element.element_id) {
            return Err(CollaboratorError::InvalidResponse {
                service: "llm",
                message: format!("no content for {}", element.element_id),
            });
        }
        Ok(block_for(element))
    }
}

/// Renderer returning the Markdown bytes wrapped in a fake PDF header.
pub struct FakePdfRenderer;

#[async_trait]
impl PdfRenderer for FakePdfRenderer {
    async fn render(&self, result: &JobResult) -> Result<Vec<u8>, CollaboratorError> {
        let mut bytes = b"%PDF-1.7\n".to_vec();
        bytes.extend_from_slice(result.markdown.as_bytes());
        Ok(bytes)
    }
}
