//! HTTP-backed collaborators.
//!
//! - [`RemoteCrawler`]: a browser crawling service, `POST {base}/crawl`.
//! - [`ChatCompletionsWriter`]: any OpenAI-compatible chat completions API.
//! - [`RemotePdfRenderer`]: a rendering service, `POST {base}/render`.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::collaborators::{CollaboratorError, PdfRenderer, SiteCrawler, TestCaseWriter};
use crate::models::{AuthConfig, CrawlOutput, JobResult, UiElement, WebsiteContext};

/// HTTP connect timeout for collaborator calls. Whole-call limits are
/// enforced by the pipeline.
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const SYSTEM_PROMPT: &str = "You are an expert QA Automation Engineer. You write detailed, \
scenario-based test cases in Markdown from UI element data and website context.";

const TEMPERATURE: f32 = 0.6;
const MAX_TOKENS: u32 = 2500;

fn build_http_client(service: &'static str) -> Result<reqwest::Client, CollaboratorError> {
    reqwest::Client::builder()
        .connect_timeout(HTTP_CONNECT_TIMEOUT)
        .build()
        .map_err(|e| CollaboratorError::Request {
            service,
            message: format!("failed to build HTTP client: {}", e),
        })
}

fn request_error(service: &'static str) -> impl Fn(reqwest::Error) -> CollaboratorError {
    move |e| CollaboratorError::Request {
        service,
        message: e.to_string(),
    }
}

fn invalid_response(service: &'static str) -> impl Fn(reqwest::Error) -> CollaboratorError {
    move |e| CollaboratorError::InvalidResponse {
        service,
        message: e.to_string(),
    }
}

// ============================================================================
// Crawler
// ============================================================================

#[derive(Serialize)]
struct CrawlRequest<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth: Option<&'a AuthConfig>,
}

/// Crawler reached over HTTP.
#[derive(Clone)]
pub struct RemoteCrawler {
    endpoint: String,
    http_client: reqwest::Client,
}

impl RemoteCrawler {
    const SERVICE: &'static str = "crawler";

    pub fn new(base_url: &str) -> Result<Self, CollaboratorError> {
        Ok(Self {
            endpoint: format!("{}/crawl", base_url.trim_end_matches('/')),
            http_client: build_http_client(Self::SERVICE)?,
        })
    }
}

#[async_trait]
impl SiteCrawler for RemoteCrawler {
    async fn crawl(
        &self,
        url: &str,
        auth: Option<&AuthConfig>,
    ) -> Result<CrawlOutput, CollaboratorError> {
        debug!(endpoint = %self.endpoint, url, "Requesting crawl");
        self.http_client
            .post(&self.endpoint)
            .json(&CrawlRequest { url, auth })
            .send()
            .await
            .map_err(request_error(Self::SERVICE))?
            .error_for_status()
            .map_err(request_error(Self::SERVICE))?
            .json::<CrawlOutput>()
            .await
            .map_err(invalid_response(Self::SERVICE))
    }
}

// ============================================================================
// Test case writer
// ============================================================================

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Test case writer backed by a chat completions endpoint.
#[derive(Clone)]
pub struct ChatCompletionsWriter {
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    http_client: reqwest::Client,
}

impl ChatCompletionsWriter {
    const SERVICE: &'static str = "llm";

    pub fn new(
        api_url: &str,
        api_key: Option<SecretString>,
        model: impl Into<String>,
    ) -> Result<Self, CollaboratorError> {
        Ok(Self {
            endpoint: format!("{}/chat/completions", api_url.trim_end_matches('/')),
            api_key,
            model: model.into(),
            http_client: build_http_client(Self::SERVICE)?,
        })
    }
}

/// User prompt for one element, in the block grammar the parser reads.
pub fn test_case_prompt(element: &UiElement, context: Option<&WebsiteContext>) -> String {
    let mut prompt = String::from(
        "Write one scenario-based QA test case in Markdown for the UI element below.\n\n\
         **Primary UI Element Details:**\n",
    );
    prompt.push_str(&format!("* Element Type: `{}`\n", element.element_type));
    prompt.push_str(&format!("* Selector: `{}`\n", element.selector));
    prompt.push_str(&format!(
        "* Visible Text: `{}`\n",
        element.visible_text.as_deref().unwrap_or("N/A")
    ));
    if !element.attributes.is_empty() {
        let attributes: Vec<String> = element
            .attributes
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        prompt.push_str(&format!("* Attributes: `{}`\n", attributes.join(" ")));
    }

    if let Some(context) = context {
        prompt.push_str("\n**Website Context:**\n");
        if let Some(site_type) = &context.site_type {
            prompt.push_str(&format!("* Primary Type: {}\n", site_type));
        }
        if let Some(page) = &context.current_page_description {
            prompt.push_str(&format!("* Current Page: {}\n", page));
        }
        if let Some(goal) = &context.user_goal_on_page {
            prompt.push_str(&format!("* Likely User Goal: {}\n", goal));
        }
    }

    prompt.push_str(
        "\n**Output Format (strict Markdown):**\n\n\
         ### Test Case ID: TC_[FEATURE]_[SCENARIO]_[NUMBER]\n\
         * **Feature Tested:** [feature]\n\
         * **Title:** [title]\n\
         * **Type:** [End-to-End | Functional | Usability | Edge Case | Scenario-Based]\n\
         * **Priority:** [High | Medium | Low]\n\
         * **Description:** [objective]\n\
         * **Primary Element:** `[selector]`\n\
         \x20   * **Purpose:** [purpose]\n\
         * **Preconditions:**\n\
         \x20   * [condition]\n\
         * **Steps:**\n\
         \x20   1. **Action:** [action]\n\
         \x20      **Expected Result:** [result]\n\
         * **Postconditions:**\n\
         \x20   * [state after the test]\n",
    );
    prompt
}

#[async_trait]
impl TestCaseWriter for ChatCompletionsWriter {
    async fn write_test_case(
        &self,
        element: &UiElement,
        context: Option<&WebsiteContext>,
    ) -> Result<String, CollaboratorError> {
        let prompt = test_case_prompt(element, context);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let mut request = self.http_client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response: ChatResponse = request
            .send()
            .await
            .map_err(request_error(Self::SERVICE))?
            .error_for_status()
            .map_err(request_error(Self::SERVICE))?
            .json()
            .await
            .map_err(invalid_response(Self::SERVICE))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(CollaboratorError::InvalidResponse {
                service: Self::SERVICE,
                message: "response contained no message content".to_string(),
            })
    }
}

// ============================================================================
// PDF renderer
// ============================================================================

/// PDF renderer reached over HTTP. Receives the result JSON, returns PDF bytes.
#[derive(Clone)]
pub struct RemotePdfRenderer {
    endpoint: String,
    http_client: reqwest::Client,
}

impl RemotePdfRenderer {
    const SERVICE: &'static str = "pdf renderer";

    pub fn new(base_url: &str) -> Result<Self, CollaboratorError> {
        Ok(Self {
            endpoint: format!("{}/render", base_url.trim_end_matches('/')),
            http_client: build_http_client(Self::SERVICE)?,
        })
    }
}

#[async_trait]
impl PdfRenderer for RemotePdfRenderer {
    async fn render(&self, result: &JobResult) -> Result<Vec<u8>, CollaboratorError> {
        let bytes = self
            .http_client
            .post(&self.endpoint)
            .json(result)
            .send()
            .await
            .map_err(request_error(Self::SERVICE))?
            .error_for_status()
            .map_err(request_error(Self::SERVICE))?
            .bytes()
            .await
            .map_err(invalid_response(Self::SERVICE))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn element() -> UiElement {
        UiElement {
            element_id: "el-1".to_string(),
            element_type: "button".to_string(),
            selector: "#buy".to_string(),
            attributes: BTreeMap::from([("class".to_string(), "cta".to_string())]),
            visible_text: Some("Buy now".to_string()),
            position: None,
        }
    }

    #[test]
    fn test_prompt_describes_element_and_context() {
        let context = WebsiteContext {
            site_type: Some("E-commerce Platform".to_string()),
            current_page_description: None,
            user_goal_on_page: Some("Buy a camera".to_string()),
        };
        let prompt = test_case_prompt(&element(), Some(&context));
        assert!(prompt.contains("* Selector: `#buy`"));
        assert!(prompt.contains("* Visible Text: `Buy now`"));
        assert!(prompt.contains("* Attributes: `class=cta`"));
        assert!(prompt.contains("* Primary Type: E-commerce Platform"));
        assert!(prompt.contains("* Likely User Goal: Buy a camera"));
        assert!(!prompt.contains("Current Page:"));
        assert!(prompt.contains("### Test Case ID:"));
    }

    #[test]
    fn test_endpoints_are_normalized() {
        let crawler = RemoteCrawler::new("http://crawler:9000/").unwrap();
        assert_eq!(crawler.endpoint, "http://crawler:9000/crawl");
        let writer = ChatCompletionsWriter::new("https://api.example.com/v1/", None, "m").unwrap();
        assert_eq!(writer.endpoint, "https://api.example.com/v1/chat/completions");
    }
}
