//! Result document assembly.
//!
//! Joins the per-element Markdown blocks into one document and builds the
//! parallel JSON document from the same analysis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{JobResult, TestCase, UiElement, WebsiteContext};
use crate::services::test_cases::parse_test_cases;

/// Everything the generating phase needs to render a result.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub source_url: String,
    pub analysis_timestamp: DateTime<Utc>,
    pub page_title: String,
    pub website_context: Option<WebsiteContext>,
    pub elements: Vec<UiElement>,
    /// One Markdown block per analyzed element, in element order.
    pub blocks: Vec<String>,
}

/// JSON form of a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaDocument {
    pub source_url: String,
    pub analysis_timestamp: DateTime<Utc>,
    pub page_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_context: Option<WebsiteContext>,
    pub identified_elements: Vec<UiElement>,
    pub generated_test_cases: Vec<TestCase>,
}

/// Markdown document: a header followed by every block.
///
/// Blocks missing a `Test Case ID:` marker get one derived from their
/// position so the parser still sees them.
pub fn assemble_markdown(outcome: &AnalysisOutcome) -> String {
    let mut markdown = format!(
        "# QA Test Documentation: {}\n**Analysis Date:** {}\n\n## Page: {}\n\n",
        outcome.source_url,
        outcome.analysis_timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        outcome.page_title,
    );

    for (i, block) in outcome.blocks.iter().enumerate() {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }
        if !has_block_marker(block) {
            markdown.push_str(&format!("### Test Case ID: TC_ELEMENT_{}\n", i + 1));
        }
        markdown.push_str(block);
        markdown.push_str("\n\n---\n\n");
    }

    markdown
}

fn has_block_marker(block: &str) -> bool {
    block.to_ascii_lowercase().contains("test case id")
}

/// Render both documents. Test cases in the JSON are parsed from the
/// assembled Markdown so both views agree.
pub fn render_result(outcome: &AnalysisOutcome) -> Result<JobResult, serde_json::Error> {
    let markdown = assemble_markdown(outcome);
    let document = QaDocument {
        source_url: outcome.source_url.clone(),
        analysis_timestamp: outcome.analysis_timestamp,
        page_title: outcome.page_title.clone(),
        website_context: outcome.website_context.clone(),
        identified_elements: outcome.elements.clone(),
        generated_test_cases: parse_test_cases(&markdown),
    };
    let json = serde_json::to_value(&document)?;

    Ok(JobResult { markdown, json })
}
