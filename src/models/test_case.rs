//! Test case records reconstructed from generated Markdown.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Test case priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    /// Lenient parse of generated priority text, e.g. "High", "**low**", "Critical".
    pub fn parse(s: &str) -> Option<Self> {
        let word = s
            .trim_matches(|c: char| !c.is_alphanumeric())
            .split(|c: char| !c.is_alphanumeric())
            .next()?
            .to_lowercase();
        match word.as_str() {
            "high" | "critical" | "urgent" | "p0" | "p1" => Some(Self::High),
            "medium" | "normal" | "moderate" | "p2" => Some(Self::Medium),
            "low" | "minor" | "p3" => Some(Self::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The UI element a test case primarily exercises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PrimaryElement {
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

/// One numbered step of a test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TestStep {
    pub number: u32,
    pub action: String,
    pub expected_result: String,
}

/// A test case parsed from one `Test Case ID:` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TestCase {
    /// `<source id>-<block ordinal>`, unique within one document.
    pub id: String,
    pub feature: String,
    pub title: String,
    #[serde(rename = "type")]
    pub test_type: String,
    pub priority: Priority,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_element: Option<PrimaryElement>,
    #[serde(default)]
    pub steps: Vec<TestStep>,
    #[serde(default)]
    pub preconditions: Vec<String>,
    #[serde(default)]
    pub postconditions: Vec<String>,
}

/// Selection criteria for rendering parsed test cases.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TestCaseFilter {
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Case-insensitive match on the test type.
    #[serde(default, rename = "type")]
    pub test_type: Option<String>,
    /// Case-insensitive match on the feature.
    #[serde(default)]
    pub feature: Option<String>,
    /// Case-insensitive substring search over title and description.
    #[serde(default)]
    pub search: Option<String>,
}

impl TestCaseFilter {
    pub fn is_empty(&self) -> bool {
        self.priority.is_none()
            && self.test_type.is_none()
            && self.feature.is_none()
            && self.search.is_none()
    }

    pub fn matches(&self, case: &TestCase) -> bool {
        if let Some(priority) = self.priority
            && case.priority != priority
        {
            return false;
        }
        if let Some(test_type) = &self.test_type
            && !case.test_type.eq_ignore_ascii_case(test_type.trim())
        {
            return false;
        }
        if let Some(feature) = &self.feature
            && !case.feature.eq_ignore_ascii_case(feature.trim())
        {
            return false;
        }
        if let Some(search) = &self.search {
            let needle = search.trim().to_lowercase();
            if !needle.is_empty()
                && !case.title.to_lowercase().contains(&needle)
                && !case.description.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }

    /// Matching cases in their original order.
    pub fn apply<'a>(&self, cases: &'a [TestCase]) -> Vec<&'a TestCase> {
        cases.iter().filter(|case| self.matches(case)).collect()
    }
}

/// Counts of parsed test cases by priority and type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TestCaseSummary {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub by_type: BTreeMap<String, usize>,
}

impl TestCaseSummary {
    pub fn from_cases<'a>(cases: impl IntoIterator<Item = &'a TestCase>) -> Self {
        let mut summary = Self::default();
        for case in cases {
            summary.total += 1;
            match case.priority {
                Priority::High => summary.high += 1,
                Priority::Medium => summary.medium += 1,
                Priority::Low => summary.low += 1,
            }
            *summary.by_type.entry(case.test_type.clone()).or_default() += 1;
        }
        summary
    }
}

/// Parsed test cases of a completed job.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TestCaseListResponse {
    pub job_id: uuid::Uuid,
    /// Summary over all parsed cases, before filtering.
    pub summary: TestCaseSummary,
    pub test_cases: Vec<TestCase>,
}
