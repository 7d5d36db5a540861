//! Markdown test case parser.
//!
//! Turns the generated documentation back into structured [`TestCase`]s.
//! Parsing is total: malformed input yields fewer or sparser cases, never an
//! error.

mod fields;
mod steps;

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{Priority, TestCase};

pub use fields::{
    Field, extract_description, extract_feature, extract_field, extract_id,
    extract_postconditions, extract_preconditions, extract_primary_element, extract_priority,
    extract_steps, extract_title, extract_type, parse_primary_element,
};
pub use steps::{NOT_SPECIFIED, parse_list, parse_steps};

pub const DEFAULT_TEST_TYPE: &str = "Functional";
pub const DEFAULT_FEATURE: &str = "General Functionality";

static BLOCK_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)test\s+case\s+id\s*:").expect("block marker pattern is valid")
});

/// Slices of `markdown`, one per `Test Case ID:` marker.
///
/// Text before the first marker is dropped.
pub fn split_blocks(markdown: &str) -> Vec<&str> {
    let starts: Vec<usize> = BLOCK_MARKER.find_iter(markdown).map(|m| m.start()).collect();

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(markdown.len());
            &markdown[start..end]
        })
        .collect()
}

/// Parse every test case block in `markdown`, in document order.
pub fn parse_test_cases(markdown: &str) -> Vec<TestCase> {
    split_blocks(markdown)
        .into_iter()
        .enumerate()
        .map(|(i, block)| parse_block(block, i + 1))
        .collect()
}

/// Parse one block. `ordinal` is the block's 1-based position and is
/// appended to the id so duplicates in the source stay distinct.
pub fn parse_block(block: &str, ordinal: usize) -> TestCase {
    let base_id = extract_id(block).unwrap_or_else(|| format!("TC-{ordinal}"));

    TestCase {
        id: format!("{base_id}-{ordinal}"),
        feature: extract_feature(block).unwrap_or_else(|| DEFAULT_FEATURE.to_string()),
        title: extract_title(block).unwrap_or_else(|| format!("Test Case {base_id}")),
        test_type: extract_type(block).unwrap_or_else(|| DEFAULT_TEST_TYPE.to_string()),
        priority: extract_priority(block).unwrap_or(Priority::Medium),
        description: extract_description(block).unwrap_or_default(),
        primary_element: extract_primary_element(block),
        steps: extract_steps(block)
            .map(|text| parse_steps(&text))
            .unwrap_or_default(),
        preconditions: extract_preconditions(block)
            .map(|text| parse_list(&text))
            .unwrap_or_default(),
        postconditions: extract_postconditions(block)
            .map(|text| parse_list(&text))
            .unwrap_or_default(),
    }
}
