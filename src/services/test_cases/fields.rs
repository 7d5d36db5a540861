//! Labeled field extraction for a single test case block.
//!
//! Every extractor is an independent pure function: it locates its own label
//! and reads until the next known label, so a missing or garbled field never
//! shifts what its neighbours see.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{Priority, PrimaryElement};

/// Field labels recognised inside a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Feature,
    Title,
    Type,
    Priority,
    Description,
    PrimaryElement,
    Preconditions,
    Steps,
    Postconditions,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::Feature,
        Field::Title,
        Field::Type,
        Field::Priority,
        Field::Description,
        Field::PrimaryElement,
        Field::Preconditions,
        Field::Steps,
        Field::Postconditions,
    ];

    /// Case-insensitive label alternatives.
    fn label_pattern(&self) -> &'static str {
        match self {
            Field::Feature => r"feature(?:\s+tested)?",
            Field::Title => r"(?:test\s+case\s+)?title",
            Field::Type => r"(?:test\s+)?type",
            Field::Priority => r"priority",
            Field::Description => r"description",
            Field::PrimaryElement => r"primary\s+element|element\s+under\s+test",
            Field::Preconditions => r"pre-?conditions?",
            Field::Steps => r"(?:test\s+)?steps?",
            Field::Postconditions => r"post-?conditions?",
        }
    }

    fn index(&self) -> usize {
        Field::ALL
            .iter()
            .position(|field| field == self)
            .unwrap_or_default()
    }
}

/// A label at the start of a line, with optional heading, bullet, or bold decoration.
fn label_regex(alternatives: &str) -> Regex {
    Regex::new(&format!(
        r"(?im)^[ \t>]*(?:#{{1,6}}[ \t]+)?(?:[*+\-•][ \t]+|\d+[.)][ \t]+)?(?:\*\*|__)?[ \t]*(?:{alternatives})[ \t]*(?:\*\*|__)?[ \t]*:[ \t]*(?:\*\*|__)?"
    ))
    .expect("field label pattern is valid")
}

static FIELD_LABELS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    Field::ALL
        .iter()
        .map(|field| label_regex(field.label_pattern()))
        .collect()
});

/// Any label that ends a field, including the block marker itself.
static ANY_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    let mut alternatives: Vec<&str> = Field::ALL.iter().map(Field::label_pattern).collect();
    alternatives.push(r"test\s+case\s+id");
    label_regex(&alternatives.join("|"))
});

static ID_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)test\s+case\s+id\s*:([^\n]*)").expect("id pattern is valid")
});

static BACKTICK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`\n]+)`").expect("backtick pattern is valid"));

static PURPOSE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:[*+\-][ \t]+)?(?:\*\*|__)?[ \t]*purpose[ \t]*(?:\*\*|__)?[ \t]*:[ \t]*(?:\*\*|__)?",
    )
    .expect("purpose pattern is valid")
});

/// Raw text of `field`: everything after its label up to the next label.
pub fn extract_field(block: &str, field: Field) -> Option<String> {
    let label = FIELD_LABELS[field.index()].find(block)?;
    let rest = &block[label.end()..];
    let end = ANY_LABEL
        .find_iter(rest)
        .find(|m| m.start() > 0)
        .map(|m| m.start())
        .unwrap_or(rest.len());

    let value = clean_value(&rest[..end]);
    (!value.is_empty()).then_some(value)
}

/// Identifier from the `Test Case ID:` line.
pub fn extract_id(block: &str) -> Option<String> {
    let caps = ID_LINE.captures(block)?;
    let raw = caps.get(1)?.as_str();
    let token = raw
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '`' | '[' | ']' | '_'))
        .split_whitespace()
        .next()?
        .trim_matches(|c: char| matches!(c, '*' | '`' | '[' | ']' | ':' | ',' | '.'));
    (!token.is_empty()).then(|| token.to_string())
}

pub fn extract_feature(block: &str) -> Option<String> {
    extract_field(block, Field::Feature).and_then(|v| first_line(&v))
}

pub fn extract_title(block: &str) -> Option<String> {
    extract_field(block, Field::Title).and_then(|v| first_line(&v))
}

pub fn extract_type(block: &str) -> Option<String> {
    extract_field(block, Field::Type).and_then(|v| first_line(&v))
}

/// Priority, if the field is present and recognisable.
pub fn extract_priority(block: &str) -> Option<Priority> {
    extract_field(block, Field::Priority).and_then(|v| Priority::parse(&v))
}

pub fn extract_description(block: &str) -> Option<String> {
    extract_field(block, Field::Description)
}

pub fn extract_preconditions(block: &str) -> Option<String> {
    extract_field(block, Field::Preconditions)
}

pub fn extract_steps(block: &str) -> Option<String> {
    extract_field(block, Field::Steps)
}

pub fn extract_postconditions(block: &str) -> Option<String> {
    extract_field(block, Field::Postconditions)
}

pub fn extract_primary_element(block: &str) -> Option<PrimaryElement> {
    extract_field(block, Field::PrimaryElement).and_then(|v| parse_primary_element(&v))
}

/// Selector from backticks, else the first line as written; optional `Purpose:`.
pub fn parse_primary_element(text: &str) -> Option<PrimaryElement> {
    let (body, purpose) = match PURPOSE_LABEL.find(text) {
        Some(m) => (&text[..m.start()], collapse_whitespace(&text[m.end()..])),
        None => (text, String::new()),
    };

    let selector = match BACKTICK.captures(body).and_then(|caps| caps.get(1)) {
        Some(quoted) => quoted.as_str().trim().to_string(),
        None => body
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .to_string(),
    };

    if selector.is_empty() {
        return None;
    }

    Some(PrimaryElement {
        selector,
        purpose: (!purpose.is_empty()).then_some(purpose),
    })
}

/// Lines made only of Markdown decoration: rules, heading hashes, stray bold
/// markers, and template placeholders such as `*--(Add more steps)--*`.
pub(crate) fn is_decoration(line: &str) -> bool {
    let inner = line.trim().trim_matches(|c| matches!(c, '*' | '_'));
    if inner.starts_with("--(") && inner.ends_with(")--") {
        return true;
    }
    line.chars()
        .all(|c| c.is_whitespace() || matches!(c, '#' | '*' | '-' | '_' | '=' | '>'))
}

/// Trim surrounding blank and decoration lines, then wrapping bold markers.
pub(crate) fn clean_value(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().collect();
    let start = lines
        .iter()
        .position(|line| !is_decoration(line))
        .unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|line| !is_decoration(line))
        .map(|i| i + 1)
        .unwrap_or(start);

    strip_bold(&lines[start..end.max(start)].join("\n"))
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    strip_bold(&text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Remove bold markers wrapping the whole value, keeping list bullets.
fn strip_bold(text: &str) -> String {
    text.trim()
        .trim_start_matches("**")
        .trim_end_matches("**")
        .trim()
        .to_string()
}

fn first_line(value: &str) -> Option<String> {
    value
        .lines()
        .map(collapse_whitespace)
        .find(|line| !line.is_empty())
}
