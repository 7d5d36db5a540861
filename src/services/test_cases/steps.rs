//! Step and list sub-parsers.

use std::sync::LazyLock;

use regex::Regex;

use super::fields::{collapse_whitespace, is_decoration};
use crate::models::TestStep;

/// Expected result recorded when the source gives none.
pub const NOT_SPECIFIED: &str = "Not specified";

static ACTION_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(?:(\d+)[.)][ \t]*)?(?:[*+\-•][ \t]+)?(?:\*\*|__)?[ \t]*action[ \t]*(?:\*\*|__)?[ \t]*:[ \t]*(?:\*\*|__)?",
    )
    .expect("action pattern is valid")
});

static EXPECTED_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:\*\*|__)?[ \t]*expected[ \t]+results?[ \t]*(?:\*\*|__)?[ \t]*:[ \t]*(?:\*\*|__)?",
    )
    .expect("expected result pattern is valid")
});

static NUMBERED_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(\d+)[.)][ \t]+").expect("numbered item pattern is valid")
});

static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t]*(?:[*+\-•]|\d+[.)])[ \t]+").expect("list marker pattern is valid")
});

/// Parse the text of a `Steps` field.
///
/// `Action` / `Expected Result` pairs are preferred. Without them every
/// numbered item becomes a step, then every bullet, then the whole text.
pub fn parse_steps(text: &str) -> Vec<TestStep> {
    let steps = parse_action_pairs(text);
    if !steps.is_empty() {
        return steps;
    }

    let steps = parse_numbered_items(text);
    if !steps.is_empty() {
        return steps;
    }

    parse_list(text)
        .into_iter()
        .enumerate()
        .map(|(i, action)| TestStep {
            number: i as u32 + 1,
            action,
            expected_result: NOT_SPECIFIED.to_string(),
        })
        .collect()
}

fn parse_action_pairs(text: &str) -> Vec<TestStep> {
    let labels: Vec<_> = ACTION_LABEL.captures_iter(text).collect();
    let mut steps = Vec::with_capacity(labels.len());
    let mut last_number = 0;

    for (i, caps) in labels.iter().enumerate() {
        let Some(label) = caps.get(0) else {
            continue;
        };
        let segment_end = labels
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());
        let segment = &text[label.end()..segment_end];

        let number = caps
            .get(1)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(last_number + 1);
        last_number = number;

        if let Some(step) = split_step(number, segment) {
            steps.push(step);
        }
    }

    steps
}

fn parse_numbered_items(text: &str) -> Vec<TestStep> {
    let items: Vec<_> = NUMBERED_ITEM.captures_iter(text).collect();
    let mut steps = Vec::with_capacity(items.len());

    for (i, caps) in items.iter().enumerate() {
        let Some(marker) = caps.get(0) else {
            continue;
        };
        let segment_end = items
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());
        let number = caps
            .get(1)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(i as u32 + 1);

        if let Some(step) = split_step(number, &text[marker.end()..segment_end]) {
            steps.push(step);
        }
    }

    steps
}

/// Split one step segment at its `Expected Result` label.
fn split_step(number: u32, segment: &str) -> Option<TestStep> {
    let (action, expected) = match EXPECTED_LABEL.find(segment) {
        Some(m) => (&segment[..m.start()], Some(&segment[m.end()..])),
        None => (segment, None),
    };

    let action = clean_step_text(action);
    let expected = expected.map(clean_step_text).unwrap_or_default();
    if action.is_empty() && expected.is_empty() {
        return None;
    }

    Some(TestStep {
        number,
        action: if action.is_empty() {
            NOT_SPECIFIED.to_string()
        } else {
            action
        },
        expected_result: if expected.is_empty() {
            NOT_SPECIFIED.to_string()
        } else {
            expected
        },
    })
}

fn clean_step_text(text: &str) -> String {
    let kept: Vec<&str> = text.lines().filter(|line| !is_decoration(line)).collect();
    collapse_whitespace(&kept.join(" "))
        .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '-' | ';' | ',' | '|'))
        .to_string()
}

/// Split a pre/postcondition field into items.
///
/// Items start at bullet or numbered markers; unmarked lines continue the
/// previous item. Non-empty text always yields at least one item.
pub fn parse_list(text: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();

    for line in text.lines() {
        if is_decoration(line) {
            continue;
        }
        match LIST_MARKER.find(line) {
            Some(marker) => items.push(line[marker.end()..].to_string()),
            None => match items.last_mut() {
                Some(last) => {
                    last.push(' ');
                    last.push_str(line.trim());
                }
                None => items.push(line.to_string()),
            },
        }
    }

    let items: Vec<String> = items
        .iter()
        .map(|item| collapse_whitespace(item))
        .filter(|item| !item.is_empty())
        .collect();

    if items.is_empty() {
        let whole = collapse_whitespace(text);
        if !whole.is_empty() {
            return vec![whole];
        }
    }

    items
}
