//! UI elements reported by the crawler.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Bounding box of an element on the rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// An interactive element discovered on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UiElement {
    pub element_id: String,
    /// Tag or role, e.g. `button`, `input`.
    pub element_type: String,
    pub selector: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl UiElement {
    /// Short human label used in logs.
    pub fn label(&self) -> String {
        match &self.visible_text {
            Some(text) if !text.trim().is_empty() => {
                format!("{} '{}' ({})", self.element_type, text.trim(), self.selector)
            }
            _ => format!("{} ({})", self.element_type, self.selector),
        }
    }
}

/// Output of one crawl.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CrawlOutput {
    #[serde(default)]
    pub page_title: String,
    #[serde(default)]
    pub elements: Vec<UiElement>,
}
