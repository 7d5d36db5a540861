//! QA documentation generator library.
//!
//! Crawls a page through a crawler service, asks a language model for one
//! test case per interactive element, and assembles the answers into a
//! Markdown and JSON document. Jobs run in the background; clients follow
//! them over REST polling or a WebSocket feed.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
