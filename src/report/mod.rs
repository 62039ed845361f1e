//! Report export.
//!
//! Renders the outcome of a batch as Markdown or JSON.

pub mod generator;

pub use generator::{generate_json_report, generate_markdown_report};
