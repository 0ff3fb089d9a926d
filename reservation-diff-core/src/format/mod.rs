//! Plan and report formatters.

pub mod json;
pub mod text;

pub use json::format_json;
pub use text::{format_plan_summary, format_plan_text, format_report_text};
