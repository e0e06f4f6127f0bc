//! examkit-report: renders submitted attempts for review.

pub mod html;

pub use html::{generate_html, write_html_report};
