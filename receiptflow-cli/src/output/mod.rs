//! Output formatting for CLI.

mod json;
mod text;

pub use json::{JsonFormatter, STREAM_END, event_line};
pub use text::TextFormatter;
#[cfg(test)]
mod tests;
