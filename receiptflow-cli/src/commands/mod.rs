//! CLI command implementations.

pub mod config;
pub mod image;
pub mod parse_qr;
pub mod qr;
pub mod tokens;

mod render;
