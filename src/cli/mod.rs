//! CLI command definitions and argument parsing.
//!
//! Uses clap derive macros for ergonomic argument definitions.

pub mod args;

/// Help text header with ANSI styling: bold name, dimmed tagline.
pub const ABOUT_STYLED: &str =
    "\x1b[1mprscore\x1b[0m \x1b[2m· Score pull requests against their Jira and Confluence context.\x1b[0m";
