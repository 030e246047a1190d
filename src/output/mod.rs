//! Output renderers for a finished review: styled terminal text and JSON.

pub mod json;
pub mod terminal;

use crate::models::ReviewOutcome;

/// Trait for rendering a review outcome to an output format.
pub trait OutputRenderer {
    /// Render the outcome to a string.
    fn render(&self, outcome: &ReviewOutcome) -> String;
}
