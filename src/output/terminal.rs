//! Terminal renderer: score headline, breakdown, traceability, then the draft.

use colored::Colorize;

use crate::models::score::weighted_overall;
use crate::models::{Confidence, ReviewOutcome};
use crate::output::OutputRenderer;

/// Breakdown entries below this are highlighted.
const LOW_SCORE: u32 = 60;

/// Terminal output renderer with colored, flowing text.
pub struct TerminalRenderer;

impl OutputRenderer for TerminalRenderer {
    fn render(&self, outcome: &ReviewOutcome) -> String {
        let mut output = String::new();
        let score = &outcome.score;

        let confidence = match score.confidence {
            Confidence::High => "high".green(),
            Confidence::Medium => "medium".yellow(),
            Confidence::Low => "low".red(),
        };
        output.push_str(&format!(
            " {} {}  {} {}  {} {}\n",
            "score".bold(),
            format!("{}/100", score.overall_score).bold(),
            "weighted".dimmed(),
            weighted_overall(&score.score_breakdown),
            "confidence".dimmed(),
            confidence,
        ));
        output.push_str(&format!(
            " {} {}  {} {}\n\n",
            "change".dimmed(),
            outcome.context.source.to_string().bold(),
            "profile".dimmed(),
            outcome.context.profile,
        ));

        for item in &score.score_breakdown {
            let value = format!("{:>3}", item.score);
            let value = if item.score < LOW_SCORE {
                value.red().bold()
            } else {
                value.green()
            };
            output.push_str(&format!(
                "   {} {:<16} {}\n",
                value,
                item.dimension.to_string(),
                item.rationale.dimmed(),
            ));
        }

        let weak: Vec<String> = score.below(LOW_SCORE).map(|i| i.dimension.to_string()).collect();
        if !weak.is_empty() {
            output.push_str(&format!(
                "\n {} {}\n",
                "needs attention".red().bold(),
                weak.join(", ")
            ));
        }
        if outcome.context.change.has_failing_checks() {
            output.push_str(&format!(" {}\n", "failing checks on this change".red()));
        }

        if !outcome.context.traceability.is_empty() {
            output.push_str(&format!("\n {}\n", "traceability".bold()));
            for (key, urls) in &outcome.context.traceability {
                if urls.is_empty() {
                    output.push_str(&format!("   {} {}\n", key.cyan(), "no linked pages".dimmed()));
                }
                for url in urls {
                    output.push_str(&format!("   {} {} {}\n", key.cyan(), "→".dimmed(), url));
                }
            }
        }

        for warning in &outcome.warnings {
            output.push_str(&format!("\n {} {}\n", "⚠".yellow().bold(), warning.yellow()));
        }

        output.push_str(&format!("{}\n", "\n───────────────────────────────────".dimmed()));
        output.push_str(&outcome.draft.markdown);
        if !outcome.draft.markdown.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(&format!(
            "{}\n",
            format!("run {} · {} ms", outcome.meta.run_id, outcome.meta.duration_ms).dimmed()
        ));

        output
    }
}
