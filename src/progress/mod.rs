//! Progress reporting for terminal output.
//!
//! [`ProgressObserver`] listens to pipeline lifecycle events and renders a
//! live step list with colored checkmarks and failure indicators on stderr.
//! Silenced with `--no-progress` or when stderr is not a terminal.

use std::io::{self, Write};
use std::sync::Mutex;

use colored::Colorize;
use indexmap::IndexMap;

use crate::telemetry::{EventKind, ReviewEvent, ReviewObserver};

/// Status of a single pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    InProgress,
    /// Finished; carries the step's one-line summary.
    Done(String),
    Failed(String),
    /// Failed but absorbed by the degradation policy.
    Degraded(String),
}

/// Renders step progress from lifecycle events.
///
/// Thread-safe; install it as the orchestrator's observer.
pub struct ProgressObserver {
    inner: Mutex<ProgressState>,
    /// If false, all output is suppressed.
    enabled: bool,
}

struct ProgressState {
    /// step id → (label, status), in pipeline order.
    steps: IndexMap<String, (String, StepStatus)>,
    /// Number of lines we last printed (for clearing).
    rendered_lines: usize,
    finished: bool,
}

impl ProgressObserver {
    /// `steps` are `(id, label)` pairs in execution order.
    pub fn new(steps: &[(&str, &str)], enabled: bool) -> Self {
        let steps = steps
            .iter()
            .map(|(id, label)| (id.to_string(), (label.to_string(), StepStatus::Pending)))
            .collect();
        Self {
            inner: Mutex::new(ProgressState {
                steps,
                rendered_lines: 0,
                finished: false,
            }),
            enabled,
        }
    }

    /// Current status of a step.
    pub fn status(&self, step: &str) -> Option<StepStatus> {
        let state = self.inner.lock().ok()?;
        state.steps.get(step).map(|(_, s)| s.clone())
    }

    fn update(state: &mut ProgressState, step: &str, status: StepStatus) {
        match state.steps.get_mut(step) {
            Some(entry) => entry.1 = status,
            None => {
                state
                    .steps
                    .insert(step.to_string(), (step.to_string(), status));
            }
        }
    }

    /// Render the current state to stderr, clearing previous output.
    fn render(state: &mut ProgressState) {
        let stderr = io::stderr();
        let mut handle = stderr.lock();

        Self::clear_lines(state.rendered_lines);

        let mut lines = 0;
        let done = state
            .steps
            .values()
            .filter(|(_, s)| matches!(s, StepStatus::Done(_) | StepStatus::Degraded(_)))
            .count();
        let _ = writeln!(
            handle,
            "  {} Building review context ({done}/{} steps)",
            "▸".cyan().bold(),
            state.steps.len(),
        );
        lines += 1;

        for (label, status) in state.steps.values() {
            let (icon, status_text) = match status {
                StepStatus::Pending => ("○".dimmed().to_string(), "waiting".dimmed().to_string()),
                StepStatus::InProgress => {
                    ("◌".cyan().bold().to_string(), "running…".cyan().to_string())
                }
                StepStatus::Done(summary) => {
                    ("✔".green().bold().to_string(), summary.green().to_string())
                }
                StepStatus::Failed(reason) => {
                    ("✖".red().bold().to_string(), reason.red().to_string())
                }
                StepStatus::Degraded(reason) => {
                    ("⚠".yellow().bold().to_string(), reason.yellow().to_string())
                }
            };
            let _ = writeln!(handle, "    {icon} {label} {status_text}", label = label.dimmed());
            lines += 1;
        }

        let _ = handle.flush();
        state.rendered_lines = lines;
    }

    /// Move cursor up and clear `n` lines.
    fn clear_lines(n: usize) {
        if n == 0 {
            return;
        }
        let stderr = io::stderr();
        let mut handle = stderr.lock();
        for _ in 0..n {
            let _ = write!(handle, "\x1b[1A\x1b[2K");
        }
        let _ = handle.flush();
    }
}

impl ReviewObserver for ProgressObserver {
    fn emit(&self, event: &ReviewEvent) {
        let Ok(mut state) = self.inner.lock() else {
            return;
        };
        if state.finished {
            return;
        }

        let step = event.step.as_deref().unwrap_or_default();
        let message = event.message.clone().unwrap_or_default();
        match event.kind {
            EventKind::StepStarted => Self::update(&mut state, step, StepStatus::InProgress),
            EventKind::StepSucceeded => Self::update(&mut state, step, StepStatus::Done(message)),
            EventKind::StepFailed => Self::update(&mut state, step, StepStatus::Failed(message)),
            EventKind::Degraded => Self::update(&mut state, step, StepStatus::Degraded(message)),
            EventKind::PipelineCompleted | EventKind::PipelineFailed => state.finished = true,
            _ => return,
        }

        if self.enabled {
            Self::render(&mut state);
        }
    }
}
