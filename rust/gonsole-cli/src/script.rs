//! Playing a file of REPL input through a session.

use std::collections::VecDeque;
use std::path::Path;

use gonsole_core::{ContinuationError, LineSource, Session, TurnOutcome};

use crate::repl::report;

/// Lines of a script. Top-level lines and continuation lines are drawn from
/// the same queue, so a block continues on the following lines of the file.
#[derive(Debug, Default)]
pub struct ScriptSource {
    lines: VecDeque<String>,
}

impl ScriptSource {
    pub fn new(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        Ok(Self::new(&std::fs::read_to_string(path)?))
    }

    pub fn next_line(&mut self) -> Option<String> {
        self.lines.pop_front()
    }
}

impl LineSource for ScriptSource {
    fn continuation(&mut self, _depth: usize) -> Result<String, ContinuationError> {
        self.next_line().ok_or(ContinuationError::Closed)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScriptSummary {
    pub turns: usize,
    pub failures: usize,
}

/// Run every line, reporting each outcome, until the script ends or says
/// `exit`.
pub fn run(session: &mut Session, source: &mut ScriptSource) -> ScriptSummary {
    let mut summary = ScriptSummary::default();
    while let Some(line) = source.next_line() {
        let outcome = session.handle_line(&line, source);
        if matches!(outcome, TurnOutcome::Idle) {
            continue;
        }
        summary.turns += 1;
        if outcome.is_failure() {
            summary.failures += 1;
        }
        if matches!(outcome, TurnOutcome::Exit) {
            break;
        }
        report(&outcome);
    }
    summary
}
