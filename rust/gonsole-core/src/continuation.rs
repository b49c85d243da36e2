//! Reading the continuation lines of a multi-line fragment.

use tracing::debug;

use crate::fragment::{closer_for, opener_of, Fragment};

/// Failure while collecting continuation lines.
#[derive(Debug, thiserror::Error)]
pub enum ContinuationError {
    /// The user interrupted input; the partial fragment is discarded.
    #[error("interrupted")]
    Interrupted,

    /// The line source ran dry before the fragment was closed.
    #[error("input ended inside an open block")]
    Closed,

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

/// Where continuation lines come from (a line editor, a script, a test).
pub trait LineSource {
    /// Next line of a fragment nested `depth` levels deep. The prompt, if
    /// any, is indented by `depth`.
    fn continuation(&mut self, depth: usize) -> Result<String, ContinuationError>;
}

/// Builds a [`Fragment`] by reading until each opener is balanced.
pub struct FragmentReader<'a, S: LineSource + ?Sized> {
    source: &'a mut S,
}

impl<'a, S: LineSource + ?Sized> FragmentReader<'a, S> {
    pub fn new(source: &'a mut S) -> Self {
        Self { source }
    }

    /// Read the fragment started by `line`. A line that is not a multi-line
    /// opener yields a single-line fragment without touching the source.
    pub fn read(&mut self, line: &str) -> Result<Fragment, ContinuationError> {
        self.generate(line, 1)
    }

    fn generate(&mut self, line: &str, depth: usize) -> Result<Fragment, ContinuationError> {
        let mut fragment = Fragment::new(line);
        if let Some(closer) = closer_for(line) {
            self.continue_until(closer, &mut fragment, depth)?;
        }
        Ok(fragment)
    }

    fn continue_until(
        &mut self,
        closer: char,
        fragment: &mut Fragment,
        depth: usize,
    ) -> Result<(), ContinuationError> {
        loop {
            let raw = self.source.continuation(depth)?;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if closes(line, closer) {
                fragment.append(line);
                debug!(depth, lines = fragment.lines().len(), "fragment closed");
                return Ok(());
            }
            if line.starts_with(closer) && closer_for(line) == Some(closer) {
                // `} else {`: same fragment, same level.
                fragment.append(line);
                continue;
            }
            let nested = self.generate(line, depth + 1)?;
            fragment.append(nested);
        }
    }
}

/// Whether `line` closes a fragment waiting for `closer`: it starts or ends
/// with the closer and carries more closers than openers of that bracket.
fn closes(line: &str, closer: char) -> bool {
    if !(line.starts_with(closer) || line.ends_with(closer)) {
        return false;
    }
    let opener = opener_of(closer);
    let balance = line.chars().fold(0i32, |acc, c| {
        if c == closer {
            acc + 1
        } else if c == opener {
            acc - 1
        } else {
            acc
        }
    });
    balance > 0
}
