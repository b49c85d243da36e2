//! Lightweight splitter that turns a line of Go into candidate identifier
//! references.
//!
//! This is not a lexer. A line is split on each symbol of [`SPLIT_SYMBOLS`] in
//! turn, and every intermediate piece is reported, so `get(console.Find())`
//! yields the whole call, `get` and `console.Find`. The liveness resolver only
//! ever asks "does some token start with this identifier", which makes the
//! over-approximation cheap and good enough.
//!
//! Pieces starting with a quote or a digit are dropped: they are literals and
//! can never name a declaration.

/// Split symbols, in priority order.
pub const SPLIT_SYMBOLS: &[char] = &[' ', ',', ';', '(', '=', '+', '-', '*', '/'];

/// Lazily tokenize a single line.
///
/// The traversal uses an explicit stack rather than recursion so that very
/// long lines cannot exhaust the call stack. Tokens come out in the same
/// pre-order a recursive splitter would produce them.
pub fn tokenize(line: &str) -> Tokens<'_> {
    Tokens {
        stack: vec![(line, 0)],
    }
}

/// Tokenize every line of an iterator, concatenating the results.
pub fn tokenize_lines<'a, I>(lines: I) -> impl Iterator<Item = &'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    lines.into_iter().flat_map(tokenize)
}

/// Iterator returned by [`tokenize`].
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    /// Pending pieces with the index of the next split symbol to try.
    stack: Vec<(&'a str, usize)>,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        while let Some((piece, from)) = self.stack.pop() {
            let token = match next_symbol(piece, from) {
                Some(index) => {
                    let symbol = SPLIT_SYMBOLS[index];
                    let parts: Vec<&'a str> = piece.split(symbol).collect();
                    for part in parts.into_iter().rev() {
                        self.stack.push((trim_closers(part), index + 1));
                    }
                    piece
                }
                None => piece.trim(),
            };
            if is_candidate(token) {
                return Some(token);
            }
        }
        None
    }
}

/// Index of the first split symbol at or after `from` that occurs in `piece`.
fn next_symbol(piece: &str, from: usize) -> Option<usize> {
    (from..SPLIT_SYMBOLS.len()).find(|&index| piece.contains(SPLIT_SYMBOLS[index]))
}

fn trim_closers(piece: &str) -> &str {
    piece.trim_matches(|c| c == ')' || c == ' ')
}

/// Empty pieces and literals are split artifacts, never identifiers.
pub fn is_candidate(token: &str) -> bool {
    match token.chars().next() {
        None => false,
        Some(first) => !(first == '"' || first == '\'' || first.is_ascii_digit()),
    }
}

/// Whether `token` refers to `name`.
///
/// The name must be a prefix of the token and must not continue into a longer
/// identifier, so `console.Find` refers to `console` and `Str2int` refers to
/// `Str2int`, but `counter` does not refer to `count`.
pub fn references(token: &str, name: &str) -> bool {
    if name.is_empty() || !token.starts_with(name) {
        return false;
    }
    match token[name.len()..].chars().next() {
        None => true,
        Some(next) => !(next.is_alphanumeric() || next == '_'),
    }
}
