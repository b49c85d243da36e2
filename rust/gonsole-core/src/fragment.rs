//! Fragments: one logical Go statement, possibly spanning several lines.
//!
//! A fragment is an opener line followed by continuation elements. Each
//! continuation line becomes a nested fragment one indentation level deeper,
//! and the closing line (`}` or `)`) is a literal line at the opener's level:
//!
//! ```text
//! if a == 1 {            <- Line (opener)
//!     console.Find()     <- Nested([Line])
//! }                      <- Line (closer)
//! ```
//!
//! Declarations are detected with a handful of regular expressions rather
//! than a grammar. See [`Fragment::is_declaration`].

use once_cell::sync::Lazy;
use regex::Regex;

use crate::tokenizer::{self, tokenize_lines};

/// One indentation unit in generated source.
pub const INDENT: &str = "    ";

/// `a := ...` and `a, b := ...`
static SHORT_DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<names>[_\w]+(?:\s*,\s*[_\w]+)*)\s*:=").expect("valid regex")
});

/// `var a int`, `const x, y = 1, 2`
static KEYWORD_DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:var|const)\s+(?P<names>[_\w]+(?:\s*,\s*[_\w]+)*)").expect("valid regex")
});

/// `type Counter int`
static TYPE_DECLARATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*type\s+(?P<name>[_\w]+)").expect("valid regex"));

/// `var (`, `const (`, `type (`
static BATCH_OPENER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:var|const|type)\s*\($").expect("valid regex"));

/// Left-hand name of one entry inside a batch.
static BATCH_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?P<name>[_\w]+)").expect("valid regex"));

/// `func Name(` or `func (recv T) Name(`
static FUNCTION_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*func\s+(?:\([^)]*\)\s*)?(?P<name>[_\w]+)\s*[(\[]").expect("valid regex")
});

/// A fragment element: a literal line or a nested continuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Line(String),
    Nested(Fragment),
}

impl From<String> for Element {
    fn from(line: String) -> Self {
        Element::Line(line)
    }
}

impl From<&str> for Element {
    fn from(line: &str) -> Self {
        Element::Line(line.to_string())
    }
}

impl From<Fragment> for Element {
    fn from(fragment: Fragment) -> Self {
        Element::Nested(fragment)
    }
}

/// One logical statement. The first element is always the opener line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    elements: Vec<Element>,
}

impl Fragment {
    pub fn new(opener: impl Into<String>) -> Self {
        Self {
            elements: vec![Element::Line(opener.into())],
        }
    }

    /// Append a continuation line or a nested fragment.
    pub fn append(&mut self, element: impl Into<Element>) {
        self.elements.push(element.into());
    }

    pub fn opener(&self) -> &str {
        match &self.elements[0] {
            Element::Line(line) => line,
            Element::Nested(nested) => nested.opener(),
        }
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Every physical line, depth first, without indentation.
    pub fn lines(&self) -> Vec<&str> {
        let mut lines = Vec::new();
        self.collect_lines(&mut lines);
        lines
    }

    fn collect_lines<'a>(&'a self, out: &mut Vec<&'a str>) {
        for element in &self.elements {
            match element {
                Element::Line(line) => out.push(line),
                Element::Nested(nested) => nested.collect_lines(out),
            }
        }
    }

    /// Candidate identifier tokens of every line of the fragment.
    pub fn tokens(&self) -> Vec<&str> {
        tokenize_lines(self.lines()).collect()
    }

    /// Whether any token of this fragment refers to `name`.
    pub fn references(&self, name: &str) -> bool {
        self.lines()
            .into_iter()
            .any(|line| tokenizer::tokenize(line).any(|token| tokenizer::references(token, name)))
    }

    /// Re-render the tree as lines, one indentation unit per nesting level.
    pub fn flatten(&self, indent: usize) -> Vec<String> {
        let mut out = Vec::new();
        self.flatten_into(indent, &mut out);
        out
    }

    fn flatten_into(&self, indent: usize, out: &mut Vec<String>) {
        for element in &self.elements {
            match element {
                Element::Line(line) => out.push(format!("{}{}", INDENT.repeat(indent), line)),
                Element::Nested(nested) => nested.flatten_into(indent + 1, out),
            }
        }
    }

    /// [`flatten`](Self::flatten) joined with newlines.
    pub fn render(&self, indent: usize) -> String {
        self.flatten(indent).join("\n")
    }

    /// Name of the function this fragment declares, if it is one.
    pub fn function_name(&self) -> Option<&str> {
        FUNCTION_NAME
            .captures(self.opener())
            .and_then(|caps| caps.name("name"))
            .map(|name| name.as_str())
    }

    /// `var (` / `const (` followed by one nested entry per declared name.
    pub fn is_batch(&self) -> bool {
        BATCH_OPENER.is_match(last_clause_raw(self.opener()))
    }

    /// Identifiers declared by this fragment's own top-level lines.
    ///
    /// Nested children are not scanned, except for the entries of a batch
    /// declaration whose left-hand names are the declared identifiers.
    pub fn declared_identifiers(&self) -> Vec<String> {
        let mut names = Vec::new();
        if self.is_batch() {
            for element in &self.elements[1..] {
                if let Element::Nested(entry) = element {
                    if let Some(caps) = BATCH_ENTRY.captures(entry.opener()) {
                        names.push(caps["name"].to_string());
                    }
                }
            }
        }
        for element in &self.elements {
            if let Element::Line(line) = element {
                for clause in real_clauses(line) {
                    if let Some(declared) = declared_in_clause(clause) {
                        names.extend(declared);
                    }
                }
            }
        }
        names
    }

    /// True when the opener's last `;`-separated clause is a declaration
    /// (short form, `var`/`const`, or `type`), or the fragment is a batch.
    ///
    /// `a := 1` is a declaration; `a := 1; a++` is a use of `a`. Multi-line
    /// values such as `x := []int{` are judged by their opener.
    pub fn is_declaration(&self) -> bool {
        if self.is_batch() {
            return true;
        }
        real_clauses(self.opener())
            .last()
            .is_some_and(|clause| declared_in_clause(clause).is_some())
    }
}

/// Whether `line` opens a multi-line fragment; returns the expected closer.
pub fn closer_for(line: &str) -> Option<char> {
    match line.trim_end().chars().last() {
        Some('{') => Some('}'),
        Some('(') => Some(')'),
        _ => None,
    }
}

/// The bracket that `closer` balances.
pub fn opener_of(closer: char) -> char {
    match closer {
        '}' => '{',
        ')' => '(',
        ']' => '[',
        other => other,
    }
}

/// Clauses separated by `;`, dropping empties and literal-only pieces.
fn real_clauses(line: &str) -> Vec<&str> {
    line.split(';')
        .filter(|clause| tokenizer::is_candidate(clause.trim()))
        .collect()
}

fn last_clause_raw(line: &str) -> &str {
    line.rsplit(';').next().unwrap_or(line)
}

/// Names declared by a single clause, checked in precedence order.
fn declared_in_clause(clause: &str) -> Option<Vec<String>> {
    if let Some(caps) = SHORT_DECLARATION.captures(clause) {
        return Some(split_names(&caps["names"]));
    }
    if let Some(caps) = KEYWORD_DECLARATION.captures(clause) {
        return Some(split_names(&caps["names"]));
    }
    TYPE_DECLARATION
        .captures(clause)
        .map(|caps| vec![caps["name"].to_string()])
}

fn split_names(names: &str) -> Vec<String> {
    names
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
