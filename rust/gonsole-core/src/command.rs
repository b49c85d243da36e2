//! Routing a top-level input line to the handler that owns it.

/// What a top-level input line asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Blank,
    Exit,
    /// `export <path>`
    Export(&'a str),
    /// `playground` or `share`
    Playground,
    /// `import ...`, carrying everything after the keyword.
    Import(&'a str),
    /// `func ...` declaration.
    Function,
    /// A literal printed on its own, e.g. `1 + 2` or `"hi"`.
    Direct,
    /// Anything else goes to the statement history.
    Statement,
}

/// Classify a trimmed input line. Prefixes are case-sensitive and checked in
/// a fixed order.
pub fn classify(line: &str) -> Command<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Command::Blank;
    }
    if line == "exit" {
        return Command::Exit;
    }
    if let Some(path) = keyword_argument(line, "export") {
        return Command::Export(path);
    }
    if line == "playground" || line == "share" {
        return Command::Playground;
    }
    if let Some(rest) = keyword_argument(line, "import") {
        return Command::Import(rest);
    }
    if line.starts_with("func ") {
        return Command::Function;
    }
    if is_direct(line) {
        return Command::Direct;
    }
    Command::Statement
}

/// Lines that start with a digit or a quote are literals, not statements.
pub fn is_direct(line: &str) -> bool {
    matches!(line.chars().next(), Some(c) if c.is_ascii_digit() || c == '"' || c == '\'' || c == '`')
}

/// `keyword <argument>`, with a non-empty argument.
fn keyword_argument<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim();
    (!rest.is_empty()).then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("   "), Command::Blank);
        assert_eq!(classify("exit"), Command::Exit);
        assert_eq!(classify("export /tmp/main.go"), Command::Export("/tmp/main.go"));
        assert_eq!(classify("playground"), Command::Playground);
        assert_eq!(classify("share"), Command::Playground);
        assert_eq!(classify("import \"fmt\""), Command::Import("\"fmt\""));
        assert_eq!(classify("import ("), Command::Import("("));
        assert_eq!(classify("func add(a, b int) int {"), Command::Function);
        assert_eq!(classify("func (c *C) Inc() {"), Command::Function);
        assert_eq!(classify("1 + 2"), Command::Direct);
        assert_eq!(classify("\"hi\""), Command::Direct);
        assert_eq!(classify("a := 1"), Command::Statement);
    }

    #[test]
    fn test_keyword_prefix_needs_separator() {
        assert_eq!(classify("exported := 1"), Command::Statement);
        assert_eq!(classify("importance++"), Command::Statement);
        assert_eq!(classify("export"), Command::Statement);
        assert_eq!(classify("exit()"), Command::Statement);
        assert_eq!(classify("func() { fmt.Println(1) }()"), Command::Statement);
    }
}
