//! ANSI color helpers for CLI output.

fn paint(code: &str, s: &str) -> String {
    format!("\x1b[{}m{}\x1b[0m", code, s)
}

/// Error labels and compiler diagnostics.
pub fn red(s: &str) -> String {
    paint("31", s)
}

pub fn cyan(s: &str) -> String {
    paint("36", s)
}

/// Hints that should not compete with program output.
pub fn gray(s: &str) -> String {
    paint("90", s)
}

/// Right-aligned bold green label, as in `     Created gonsole.toml`.
pub fn status_label(label: &str) -> String {
    paint("1;32", &format!("{:>12}", label))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_and_resets() {
        assert_eq!(red("x"), "\x1b[31mx\x1b[0m");
        assert_eq!(status_label("Created"), "\x1b[1;32m     Created\x1b[0m");
    }
}
