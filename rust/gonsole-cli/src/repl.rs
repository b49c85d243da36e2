//! Interactive read loop on top of rustyline.

use std::fs;
use std::path::{Component, Path, PathBuf};

use gonsole_core::fragment::INDENT;
use gonsole_core::{ContinuationError, LineSource, Session, TurnError, TurnOutcome};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::warn;

use crate::colors::{cyan, gray, red, status_label};

/// Environment variable used to override REPL history location.
pub const HISTORY_PATH_ENV: &str = "GONSOLE_HISTORY_PATH";

/// Continuation lines read from the same editor, prompted with one
/// indentation unit per nesting level.
pub struct EditorSource {
    editor: DefaultEditor,
}

impl EditorSource {
    pub fn new() -> rustyline::Result<Self> {
        let config = rustyline::Config::builder().auto_add_history(true).build();
        Ok(Self {
            editor: DefaultEditor::with_config(config)?,
        })
    }

    fn readline(&mut self, prompt: &str) -> Result<String, ReadlineError> {
        self.editor.readline(prompt)
    }
}

impl LineSource for EditorSource {
    fn continuation(&mut self, depth: usize) -> Result<String, ContinuationError> {
        match self.readline(&INDENT.repeat(depth)) {
            Ok(line) => Ok(line),
            Err(ReadlineError::Interrupted) => Err(ContinuationError::Interrupted),
            Err(ReadlineError::Eof) => Err(ContinuationError::Closed),
            Err(ReadlineError::Io(err)) => Err(ContinuationError::Io(err)),
            Err(err) => Err(ContinuationError::Io(std::io::Error::other(err.to_string()))),
        }
    }
}

/// Where an outcome is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Text to print for a turn, if any.
pub fn describe(outcome: &TurnOutcome) -> Vec<(Stream, String)> {
    match outcome {
        TurnOutcome::Idle | TurnOutcome::Exit | TurnOutcome::Declared(_) => Vec::new(),
        TurnOutcome::Output(out) if out.is_empty() => Vec::new(),
        TurnOutcome::Output(out) => vec![(Stream::Stdout, out.clone())],
        TurnOutcome::Exported(path) => vec![(
            Stream::Stdout,
            format!("{} {}", status_label("Exported"), path.display()),
        )],
        TurnOutcome::Shared(url) => vec![(Stream::Stdout, url.clone())],
        TurnOutcome::Failed(TurnError::Interrupted) => {
            vec![(Stream::Stdout, gray("(interrupted)"))]
        }
        TurnOutcome::Failed(TurnError::CompileFailure {
            reason,
            detail,
            stdout,
        }) => {
            let mut lines = vec![(Stream::Stderr, red(reason))];
            if !detail.is_empty() {
                lines.push((Stream::Stderr, detail.trim().to_string()));
            }
            if !stdout.is_empty() {
                lines.push((Stream::Stdout, stdout.clone()));
            }
            lines
        }
        TurnOutcome::Failed(err) => vec![(Stream::Stderr, format!("{} {}", red("error:"), err))],
    }
}

/// Print a turn's outcome.
pub fn report(outcome: &TurnOutcome) {
    for (stream, text) in describe(outcome) {
        match stream {
            Stream::Stdout => println!("{}", text),
            Stream::Stderr => eprintln!("{}", text),
        }
    }
}

/// Run the interactive loop until `exit`, Ctrl-D or an editor failure.
pub fn run(session: &mut Session, configured_history: Option<&Path>) -> rustyline::Result<()> {
    println!("{}", gray("Gonsole: type Go statements, `exit` to quit."));

    let mut source = EditorSource::new()?;
    let history = history_path(configured_history);
    if let Some(ref path) = history {
        if path.exists() {
            if let Err(err) = source.editor.load_history(path) {
                warn!(path = %path.display(), error = %err, "failed to load history");
            }
        }
    }

    let mut lineno = 0usize;
    loop {
        lineno += 1;
        match source.readline(&format!("[{}] > ", lineno)) {
            Ok(line) => {
                let outcome = session.handle_line(&line, &mut source);
                if matches!(outcome, TurnOutcome::Exit) {
                    break;
                }
                report(&outcome);
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", gray("(Ctrl-D or `exit` to quit)"));
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{} {}", red("error:"), err);
                break;
            }
        }
    }

    if let Some(ref path) = history {
        save_history(&mut source.editor, path);
    }
    println!("{}", cyan("bye"));
    Ok(())
}

fn save_history(editor: &mut DefaultEditor, path: &Path) {
    if let Some(parent) = path.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            warn!(path = %parent.display(), error = %err, "failed to create history directory");
            return;
        }
    }
    if let Err(err) = editor.save_history(path) {
        warn!(path = %path.display(), error = %err, "failed to save history");
    }
}

/// Expand a requested history location against `home`.
///
/// A leading `~` component and relative paths both land under `home`;
/// absolute paths are kept. Nothing requested means
/// `~/.gonsole/repl_history`.
fn history_file(home: Option<&Path>, requested: Option<&Path>) -> Option<PathBuf> {
    let Some(requested) = requested.filter(|path| !path.as_os_str().is_empty()) else {
        return home.map(|home| home.join(".gonsole").join("repl_history"));
    };
    if requested.is_absolute() {
        return Some(requested.to_path_buf());
    }
    let home = home?;
    let mut components = requested.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => {
            let rest = components.as_path();
            Some(if rest.as_os_str().is_empty() {
                home.to_path_buf()
            } else {
                home.join(rest)
            })
        }
        _ => Some(home.join(requested)),
    }
}

/// `GONSOLE_HISTORY_PATH` when set to something non-blank, else the
/// `history` key of the config file.
fn history_path(configured: Option<&Path>) -> Option<PathBuf> {
    let from_env = std::env::var(HISTORY_PATH_ENV)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from);
    history_file(
        dirs::home_dir().as_deref(),
        from_env.as_deref().or(configured),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_file_locations() {
        let home = Path::new("/home/tester");
        let resolve = |requested: Option<&str>| history_file(Some(home), requested.map(Path::new));

        assert_eq!(
            resolve(None),
            Some(PathBuf::from("/home/tester/.gonsole/repl_history"))
        );
        assert_eq!(resolve(Some("")), resolve(None));
        assert_eq!(
            resolve(Some("go/history.log")),
            Some(PathBuf::from("/home/tester/go/history.log"))
        );
        assert_eq!(
            resolve(Some("~/logs/gonsole.log")),
            Some(PathBuf::from("/home/tester/logs/gonsole.log"))
        );
        assert_eq!(
            resolve(Some("/tmp/gonsole.log")),
            Some(PathBuf::from("/tmp/gonsole.log"))
        );
    }

    #[test]
    fn test_history_file_without_home() {
        assert_eq!(
            history_file(None, Some(Path::new("/tmp/gonsole.log"))),
            Some(PathBuf::from("/tmp/gonsole.log"))
        );
        assert_eq!(history_file(None, Some(Path::new("relative.log"))), None);
        assert_eq!(history_file(None, None), None);
    }

    #[test]
    fn test_describe_compile_failure() {
        let outcome = TurnOutcome::Failed(TurnError::CompileFailure {
            reason: "# command-line-arguments".into(),
            detail: " 9:5: undefined: x".into(),
            stdout: String::new(),
        });

        let lines = describe(&outcome);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].0, Stream::Stderr);
        assert!(lines[0].1.contains("# command-line-arguments"));
        assert_eq!(lines[1], (Stream::Stderr, "9:5: undefined: x".to_string()));
    }

    #[test]
    fn test_describe_quiet_outcomes() {
        assert!(describe(&TurnOutcome::Idle).is_empty());
        assert!(describe(&TurnOutcome::Declared(vec!["a".into()])).is_empty());
        assert!(describe(&TurnOutcome::Output(String::new())).is_empty());
        assert_eq!(
            describe(&TurnOutcome::Output("3".into())),
            vec![(Stream::Stdout, "3".to_string())]
        );
    }

    #[test]
    fn test_describe_not_declared() {
        let lines = describe(&TurnOutcome::Failed(TurnError::NotDeclared));
        assert_eq!(lines.len(), 1);
        assert!(lines[0].1.contains("parameter not declared"));
    }
}
