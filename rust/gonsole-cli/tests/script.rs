//! Script playback against a session backed by a canned toolchain.

use std::path::Path;

use gonsole_cli::script::{self, ScriptSource, ScriptSummary};
use gonsole_core::{RunOutput, Session, SessionConfig, Template, Toolchain, ToolchainError};

/// Rejects programs that reference `missing`, accepts everything else.
struct Canned;

impl Toolchain for Canned {
    fn run(&self, source: &Path) -> Result<RunOutput, ToolchainError> {
        let program = std::fs::read_to_string(source).unwrap();
        if program.contains("missing") {
            return Ok(RunOutput {
                stdout: String::new(),
                stderr: "# command-line-arguments\n./main.go:8:14: undefined: missing\n".into(),
                success: false,
            });
        }
        Ok(RunOutput {
            stdout: "ok\n".into(),
            stderr: String::new(),
            success: true,
        })
    }
}

fn session(name: &str) -> Session {
    let config = SessionConfig {
        cache_file: std::env::temp_dir()
            .join(format!("gonsole-cli-test-{}-{}", std::process::id(), name))
            .join("main.go"),
        default_imports: vec!["fmt".into()],
    };
    Session::new(config, Template::builtin().unwrap(), Box::new(Canned))
}

#[test]
fn script_with_blocks_runs_clean() {
    let mut session = session("clean");
    let mut source = ScriptSource::new(
        "a := 1\n\nif a > 0 {\nfmt.Println(a)\n} else {\nfmt.Println(-a)\n}\nfmt.Println(a)\n",
    );

    let summary = script::run(&mut session, &mut source);

    assert_eq!(
        summary,
        ScriptSummary {
            turns: 3,
            failures: 0
        }
    );
    assert_eq!(session.variables().len(), 3);
}

#[test]
fn failures_are_counted_and_script_continues() {
    let mut session = session("failures");
    let mut source = ScriptSource::new("x := 1\nfmt.Println(missing)\nfmt.Println(x)\n");

    let summary = script::run(&mut session, &mut source);

    assert_eq!(summary.turns, 3);
    assert_eq!(summary.failures, 1);
    assert_eq!(session.variables().len(), 2);
}

#[test]
fn exit_stops_playback() {
    let mut session = session("exit");
    let mut source = ScriptSource::new("x := 1\nexit\nfmt.Println(x)\n");

    let summary = script::run(&mut session, &mut source);

    assert_eq!(summary.turns, 2);
    assert_eq!(session.variables().len(), 1);
}

#[test]
fn unterminated_block_is_a_failure() {
    let mut session = session("unterminated");
    let mut source = ScriptSource::new("x := 1\nif x > 0 {\nfmt.Println(x)\n");

    let summary = script::run(&mut session, &mut source);

    assert_eq!(summary.failures, 1);
    assert_eq!(session.variables().len(), 1);
}
