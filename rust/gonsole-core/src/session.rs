//! One interactive session: classifies each input line, feeds the trackers,
//! assembles the program and runs it.
//!
//! A turn never returns `Err`. Every failure a user can recover from is
//! reported as [`TurnOutcome::Failed`] and the caller keeps reading input.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::command::{classify, Command};
use crate::continuation::{ContinuationError, FragmentReader, LineSource};
use crate::fragment::{Element, INDENT};
use crate::functions::FunctionTracker;
use crate::imports::{ImportSpec, ImportTracker};
use crate::registry::{DeclarationRegistry, SharedRegistry};
use crate::template::{Regions, Template};
use crate::toolchain::{RunOutput, Toolchain, ToolchainError};
use crate::variables::VariableTracker;

/// Publishes a program somewhere and returns a URL for it.
pub trait ShareService {
    fn share(&self, program: &str) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Where the assembled program is written before each run.
    pub cache_file: PathBuf,
    /// Imports declared before the first turn.
    pub default_imports: Vec<String>,
}

impl SessionConfig {
    pub fn default_cache_file() -> PathBuf {
        std::env::temp_dir()
            .join("gonsole")
            .join("_cache")
            .join("main.go")
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_file: Self::default_cache_file(),
            default_imports: vec!["fmt".to_string()],
        }
    }
}

/// A failed turn. The session state is as it was before the turn started,
/// except for import and function declarations, which are never undone.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("interrupted")]
    Interrupted,

    #[error("parameter not declared")]
    NotDeclared,

    /// The toolchain reported diagnostics. `detail` is the second stderr line
    /// with its `file:` prefix removed.
    #[error("{reason}\n{detail}")]
    CompileFailure {
        reason: String,
        detail: String,
        stdout: String,
    },

    #[error(transparent)]
    Toolchain(#[from] ToolchainError),

    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Input(ContinuationError),

    #[error("share failed: {0}")]
    Share(String),

    #[error("{0}")]
    Malformed(String),
}

impl From<ContinuationError> for TurnError {
    fn from(err: ContinuationError) -> Self {
        match err {
            ContinuationError::Interrupted => TurnError::Interrupted,
            other => TurnError::Input(other),
        }
    }
}

/// What a turn produced.
#[derive(Debug)]
pub enum TurnOutcome {
    /// Nothing to do (blank line).
    Idle,
    /// The user asked to leave.
    Exit,
    /// The program ran; its standard output, trailing whitespace removed.
    Output(String),
    /// Names declared by an import, function or variable declaration.
    Declared(Vec<String>),
    Exported(PathBuf),
    Shared(String),
    Failed(TurnError),
}

impl TurnOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, TurnOutcome::Failed(_))
    }
}

pub struct Session {
    registry: SharedRegistry,
    variables: VariableTracker,
    imports: ImportTracker,
    functions: FunctionTracker,
    template: Template,
    toolchain: Box<dyn Toolchain>,
    sharer: Option<Box<dyn ShareService>>,
    cache_file: PathBuf,
}

impl Session {
    pub fn new(config: SessionConfig, template: Template, toolchain: Box<dyn Toolchain>) -> Self {
        let registry = DeclarationRegistry::shared();
        let mut imports = ImportTracker::new(registry.clone());
        for path in &config.default_imports {
            imports.declare(ImportSpec::new(path.as_str()));
        }
        Self {
            variables: VariableTracker::new(registry.clone()),
            functions: FunctionTracker::new(registry.clone()),
            imports,
            registry,
            template,
            toolchain,
            sharer: None,
            cache_file: config.cache_file,
        }
    }

    pub fn with_share_service(mut self, sharer: Box<dyn ShareService>) -> Self {
        self.sharer = Some(sharer);
        self
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn variables(&self) -> &VariableTracker {
        &self.variables
    }

    pub fn imports(&self) -> &ImportTracker {
        &self.imports
    }

    pub fn functions(&self) -> &FunctionTracker {
        &self.functions
    }

    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    /// Run one top-level line to completion. Continuation lines, if the
    /// line opens a block, are pulled from `source`.
    ///
    /// Liveness is cleared only once a program has been assembled, so
    /// callees marked while a function is declared stay live until the next
    /// program is built.
    pub fn handle_line(&mut self, line: &str, source: &mut dyn LineSource) -> TurnOutcome {
        let outcome = match classify(line) {
            Command::Blank => TurnOutcome::Idle,
            Command::Exit => TurnOutcome::Exit,
            Command::Export(path) => self.export(Path::new(path)),
            Command::Playground => self.share(),
            Command::Import(rest) => self.import(line.trim(), rest, source),
            Command::Function => self.function(line.trim(), source),
            Command::Direct => self.direct(line.trim()),
            Command::Statement => self.statement(line.trim(), source),
        };
        if let TurnOutcome::Failed(err) = &outcome {
            debug!(error = %err, "turn failed");
        }
        outcome
    }

    /// The program the current state would compile to. Liveness found while
    /// rendering is cleared again afterwards.
    pub fn program(&self) -> String {
        self.scan_liveness();
        let imports = self.imports.render();
        let functions = self.functions.render();
        let statements = self.variables.render();
        self.registry.borrow_mut().reset_liveness();
        self.template.render(Regions {
            imports: &imports,
            functions: &functions,
            statements: &statements,
        })
    }

    fn import(&mut self, line: &str, rest: &str, source: &mut dyn LineSource) -> TurnOutcome {
        let specs: Vec<ImportSpec> = if rest == "(" {
            let block = match FragmentReader::new(source).read(line) {
                Ok(block) => block,
                Err(err) => return TurnOutcome::Failed(err.into()),
            };
            block
                .elements()
                .iter()
                .filter_map(|element| match element {
                    Element::Nested(entry) => ImportSpec::parse(entry.opener()),
                    Element::Line(_) => None,
                })
                .collect()
        } else {
            match ImportSpec::parse(rest) {
                Some(spec) => vec![spec],
                None => {
                    return TurnOutcome::Failed(TurnError::Malformed(format!(
                        "cannot parse import `{}`",
                        rest
                    )))
                }
            }
        };

        let paths = specs.iter().map(|spec| spec.path.clone()).collect();
        for spec in specs {
            self.imports.declare(spec);
        }
        TurnOutcome::Declared(paths)
    }

    fn function(&mut self, line: &str, source: &mut dyn LineSource) -> TurnOutcome {
        let fragment = match FragmentReader::new(source).read(line) {
            Ok(fragment) => fragment,
            Err(err) => return TurnOutcome::Failed(err.into()),
        };
        match self.functions.declare(fragment) {
            Some(name) => TurnOutcome::Declared(vec![name]),
            None => TurnOutcome::Failed(TurnError::Malformed(format!(
                "cannot find a function name in `{}`",
                line
            ))),
        }
    }

    fn direct(&mut self, line: &str) -> TurnOutcome {
        let statements = format!("{}fmt.Println({})", INDENT, line);
        let imports = format!("{}\"fmt\"", INDENT);
        let program = self.template.render(Regions {
            imports: &imports,
            functions: "",
            statements: &statements,
        });
        let outcome = match self.compile(&program) {
            Ok(output) => TurnOutcome::Output(output),
            Err(err) => TurnOutcome::Failed(err),
        };
        self.registry.borrow_mut().reset_liveness();
        outcome
    }

    fn statement(&mut self, line: &str, source: &mut dyn LineSource) -> TurnOutcome {
        let fragment = match FragmentReader::new(source).read(line) {
            Ok(fragment) => fragment,
            Err(err) => return TurnOutcome::Failed(err.into()),
        };

        if fragment.is_declaration() {
            let names = fragment.declared_identifiers();
            self.variables.add(fragment);
            // Nothing is emitted until a statement uses the new names.
            return TurnOutcome::Declared(names);
        }

        self.variables.add(fragment);
        self.scan_liveness();
        if self.variables.len() == 1 && !self.registry.borrow().has_live() {
            self.variables.rollback();
            self.registry.borrow_mut().reset_liveness();
            return TurnOutcome::Failed(TurnError::NotDeclared);
        }

        let program = self.program();
        match self.compile(&program) {
            Ok(output) => TurnOutcome::Output(output),
            Err(err) => {
                self.variables.rollback();
                TurnOutcome::Failed(err)
            }
        }
    }

    fn export(&mut self, path: &Path) -> TurnOutcome {
        let program = self.program();
        match write_program(path, &program) {
            Ok(()) => TurnOutcome::Exported(path.to_path_buf()),
            Err(err) => TurnOutcome::Failed(err),
        }
    }

    fn share(&mut self) -> TurnOutcome {
        let program = self.program();
        let Some(sharer) = &self.sharer else {
            return TurnOutcome::Failed(TurnError::Share("no share service configured".into()));
        };
        match sharer.share(&program) {
            Ok(url) => TurnOutcome::Shared(url),
            Err(err) => {
                warn!(error = %err, "share failed");
                TurnOutcome::Failed(TurnError::Share(err.to_string()))
            }
        }
    }

    /// Functions reachable from the emitted statements, then the imports
    /// used by those statements and function bodies.
    fn scan_liveness(&self) {
        let emitted = self.variables.emitted();
        self.functions.scan_liveness(emitted.iter().copied());
        let bodies = self.functions.live_bodies();
        self.imports
            .scan_liveness(emitted.iter().copied().chain(bodies.iter().copied()));
    }

    fn compile(&self, program: &str) -> Result<String, TurnError> {
        write_program(&self.cache_file, program)?;
        let output = self.toolchain.run(&self.cache_file)?;
        info!(success = output.success, "program finished");
        interpret(output)
    }
}

fn write_program(path: &Path, program: &str) -> Result<(), TurnError> {
    let io_error = |source| TurnError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    std::fs::write(path, program).map_err(io_error)
}

/// Successful output, or the first two stderr lines as a compile failure.
fn interpret(output: RunOutput) -> Result<String, TurnError> {
    let stdout = output.stdout.trim_end().to_string();
    if !output.failed() {
        return Ok(stdout);
    }
    let mut lines = output.stderr.lines();
    let reason = lines.next().unwrap_or_default().to_string();
    let detail = lines
        .next()
        .map(|line| match line.split_once(':') {
            Some((_, rest)) => rest.to_string(),
            None => line.to_string(),
        })
        .unwrap_or_default();
    Err(TurnError::CompileFailure {
        reason,
        detail,
        stdout,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpret_compile_error() {
        let output = RunOutput {
            stdout: String::new(),
            stderr: "# command-line-arguments\n./main.go:9:5: undefined: x\n".into(),
            success: false,
        };
        match interpret(output) {
            Err(TurnError::CompileFailure { reason, detail, .. }) => {
                assert_eq!(reason, "# command-line-arguments");
                assert_eq!(detail, "9:5: undefined: x");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_interpret_single_line_stderr() {
        let output = RunOutput {
            stdout: "partial\n".into(),
            stderr: "signal: killed".into(),
            success: false,
        };
        match interpret(output) {
            Err(TurnError::CompileFailure {
                reason,
                detail,
                stdout,
            }) => {
                assert_eq!(reason, "signal: killed");
                assert_eq!(detail, "");
                assert_eq!(stdout, "partial");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_interpret_success_trims_output() {
        let output = RunOutput {
            stdout: "hi\n\n".into(),
            stderr: String::new(),
            success: true,
        };
        assert_eq!(interpret(output).unwrap(), "hi");
    }
}
