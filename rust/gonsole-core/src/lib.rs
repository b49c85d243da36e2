//! Gonsole Core
//!
//! Incremental fragment tracking for a Go REPL: which of the statements,
//! functions and imports typed so far are needed by the newest statement,
//! and the assembly of exactly those into a runnable program.

pub mod command;
pub mod continuation;
pub mod fragment;
pub mod functions;
pub mod imports;
pub mod registry;
pub mod session;
pub mod template;
pub mod tokenizer;
pub mod toolchain;
pub mod variables;

pub use continuation::{ContinuationError, LineSource};
pub use fragment::Fragment;
pub use session::{Session, SessionConfig, ShareService, TurnError, TurnOutcome};
pub use template::{Template, TemplateError};
pub use toolchain::{GoToolchain, RunOutput, Toolchain, ToolchainError};
