//! Building and running the assembled program.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{info, warn};

/// Captured result of one toolchain invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl RunOutput {
    /// Any diagnostic output counts as a failure, whatever the exit status.
    pub fn failed(&self) -> bool {
        !self.success || !self.stderr.trim().is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    #[error("failed to start `{binary}`: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for `{binary}`: {source}")]
    Wait {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{binary}` did not finish within {}s and was killed", .timeout.as_secs())]
    TimedOut { binary: String, timeout: Duration },
}

/// Something that behaves like "build and run a single source file".
pub trait Toolchain {
    fn run(&self, source: &Path) -> Result<RunOutput, ToolchainError>;
}

/// Runs `<binary> run <file>`.
#[derive(Debug, Clone)]
pub struct GoToolchain {
    binary: PathBuf,
    timeout: Duration,
}

impl GoToolchain {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    fn name(&self) -> String {
        self.binary.display().to_string()
    }
}

impl Default for GoToolchain {
    fn default() -> Self {
        Self::new("go", Duration::from_secs(30))
    }
}

impl Toolchain for GoToolchain {
    fn run(&self, source: &Path) -> Result<RunOutput, ToolchainError> {
        info!(binary = %self.name(), source = %source.display(), "running program");
        let mut child = Command::new(&self.binary)
            .arg("run")
            .arg(source)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ToolchainError::Spawn {
                binary: self.name(),
                source,
            })?;

        // Drain both pipes while waiting so a chatty program cannot block on
        // a full pipe buffer.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                warn!(binary = %self.name(), timeout = ?self.timeout, "toolchain timed out");
                let _ = child.kill();
                let _ = child.wait();
                return Err(ToolchainError::TimedOut {
                    binary: self.name(),
                    timeout: self.timeout,
                });
            }
            Err(source) => {
                let _ = child.kill();
                return Err(ToolchainError::Wait {
                    binary: self.name(),
                    source,
                });
            }
        };

        Ok(RunOutput {
            stdout: collect(stdout),
            stderr: collect(stderr),
            success: status.success(),
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    let mut pipe = pipe?;
    Some(thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }))
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

/// Extension trait for `std::process::Child` to support timeouts.
trait ChildExt {
    fn wait_timeout(&mut self, timeout: Duration) -> std::io::Result<Option<ExitStatus>>;
}

impl ChildExt for Child {
    fn wait_timeout(&mut self, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
        let start = Instant::now();
        loop {
            match self.try_wait()? {
                Some(status) => return Ok(Some(status)),
                None => {
                    if start.elapsed() >= timeout {
                        return Ok(None);
                    }
                    thread::sleep(Duration::from_millis(10));
                }
            }
        }
    }
}
