//! Configuration file parsing for `gonsole.toml`.
//!
//! Searches the current directory then its ancestors, falling back to
//! `~/.config/gonsole/gonsole.toml`. No file at all means defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use gonsole_core::SessionConfig;
use serde::{Deserialize, Serialize};

pub const FILE_NAME: &str = "gonsole.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid toml in '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct GonsoleConfig {
    /// Go binary used to build and run programs.
    pub go: String,
    /// Seconds a program may run before it is killed.
    pub timeout_secs: u64,
    /// Directory holding the generated `main.go`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    /// Program template replacing the built-in one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,
    /// Imports available without an `import` line.
    pub default_imports: Vec<String>,
    pub playground_url: String,
    /// Line editor history file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<PathBuf>,
}

impl Default for GonsoleConfig {
    fn default() -> Self {
        Self {
            go: "go".to_string(),
            timeout_secs: 30,
            cache_dir: None,
            template: None,
            default_imports: vec!["fmt".to_string()],
            playground_url: "https://play.golang.org".to_string(),
            history: None,
        }
    }
}

impl GonsoleConfig {
    /// Load the nearest `gonsole.toml`, or defaults when there is none.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Path of the config file that [`load`](Self::load) would read.
    pub fn find() -> Option<PathBuf> {
        let cwd = std::env::current_dir().ok();
        let home = dirs::home_dir();
        find_config(cwd.as_deref(), home.as_deref())
    }

    /// Parse a TOML string directly.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_file(&self) -> PathBuf {
        match &self.cache_dir {
            Some(dir) => dir.join("main.go"),
            None => SessionConfig::default_cache_file(),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            cache_file: self.cache_file(),
            default_imports: self.default_imports.clone(),
        }
    }

    /// Contents written by `gonsole init`.
    pub fn default_template() -> &'static str {
        r#"# Gonsole configuration

# Go binary used to build and run each program
go = "go"

# Seconds a program may run before it is killed
timeout_secs = 30

# Packages usable without an explicit import
default_imports = ["fmt"]

# Where `playground` shares programs
playground_url = "https://play.golang.org"

# Directory for the generated main.go (default: <tmp>/gonsole/_cache)
# cache_dir = "/tmp/gonsole/_cache"

# Custom program template with {%import_area%}, {%func_area%} and {%code_area%}
# template = "main.go.tmpl"

# Line editor history (default: ~/.gonsole/repl_history)
# history = "~/.gonsole/repl_history"
"#
    }
}

/// Nearest `gonsole.toml` at or above `cwd`, then the one under `home`.
fn find_config(cwd: Option<&Path>, home: Option<&Path>) -> Option<PathBuf> {
    if let Some(start) = cwd {
        for dir in start.ancestors() {
            let candidate = dir.join(FILE_NAME);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    let global = home?.join(".config").join("gonsole").join(FILE_NAME);
    global.is_file().then_some(global)
}
