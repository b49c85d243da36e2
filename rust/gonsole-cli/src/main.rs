use std::path::{Path, PathBuf};

use clap::{Args, Parser as ClapParser, Subcommand};
use gonsole_cli::colors::{red, status_label};
use gonsole_cli::config::{self, GonsoleConfig};
use gonsole_cli::playground::PlaygroundClient;
use gonsole_cli::{repl, script};
use gonsole_core::{GoToolchain, Session, Template};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "gonsole", version, about = "An incremental Go REPL")]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Flags that take precedence over `gonsole.toml`.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Read configuration from this file instead of searching for one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Go binary to build and run programs with
    #[arg(long, global = true)]
    go: Option<String>,

    /// Seconds a program may run before it is killed
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Program template with the three placeholder regions
    #[arg(long, global = true)]
    template: Option<PathBuf>,

    /// Directory for the generated main.go
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive shell (default)
    Repl,
    /// Feed a file of REPL input through a session
    Run {
        /// Path to the script
        #[arg()]
        script: PathBuf,
    },
    /// Write a default gonsole.toml in the current directory
    Init,
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Init => cmd_init(),
        Commands::Repl => {
            let config = load_config(&cli.overrides);
            let mut session = build_session(&config);
            if let Err(e) = repl::run(&mut session, config.history.as_deref()) {
                fail(e);
            }
        }
        Commands::Run { script } => {
            let config = load_config(&cli.overrides);
            let mut session = build_session(&config);
            cmd_run(&mut session, &script);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("GONSOLE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn fail(e: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", red("error:"), e);
    std::process::exit(1);
}

fn load_config(overrides: &Overrides) -> GonsoleConfig {
    let loaded = match &overrides.config {
        Some(path) => GonsoleConfig::load_from(path),
        None => GonsoleConfig::load(),
    };
    let mut config = loaded.unwrap_or_else(|e| fail(e));
    if let Some(go) = &overrides.go {
        config.go = go.clone();
    }
    if let Some(timeout) = overrides.timeout {
        config.timeout_secs = timeout;
    }
    if let Some(template) = &overrides.template {
        config.template = Some(template.clone());
    }
    if let Some(cache_dir) = &overrides.cache_dir {
        config.cache_dir = Some(cache_dir.clone());
    }
    config
}

fn build_session(config: &GonsoleConfig) -> Session {
    let template = match &config.template {
        Some(path) => Template::load(path),
        None => Template::builtin(),
    }
    .unwrap_or_else(|e| fail(e));

    let toolchain = GoToolchain::new(&config.go, config.timeout());
    let session = Session::new(config.session_config(), template, Box::new(toolchain));
    match PlaygroundClient::new(&config.playground_url) {
        Ok(client) => session.with_share_service(Box::new(client)),
        Err(e) => {
            warn!(error = %e, "playground sharing unavailable");
            session
        }
    }
}

fn cmd_run(session: &mut Session, path: &Path) {
    let mut source = script::ScriptSource::from_path(path).unwrap_or_else(|e| {
        fail(format!("cannot read script '{}': {}", path.display(), e));
    });
    let summary = script::run(session, &mut source);
    if summary.failures > 0 {
        eprintln!(
            "{} {} of {} turns failed",
            red("error:"),
            summary.failures,
            summary.turns
        );
        std::process::exit(1);
    }
}

fn cmd_init() {
    let path = PathBuf::from(config::FILE_NAME);
    if path.exists() {
        fail(format!("{} already exists, not overwriting", config::FILE_NAME));
    }
    if let Err(e) = std::fs::write(&path, GonsoleConfig::default_template()) {
        fail(format!("writing {}: {}", config::FILE_NAME, e));
    }
    println!("{} {}", status_label("Created"), config::FILE_NAME);
}
