use prov_cli::cli;
use prov_cli::Project;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> ExitCode {
    let matches = cli::command().get_matches();

    let root = match cli::project_root(&matches) {
        Ok(root) => root,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(matches.get_flag("verbose"), &root);

    let stdout = io::stdout();
    let result = cli::run(&root, &matches, &mut stdout.lock());
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Stderr logging filtered by `PROV_LOG`/`RUST_LOG`, plus info-level
/// events appended to the project's log file once it is initialized
fn init_tracing(verbose: bool, root: &Path) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("PROV_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default));

    let file_layer = open_log(root).map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .with_filter(LevelFilter::INFO)
    });

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(io::stderr)
                .with_filter(filter),
        )
        .with(file_layer)
        .init();
}

fn open_log(root: &Path) -> Option<std::fs::File> {
    let project = Project::open(root).ok()?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(project.log_path())
        .ok()
}
