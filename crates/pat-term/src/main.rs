//! Terminal entry point: argument parsing, logging setup, and editor
//! startup.

mod frontend;
mod translate;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use frontend::CrosstermFrontend;
use pat_editor::Editor;

#[derive(Parser, Debug)]
#[command(name = "patina", about = "modal terminal editor", version)]
struct Args {
    /// Files to open.
    files: Vec<PathBuf>,

    /// Configuration file path (defaults to patina.toml discovery).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log file path (defaults to patina.log in the cache directory).
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_tracing(args.log_file.clone())?;

    let config = pat_config::load_from(args.config.clone())?;
    let mut editor = Editor::new(config);
    for file in &args.files {
        editor.open_file(file, None);
    }

    let mut frontend = CrosstermFrontend::new();
    editor.run(&mut frontend)
}

/// Logs go to a file, never the alternate screen. `PATINA_LOG` filters in
/// the usual EnvFilter syntax.
fn init_tracing(path: Option<PathBuf>) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let path = path.unwrap_or_else(|| {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("patina")
            .join("patina.log")
    });
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("PATINA_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}
