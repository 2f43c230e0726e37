use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use zettel_rewriter_core::batch::process_files;
use zettel_rewriter_core::config::{DEFAULT_CONFIG_FILE, load_config, load_config_required};
use zettel_rewriter_core::runtime::{
    ParameterOverrides, ProcessMode, check_dirs, resolve_parameters,
};

#[derive(Debug, Parser)]
#[command(
    name = "zettel-rewriter",
    version,
    about = "Convert [[wikilinks]] in a note directory into standard markdown links"
)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "CONFIG",
        help = "Path to a TOML configuration file. Default is zettel-link-rewriter.toml"
    )]
    config: Option<PathBuf>,
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        default_value = "warning",
        help = "Logging level for the run. Default is warning"
    )]
    verbosity: Verbosity,
    #[arg(
        short = 'f',
        long,
        value_name = "LOGFILE",
        help = "Write log messages to a file in addition to stderr"
    )]
    log_file: Option<PathBuf>,
    #[arg(
        long,
        value_name = "DIRECTORY",
        help = "Directory containing source note files. Default is the current directory"
    )]
    source_files: Option<PathBuf>,
    #[arg(
        long,
        value_name = "DIRECTORY",
        help = "Directory to write converted files to. Default is ./dest"
    )]
    target_files: Option<PathBuf>,
    #[arg(
        short,
        long,
        value_name = "MODE",
        help = "Process all source files or only recently modified ones. Default is all"
    )]
    process: Option<ModeArg>,
    #[arg(
        short,
        long,
        value_name = "MINUTES",
        help = "Time window for recently modified files. Default is 60"
    )]
    modified: Option<u64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Verbosity {
    Warning,
    Info,
    Debug,
}

impl Verbosity {
    fn directive(self) -> &'static str {
        match self {
            Self::Warning => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    All,
    Modified,
}

impl From<ModeArg> for ProcessMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::All => Self::All,
            ModeArg::Modified => Self::Modified,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbosity, cli.log_file.as_deref())?;

    let start = Instant::now();

    // An explicitly named config file must exist; the implicit default is
    // optional and skipped silently when absent.
    let config = match &cli.config {
        Some(path) => load_config_required(path)?,
        None => load_config(Path::new(DEFAULT_CONFIG_FILE))?,
    };

    let overrides = ParameterOverrides {
        source_dir: cli.source_files,
        target_dir: cli.target_files,
        mode: cli.process.map(ProcessMode::from),
        modified_window_minutes: cli.modified,
    };
    let parameters = resolve_parameters(&overrides, &config)?;
    check_dirs(&parameters)?;

    let report = process_files(&parameters)?;

    let elapsed = start.elapsed().as_secs();
    let (hours, remainder) = (elapsed / 3600, elapsed % 3600);
    let (minutes, seconds) = (remainder / 60, remainder % 60);
    println!(
        "Processed {} files in {:02}:{:02}:{:02}",
        report.processed, hours, minutes, seconds
    );
    if report.skipped > 0 {
        println!("Skipped {} files (see log for details)", report.skipped);
    }
    Ok(())
}

fn init_logging(verbosity: Verbosity, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter).with(stderr_layer);

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            registry
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .init();
        }
        None => registry.init(),
    }
    Ok(())
}
