use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use crate::config::RewriterConfig;

pub const DEFAULT_SOURCE_DIR: &str = ".";
pub const DEFAULT_TARGET_DIR: &str = "dest";
pub const DEFAULT_MODIFIED_WINDOW_MINUTES: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessMode {
    All,
    Modified,
}

impl ProcessMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Modified => "modified",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "all" => Ok(Self::All),
            "modified" => Ok(Self::Modified),
            other => bail!("unknown process mode `{other}` (expected `all` or `modified`)"),
        }
    }
}

/// Everything one run needs, resolved once and passed by reference. No
/// ambient state.
#[derive(Debug, Clone)]
pub struct RunParameters {
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
    pub mode: ProcessMode,
    pub modified_window_minutes: u64,
}

/// Values given on the command line. `None` means "fall back to the config
/// file, then to the built-in default".
#[derive(Debug, Clone, Default)]
pub struct ParameterOverrides {
    pub source_dir: Option<PathBuf>,
    pub target_dir: Option<PathBuf>,
    pub mode: Option<ProcessMode>,
    pub modified_window_minutes: Option<u64>,
}

/// Merge CLI overrides over config-file values over defaults into one
/// immutable `RunParameters`. Rejects a zero window when the mode is
/// `modified`, before any file is touched.
pub fn resolve_parameters(
    overrides: &ParameterOverrides,
    config: &RewriterConfig,
) -> Result<RunParameters> {
    let source_dir = overrides
        .source_dir
        .clone()
        .or_else(|| config.rewriter.source_files.clone().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SOURCE_DIR));
    let target_dir = overrides
        .target_dir
        .clone()
        .or_else(|| config.rewriter.target_files.clone().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TARGET_DIR));

    let mode = match overrides.mode {
        Some(mode) => mode,
        None => match config.rewriter.process.as_deref() {
            Some(value) => ProcessMode::parse(value)
                .context("invalid `process` value in configuration file")?,
            None => ProcessMode::All,
        },
    };

    let modified_window_minutes = overrides
        .modified_window_minutes
        .or(config.rewriter.modified)
        .unwrap_or(DEFAULT_MODIFIED_WINDOW_MINUTES);

    if mode == ProcessMode::Modified && modified_window_minutes == 0 {
        bail!(
            "process mode `modified` requires a positive time window in minutes (got 0)"
        );
    }

    Ok(RunParameters {
        source_dir,
        target_dir,
        mode,
        modified_window_minutes,
    })
}

/// The source directory must already exist; the target directory is created
/// when absent.
pub fn check_dirs(parameters: &RunParameters) -> Result<()> {
    if !parameters.source_dir.is_dir() {
        bail!(
            "source directory {} does not exist",
            parameters.source_dir.display()
        );
    }
    fs::create_dir_all(&parameters.target_dir).with_context(|| {
        format!(
            "failed to create target directory {}",
            parameters.target_dir.display()
        )
    })?;
    Ok(())
}
