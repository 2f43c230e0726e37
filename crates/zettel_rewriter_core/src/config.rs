use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Implicit config file looked up in the working directory when no
/// `--config` flag is given.
pub const DEFAULT_CONFIG_FILE: &str = "zettel-link-rewriter.toml";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct RewriterConfig {
    #[serde(default)]
    pub rewriter: RewriterSection,
}

/// Keys under `[rewriter]`. Every key is optional; CLI flags override these,
/// and built-in defaults fill whatever remains unset.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct RewriterSection {
    pub source_files: Option<String>,
    pub target_files: Option<String>,
    pub process: Option<String>,
    pub modified: Option<u64>,
}

/// Load and parse a RewriterConfig from a TOML file. Returns default if the
/// file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<RewriterConfig> {
    if !config_path.exists() {
        return Ok(RewriterConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: RewriterConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

/// Like `load_config`, but for a path the user named explicitly: a missing
/// file is a configuration error, not a silent default.
pub fn load_config_required(config_path: &Path) -> Result<RewriterConfig> {
    if !config_path.exists() {
        bail!(
            "configuration file {} does not exist",
            config_path.display()
        );
    }
    load_config(config_path)
}
