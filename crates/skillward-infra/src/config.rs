//! Configuration loader for Skillward.
//!
//! Reads `skillward.toml` (from the scanned directory, or an explicit path)
//! and deserializes it into [`GlobalConfig`]. A missing file means defaults.
//! A file that exists but does not parse is an error: falling back to the
//! defaults would silently lift every policy bound.

use std::path::{Path, PathBuf};

use anyhow::Context;
use skillward_types::config::GlobalConfig;

pub const CONFIG_FILE_NAME: &str = "skillward.toml";

/// Where the configuration for a scan of `target` lives.
///
/// `target` may be a directory or a single skill file.
pub fn default_config_path(target: &Path) -> PathBuf {
    if target.is_file() {
        target
            .parent()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
    } else {
        target.join(CONFIG_FILE_NAME)
    }
}

/// Load configuration from `path`.
///
/// - If the file does not exist, returns [`GlobalConfig::default()`].
/// - If the file cannot be read or parsed, returns an error naming it.
pub async fn load_config(path: &Path) -> anyhow::Result<GlobalConfig> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No {} found at {}, using defaults", CONFIG_FILE_NAME, path.display());
            return Ok(GlobalConfig::default());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    let config: GlobalConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    config
        .trust
        .weights
        .validate()
        .with_context(|| format!("invalid trust weights in {}", path.display()))?;
    config
        .policy
        .to_policy()
        .with_context(|| format!("invalid policy in {}", path.display()))?;

    tracing::debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}
