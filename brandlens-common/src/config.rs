//! Configuration file resolution and TOML loading
//!
//! Bootstrap configuration is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config file (`<config_dir>/<app>/<app>.toml`)
//! 4. Compiled defaults (fallback)
//!
//! A missing config file is never fatal: callers get a warning and defaults.
//! A config file that exists but does not parse is a `Config` error.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where the active configuration file came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine,
    Environment,
    PlatformFile,
    Defaults,
}

/// Logging configuration shared by every brandlens binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Resolve the configuration file path following the priority order above
///
/// Returns `None` with `ConfigSource::Defaults` when no candidate exists.
pub fn resolve_config_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    app_name: &str,
) -> (Option<PathBuf>, ConfigSource) {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return (Some(path.to_path_buf()), ConfigSource::CommandLine);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return (Some(PathBuf::from(path)), ConfigSource::Environment);
        }
    }

    // Priority 3: Platform config file
    if let Some(path) = platform_config_file(app_name) {
        return (Some(path), ConfigSource::PlatformFile);
    }

    // Priority 4: Compiled defaults
    (None, ConfigSource::Defaults)
}

/// Locate an existing platform config file for `app_name`
fn platform_config_file(app_name: &str) -> Option<PathBuf> {
    let file_name = format!("{}.toml", app_name);

    let user_config = dirs::config_dir().map(|d| d.join(app_name).join(&file_name));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc").join(app_name).join(&file_name);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Load and parse a TOML file into `T`
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load `T` from `path`, falling back to `T::default()` when the file is absent
///
/// Parse errors are still reported; only a missing file degrades to defaults.
pub fn load_toml_or_default<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match path {
        Some(path) if path.exists() => {
            let config = load_toml(path)?;
            info!("Configuration loaded from {}", path.display());
            Ok(config)
        }
        Some(path) => {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            Ok(T::default())
        }
        None => {
            debug!("No config file configured, using built-in defaults");
            Ok(T::default())
        }
    }
}

/// Write bytes to `path` atomically (temp file in the same directory, then rename)
///
/// Parent directories are created as needed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidInput(format!("Not a file path: {}", path.display())))?;
    let temp_path = parent.join(format!(".{}.tmp", file_name));

    std::fs::write(&temp_path, contents)?;
    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(Error::Io(e));
    }
    Ok(())
}

/// Serialize `config` as TOML and write it atomically
pub fn write_toml_config<T: Serialize>(config: &T, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    write_atomic(path, content.as_bytes())
}
