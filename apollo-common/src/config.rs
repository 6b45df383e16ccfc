//! Bootstrap configuration loading and root folder resolution
//!
//! Bootstrap settings are the ones that cannot change while a service runs
//! (port, root folder, classifier endpoint, logging). Everything tunable at
//! runtime lives in the `settings` table instead.
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the shared SQLite database inside the root folder
pub const DATABASE_FILE_NAME: &str = "apollo.db";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database and scratch media
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP port override
    #[serde(default)]
    pub port: Option<u16>,

    /// Classification service predict endpoint
    #[serde(default)]
    pub classifier_url: Option<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load a TOML bootstrap file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the TOML bootstrap file for a module, or defaults if none exists
///
/// An explicit path must exist and parse. Without one, the platform config
/// location is tried and any problem there degrades to defaults.
pub fn load_module_config(explicit: Option<&Path>, module_name: &str) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        return load_toml_config(path);
    }

    match default_config_path(module_name) {
        Some(path) if path.exists() => match load_toml_config(&path) {
            Ok(config) => {
                debug!("Loaded bootstrap config from {}", path.display());
                Ok(config)
            }
            Err(e) => {
                warn!("Ignoring unreadable config file: {}", e);
                Ok(TomlConfig::default())
            }
        },
        _ => Ok(TomlConfig::default()),
    }
}

/// Platform config file location: `<config_dir>/apollo/<module>.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("apollo").join(format!("{}.toml", module_name)))
}

/// Resolve the root folder following the priority order above
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("apollo"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/apollo"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("apollo"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/apollo"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("apollo"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\apollo"))
    } else {
        PathBuf::from("./apollo_data")
    }
}

/// Create the root folder if missing and return the database path inside it
pub fn prepare_root_folder(root_folder: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(root_folder)?;
    Ok(root_folder.join(DATABASE_FILE_NAME))
}
