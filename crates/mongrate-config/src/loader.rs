use std::path::{Path, PathBuf};

use mongrate_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

const CONFIG_FILE: &str = "config.yml";

/// Loads `AppConfig` from YAML or TOML and layers `MONGRATE_*` environment
/// overrides on top.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Directory holding the default config file, e.g. `~/.config/mongrate`.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mongrate")
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(CONFIG_FILE)
    }

    /// Parse a config file. The format is picked from the extension.
    pub fn load(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config: AppConfig = match ext {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}")))?,
            "toml" => toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("TOML parse error: {e}")))?,
            other => {
                return Err(Error::Config(format!(
                    "unsupported config extension: {other}"
                )));
            }
        };

        info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Load the explicit path if given, else the default location when it
    /// exists, else built-in defaults. Environment overrides apply in every case.
    pub fn load_or_default(path: Option<&Path>) -> Result<AppConfig> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => {
                let default_path = Self::default_config_path();
                if default_path.is_file() {
                    Self::load(&default_path)?
                } else {
                    debug!(
                        "no config at {}, using defaults",
                        default_path.display()
                    );
                    AppConfig::default()
                }
            }
        };
        apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Write `config` in the format `load` expects for the extension,
    /// creating parent directories as needed.
    pub fn write(path: &Path, config: &AppConfig) -> Result<()> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let contents = match ext {
            "yml" | "yaml" => serde_yaml::to_string(config)
                .map_err(|e| Error::Config(format!("failed to serialize config: {e}")))?,
            "toml" => toml::to_string(config)
                .map_err(|e| Error::Config(format!("failed to serialize config: {e}")))?,
            other => {
                return Err(Error::Config(format!(
                    "unsupported config extension: {other}"
                )));
            }
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Apply `MONGRATE_*` overrides using `lookup` to resolve variables.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(uri) = lookup("MONGRATE_DATABASE_URI") {
        config.database.uri = uri;
    }
    if let Some(name) = lookup("MONGRATE_DATABASE_NAME") {
        config.database.name = name;
    }
    if let Some(dir) = lookup("MONGRATE_SCRIPTS_DIR") {
        config.migration.scripts_dir = PathBuf::from(dir);
    }
    if let Some(suffix) = lookup("MONGRATE_COLLECTION_SUFFIX") {
        config.migration.collection_suffix = (!suffix.is_empty()).then_some(suffix);
    }
    if let Some(strict) = lookup("MONGRATE_STRICT_ORDER") {
        config.migration.fail_on_order_mismatch = parse_bool(&strict).ok_or_else(|| {
            Error::Config(format!("MONGRATE_STRICT_ORDER must be a boolean, got '{strict}'"))
        })?;
    }
    Ok(())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
