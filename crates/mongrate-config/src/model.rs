use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration for a migration host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub migration: MigrationConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub uri: String,
    pub name: String,
    /// Reported to the server in the connection handshake.
    pub app_name: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            name: "app".to_string(),
            app_name: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub scripts_dir: PathBuf,
    /// Abort when an already-applied script is visited after a pending one.
    pub fail_on_order_mismatch: bool,
    /// Namespaces the history collection as `_migration_<suffix>`.
    pub collection_suffix: Option<String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            scripts_dir: PathBuf::from("./migrations"),
            fail_on_order_mismatch: false,
            collection_suffix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_lenient_and_local() {
        let config = AppConfig::default();
        assert_eq!(config.database.uri, "mongodb://localhost:27017");
        assert_eq!(config.database.name, "app");
        assert!(!config.migration.fail_on_order_mismatch);
        assert!(config.migration.collection_suffix.is_none());
        assert_eq!(config.log.level, "info");
        assert!(!config.log.json);
    }

    #[test]
    fn partial_yaml_keeps_remaining_defaults() {
        let yaml = "migration:\n  collection_suffix: billing\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.migration.collection_suffix.as_deref(),
            Some("billing")
        );
        assert!(!config.migration.fail_on_order_mismatch);
        assert_eq!(config.migration.scripts_dir, PathBuf::from("./migrations"));
        assert_eq!(config.database.name, "app");
    }
}
