// ABOUTME: Configuration file describing the source and destination stores
// ABOUTME: Loads YAML or TOML and validates connection settings before use

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{ReconcileError, Result};

const MYSQL_PARAMS: &[&str] = &["charset", "tls"];
const SSL_MODES: &[&str] = &["disable", "prefer", "require"];

/// Root configuration: one section per store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Destination database
    pub mysql: MysqlConfig,
    /// Source database
    pub postgresql: PostgresConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MysqlConfig {
    pub database: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_mysql_port")]
    pub port: u16,
    /// Driver parameters: `charset` and `tls` (true, false or skip-verify)
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostgresConfig {
    pub database: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_postgres_port")]
    pub port: u16,
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
    /// Source tables skipped by validate, migrate and compare
    #[serde(default)]
    pub ignored_tables: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_ssl_mode() -> String {
    "disable".to_string()
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Files ending in `.toml` are parsed as TOML, everything else as YAML.
    /// The result is validated before it is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Config`] if the file cannot be read, does not
    /// parse, or fails validation.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReconcileError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        if is_toml {
            Self::from_toml(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| ReconcileError::Config(format!("invalid YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)
            .map_err(|e| ReconcileError::Config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        require("mysql.database", &self.mysql.database)?;
        require("mysql.host", &self.mysql.host)?;
        require("postgresql.database", &self.postgresql.database)?;
        require("postgresql.host", &self.postgresql.host)?;

        if self.mysql.port == 0 {
            return Err(ReconcileError::Config("mysql.port must be nonzero".into()));
        }
        if self.postgresql.port == 0 {
            return Err(ReconcileError::Config(
                "postgresql.port must be nonzero".into(),
            ));
        }

        if !SSL_MODES.contains(&self.postgresql.ssl_mode.as_str()) {
            return Err(ReconcileError::Config(format!(
                "postgresql.ssl_mode must be one of {}, got '{}'",
                SSL_MODES.join(", "),
                self.postgresql.ssl_mode
            )));
        }

        for key in self.mysql.params.keys() {
            if !MYSQL_PARAMS.contains(&key.as_str()) {
                return Err(ReconcileError::Config(format!(
                    "unknown mysql.params key '{}' (supported: {})",
                    key,
                    MYSQL_PARAMS.join(", ")
                )));
            }
        }

        // The charset is interpolated into SET NAMES
        if let Some(charset) = self.mysql.params.get("charset") {
            if charset.is_empty()
                || !charset
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(ReconcileError::Config(format!(
                    "invalid mysql charset '{}'",
                    charset
                )));
            }
        }

        Ok(())
    }

    /// Tables to leave out of every operation
    pub fn ignored_tables(&self) -> &[String] {
        &self.postgresql.ignored_tables
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ReconcileError::Config(format!("{} is required", field)));
    }
    Ok(())
}
