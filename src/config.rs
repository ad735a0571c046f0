//! Run configuration, read from a JSON file next to the data folders.
//!
//! ```json
//! {
//!   "use_db": false,
//!   "db": { "host": "localhost", "database": "qos", "username": "qos", "password": "" },
//!   "db_qos_data_table": "stg.qos_data",
//!   "db_qos_curves_table": "stg.qos_curves",
//!   "db_output_table": "quality_of_service",
//!   "db_output_schema": "qos",
//!   "paths": { "input": "data/input", "output": "data/output" }
//! }
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{QosError, Result};

/// Environment variable that overrides `db.password`.
pub const DB_PASSWORD_ENV: &str = "QOS_DB_PASSWORD";

#[derive(Debug, Clone, Deserialize)]
pub struct QosConfig {
    /// Read and write through the relational store instead of flat files.
    #[serde(default)]
    pub use_db: bool,

    #[serde(default)]
    pub db: Option<DbConfig>,

    #[serde(default = "default_data_table")]
    pub db_qos_data_table: String,

    #[serde(default = "default_curves_table")]
    pub db_qos_curves_table: String,

    #[serde(default = "default_output_table")]
    pub db_output_table: String,

    #[serde(default = "default_output_schema")]
    pub db_output_schema: String,

    pub paths: PathsConfig,

    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub host: String,
    pub database: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
}

/// Flat-file folders; relative entries are resolved against the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    pub input: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

fn default_data_table() -> String {
    "stg.qos_data".to_string()
}

fn default_curves_table() -> String {
    "stg.qos_curves".to_string()
}

fn default_output_table() -> String {
    "quality_of_service".to_string()
}

fn default_output_schema() -> String {
    "qos".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_api_host() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    8000
}

impl QosConfig {
    /// Loads the config file, resolves paths and applies the password override.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(QosError::Config(format!(
                "config file '{}' does not exist",
                path.display()
            )));
        }
        let raw = std::fs::read_to_string(path)?;
        let base = path.parent().unwrap_or(Path::new("."));

        let config = Self::from_json(&raw, base)?
            .with_password_override(std::env::var(DB_PASSWORD_ENV).ok());
        config.validate()?;

        debug!(config = %path.display(), use_db = config.use_db, "Configuration loaded");
        Ok(config)
    }

    /// Parses config JSON, resolving relative paths against `base`.
    pub fn from_json(raw: &str, base: &Path) -> Result<Self> {
        let mut config: QosConfig = serde_json::from_str(raw)
            .map_err(|e| QosError::Config(format!("invalid configuration: {e}")))?;

        config.paths.input = resolve(base, &config.paths.input);
        config.paths.output = resolve(base, &config.paths.output);
        Ok(config)
    }

    pub fn with_password_override(mut self, password: Option<String>) -> Self {
        if let (Some(db), Some(password)) = (self.db.as_mut(), password) {
            db.password = password;
        }
        self
    }

    /// Checks the settings needed by the selected storage mode.
    pub fn validate(&self) -> Result<()> {
        if self.use_db {
            if self.db.is_none() {
                return Err(QosError::Config(
                    "use_db is true but no db section is configured".into(),
                ));
            }
            for name in [
                &self.db_qos_data_table,
                &self.db_qos_curves_table,
                &self.db_output_table,
                &self.db_output_schema,
            ] {
                validate_identifier(name)?;
            }
        } else if !self.paths.input.is_dir() {
            return Err(QosError::InputAccess(format!(
                "input folder '{}' does not exist",
                self.paths.input.display()
            )));
        }
        Ok(())
    }

    /// `schema.table` for the output relation.
    pub fn output_relation(&self) -> String {
        format!("{}.{}", self.db_output_schema, self.db_output_table)
    }

    pub fn db(&self) -> Result<&DbConfig> {
        self.db
            .as_ref()
            .ok_or_else(|| QosError::Config("no db section is configured".into()))
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Accepts `name` or `schema.name` made of ASCII letters, digits and underscores.
pub fn validate_identifier(name: &str) -> Result<()> {
    let parts: Vec<&str> = name.split('.').collect();
    let valid = parts.len() <= 2
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });

    if valid {
        Ok(())
    } else {
        Err(QosError::Config(format!("'{name}' is not a valid table name")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{ "paths": { "input": "data/input", "output": "/tmp/qos-out" } }"#;

    #[test]
    fn test_defaults_and_relative_paths() {
        let config = QosConfig::from_json(MINIMAL, Path::new("/srv/qos")).unwrap();

        assert!(!config.use_db);
        assert_eq!(config.paths.input, PathBuf::from("/srv/qos/data/input"));
        assert_eq!(config.paths.output, PathBuf::from("/tmp/qos-out"));
        assert_eq!(config.db_qos_data_table, "stg.qos_data");
        assert_eq!(config.output_relation(), "qos.quality_of_service");
        assert_eq!(config.api.port, 8000);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = QosConfig::from_json("{ \"paths\": 3 }", Path::new(".")).unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = QosConfig::load(Path::new("/definitely/not/here/qos_config.json")).unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_missing_input_folder() {
        let config = QosConfig::from_json(MINIMAL, Path::new("/definitely/not/here")).unwrap();
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), "input_access");
    }

    #[test]
    fn test_use_db_requires_db_section() {
        let raw = r#"{ "use_db": true, "paths": { "input": "in", "output": "out" } }"#;
        let config = QosConfig::from_json(raw, Path::new(".")).unwrap();
        assert_eq!(config.validate().unwrap_err().kind(), "config");
    }

    #[test]
    fn test_password_override() {
        let raw = r#"{
            "use_db": true,
            "db": { "host": "db", "database": "qos", "username": "svc", "password": "file" },
            "paths": { "input": "in", "output": "out" }
        }"#;
        let config = QosConfig::from_json(raw, Path::new("."))
            .unwrap()
            .with_password_override(Some("env".into()));

        let db = config.db().unwrap();
        assert_eq!(db.password, "env");
        assert_eq!(db.port, 5432);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_identifier_validation() {
        assert!(validate_identifier("qos").is_ok());
        assert!(validate_identifier("stg.qos_curves").is_ok());
        assert!(validate_identifier("a.b.c").is_err());
        assert!(validate_identifier("qos; DROP TABLE x").is_err());
        assert!(validate_identifier("1table").is_err());
        assert!(validate_identifier("").is_err());
    }
}
