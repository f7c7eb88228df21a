//! Sync configuration.
//!
//! Two sources, both read once at process start and then passed down as plain
//! values:
//! - a TOML file naming the ticker, the `{table = interval}` map, the storage
//!   backend and the quote source;
//! - database credentials from the environment (`DB_HOST`, `DB_PORT`,
//!   `DB_USER`, `DB_PASSWORD`, `DB_NAME`), required for the Postgres backend.

use crate::domain::{Interval, InvalidTableName, TableName};
use crate::sync::SyncJob;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_HOST: &str = "DB_HOST";
pub const ENV_PORT: &str = "DB_PORT";
pub const ENV_USER: &str = "DB_USER";
pub const ENV_PASSWORD: &str = "DB_PASSWORD";
pub const ENV_NAME: &str = "DB_NAME";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {name}: '{value}'")]
    InvalidVar { name: &'static str, value: String },

    #[error("read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    InvalidTable(#[from] InvalidTableName),

    #[error("ticker must not be empty")]
    EmptyTicker,

    #[error("no tables configured")]
    NoTables,

    #[error("{0} is required for this configuration")]
    MissingSetting(&'static str),
}

/// Storage backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Postgres,
    Sqlite,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub backend: Backend,
    /// SQLite database file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Quote source selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Yahoo,
    Csv,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSettings {
    #[serde(default)]
    pub kind: SourceKind,
    /// Directory of CSV exports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// The complete sync configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub ticker: String,
    pub tables: BTreeMap<String, Interval>,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub source: SourceSettings,
}

impl SyncConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// CAC 40 daily bars into `cac` on Postgres, fetched from Yahoo Finance.
    pub fn default_cac() -> Self {
        let mut tables = BTreeMap::new();
        tables.insert("cac".to_string(), Interval::Daily);
        Self {
            ticker: "^FCHI".to_string(),
            tables,
            database: DatabaseSettings::default(),
            source: SourceSettings::default(),
        }
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.ticker.trim().is_empty() {
            return Err(ConfigError::EmptyTicker);
        }
        if self.tables.is_empty() {
            return Err(ConfigError::NoTables);
        }
        for name in self.tables.keys() {
            TableName::new(name.as_str())?;
        }
        if self.source.kind == SourceKind::Csv && self.source.dir.is_none() {
            return Err(ConfigError::MissingSetting("source.dir"));
        }
        Ok(())
    }

    /// One job per configured table, in table-name order.
    pub fn jobs(&self) -> Result<Vec<SyncJob>, ConfigError> {
        self.tables
            .iter()
            .map(|(name, interval)| {
                Ok(SyncJob {
                    ticker: self.ticker.clone(),
                    table: TableName::new(name.as_str())?,
                    interval: interval.clone(),
                })
            })
            .collect()
    }

    /// Resolve the storage target. Credentials are only consulted for the
    /// Postgres backend.
    pub fn storage_target<F>(&self, lookup: F) -> Result<StorageTarget, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match self.database.backend {
            Backend::Postgres => Ok(StorageTarget::Postgres(DatabaseConfig::from_lookup(
                lookup,
            )?)),
            Backend::Sqlite => self
                .database
                .path
                .clone()
                .map(StorageTarget::Sqlite)
                .ok_or(ConfigError::MissingSetting("database.path")),
        }
    }
}

/// Database connection credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
}

impl DatabaseConfig {
    /// Read credentials through `lookup`. Every variable must be present and
    /// non-empty; the port must be a valid TCP port.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &'static str| -> Result<String, ConfigError> {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingVar(name))
        };

        let host = require(ENV_HOST)?;
        let port_raw = require(ENV_PORT)?;
        let user = require(ENV_USER)?;
        let password = require(ENV_PASSWORD)?;
        let dbname = require(ENV_NAME)?;

        let port = port_raw.parse::<u16>().map_err(|_| ConfigError::InvalidVar {
            name: ENV_PORT,
            value: port_raw.clone(),
        })?;

        Ok(Self {
            host,
            port,
            user,
            password,
            dbname,
        })
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("dbname", &self.dbname)
            .finish()
    }
}

/// Where bars are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageTarget {
    Postgres(DatabaseConfig),
    Sqlite(PathBuf),
}

impl fmt::Display for StorageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres(db) => write!(
                f,
                "postgres://{}@{}:{}/{}",
                db.user, db.host, db.port, db.dbname
            ),
            Self::Sqlite(path) => write!(f, "sqlite:{}", path.display()),
        }
    }
}
