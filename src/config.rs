//! Connection and run settings.
//!
//! Settings come from an optional TOML file and from command-line flags (which
//! may themselves be fed from `SFTPQL_*` environment variables). Flags win over
//! the file. Nothing is hard-coded apart from the defaults below.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// Table name used when the remote file name yields no usable identifier.
pub const FALLBACK_TABLE_NAME: &str = "data";

/// Partially specified settings, as read from a file or the command line.
#[derive(Debug, Default, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(alias = "path")]
    pub remote_path: Option<String>,
    pub timeout_secs: Option<u64>,
    pub table_name: Option<String>,
    pub delimiter: Option<char>,
}

impl ConfigFile {
    /// Load settings from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&content).map_err(|e| match e {
            ConfigError::Invalid { reason, .. } => ConfigError::Read {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    /// Parse settings from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Invalid {
            key: "config",
            reason: e.to_string(),
        })
    }

    /// Overlay `overrides` on top of `self`; any value set in `overrides` wins.
    pub fn merge(self, overrides: ConfigFile) -> ConfigFile {
        ConfigFile {
            host: overrides.host.or(self.host),
            port: overrides.port.or(self.port),
            username: overrides.username.or(self.username),
            password: overrides.password.or(self.password),
            remote_path: overrides.remote_path.or(self.remote_path),
            timeout_secs: overrides.timeout_secs.or(self.timeout_secs),
            table_name: overrides.table_name.or(self.table_name),
            delimiter: overrides.delimiter.or(self.delimiter),
        }
    }

    /// Fail on the first missing key other than the password.
    ///
    /// Lets the caller reject an incomplete configuration before prompting.
    pub fn check_required(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("host", &self.host),
            ("username", &self.username),
            ("remote_path", &self.remote_path),
        ] {
            if !value.as_deref().is_some_and(|v| !v.trim().is_empty()) {
                return Err(ConfigError::Missing(key));
            }
        }
        Ok(())
    }

    /// Validate and fill in defaults.
    pub fn resolve(self) -> Result<Settings, ConfigError> {
        let host = require("host", self.host)?;
        let username = require("username", self.username)?;
        let password = self.password.ok_or(ConfigError::Missing("password"))?;
        let remote_path = require("remote_path", self.remote_path)?;

        let port = self.port.unwrap_or(DEFAULT_PORT);
        if port == 0 {
            return Err(ConfigError::Invalid {
                key: "port",
                reason: "must be between 1 and 65535".to_string(),
            });
        }

        let delimiter = match self.delimiter.unwrap_or(',') {
            c if c.is_ascii() && c != '"' && c != '\n' && c != '\r' => c as u8,
            c => {
                return Err(ConfigError::Invalid {
                    key: "delimiter",
                    reason: format!("{c:?} cannot be used as a field delimiter"),
                })
            }
        };

        let table_name = match self.table_name {
            Some(name) if is_identifier(&name) => name,
            Some(name) => {
                return Err(ConfigError::Invalid {
                    key: "table_name",
                    reason: format!("{name:?} is not a lowercase SQL identifier"),
                })
            }
            None => table_name_for(&remote_path),
        };

        Ok(Settings {
            connection: ConnectionConfig {
                host,
                port,
                username,
                password,
                remote_path,
            },
            timeout: self.timeout_secs.map(Duration::from_secs),
            table_name,
            delimiter,
        })
    }
}

fn require(key: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(key)),
    }
}

/// Everything needed to reach and read the remote file.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub remote_path: String,
}

impl ConnectionConfig {
    /// `host:port` form used in log lines and errors.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("remote_path", &self.remote_path)
            .finish()
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub connection: ConnectionConfig,
    /// Upper bound on connecting and authenticating; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub table_name: String,
    pub delimiter: u8,
}

/// Derive a table name from the remote file stem (`exports/Customers.csv` -> `customers`).
pub fn table_name_for(remote_path: &str) -> String {
    let file = remote_path.rsplit('/').next().unwrap_or(remote_path);
    let stem = match file.rfind('.') {
        Some(idx) if idx > 0 => &file[..idx],
        _ => file,
    };

    let name: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    if is_identifier(&name) {
        name
    } else {
        FALLBACK_TABLE_NAME.to_string()
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
