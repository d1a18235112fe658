//! Connection settings

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    DEFAULT_AMI_HOST, DEFAULT_AMI_PORT, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_SECRET, DEFAULT_USERNAME,
};

/// Error applying a string override to [`AmiConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Manager connection settings.
///
/// Missing keys take their defaults when deserialized, so a partial
/// document is enough:
///
/// ```
/// use asterisk_ami_tokio::AmiConfig;
///
/// let config: AmiConfig = serde_json::from_str(r#"{"server": "pbx.local:5039"}"#).unwrap();
/// assert_eq!(config.server, "pbx.local:5039");
/// assert_eq!(config.username, "phpagi");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmiConfig {
    /// Host name or address, optionally with `:port`.
    pub server: String,
    /// Port used when `server` carries none.
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing)]
    pub secret: String,
    /// Report protocol diagnostics at `info` instead of `debug`.
    pub write_log: bool,
    pub connect_timeout_ms: u64,
}

impl Default for AmiConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_AMI_HOST.to_string(),
            port: DEFAULT_AMI_PORT,
            username: DEFAULT_USERNAME.to_string(),
            secret: DEFAULT_SECRET.to_string(),
            write_log: false,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

impl AmiConfig {
    /// Set one key from its string form. Keys are matched ignoring case.
    pub fn apply_override(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key
            .to_ascii_lowercase()
            .as_str()
        {
            "server" => self.server = value.to_string(),
            "port" => {
                self.port = value
                    .trim()
                    .parse()
                    .map_err(|_| invalid())?
            }
            "username" => self.username = value.to_string(),
            "secret" => self.secret = value.to_string(),
            "write_log" => self.write_log = parse_flag(value).ok_or_else(invalid)?,
            "connect_timeout_ms" => {
                self.connect_timeout_ms = value
                    .trim()
                    .parse()
                    .map_err(|_| invalid())?
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// Apply every `(key, value)` pair in order.
    pub fn with_overrides<I, K, V>(mut self, overrides: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in overrides {
            self.apply_override(key.as_ref(), value.as_ref())?;
        }
        Ok(self)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value
        .trim()
        .to_ascii_lowercase()
        .as_str()
    {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" | "" => Some(false),
        _ => None,
    }
}
