// Application configuration from defaults, TOML files and the environment

use crate::logging::{LogConfig, LogFormat, LogLevel};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Prefix of the environment variables read by [`AppConfig::from_env`].
pub const ENV_PREFIX: &str = "MABS";

/// Top-level application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub debug: bool,
    pub log: LogSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: LogLevel,
    pub format: LogFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "mabs".to_string(),
            debug: false,
            log: LogSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("TOML parse error: {}", e)))
    }

    /// Load a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Defaults overridden by `MABS_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load `.env` (when present) and then read the environment.
    pub fn from_dotenv() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Override fields from `MABS_*` variables.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| env::var(format!("{}_{}", ENV_PREFIX, key)).ok())
    }

    fn apply_vars<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("NAME") {
            self.name = name;
        }
        if let Some(debug) = lookup("DEBUG") {
            self.debug = parse_bool(&debug);
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log.level = LogLevel::from_str(&level)
                .ok_or_else(|| Error::Config(format!("unknown log level '{}'", level)))?;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.log.format = LogFormat::from_str(&format)
                .ok_or_else(|| Error::Config(format!("unknown log format '{}'", format)))?;
        }
        if let Some(host) = lookup("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SERVER_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("invalid port '{}'", port)))?;
        }
        Ok(())
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Logging setup for this configuration; debug mode lowers the level to DEBUG.
    pub fn log_config(&self) -> LogConfig {
        let level = if self.debug && self.log.level == LogLevel::Info {
            LogLevel::Debug
        } else {
            self.log.level
        };
        LogConfig::new().level(level).format(self.log.format)
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
