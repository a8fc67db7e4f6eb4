//! Server configuration.

use crate::ConfigError;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Configuration for the game server.
///
/// Sources, lowest precedence first: defaults, an optional TOML file, the
/// `PORT` environment variable, then command-line flags.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    host: String,

    /// Port to bind to.
    #[serde(default = "default_port")]
    port: u16,

    /// Directory of static client files served for paths other than `/ws`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    static_dir: Option<PathBuf>,

    /// Seconds a finished session stays in the registry before eviction.
    #[serde(default = "default_eviction_grace_secs")]
    eviction_grace_secs: u64,

    /// Seconds between eviction passes.
    #[serde(default = "default_reap_interval_secs")]
    reap_interval_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_eviction_grace_secs() -> u64 {
    30
}

fn default_reap_interval_secs() -> u64 {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
            eviction_grace_secs: default_eviction_grace_secs(),
            reap_interval_secs: default_reap_interval_secs(),
        }
    }
}

impl ServerConfig {
    /// Loads defaults, then `path` if given, then the `PORT` variable.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed, or `PORT` is not a port.
    #[instrument]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_port_var(std::env::var("PORT").ok().as_deref())
    }

    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config = Self::from_toml(&content)?;
        info!(host = %config.host, port = config.port, "Config loaded successfully");
        Ok(config)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::new(format!("Failed to render config: {}", e)))
    }

    /// Applies a `PORT` environment value, if set.
    pub fn with_port_var(mut self, value: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(value) = value {
            self.port = value
                .trim()
                .parse()
                .map_err(|e| ConfigError::new(format!("Invalid PORT {:?}: {}", value, e)))?;
        }
        Ok(self)
    }

    /// Applies command-line overrides.
    pub fn with_overrides(
        mut self,
        host: Option<String>,
        port: Option<u16>,
        static_dir: Option<PathBuf>,
    ) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        if static_dir.is_some() {
            self.static_dir = static_dir;
        }
        self
    }

    /// Checks values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reap_interval_secs == 0 {
            return Err(ConfigError::new("reap_interval_secs must be at least 1"));
        }
        if let Some(dir) = &self.static_dir
            && !dir.is_dir()
        {
            return Err(ConfigError::new(format!(
                "static_dir {} is not a directory",
                dir.display()
            )));
        }
        Ok(())
    }

    /// How long finished sessions are kept.
    pub fn eviction_grace(&self) -> Duration {
        Duration::from_secs(self.eviction_grace_secs)
    }

    /// Time between eviction passes.
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}
