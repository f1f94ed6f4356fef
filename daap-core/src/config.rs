//! Layered configuration: defaults < config file < environment
//! variables, built on the `config` crate.

use std::path::{Path, PathBuf};

use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub cache: CacheConfig,
    pub zeroconf: ZeroconfConfig,
    pub library: LibraryConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server", &self.server)
            .field("logging", &self.logging)
            .field("cache", &self.cache)
            .field("zeroconf", &self.zeroconf)
            .field("library", &self.library)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub password: Option<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3689,
            name: "Rust DAAP Server".to_string(),
            password: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZeroconfConfig {
    pub enabled: bool,
}

impl Default for ZeroconfConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub root: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Load configuration from an optional file, layered under
    /// environment variables prefixed `DAAP_` (e.g. `DAAP_SERVER_PORT`,
    /// `DAAP_LIBRARY_ROOT`).
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if path.exists() {
                builder = builder.add_source(File::from(path));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("DAAP")
                .separator("_")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration at startup (fail fast on misconfigurations).
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push("server.port must be between 1 and 65535, got 0".to_string());
        }

        if self.cache.enabled && self.cache.ttl_seconds == 0 {
            errors.push("cache.ttl_seconds must be greater than 0 when cache.enabled is true".to_string());
        }

        if !self.library.root.is_dir() {
            errors.push(format!(
                "library.root '{}' does not exist or is not a directory",
                self.library.root.display()
            ));
        }

        if let Some(password) = &self.server.password {
            if password.is_empty() {
                errors.push(
                    "server.password is set but empty; omit it entirely for no auth".to_string(),
                );
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_once_library_root_exists() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.library.root = dir.path().to_path_buf();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_port_and_missing_library_root_are_rejected() {
        let mut config = Config::default();
        config.server.port = 0;
        config.library.root = PathBuf::from("/does/not/exist/daap-test");
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn empty_password_is_rejected_but_absent_password_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.library.root = dir.path().to_path_buf();
        config.server.password = Some(String::new());
        assert_eq!(config.validate().unwrap_err().len(), 1);

        config.server.password = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn cache_ttl_zero_is_only_rejected_when_cache_is_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.library.root = dir.path().to_path_buf();
        config.cache.ttl_seconds = 0;
        config.cache.enabled = false;
        assert!(config.validate().is_ok());

        config.cache.enabled = true;
        assert!(config.validate().is_err());
    }
}
