//! Configuration management for jsonpoll.
//!
//! Configuration is read from `~/.config/jsonpoll/config.toml`. If the file
//! doesn't exist, a default configuration with comments is created.

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::session::HeaderPolicy;

/// Environment variable consulted when no token is configured.
pub const TOKEN_ENV: &str = "JSONPOLL_TOKEN";

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub http: HttpConfig,
}

/// Settings for the polling session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Base address resource paths are resolved against
    pub base_url: String,

    /// Bearer token sent with every request
    pub token: String,

    /// Interval used when a chain is scheduled without one (default: 60)
    pub default_interval_secs: f64,

    /// Only adopt an ETag when X-RateLimit-Remaining is also present (default: true)
    pub etag_requires_rate_limit: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.github.com/".to_string(),
            token: String::new(),
            default_interval_secs: 60.0,
            etag_requires_rate_limit: true,
        }
    }
}

impl SessionConfig {
    pub fn default_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.default_interval_secs)
            .unwrap_or_else(|_| Duration::from_secs(60))
    }

    pub fn header_policy(&self) -> HeaderPolicy {
        HeaderPolicy {
            etag_requires_rate_limit: self.etag_requires_rate_limit,
        }
    }

    /// The configured token, or `JSONPOLL_TOKEN` when none is configured.
    pub fn resolved_token(&self) -> String {
        if self.token.is_empty() {
            std::env::var(TOKEN_ENV).unwrap_or_default()
        } else {
            self.token.clone()
        }
    }
}

/// Settings for the HTTP transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds (default: 10)
    pub timeout_secs: u64,

    /// User agent string to send
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: concat!("jsonpoll/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/jsonpoll/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("jsonpoll").join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    fn default_config_content() -> String {
        r##"# jsonpoll configuration

[session]
# Base address that resource paths are resolved against
base_url = "https://api.github.com/"

# Bearer token sent as "Authorization: bearer <token>".
# Leave empty to read it from the JSONPOLL_TOKEN environment variable.
token = ""

# Interval in seconds for chains scheduled without an explicit one
default_interval_secs = 60

# Only remember an ETag when the response also carries X-RateLimit-Remaining
etag_requires_rate_limit = true

[http]
# Request timeout in seconds
timeout_secs = 10
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_deserializes() {
        let content = Config::default_config_content();
        let config: Config = toml::from_str(&content).expect("Default config should be valid TOML");

        assert_eq!(config.session.base_url, "https://api.github.com/");
        assert_eq!(config.session.default_interval(), Duration::from_secs(60));
        assert!(config.session.etag_requires_rate_limit);
        assert_eq!(config.http.timeout_secs, 10);
    }

    #[test]
    fn test_partial_config() {
        let content = r##"
[session]
default_interval_secs = 2.5
etag_requires_rate_limit = false
"##;
        let config: Config = toml::from_str(content).expect("Partial config should work");

        assert_eq!(config.session.default_interval(), Duration::from_millis(2500));
        assert!(!config.session.header_policy().etag_requires_rate_limit);
        // Defaults fill the rest
        assert_eq!(config.session.base_url, "https://api.github.com/");
        assert!(config.http.user_agent.starts_with("jsonpoll/"));
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").expect("Empty config should work");
        assert_eq!(config.session.default_interval_secs, 60.0);
        assert_eq!(config.http.timeout_secs, 10);
    }

    #[test]
    fn test_negative_interval_falls_back() {
        let config: Config =
            toml::from_str("[session]\ndefault_interval_secs = -3").expect("parses");
        assert_eq!(config.session.default_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[session]\nbase_url = \"http://localhost:8080/\"\ntoken = \"abc\"\n")
            .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.session.base_url, "http://localhost:8080/");
        assert_eq!(config.session.token, "abc");
    }

    #[test]
    fn test_load_from_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[session\nbroken").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
