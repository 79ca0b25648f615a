/*
 * aurtree - Pure-AUR dependency resolver for a personal Arch Linux repository.
 * Copyright (C) 2025  aurtree contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Configuration management with validation and defaults.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::{AurtreeError, AurtreeResult};

/// Main configuration structure for aurtree
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP settings shared by both registry clients
    pub network: NetworkConfig,

    /// AUR RPC settings
    pub aur: AurConfig,

    /// Official repository search settings
    pub official: OfficialConfig,

    /// Resolver limits
    pub resolver: ResolverConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            aur: AurConfig::default(),
            official: OfficialConfig::default(),
            resolver: ResolverConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,

    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// User-Agent header sent to both registries
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: concat!("aurtree/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// AUR-specific configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AurConfig {
    /// AUR RPC base URL
    pub rpc_url: String,
}

impl Default for AurConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://aur.archlinux.org/rpc/".to_string(),
        }
    }
}

/// Official repository configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OfficialConfig {
    /// Package search endpoint of archlinux.org
    pub search_url: String,
}

impl Default for OfficialConfig {
    fn default() -> Self {
        Self {
            search_url: "https://archlinux.org/packages/search/json/".to_string(),
        }
    }
}

/// Resolver configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Longest dependency chain followed below the root
    pub max_depth: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (empty = no file logging)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with precedence:
    /// 1. /etc/aurtree/aurtree.toml (system-wide)
    /// 2. ~/.config/aurtree/config.toml (user)
    /// 3. Environment variables (AURTREE_*)
    pub fn load() -> Self {
        let mut config = Config::default();

        if let Some(parsed) = Self::read(Path::new("/etc/aurtree/aurtree.toml")) {
            config = config.merge(parsed);
        }

        if let Some(config_dir) = dirs::config_dir() {
            if let Some(parsed) = Self::read(&config_dir.join("aurtree").join("config.toml")) {
                config = config.merge(parsed);
            }
        }

        config.apply_env_overrides()
    }

    fn read(path: &Path) -> Option<Config> {
        let content = fs::read_to_string(path).ok()?;
        match toml::from_str::<Config>(&content) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("ignoring invalid config {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Merge another config into this one (other takes precedence for non-default values)
    fn merge(mut self, other: Config) -> Self {
        let default = Config::default();

        if other.network.timeout_secs != default.network.timeout_secs {
            self.network.timeout_secs = other.network.timeout_secs;
        }
        if other.network.connect_timeout_secs != default.network.connect_timeout_secs {
            self.network.connect_timeout_secs = other.network.connect_timeout_secs;
        }
        if other.network.user_agent != default.network.user_agent {
            self.network.user_agent = other.network.user_agent;
        }
        if other.aur != default.aur {
            self.aur = other.aur;
        }
        if other.official != default.official {
            self.official = other.official;
        }
        if other.resolver != default.resolver {
            self.resolver = other.resolver;
        }
        if other.logging.level != default.logging.level {
            self.logging.level = other.logging.level;
        }
        if other.logging.file.is_some() {
            self.logging.file = other.logging.file;
        }

        self
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("AURTREE_AUR_URL") {
            self.aur.rpc_url = val;
        }

        if let Ok(val) = std::env::var("AURTREE_OFFICIAL_URL") {
            self.official.search_url = val;
        }

        if let Ok(val) = std::env::var("AURTREE_TIMEOUT") {
            if let Ok(n) = val.parse() {
                self.network.timeout_secs = n;
            }
        }

        if let Ok(val) = std::env::var("AURTREE_MAX_DEPTH") {
            if let Ok(n) = val.parse() {
                self.resolver.max_depth = n;
            }
        }

        if let Ok(val) = std::env::var("AURTREE_LOG_LEVEL") {
            self.logging.level = val;
        }

        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> AurtreeResult<()> {
        for (key, value) in [
            ("aur.rpc_url", &self.aur.rpc_url),
            ("official.search_url", &self.official.search_url),
        ] {
            Url::parse(value).map_err(|e| AurtreeError::ConfigError {
                message: format!("{} is not a valid URL ({}): {}", key, value, e),
            })?;
        }
        if self.network.timeout_secs == 0 || self.network.connect_timeout_secs == 0 {
            return Err(AurtreeError::ConfigError {
                message: "network timeouts must be at least 1 second".to_string(),
            });
        }
        if self.resolver.max_depth == 0 {
            return Err(AurtreeError::ConfigError {
                message: "resolver.max_depth must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.timeout_secs, 30);
        assert_eq!(config.resolver.max_depth, 64);
        assert_eq!(config.aur.rpc_url, "https://aur.archlinux.org/rpc/");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.resolver.max_depth = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.network.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.official.search_url = "not a url".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("official.search_url"));
    }

    #[test]
    fn test_partial_toml_merges_over_defaults() {
        let parsed: Config = toml::from_str(
            "[resolver]\nmax_depth = 8\n\n[aur]\nrpc_url = \"http://localhost:8080/rpc/\"\n",
        )
        .unwrap();
        let config = Config::default().merge(parsed);

        assert_eq!(config.resolver.max_depth, 8);
        assert_eq!(config.aur.rpc_url, "http://localhost:8080/rpc/");
        assert_eq!(config.network.timeout_secs, 30);
        assert_eq!(config.logging.level, "info");
    }
}
