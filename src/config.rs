use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{EdgeError, EdgeResult};

/// Upper bound on origin attempts per request
pub const MAX_ORIGIN_RETRIES: u32 = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub rewrite: RewriteConfig,

    #[serde(default)]
    pub origin: OriginConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Prefix-strip rule settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Leading segment to strip; its trailing slash is kept in the rewritten path
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Substituted when stripping leaves only the root
    #[serde(default = "default_fallback_path")]
    pub fallback_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginConfig {
    #[serde(default = "default_origin_url")]
    pub url: String,

    #[serde(default)]
    pub host_header: Option<String>,

    #[serde(default = "default_origin_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json_format: bool,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024 // 10MB
}

fn default_true() -> bool {
    true
}

fn default_prefix() -> String {
    "/api/".to_string()
}

fn default_fallback_path() -> String {
    "/health".to_string()
}

fn default_origin_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_origin_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: default_prefix(),
            fallback_path: default_fallback_path(),
        }
    }
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            url: default_origin_url(),
            host_header: None,
            timeout_secs: default_origin_timeout(),
            max_retries: default_max_retries(),
            headers: HashMap::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> EdgeResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EdgeError::ConfigError(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> EdgeResult<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| EdgeError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EdgeResult<()> {
        self.rewrite.validate()?;

        let origin = url::Url::parse(&self.origin.url).map_err(|e| {
            EdgeError::ConfigError(format!("Invalid origin url '{}': {}", self.origin.url, e))
        })?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(EdgeError::ConfigError(format!(
                "Origin url must be http or https, got '{}'",
                origin.scheme()
            )));
        }

        if self.origin.max_retries == 0 || self.origin.max_retries > MAX_ORIGIN_RETRIES {
            return Err(EdgeError::ConfigError(format!(
                "origin.max_retries must be between 1 and {}, got {}",
                MAX_ORIGIN_RETRIES, self.origin.max_retries
            )));
        }

        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl RewriteConfig {
    pub fn validate(&self) -> EdgeResult<()> {
        if self.prefix.len() < 2 || !self.prefix.starts_with('/') || !self.prefix.ends_with('/') {
            return Err(EdgeError::ConfigError(format!(
                "rewrite.prefix must start and end with '/' and name a segment, got '{}'",
                self.prefix
            )));
        }

        if !self.fallback_path.starts_with('/') {
            return Err(EdgeError::ConfigError(format!(
                "rewrite.fallback_path must be absolute, got '{}'",
                self.fallback_path
            )));
        }

        Ok(())
    }
}

impl OriginConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
