//! Configuration management for kubeconfig-relay
//!
//! Settings are resolved once at startup, in increasing priority:
//! 1. Default values
//! 2. Configuration file (TOML format)
//! 3. Environment variables
//! 4. Command-line flags
//!
//! The resulting [`RelayConfig`] is immutable and shared with the sync loop.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Path to a kubeconfig file; in-cluster credentials are used when unset
    pub kubeconfig: Option<PathBuf>,
    /// Docker host address, also written into mutated kubeconfigs
    pub host: String,
    /// Namespace watched for kubeconfig secrets
    pub namespace: String,
    /// Suffix appended to the cluster name for the derived secret
    pub suffix: String,
    /// Disable TLS verification in mutated kubeconfigs
    pub disable_tls_verify: bool,
    /// Docker Engine API port on `host`
    pub docker_port: u16,
    /// Deadline for every Docker and Kubernetes call, in seconds
    pub call_timeout_secs: u64,
    /// Capacity of the channel between the watch and the sync loop
    pub event_buffer: usize,
    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Directory for rolling JSON log files; console only when unset
    pub log_dir: Option<PathBuf>,
    /// Use JSON formatting on the console as well
    pub json: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            host: String::new(),
            namespace: String::new(),
            suffix: String::new(),
            disable_tls_verify: true,
            docker_port: 2375,
            call_timeout_secs: 10,
            event_buffer: 64,
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            json: false,
        }
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub kubeconfig: Option<PathBuf>,
    pub host: Option<String>,
    pub namespace: Option<String>,
    pub suffix: Option<String>,
    pub disable_tls_verify: Option<bool>,
    pub docker_port: Option<u16>,
    pub call_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
}

impl RelayConfig {
    /// Load configuration from file, environment and command line
    pub fn load(
        config_path: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let mut config = match config_path.map(Path::to_path_buf).or_else(Self::find_config_file) {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.apply_overrides(overrides);

        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_path_buf(), e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            std::env::var("KCRELAY_CONFIG").ok().map(PathBuf::from),
            Some(PathBuf::from("/etc/kubeconfig-relay/config.toml")),
            Some(PathBuf::from("./kubeconfig-relay.toml")),
        ];

        paths.into_iter().flatten().find(|p| p.exists())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply `KCRELAY_*` overrides read through `lookup`
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("KCRELAY_KUBECONFIG") {
            self.kubeconfig = Some(PathBuf::from(path));
        }
        if let Some(host) = lookup("KCRELAY_HOST") {
            self.host = host;
        }
        if let Some(namespace) = lookup("KCRELAY_NAMESPACE") {
            self.namespace = namespace;
        }
        if let Some(suffix) = lookup("KCRELAY_SUFFIX") {
            self.suffix = suffix;
        }
        if let Some(disable) = lookup("KCRELAY_DISABLE_TLS_VERIFY") {
            if let Ok(disable) = disable.parse() {
                self.disable_tls_verify = disable;
            }
        }
        if let Some(port) = lookup("KCRELAY_DOCKER_PORT") {
            if let Ok(port) = port.parse() {
                self.docker_port = port;
            }
        }
        if let Some(secs) = lookup("KCRELAY_CALL_TIMEOUT") {
            if let Ok(secs) = secs.parse() {
                self.call_timeout_secs = secs;
            }
        }
        if let Some(buffer) = lookup("KCRELAY_EVENT_BUFFER") {
            if let Ok(buffer) = buffer.parse() {
                self.event_buffer = buffer;
            }
        }

        // Logging
        if let Some(level) = lookup("KCRELAY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(dir) = lookup("KCRELAY_LOG_DIR") {
            self.logging.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(json) = lookup("KCRELAY_LOG_JSON") {
            if let Ok(json) = json.parse() {
                self.logging.json = json;
            }
        }
    }

    /// Apply command-line values, which win over everything else
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(path) = &overrides.kubeconfig {
            self.kubeconfig = Some(path.clone());
        }
        if let Some(host) = &overrides.host {
            self.host = host.clone();
        }
        if let Some(namespace) = &overrides.namespace {
            self.namespace = namespace.clone();
        }
        if let Some(suffix) = &overrides.suffix {
            self.suffix = suffix.clone();
        }
        if let Some(disable) = overrides.disable_tls_verify {
            self.disable_tls_verify = disable;
        }
        if let Some(port) = overrides.docker_port {
            self.docker_port = port;
        }
        if let Some(secs) = overrides.call_timeout_secs {
            self.call_timeout_secs = secs;
        }
        if let Some(level) = &overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = Self {
            host: "203.0.113.5".to_string(),
            namespace: "clusters".to_string(),
            suffix: "-internal".to_string(),
            ..Self::default()
        };
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::Validation("Docker host cannot be empty".to_string()));
        }
        if self.namespace.is_empty() {
            return Err(ConfigError::Validation("Namespace cannot be empty".to_string()));
        }
        // An empty suffix would make the derived secret collide with the cluster name
        if self.suffix.is_empty() {
            return Err(ConfigError::Validation("Suffix cannot be empty".to_string()));
        }
        if self.docker_port == 0 {
            return Err(ConfigError::Validation("Docker port cannot be 0".to_string()));
        }
        if self.call_timeout_secs == 0 {
            return Err(ConfigError::Validation("Call timeout cannot be 0".to_string()));
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::Validation("Event buffer cannot be 0".to_string()));
        }

        Ok(())
    }

    /// Docker Engine endpoint derived from host and port
    pub fn docker_endpoint(&self) -> String {
        format!("tcp://{}:{}", self.host, self.docker_port)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// Configuration errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Failed to read configuration file
    FileRead(PathBuf, String),
    /// Failed to parse configuration
    Parse(String),
    /// Configuration validation failed
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, err) => {
                write!(f, "Failed to read config file {:?}: {}", path, err)
            }
            ConfigError::Parse(err) => write!(f, "Failed to parse config: {}", err),
            ConfigError::Validation(err) => write!(f, "Config validation failed: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}
