//! Configuration types for the intake server

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IntakeConfig {
    /// Global server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Management API settings
    #[serde(default)]
    pub management: ManagementConfig,

    /// Submission endpoint settings
    #[serde(default)]
    pub submission: SubmissionConfig,

    /// Object store sink
    #[serde(default)]
    pub storage: StorageConfig,

    /// Record stream sink
    #[serde(default)]
    pub forward: ForwardConfig,

    /// Postal district mapping
    #[serde(default)]
    pub postcodes: PostcodeConfig,
}

/// Server listening configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable access logging
    #[serde(default = "default_true")]
    pub access_log: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            access_log: true,
        }
    }
}

/// Management API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagementConfig {
    /// Enable management API
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// WebSocket address for management connections
    #[serde(default = "default_management_address")]
    pub address: String,

    /// Management port
    #[serde(default = "default_management_port")]
    pub port: u16,
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: default_management_address(),
            port: default_management_port(),
        }
    }
}

/// Submission endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// Path accepting `POST` submissions
    #[serde(default = "default_submission_path")]
    pub path: String,

    /// Reject every request with 503 while set
    #[serde(default)]
    pub maintenance_mode: bool,

    /// Accepted bearer tokens (empty = any bearer token)
    #[serde(default)]
    pub bearer_tokens: Vec<String>,

    /// Largest accepted request body in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            path: default_submission_path(),
            maintenance_mode: false,
            bearer_tokens: Vec::new(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Object store sink configuration
///
/// Records land in `<root>/<bucket>/<object key>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_storage_root")]
    pub root: String,

    #[serde(default = "default_bucket")]
    pub bucket: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root: default_storage_root(),
            bucket: default_bucket(),
        }
    }
}

/// Record stream sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardConfig {
    #[serde(default)]
    pub enabled: bool,

    /// HTTP endpoint receiving one JSON record per request
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Sent as `X-Stream-Name`
    #[serde(default = "default_stream_name")]
    pub stream_name: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            stream_name: default_stream_name(),
            timeout: default_timeout(),
        }
    }
}

/// Postal district mapping configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PostcodeConfig {
    /// TOML mapping file; districts pass through unchanged when unset
    #[serde(default)]
    pub mapping_file: Option<String>,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_management_address() -> String {
    "127.0.0.1".to_string()
}

fn default_management_port() -> u16 {
    9090
}

fn default_true() -> bool {
    true
}

fn default_submission_path() -> String {
    "/submission/mobile-analytics".to_string()
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

fn default_storage_root() -> String {
    "analytics-store".to_string()
}

fn default_bucket() -> String {
    "analytics-submissions".to_string()
}

fn default_stream_name() -> String {
    "analytics".to_string()
}

fn default_timeout() -> u64 {
    10
}

impl IntakeConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = self.to_toml()?;
        std::fs::write(path.as_ref(), content)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Convert to TOML string
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// Check settings that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError("Server port cannot be 0".into()));
        }

        if self.management.enabled && self.management.port == 0 {
            return Err(ConfigError::ValidationError("Management port cannot be 0".into()));
        }

        if !self.submission.path.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "Submission path '{}' must start with '/'",
                self.submission.path
            )));
        }

        if self.submission.max_body_bytes == 0 {
            return Err(ConfigError::ValidationError("max_body_bytes cannot be 0".into()));
        }

        if self.forward.enabled && self.forward.endpoint.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::ValidationError(
                "Forwarding is enabled but no endpoint is configured".into(),
            ));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IntakeConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert!(config.management.enabled);
        assert_eq!(config.submission.path, "/submission/mobile-analytics");
        assert!(!config.submission.maintenance_mode);
        assert!(config.storage.enabled);
        assert!(!config.forward.enabled);
        assert!(config.postcodes.mapping_file.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
bind_address = "127.0.0.1"
port = 3000

[submission]
bearer_tokens = ["token-a", "token-b"]
max_body_bytes = 4096

[storage]
root = "/var/lib/intake"
bucket = "some-bucket-name"

[forward]
enabled = true
endpoint = "http://127.0.0.1:4000/records"
stream_name = "firehoseStreamName"

[postcodes]
mapping_file = "districts.toml"
"#;

        let config = IntakeConfig::from_toml(toml).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert_eq!(config.submission.bearer_tokens.len(), 2);
        assert_eq!(config.submission.max_body_bytes, 4096);
        assert_eq!(config.storage.bucket, "some-bucket-name");
        assert_eq!(config.forward.stream_name, "firehoseStreamName");
        assert_eq!(config.forward.timeout, 10);
        assert_eq!(config.postcodes.mapping_file.as_deref(), Some("districts.toml"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut config = IntakeConfig::default();
        config.forward.enabled = true;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let mut config = IntakeConfig::default();
        config.submission.path = "submission".to_string();
        assert!(config.validate().is_err());

        let mut config = IntakeConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intake.toml");

        let mut config = IntakeConfig::default();
        config.submission.maintenance_mode = true;
        config.save(&path).unwrap();

        let loaded = IntakeConfig::load(&path).unwrap();
        assert!(loaded.submission.maintenance_mode);
        assert_eq!(loaded.storage.bucket, config.storage.bucket);
    }
}
