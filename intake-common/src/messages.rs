//! Management API messages

use crate::config::IntakeConfig;
use serde::{Deserialize, Serialize};

/// Messages sent from an operator client to the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    /// Request current server status
    GetStatus,

    /// Request current configuration
    GetConfig,

    /// Get submission statistics
    GetStats,

    /// Reload configuration and postal district mapping from file
    ReloadConfig,

    /// Toggle maintenance mode without touching the config file
    SetMaintenanceMode(bool),
}

/// Messages sent from server to an operator client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    /// Server status response
    Status(ServerStatus),

    /// Current configuration
    Config(IntakeConfig),

    /// Submission statistics
    Stats(ServerStats),

    /// Operation success
    Success(String),

    /// Operation error
    Error(String),
}

/// Server status information
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerStatus {
    pub running: bool,

    pub uptime_secs: u64,

    pub maintenance_mode: bool,

    pub storage_enabled: bool,

    pub forward_enabled: bool,

    /// Known postal districts, `None` when no mapping is loaded
    pub mapped_districts: Option<usize>,

    pub version: String,

    pub listen_address: String,

    pub submission_path: String,
}

/// Submission statistics
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerStats {
    /// Total requests handled
    pub total_requests: u64,

    /// Total request body bytes received
    pub bytes_received: u64,

    /// Submissions stored
    pub accepted: u64,

    /// Rejected requests by reason
    pub rejected: RejectionStats,

    /// Submissions that parsed but could not be persisted
    pub sink_failures: u64,

    /// Requests per second (average)
    pub requests_per_second: f64,

    /// Response status code counts
    pub status_codes: StatusCodeStats,
}

/// Rejection counts
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RejectionStats {
    pub bad_request: u64,
    pub unauthorized: u64,
    pub not_found: u64,
    pub method_not_allowed: u64,
    pub payload_too_large: u64,
    pub maintenance: u64,
}

/// HTTP status code statistics
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct StatusCodeStats {
    /// 2xx responses
    pub success: u64,
    /// 3xx responses
    pub redirect: u64,
    /// 4xx responses
    pub client_error: u64,
    /// 5xx responses
    pub server_error: u64,
}
