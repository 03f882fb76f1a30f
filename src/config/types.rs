//! Configuration types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Platform endpoint configuration
    #[serde(default)]
    pub platform: PlatformConfig,
    /// Presence/heartbeat settings
    #[serde(default)]
    pub presence: PresenceSettings,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            platform: PlatformConfig::default(),
            presence: PresenceSettings::default(),
            settings: AppSettings::default(),
        }
    }
}

/// Platform endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Base URL for the REST API
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// WebSocket URL for the live channel
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Bearer token for authenticated requests (normally injected at runtime)
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            ws_url: default_ws_url(),
            auth_token: None,
        }
    }
}

fn default_api_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_ws_url() -> String {
    "ws://localhost:3001".to_string()
}

/// Presence/heartbeat settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceSettings {
    /// Heartbeat interval in seconds
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    /// Upper bound for geolocation lookups in seconds
    #[serde(default = "default_geo_timeout")]
    pub geo_timeout_seconds: u64,
    /// Where the stable device identifier is persisted
    #[serde(default = "default_device_id_path")]
    pub device_id_path: String,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_seconds: default_heartbeat_interval(),
            geo_timeout_seconds: default_geo_timeout(),
            device_id_path: default_device_id_path(),
        }
    }
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_geo_timeout() -> u64 {
    5
}

fn default_device_id_path() -> String {
    ".wagerhub/device_id".to_string()
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Delay between live-channel reconnection attempts in milliseconds
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Global stake ceiling, applied on top of the balance bound
    #[serde(default = "default_max_stake")]
    pub max_stake: Decimal,
    /// Capacity of the transaction feed buffer
    #[serde(default = "default_feed_size")]
    pub transaction_feed_size: usize,
    /// Capacity of the notification feed buffer
    #[serde(default = "default_feed_size")]
    pub notification_feed_size: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            reconnect_delay_ms: default_reconnect_delay(),
            request_timeout_seconds: default_request_timeout(),
            max_stake: default_max_stake(),
            transaction_feed_size: default_feed_size(),
            notification_feed_size: default_feed_size(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_reconnect_delay() -> u64 {
    3000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_stake() -> Decimal {
    Decimal::from(10_000)
}

fn default_feed_size() -> usize {
    50
}
