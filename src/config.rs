//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, UplinkError};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub gnss: GnssConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Telemetry endpoint configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_host")]
    pub host: String,

    /// Write API key of the channel; has no default
    pub api_key: String,

    #[serde(default = "default_probe_url")]
    pub probe_url: String,

    #[serde(default = "default_scheme")]
    pub scheme: String,
}

/// What a connection timeout does to the pending request
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutPolicy {
    /// Release the pending request and return the session to idle
    #[default]
    Authoritative,
    /// Only log; a late connection is still used for the upload
    Observational,
}

/// Cycle and timeout timing
#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_cycle_interval_s")]
    pub cycle_interval_s: u64,

    #[serde(default = "default_repeating")]
    pub repeating: bool,

    #[serde(default = "default_connection_timeout_s")]
    pub connection_timeout_s: u64,

    #[serde(default)]
    pub timeout_policy: TimeoutPolicy,
}

/// HTTP transfer configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_request_timeout_s")]
    pub request_timeout_s: u64,

    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Data link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_interface")]
    pub interface: String,

    #[serde(default = "default_telemetry_host")]
    pub check_host: String,

    #[serde(default = "default_check_port")]
    pub check_port: u16,
}

/// GNSS receiver configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GnssConfig {
    #[serde(default = "default_gnss_port")]
    pub port: String,

    #[serde(default = "default_gnss_baud_rate")]
    pub baud_rate: u32,

    /// Sentence body (without `$` and checksum) written on forced refresh
    #[serde(default = "default_restart_sentence")]
    pub restart_sentence: String,

    /// Wait before subscribing again after the receiver goes away
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for rolling log files; empty logs to stdout only
    #[serde(default)]
    pub directory: String,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

// Default value functions
fn default_telemetry_host() -> String { "api.thingspeak.com".to_string() }
fn default_probe_url() -> String { "http://httpbin.org/get".to_string() }
fn default_scheme() -> String { "https".to_string() }

fn default_cycle_interval_s() -> u64 { 30 }
fn default_repeating() -> bool { true }
fn default_connection_timeout_s() -> u64 { 10 }

fn default_request_timeout_s() -> u64 { 20 }
fn default_max_response_bytes() -> usize { 64 * 1024 }
fn default_user_agent() -> String { format!("gnss-uplink/{}", env!("CARGO_PKG_VERSION")) }

fn default_interface() -> String { "wwan0".to_string() }
fn default_check_port() -> u16 { 443 }

fn default_gnss_port() -> String { "/dev/ttyUSB1".to_string() }
fn default_gnss_baud_rate() -> u32 { 9600 }
fn default_restart_sentence() -> String { "PMTK101".to_string() }
fn default_reconnect_interval_ms() -> u64 { 1000 }

fn default_log_level() -> String { "info".to_string() }
fn default_file_prefix() -> String { "gnss-uplink.log".to_string() }

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cycle_interval_s: default_cycle_interval_s(),
            repeating: default_repeating(),
            connection_timeout_s: default_connection_timeout_s(),
            timeout_policy: TimeoutPolicy::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_s: default_request_timeout_s(),
            max_response_bytes: default_max_response_bytes(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            check_host: default_telemetry_host(),
            check_port: default_check_port(),
        }
    }
}

impl Default for GnssConfig {
    fn default() -> Self {
        Self {
            port: default_gnss_port(),
            baud_rate: default_gnss_baud_rate(),
            restart_sentence: default_restart_sentence(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
            file_prefix: default_file_prefix(),
        }
    }
}

impl ScheduleConfig {
    /// Period of the cycle timer
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_s)
    }

    /// Guard duration of the connection timeout timer
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_s)
    }
}

impl GnssConfig {
    /// Back-off between receiver subscriptions
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}

/// Shorthand for a validation failure
fn invalid(msg: impl std::fmt::Display) -> UplinkError {
    UplinkError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use gnss_uplink::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        // Telemetry endpoint
        if self.telemetry.host.is_empty() {
            return Err(invalid("telemetry host cannot be empty"));
        }

        if self.telemetry.host.contains('/') {
            return Err(invalid("telemetry host must not contain a path"));
        }

        if self.telemetry.api_key.is_empty() {
            return Err(invalid("telemetry api_key cannot be empty"));
        }

        if self.telemetry.probe_url.is_empty() {
            return Err(invalid("telemetry probe_url cannot be empty"));
        }

        if !["http", "https"].contains(&self.telemetry.scheme.as_str()) {
            return Err(invalid("telemetry scheme must be 'http' or 'https'"));
        }

        // Timing
        if self.schedule.cycle_interval_s == 0 || self.schedule.cycle_interval_s > 86_400 {
            return Err(invalid("cycle_interval_s must be between 1 and 86400"));
        }

        if self.schedule.connection_timeout_s == 0 {
            return Err(invalid("connection_timeout_s must be greater than 0"));
        }

        if self.schedule.connection_timeout_s >= self.schedule.cycle_interval_s {
            return Err(invalid("connection_timeout_s must be shorter than cycle_interval_s"));
        }

        if self.http.request_timeout_s == 0 || self.http.request_timeout_s > 300 {
            return Err(invalid("request_timeout_s must be between 1 and 300"));
        }

        if self.http.max_response_bytes == 0 || self.http.max_response_bytes > 16 * 1024 * 1024 {
            return Err(invalid("max_response_bytes must be between 1 and 16777216"));
        }

        // Link
        if self.link.check_host.is_empty() {
            return Err(invalid("link check_host cannot be empty"));
        }

        if self.link.check_port == 0 {
            return Err(invalid("link check_port must be greater than 0"));
        }

        // GNSS receiver
        if self.gnss.port.is_empty() {
            return Err(invalid("gnss port cannot be empty"));
        }

        if ![4800, 9600, 19200, 38400, 57600, 115200].contains(&self.gnss.baud_rate) {
            return Err(invalid("gnss baud_rate must be one of: 4800, 9600, 19200, 38400, 57600, 115200"));
        }

        if self.gnss.restart_sentence.contains(['$', '*']) {
            return Err(invalid("gnss restart_sentence must not include '$' or a checksum"));
        }

        if self.gnss.reconnect_interval_ms == 0 || self.gnss.reconnect_interval_ms > 60000 {
            return Err(invalid("gnss reconnect_interval_ms must be between 1 and 60000"));
        }

        // Logging
        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("logging level must be one of: trace, debug, info, warn, error"));
        }

        if !self.logging.directory.is_empty() && self.logging.file_prefix.is_empty() {
            return Err(invalid("logging file_prefix cannot be empty when directory is set"));
        }

        Ok(())
    }
}
