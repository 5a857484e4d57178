//! # Error Types
//!
//! Custom error types for GNSS Uplink using `thiserror`.

use thiserror::Error;

/// Main error type for GNSS Uplink
#[derive(Debug, Error)]
pub enum UplinkError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(String),

    /// NMEA sentence could not be parsed
    #[error("NMEA parse error: {0}")]
    Nmea(String),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// Result type alias for GNSS Uplink
pub type Result<T> = std::result::Result<T, UplinkError>;

/// Failure of a single HTTP transfer
///
/// None of these are fatal: the caller logs them and the cycle carries on.
#[derive(Debug, Error)]
pub enum TransferError {
    /// DNS, connect, or read failure
    #[error("transport failure: {0}")]
    Transport(String),

    /// TLS certificate validation failed
    #[error("certificate validation failed for {host}: {reason}")]
    Certificate { host: String, reason: String },

    /// Server answered with a non-success status
    #[error("HTTP {status} from {host}")]
    Status { status: u16, host: String },

    /// Response exceeded the configured size cap
    #[error("response exceeded {limit} bytes")]
    ResponseTooLarge { limit: usize },

    /// Response buffer could not grow
    #[error("could not grow response buffer to {requested} bytes")]
    Allocation { requested: usize },

    /// URL could not be parsed
    #[error("invalid URL {0}")]
    InvalidUrl(String),
}

impl TransferError {
    /// Operator guidance for certificate failures
    ///
    /// Empty for every other kind of failure.
    pub fn remediation(&self) -> Vec<String> {
        match self {
            TransferError::Certificate { host, .. } => vec![
                "Make sure the system date is set correctly (e.g. `date -s '2024-07-07'`)".to_string(),
                format!(
                    "Check the validity window of the certificate with: `openssl s_client -connect {}:443 2>/dev/null | openssl x509 -noout -dates`",
                    host
                ),
            ],
            _ => Vec::new(),
        }
    }
}
