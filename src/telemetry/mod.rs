//! # Telemetry Module
//!
//! Encodes the latest fix as a telemetry update and runs the two-step
//! exchange performed on every established connection.
//!
//! This module handles:
//! - Building the update URL (`field1` longitude, `field2` latitude,
//!   `field3` time of day)
//! - The diagnostic probe, whose failure never prevents the upload
//! - Interpreting the collector's reply to the update

use bytes::Bytes;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::config::TelemetryConfig;
use crate::error::TransferError;
use crate::gnss::LatestFix;
use crate::http::HttpTransferClient;

/// Placeholder for the API key in logged URLs
const REDACTED: &str = "<redacted>";

/// Where probes and updates are sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryEndpoint {
    scheme: String,
    host: String,
    api_key: String,
    probe_url: String,
}

impl TelemetryEndpoint {
    pub fn new(config: &TelemetryConfig) -> Self {
        Self {
            scheme: config.scheme.clone(),
            host: config.host.clone(),
            api_key: config.api_key.clone(),
            probe_url: config.probe_url.clone(),
        }
    }

    pub fn probe_url(&self) -> &str {
        &self.probe_url
    }

    /// Update URL carrying `fix`
    ///
    /// # Examples
    ///
    /// ```
    /// use gnss_uplink::config::TelemetryConfig;
    /// use gnss_uplink::gnss::LatestFix;
    /// use gnss_uplink::telemetry::TelemetryEndpoint;
    ///
    /// let endpoint = TelemetryEndpoint::new(&TelemetryConfig {
    ///     host: "api.thingspeak.com".into(),
    ///     api_key: "KEY".into(),
    ///     probe_url: "http://httpbin.org/get".into(),
    ///     scheme: "https".into(),
    /// });
    ///
    /// assert_eq!(
    ///     endpoint.upload_url(&LatestFix::default()),
    ///     "https://api.thingspeak.com/update?api_key=KEY&field1=0.000000&field2=0.000000&field3=00:00:00:000"
    /// );
    /// ```
    pub fn upload_url(&self, fix: &LatestFix) -> String {
        self.format_url(&self.api_key, fix)
    }

    /// Same as [`Self::upload_url`] with the API key masked, for logs
    pub fn redacted_upload_url(&self, fix: &LatestFix) -> String {
        self.format_url(REDACTED, fix)
    }

    fn format_url(&self, api_key: &str, fix: &LatestFix) -> String {
        format!(
            "{}://{}/update?api_key={}&field1={}&field2={}&field3={}",
            self.scheme,
            self.host,
            api_key,
            fix.longitude_degrees(),
            fix.latitude_degrees(),
            fix.time_of_day
        )
    }
}

/// How the collector answered an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Stored under this entry id
    Accepted(u64),
    /// Collector answered `0` (rate limit or bad key)
    Rejected,
    /// Answered with something other than an entry id
    Delivered,
    /// Transfer failed
    Failed,
}

impl UploadOutcome {
    /// Interpret an update response body
    pub fn from_body(body: &[u8]) -> Self {
        match std::str::from_utf8(body).map(str::trim) {
            Ok("0") => UploadOutcome::Rejected,
            Ok(text) => text
                .parse()
                .map(UploadOutcome::Accepted)
                .unwrap_or(UploadOutcome::Delivered),
            Err(_) => UploadOutcome::Delivered,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, UploadOutcome::Accepted(_) | UploadOutcome::Delivered)
    }
}

/// Result of one probe-then-upload exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadReport {
    pub probe_ok: bool,
    pub upload: UploadOutcome,
}

/// Echo service reply; only the caller's address is of interest
#[derive(Deserialize)]
struct ProbeEcho {
    origin: Option<String>,
}

/// Probe connectivity, then upload `fix`
///
/// Exactly one probe and one update request are issued, in that order.
/// Failures are logged and never retried here.
pub async fn run_upload_sequence<H>(
    http: &H,
    endpoint: &TelemetryEndpoint,
    fix: LatestFix,
) -> UploadReport
where
    H: HttpTransferClient + ?Sized,
{
    let probe_ok = match http.get(endpoint.probe_url()).await {
        Ok(body) => {
            log_probe_response(&body);
            true
        }
        Err(e) => {
            log_transfer_error("Probe", &e);
            false
        }
    };

    info!("Uploading fix: {}", endpoint.redacted_upload_url(&fix));

    let upload = match http.get(&endpoint.upload_url(&fix)).await {
        Ok(body) => {
            let outcome = UploadOutcome::from_body(&body);
            match outcome {
                UploadOutcome::Accepted(entry) => info!("Update accepted as entry {}", entry),
                UploadOutcome::Rejected => warn!("Update rejected by collector"),
                _ => info!("Update response: {}", String::from_utf8_lossy(&body)),
            }
            outcome
        }
        Err(e) => {
            log_transfer_error("Upload", &e);
            UploadOutcome::Failed
        }
    };

    UploadReport { probe_ok, upload }
}

fn log_probe_response(body: &Bytes) {
    match serde_json::from_slice::<ProbeEcho>(body) {
        Ok(ProbeEcho { origin: Some(origin) }) => info!("Probe succeeded, public address {}", origin),
        _ => info!("Probe response: {}", String::from_utf8_lossy(body)),
    }
}

fn log_transfer_error(what: &str, err: &TransferError) {
    error!("{} failed: {}", what, err);
    for hint in err.remediation() {
        error!("{}", hint);
    }
}
