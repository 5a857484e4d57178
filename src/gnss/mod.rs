//! # GNSS Module
//!
//! Position acquisition from a GNSS receiver.
//!
//! This module handles:
//! - The latest-fix record and position samples
//! - The receiver interface ([`PositionSource`])
//! - NMEA 0183 parsing and checksums for serial receivers
//! - The acquisition worker that keeps the latest fix current

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

pub mod checksum;
pub mod fix;
pub mod nmea;
pub mod serial;
pub mod service;

pub use fix::{FixState, LatestFix, PositionSample, TimeOfDay};
pub use service::{LatestFixReader, PositionAcquisitionService, RefreshHandle};

/// Capacity of the position notification channel
pub const NOTIFICATION_CHANNEL_CAPACITY: usize = 16;

/// A positioning receiver
///
/// Sources are driven from the acquisition worker's own runtime, so
/// `subscribe` may register I/O with the current tokio reactor.
#[async_trait]
pub trait PositionSource: Send + 'static {
    /// Start delivering position notifications
    ///
    /// The stream ends when the receiver goes away.
    async fn subscribe(&mut self) -> Result<mpsc::Receiver<PositionSample>>;

    /// Ask the receiver to restart acquisition
    ///
    /// Fresh samples arrive asynchronously on the subscribed stream.
    async fn force_restart(&mut self) -> Result<()>;
}
