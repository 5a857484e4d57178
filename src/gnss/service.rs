//! # Position Acquisition Service
//!
//! Dedicated worker that keeps the latest fix current.
//!
//! The worker runs on its own OS thread with its own single-threaded tokio
//! runtime, independent of the upload cycle. It is the only writer of the
//! latest fix; readers get a [`LatestFixReader`] backed by a single-slot
//! `watch` channel, so a read always sees a complete record.

use std::thread;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::fix::{format_microdegrees, LatestFix, PositionSample};
use super::PositionSource;
use crate::error::{Result, UplinkError};

/// Read side of the latest fix
#[derive(Debug, Clone)]
pub struct LatestFixReader {
    rx: watch::Receiver<LatestFix>,
}

impl From<watch::Receiver<LatestFix>> for LatestFixReader {
    fn from(rx: watch::Receiver<LatestFix>) -> Self {
        Self { rx }
    }
}

impl LatestFixReader {
    /// Copy of the record as currently stored
    pub fn snapshot(&self) -> LatestFix {
        *self.rx.borrow()
    }
}

/// Requests a fresh acquisition pass without waiting for it
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl From<mpsc::UnboundedSender<()>> for RefreshHandle {
    fn from(tx: mpsc::UnboundedSender<()>) -> Self {
        Self { tx }
    }
}

impl RefreshHandle {
    /// Ask the worker to restart acquisition
    ///
    /// Never blocks. Returns `false` if the worker is gone.
    pub fn request(&self) -> bool {
        if self.tx.send(()).is_err() {
            warn!("Position worker not running, refresh request dropped");
            return false;
        }
        true
    }
}

/// Worker owning the position source and the latest fix
pub struct PositionAcquisitionService<S: PositionSource> {
    source: S,
    latest: watch::Sender<LatestFix>,
    refresh_rx: mpsc::UnboundedReceiver<()>,
    reconnect_interval: Duration,
}

impl<S: PositionSource> PositionAcquisitionService<S> {
    /// Create the service and its reader/refresh handles
    ///
    /// # Arguments
    ///
    /// * `source` - Receiver to subscribe to
    /// * `reconnect_interval` - Wait before subscribing again after the
    ///   subscription fails or the notification stream ends
    pub fn new(source: S, reconnect_interval: Duration) -> (Self, LatestFixReader, RefreshHandle) {
        let (latest, rx) = watch::channel(LatestFix::default());
        let (tx, refresh_rx) = mpsc::unbounded_channel();

        let service = Self { source, latest, refresh_rx, reconnect_interval };
        (service, LatestFixReader { rx }, RefreshHandle { tx })
    }

    /// Run the service on a dedicated thread with its own runtime
    ///
    /// # Errors
    ///
    /// Returns error if the thread cannot be spawned. Runtime and source
    /// failures are logged from inside the worker.
    pub fn spawn(self) -> Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("position".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to build position worker runtime: {}", e);
                        return;
                    }
                };

                runtime.block_on(self.run());
            })
            .map_err(UplinkError::Io)
    }

    /// Keep the latest fix current for the rest of the process lifetime
    ///
    /// A failed subscription or a closed notification stream is followed by
    /// a back-off and a fresh subscription. Refresh requests keep being
    /// served while the receiver is down.
    pub async fn run(mut self) {
        info!("Position worker started");

        loop {
            match self.source.subscribe().await {
                Ok(notifications) => {
                    self.drain(notifications).await;
                    warn!(
                        "Position notifications closed, resubscribing in {}ms",
                        self.reconnect_interval.as_millis()
                    );
                }
                Err(e) => warn!(
                    "Failed to subscribe to position source: {}, retrying in {}ms",
                    e,
                    self.reconnect_interval.as_millis()
                ),
            }

            self.back_off().await;
        }
    }

    /// Process notifications and refresh requests until the stream closes
    async fn drain(&mut self, mut notifications: mpsc::Receiver<PositionSample>) {
        loop {
            tokio::select! {
                sample = notifications.recv() => match sample {
                    Some(sample) => Self::handle_sample(&self.latest, &sample),
                    None => return,
                },
                Some(()) = self.refresh_rx.recv() => {
                    debug!("Forcing position acquisition restart");
                    if let Err(e) = self.source.force_restart().await {
                        warn!("Failed to restart position acquisition: {}", e);
                    }
                }
            }
        }
    }

    /// Wait out the reconnect interval; a refresh request cuts it short
    async fn back_off(&mut self) {
        let wait = sleep(self.reconnect_interval);
        tokio::pin!(wait);

        tokio::select! {
            _ = &mut wait => {}
            Some(()) = self.refresh_rx.recv() => {
                debug!("Refresh requested while receiver is down, resubscribing now");
            }
        }
    }

    /// Fold one notification into the latest fix
    fn handle_sample(latest: &watch::Sender<LatestFix>, sample: &PositionSample) {
        debug!("New position sample, state: {}", sample.fix_state);

        // No-fix samples return false and the stored record is untouched
        let updated = latest.send_if_modified(|fix| fix.apply(sample));
        if !updated {
            return;
        }

        info!(
            latitude = %format_microdegrees(sample.latitude),
            longitude = %format_microdegrees(sample.longitude),
            accuracy_m = sample.horizontal_accuracy as f64 / 100.0,
            "Position updated ({})",
            sample.fix_state
        );

        if sample.time_of_day.is_none() {
            debug!("Sample carried no time of day, keeping previous time");
        }
    }
}
