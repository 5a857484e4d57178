//! # Connection Orchestrator
//!
//! Drives the upload cycle:
//!
//! 1. **Cycle tick**: request a fresh position pass, move the session to
//!    awaiting-connection, arm the timeout, request a connection
//! 2. **Connected**: disarm the timeout, snapshot the latest fix, probe and
//!    upload on a spawned task, release the connection when it finishes
//! 3. **Disconnected**: log and return to idle
//! 4. **Timeout**: log an error; what happens to the pending request
//!    depends on the configured [`TimeoutPolicy`]
//!
//! Every callback runs on one `select!` loop, so handlers never race each
//! other. The HTTP exchange is the only slow step and it runs off the loop.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{ScheduleConfig, TimeoutPolicy};
use crate::gnss::fix::format_microdegrees;
use crate::gnss::{LatestFixReader, RefreshHandle};
use crate::http::HttpTransferClient;
use crate::link::{LinkEvent, LinkManager, LinkState, RequestHandle};
use crate::telemetry::{run_upload_sequence, TelemetryEndpoint, UploadReport};

pub mod session;
pub mod timer;

pub use session::{ConnectionSession, SessionState};
pub use timer::{CycleTimer, TimeoutTimer, TimerEvent, TimerSupervisor};

/// Everything the orchestrator's callbacks need, built once at startup
pub struct OrchestrationContext {
    pub endpoint: TelemetryEndpoint,
    pub http: Arc<dyn HttpTransferClient>,
    pub link: Arc<dyn LinkManager>,
    pub latest_fix: LatestFixReader,
    pub refresh: RefreshHandle,
    pub schedule: ScheduleConfig,
}

/// Completion of a spawned upload sequence
#[derive(Debug, Clone, Copy)]
pub struct UploadCompletion {
    pub handle: RequestHandle,
    pub report: UploadReport,
}

/// Counters kept over the process lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub cycles: u64,
    pub skipped_ticks: u64,
    pub connections: u64,
    pub disconnections: u64,
    pub timeouts: u64,
    pub late_connections: u64,
    pub probe_failures: u64,
    pub uploads_ok: u64,
    pub uploads_failed: u64,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cycles ({} skipped), {} connected, {} disconnected, {} timed out, \
             {} late, uploads {} ok / {} failed, {} probe failures",
            self.cycles,
            self.skipped_ticks,
            self.connections,
            self.disconnections,
            self.timeouts,
            self.late_connections,
            self.uploads_ok,
            self.uploads_failed,
            self.probe_failures
        )
    }
}

/// Connection-state-driven upload sequencer
pub struct ConnectionOrchestrator {
    ctx: OrchestrationContext,
    session: ConnectionSession,
    timers: TimerSupervisor,
    upload_tx: mpsc::Sender<UploadCompletion>,
    upload_rx: mpsc::Receiver<UploadCompletion>,
    stats: SessionStats,
}

impl ConnectionOrchestrator {
    pub fn new(ctx: OrchestrationContext) -> Self {
        let (upload_tx, upload_rx) = mpsc::channel(1);

        Self {
            ctx,
            session: ConnectionSession::new(),
            timers: TimerSupervisor::new(),
            upload_tx,
            upload_rx,
            stats: SessionStats::default(),
        }
    }

    pub fn session(&self) -> &ConnectionSession {
        &self.session
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Run the cycle until `shutdown` completes
    ///
    /// # Returns
    ///
    /// * `SessionStats` - Counters accumulated over the run
    pub async fn run<F>(mut self, mut link_events: mpsc::Receiver<LinkEvent>, shutdown: F) -> SessionStats
    where
        F: Future<Output = ()>,
    {
        let interval = self.ctx.schedule.cycle_interval();
        info!(
            "Starting upload cycle every {}s (timeout {}s, {:?} timeouts)",
            interval.as_secs(),
            self.ctx.schedule.connection_timeout_s,
            self.ctx.schedule.timeout_policy
        );
        self.timers.start_cycle(interval, self.ctx.schedule.repeating);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                event = self.timers.next() => match event {
                    TimerEvent::CycleTick => self.on_cycle_tick(),
                    TimerEvent::ConnectionTimeout => self.on_timeout(),
                },
                Some(event) = link_events.recv() => self.on_link_event(event),
                Some(done) = self.upload_rx.recv() => self.on_upload_complete(done),
                _ = &mut shutdown => {
                    info!("Shutting down upload cycle");
                    break;
                }
            }
        }

        if let Some(handle) = self.session.reset() {
            self.ctx.link.release(handle);
        }
        info!("Session statistics: {}", self.stats);
        self.stats
    }

    /// Cycle timer fired
    pub fn on_cycle_tick(&mut self) {
        self.stats.cycles += 1;

        match self.session.state() {
            SessionState::Connected => {
                warn!("Upload still in progress, skipping cycle");
                self.stats.skipped_ticks += 1;
                return;
            }
            SessionState::AwaitingConnection if !self.session.timed_out() => {
                warn!("Connection request still pending, skipping cycle");
                self.stats.skipped_ticks += 1;
                return;
            }
            SessionState::AwaitingConnection => {
                // Only reachable with observational timeouts
                if let Some(stale) = self.session.reset() {
                    info!("Superseding timed-out request {}", stale);
                    self.ctx.link.release(stale);
                }
            }
            SessionState::Idle => {}
        }

        self.ctx.refresh.request();

        let fix = self.ctx.latest_fix.snapshot();
        info!(
            longitude = %format_microdegrees(fix.longitude),
            latitude = %format_microdegrees(fix.latitude),
            "Requesting connection..."
        );

        self.session.begin();
        self.timers.arm_timeout(self.ctx.schedule.connection_timeout());
        let handle = self.ctx.link.request();
        self.session.attach(handle);
        debug!("Connection request {} issued", handle);
    }

    /// Connection timeout fired
    pub fn on_timeout(&mut self) {
        self.timers.disarm_timeout();

        if self.session.state() != SessionState::AwaitingConnection || self.session.timed_out() {
            debug!("Timeout fired with no pending request");
            return;
        }

        self.stats.timeouts += 1;
        error!(
            "Couldn't establish connection after {} seconds",
            self.ctx.schedule.connection_timeout_s
        );

        match self.ctx.schedule.timeout_policy {
            TimeoutPolicy::Authoritative => {
                if let Some(handle) = self.session.reset() {
                    self.ctx.link.release(handle);
                }
            }
            TimeoutPolicy::Observational => self.session.mark_timed_out(),
        }
    }

    /// Connectivity state changed for some request
    pub fn on_link_event(&mut self, event: LinkEvent) {
        if !self.session.is_current(event.handle) {
            match event.state {
                LinkState::Connected => {
                    warn!("Ignoring connection for stale request {}", event.handle);
                    self.stats.late_connections += 1;
                    self.ctx.link.release(event.handle);
                }
                LinkState::Disconnected => {
                    debug!("Ignoring disconnect for stale request {}", event.handle);
                }
            }
            return;
        }

        match (event.state, self.session.state()) {
            (LinkState::Connected, SessionState::AwaitingConnection) => self.start_upload(event),
            (LinkState::Disconnected, SessionState::AwaitingConnection) => {
                info!("Interface {} disconnected.", event.interface);
                self.stats.disconnections += 1;
                self.timers.disarm_timeout();
                if let Some(handle) = self.session.reset() {
                    self.ctx.link.release(handle);
                }
            }
            (LinkState::Disconnected, SessionState::Connected) => {
                warn!("Interface {} lost during upload", event.interface);
                self.stats.disconnections += 1;
            }
            (state, current) => {
                debug!("Ignoring {:?} for request {} while {}", state, event.handle, current);
            }
        }
    }

    /// Spawned upload sequence finished
    pub fn on_upload_complete(&mut self, done: UploadCompletion) {
        if !done.report.probe_ok {
            self.stats.probe_failures += 1;
        }
        if done.report.upload.is_success() {
            self.stats.uploads_ok += 1;
        } else {
            self.stats.uploads_failed += 1;
        }

        if self.session.state() == SessionState::Connected && self.session.is_current(done.handle) {
            self.session.reset();
        }

        self.ctx.link.release(done.handle);
        info!("Connection {} released", done.handle);
    }

    fn start_upload(&mut self, event: LinkEvent) {
        self.timers.disarm_timeout();
        self.session.connect();
        self.stats.connections += 1;

        if self.session.timed_out() {
            info!("Late connection for request {} accepted", event.handle);
            self.stats.late_connections += 1;
        }

        info!("Interface {} connected.", event.interface);

        let fix = self.ctx.latest_fix.snapshot();
        let http = Arc::clone(&self.ctx.http);
        let endpoint = self.ctx.endpoint.clone();
        let tx = self.upload_tx.clone();
        let handle = event.handle;

        tokio::spawn(async move {
            let report = run_upload_sequence(http.as_ref(), &endpoint, fix).await;
            if tx.send(UploadCompletion { handle, report }).await.is_err() {
                debug!("Orchestrator gone before upload {} completed", handle);
            }
        });
    }
}
