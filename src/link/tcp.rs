//! TCP reachability link
//!
//! For hosts whose modem or network manager keeps the data link up on its
//! own: "connected" means a TCP connection to the telemetry host succeeds.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{LinkEvent, LinkManager, RequestHandle};
use crate::config::LinkConfig;

/// Link manager that probes TCP reachability per request
///
/// Each request runs as its own task; releasing a request that is still
/// connecting aborts that task, so no event is delivered for it.
pub struct TcpReachabilityLink {
    interface: String,
    host: String,
    port: u16,
    events: mpsc::Sender<LinkEvent>,
    next_handle: AtomicU64,
    pending: Arc<Mutex<HashMap<RequestHandle, JoinHandle<()>>>>,
}

impl TcpReachabilityLink {
    pub fn new(config: &LinkConfig, events: mpsc::Sender<LinkEvent>) -> Self {
        Self {
            interface: config.interface.clone(),
            host: config.check_host.clone(),
            port: config.check_port,
            events,
            next_handle: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of requests not yet released
    pub fn outstanding(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }
}

impl LinkManager for TcpReachabilityLink {
    /// Must be called from within a tokio runtime
    fn request(&self) -> RequestHandle {
        let handle = RequestHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let interface = self.interface.clone();
        let host = self.host.clone();
        let port = self.port;
        let events = self.events.clone();

        debug!("Link request {}: checking {}:{}", handle, host, port);

        let task = tokio::spawn(async move {
            let event = match TcpStream::connect((host.as_str(), port)).await {
                Ok(_) => LinkEvent::connected(handle, &interface),
                Err(e) => {
                    warn!("Link request {}: {}:{} unreachable: {}", handle, host, port, e);
                    LinkEvent::disconnected(handle, &interface)
                }
            };

            if events.send(event).await.is_err() {
                debug!("Link request {}: no listener for result", handle);
            }
        });

        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(handle, task);
        }
        handle
    }

    fn release(&self, handle: RequestHandle) {
        let task = self.pending.lock().ok().and_then(|mut p| p.remove(&handle));

        match task {
            Some(task) if !task.is_finished() => {
                task.abort();
                info!("Link request {} cancelled", handle);
            }
            Some(_) => debug!("Link request {} released", handle),
            None => debug!("Link request {} was not outstanding", handle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkState;
    use tokio::net::TcpListener;

    fn link_to(port: u16) -> (TcpReachabilityLink, mpsc::Receiver<LinkEvent>) {
        let (tx, rx) = mpsc::channel(4);
        let config = LinkConfig {
            interface: "lo".to_string(),
            check_host: "127.0.0.1".to_string(),
            check_port: port,
        };
        (TcpReachabilityLink::new(&config, tx), rx)
    }

    #[tokio::test]
    async fn test_reachable_host_reports_connected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (link, mut rx) = link_to(listener.local_addr().unwrap().port());

        let handle = link.request();
        let event = rx.recv().await.unwrap();

        assert_eq!(event, LinkEvent::connected(handle, "lo"));
        assert_eq!(link.outstanding(), 1);

        link.release(handle);
        assert_eq!(link.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_host_reports_disconnected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let (link, mut rx) = link_to(port);

        let handle = link.request();
        let event = rx.recv().await.unwrap();

        assert_eq!(event.handle, handle);
        assert_eq!(event.state, LinkState::Disconnected);
    }

    #[tokio::test]
    async fn test_handles_are_unique() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (link, mut rx) = link_to(listener.local_addr().unwrap().port());

        let first = link.request();
        let second = link.request();
        assert_ne!(first, second);

        let mut seen = vec![rx.recv().await.unwrap().handle, rx.recv().await.unwrap().handle];
        seen.sort_by_key(|h| h.0);
        assert_eq!(seen, vec![first, second]);
    }

    #[tokio::test]
    async fn test_release_unknown_handle_is_noop() {
        let (link, _rx) = link_to(9);
        link.release(RequestHandle(42));
        assert_eq!(link.outstanding(), 0);
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(RequestHandle(7).to_string(), "#7");
    }
}
