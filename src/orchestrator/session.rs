//! Connection session state machine
//!
//! ```text
//! Idle --begin--> AwaitingConnection --connect--> Connected --reset--> Idle
//!                 AwaitingConnection --reset----> Idle
//! ```

use std::fmt;

use crate::link::RequestHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingConnection,
    Connected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::AwaitingConnection => write!(f, "awaiting connection"),
            SessionState::Connected => write!(f, "connected"),
        }
    }
}

/// The single connection attempt in flight, if any
#[derive(Debug, Default)]
pub struct ConnectionSession {
    state: SessionState,
    handle: Option<RequestHandle>,
    /// Timeout already fired for this attempt
    timed_out: bool,
}

impl ConnectionSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn handle(&self) -> Option<RequestHandle> {
        self.handle
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// Whether `handle` is the request this session is waiting on
    pub fn is_current(&self, handle: RequestHandle) -> bool {
        self.handle == Some(handle)
    }

    /// Start a new attempt; the request handle is attached once issued
    ///
    /// Returns `false` if a session is already active.
    pub fn begin(&mut self) -> bool {
        if self.state != SessionState::Idle {
            return false;
        }
        self.state = SessionState::AwaitingConnection;
        self.handle = None;
        self.timed_out = false;
        true
    }

    pub fn attach(&mut self, handle: RequestHandle) {
        self.handle = Some(handle);
    }

    pub fn mark_timed_out(&mut self) {
        self.timed_out = true;
    }

    /// Mark the pending request as connected
    ///
    /// Returns `false` unless the session was awaiting a connection.
    pub fn connect(&mut self) -> bool {
        if self.state != SessionState::AwaitingConnection {
            return false;
        }
        self.state = SessionState::Connected;
        true
    }

    /// Return to idle, handing back the request to release
    pub fn reset(&mut self) -> Option<RequestHandle> {
        self.state = SessionState::Idle;
        self.timed_out = false;
        self.handle.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_lifecycle() {
        let mut session = ConnectionSession::new();
        assert_eq!(session.state(), SessionState::Idle);

        assert!(session.begin());
        session.attach(RequestHandle(3));
        assert_eq!(session.state(), SessionState::AwaitingConnection);
        assert!(session.is_current(RequestHandle(3)));
        assert!(!session.is_current(RequestHandle(4)));

        assert!(session.connect());
        assert_eq!(session.state(), SessionState::Connected);

        assert_eq!(session.reset(), Some(RequestHandle(3)));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.handle(), None);
    }

    #[test]
    fn test_begin_refused_while_active() {
        let mut session = ConnectionSession::new();
        assert!(session.begin());
        assert!(!session.begin());

        session.connect();
        assert!(!session.begin());
    }

    #[test]
    fn test_connect_requires_awaiting() {
        let mut session = ConnectionSession::new();
        assert!(!session.connect());
        assert_eq!(session.state(), SessionState::Idle);

        session.begin();
        session.connect();
        assert!(!session.connect());
    }

    #[test]
    fn test_timed_out_flag_cleared_on_reset() {
        let mut session = ConnectionSession::new();
        session.begin();
        session.attach(RequestHandle(1));
        session.mark_timed_out();
        assert!(session.timed_out());
        assert_eq!(session.state(), SessionState::AwaitingConnection);

        session.reset();
        assert!(!session.timed_out());
        assert!(session.begin());
        assert!(!session.timed_out());
    }

    #[test]
    fn test_reset_when_idle() {
        let mut session = ConnectionSession::new();
        assert_eq!(session.reset(), None);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::AwaitingConnection.to_string(), "awaiting connection");
    }
}
