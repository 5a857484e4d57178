//! # Data Link Module
//!
//! Interface to whoever brings the data connection up.
//!
//! A connection is requested, then reported asynchronously as a
//! [`LinkEvent`] on a channel handed to the manager at construction.
//! Every request is eventually handed back with [`LinkManager::release`].

use std::fmt;

pub mod tcp;

pub use tcp::TcpReachabilityLink;

/// Capacity of the link event channel
pub const LINK_EVENT_CHANNEL_CAPACITY: usize = 8;

/// Identifies one connection request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestHandle(pub u64);

impl fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reported state of a requested connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    Disconnected,
}

/// Connectivity notification for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEvent {
    pub handle: RequestHandle,
    /// Interface name, for logs
    pub interface: String,
    pub state: LinkState,
}

impl LinkEvent {
    pub fn connected(handle: RequestHandle, interface: &str) -> Self {
        Self { handle, interface: interface.to_string(), state: LinkState::Connected }
    }

    pub fn disconnected(handle: RequestHandle, interface: &str) -> Self {
        Self { handle, interface: interface.to_string(), state: LinkState::Disconnected }
    }
}

/// Connectivity manager
///
/// Neither call blocks; outcomes arrive as [`LinkEvent`]s.
#[cfg_attr(test, mockall::automock)]
pub trait LinkManager: Send + Sync {
    /// Ask for a data connection
    fn request(&self) -> RequestHandle;

    /// Give a connection (or a still pending request) back
    fn release(&self, handle: RequestHandle);
}
