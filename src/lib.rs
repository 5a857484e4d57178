//! # GNSS Uplink Library
//!
//! Periodically report the position of a GNSS receiver to a telemetry
//! collector over an on-demand data link.
//!
//! A position worker keeps the latest fix current on its own thread. Every
//! cycle the orchestrator asks for a fresh fix, brings the link up, probes
//! connectivity, uploads the fix and releases the link again. A connection
//! that never arrives is reported after a timeout.

pub mod config;
pub mod error;
pub mod gnss;
pub mod http;
pub mod link;
pub mod logging;
pub mod orchestrator;
pub mod telemetry;
