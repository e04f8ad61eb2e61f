//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection (either leg)
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (id for tracing, live-connection tracking)
//!     → Hand off to the proxy leg handler
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
