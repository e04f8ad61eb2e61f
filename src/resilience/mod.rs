//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Every read, write and dial on either leg:
//!     → timeouts.rs (enforce the idle deadline)
//!     → On expiry: the connection is torn down
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No retries: a failed upstream ends the client connection

pub mod timeouts;
