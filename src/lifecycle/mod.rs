//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config + rules → bind outgoing leg → bind incoming leg
//!     → spawn accept loops
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: the outgoing leg is listening before any client
//!   request can reach the relay
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: connections still open after the grace period
//!   are abandoned

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{start, RunningProxy, StartupError};
