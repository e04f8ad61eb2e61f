//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Listeners, legs, session table produce:
//!     → logging.rs (structured tracing events, one span per connection)
//!     → metrics.rs (counters and the active-session gauge)
//!
//! Consumers:
//!     → stdout (human or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Connection id and leg travel as span fields, not repeated per event
//! - Metrics are cheap no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
