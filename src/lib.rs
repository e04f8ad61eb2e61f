//! Header-whitelisting HTTP/1.1 proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!              ┌──────────────── hwl-proxy (intermediary) ────────────────┐
//!              │                                                          │
//!   Client ───▶│ incoming leg ──split──▶ whitelisted + X-Message-ID ──────┼──▶ Relay
//!              │      │                                                   │      │
//!              │      └─ withheld ──▶ session table ──┐                   │      │
//!              │                                      ▼                   │      │
//!   Next hop ◀─┼──────── join ◀── outgoing leg ◀──────────────────────────┼──────┘
//!              │                                                          │
//!              │  config · observability · lifecycle · net · resilience   │
//!              └──────────────────────────────────────────────────────────┘
//! ```
//!
//! In the origin role only the incoming leg runs and withheld headers are
//! dropped instead of stashed.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod proxy;
pub mod session;
pub mod whitelist;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::ProxyConfig;
pub use lifecycle::{start, RunningProxy, Shutdown};
pub use whitelist::Whitelist;
