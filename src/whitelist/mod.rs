//! Header whitelisting subsystem.
//!
//! # Data Flow
//! ```text
//! whitelist.json
//!     → rule.rs (deserialize, compile value patterns once)
//!     → Whitelist (ordered, immutable, shared via Arc)
//!
//! Incoming leg:  request head → engine::split → (whitelisted, withheld)
//! Outgoing leg:  relayed request + withheld → engine::join → full request
//! ```
//!
//! # Design Decisions
//! - Rules are evaluated in list order; each rule consumes one line per message
//! - Invalid header syntax rejects the whole message
//! - On rejoin, headers present in the live message always win

pub mod engine;
pub mod rule;

pub use engine::{join, Split, SplitError, Whitelist};
pub use rule::{load_rules, parse_rules, RuleConfig, RuleError, WhitelistRule};
