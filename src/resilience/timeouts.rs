//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound every client-facing and upstream read, write and dial by the
//!   configured idle deadline
//! - Cancel the blocked operation cleanly when the deadline fires
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - A timed-out connection is torn down; no response is synthesized

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// The idle deadline elapsed before the operation completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("idle deadline of {0:?} elapsed")]
pub struct TimedOut(pub Duration);

/// Runs `fut` under `limit`, dropping it if the deadline fires first.
pub async fn deadline<F>(limit: Duration, fut: F) -> Result<F::Output, TimedOut>
where
    F: Future,
{
    tokio::time::timeout(limit, fut).await.map_err(|_| TimedOut(limit))
}
