//! Session correlation across the relay hop.
//!
//! # Responsibilities
//! - Mint correlation ids for requests entering the incoming leg
//! - Hold each request's withheld header fragment until the outgoing leg
//!   claims it by id
//! - Guarantee every session is removed exactly once
//!
//! # Design Decisions
//! - One mutex over the whole map; every operation is O(1) and short
//! - The table is an injected service object, never a global
//! - Ids come from a pluggable source so tests can force collisions

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use rand::Rng;

use crate::observability::metrics;

/// Source of raw session identifiers.
pub trait IdSource: Send + Sync + fmt::Debug {
    fn next_id(&self) -> u64;
}

/// Non-negative random integers; uniqueness within the process is all that is required.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdSource;

impl IdSource for RandomIdSource {
    fn next_id(&self) -> u64 {
        rand::thread_rng().gen_range(0..=i64::MAX as u64)
    }
}

/// A withheld-header fragment keyed by its correlation id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub withheld: Vec<u8>,
}

/// Concurrency-safe correlation map.
#[derive(Debug)]
pub struct SessionTable {
    ids: Box<dyn IdSource>,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::with_id_source(RandomIdSource)
    }

    pub fn with_id_source(ids: impl IdSource + 'static) -> Self {
        Self {
            ids: Box::new(ids),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Creates an empty session and returns its id.
    pub fn create(&self) -> String {
        self.create_with(Vec::new())
    }

    /// Creates a session holding `withheld` and returns its id.
    ///
    /// Re-draws the id while it collides with a live session.
    pub fn create_with(&self, withheld: Vec<u8>) -> String {
        let mut sessions = self.sessions.lock().expect("session table mutex poisoned");
        let id = loop {
            let candidate = self.ids.next_id().to_string();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
            tracing::debug!(session_id = %candidate, "Session id collision, drawing again");
        };
        sessions.insert(
            id.clone(),
            Session {
                id: id.clone(),
                withheld,
            },
        );
        metrics::record_active_sessions(sessions.len());
        id
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        let sessions = self.sessions.lock().expect("session table mutex poisoned");
        sessions.get(id).cloned()
    }

    /// Removes a session; true iff it existed.
    pub fn remove(&self, id: &str) -> bool {
        self.take(id).is_some()
    }

    /// Looks up and removes a session in one step.
    pub fn take(&self, id: &str) -> Option<Session> {
        let mut sessions = self.sessions.lock().expect("session table mutex poisoned");
        let session = sessions.remove(id);
        if session.is_some() {
            metrics::record_active_sessions(sessions.len());
        }
        session
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().expect("session table mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates a session owned by the returned guard.
    pub fn open(self: &Arc<Self>, withheld: Vec<u8>) -> SessionGuard {
        let id = self.create_with(withheld);
        SessionGuard {
            table: Arc::clone(self),
            id,
        }
    }
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Removes its session on drop unless the outgoing leg already claimed it.
///
/// Scoped to one request/response round trip on the incoming leg.
#[derive(Debug)]
pub struct SessionGuard {
    table: Arc<SessionTable>,
    id: String,
}

impl SessionGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.table.remove(&self.id) {
            tracing::debug!(session_id = %self.id, "Session never claimed by the outgoing leg, discarded");
        }
    }
}
