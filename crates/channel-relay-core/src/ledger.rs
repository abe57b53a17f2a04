//! Per-username command ledger.
//!
//! Maps each username to the last command invocation it issued, so a later
//! payment-completion event can be correlated back to the ordering user.
//! Last write wins; entries never expire and live for the process lifetime.

use crate::event::CommandInvocation;
use crate::Username;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// In-memory username-to-last-invocation map.
///
/// Owned by the application state and passed by handle into the command
/// responder; never global. A mutex guards the map because requests are
/// served from a multi-threaded runtime; each write is one short critical
/// section.
#[derive(Debug, Default)]
pub struct CommandLedger {
    entries: Mutex<HashMap<Username, CommandInvocation>>,
}

impl CommandLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an invocation, replacing any earlier entry for the same
    /// username.
    pub fn record(&self, invocation: CommandInvocation) {
        self.lock().insert(invocation.username.clone(), invocation);
    }

    /// The last invocation recorded for `username`, if any.
    pub fn last_for(&self, username: &Username) -> Option<CommandInvocation> {
        self.lock().get(username).cloned()
    }

    /// Number of usernames with a live entry.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Username, CommandInvocation>> {
        // The map stays usable even if a writer panicked mid-insert.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
