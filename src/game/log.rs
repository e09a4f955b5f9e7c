//! Session Log
//!
//! Append-only entries recorded by game transitions and shown to players.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::core::rng::DeterministicRng;

/// Who caused a log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    /// Engine bookkeeping (game start, reshuffle, elimination, winner).
    System,
    /// A player's move.
    Action,
}

/// A single log line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique entry id.
    pub id: String,
    /// Entry kind.
    #[serde(rename = "type")]
    pub kind: LogKind,
    /// Rendered message.
    pub message: String,
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    /// Create a new entry with an id drawn from the action RNG.
    pub fn new(
        rng: &mut DeterministicRng,
        kind: LogKind,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: rng.next_uuid().to_string(),
            kind,
            message: message.into(),
            timestamp,
        }
    }

    /// Create a system entry.
    pub fn system(rng: &mut DeterministicRng, message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(rng, LogKind::System, message, at)
    }

    /// Create an action entry.
    pub fn action(rng: &mut DeterministicRng, message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(rng, LogKind::Action, message, at)
    }
}
