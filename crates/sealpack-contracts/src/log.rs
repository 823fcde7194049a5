//! Transparency log entry and persisted state types.
//!
//! `LogEntry` is one append-only record. `LogState` is exactly what is
//! written to durable storage: the ordered entries plus the Merkle root over
//! them. The serialized form of each entry is a Merkle leaf input, so the
//! field order below is part of the on-disk format.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// The kind of operation a log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Keygen,
    Sign,
    Verify,
    Install,
    Demo,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Keygen => "keygen",
            Action::Sign => "sign",
            Action::Verify => "verify",
            Action::Install => "install",
            Action::Demo => "demo",
        }
    }
}

/// A single immutable transparency log record.
///
/// Built with `LogEntry::new(action)` and the `with_*` builders; never
/// modified once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp with millisecond precision.
    pub timestamp: String,

    pub action: Action,

    /// Artifact file name or package spec.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,

    /// Artifact digest at the time of the operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<Digest>,

    /// Path of the signature file involved, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    /// Sandbox policy summary applied during install.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl LogEntry {
    /// Create an entry for `action` stamped with the current time.
    pub fn new(action: Action) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            action,
            artifact: None,
            hash: None,
            signature: None,
            policy: None,
            note: None,
        }
    }

    pub fn with_artifact(mut self, artifact: impl Into<String>) -> Self {
        self.artifact = Some(artifact.into());
        self
    }

    pub fn with_hash(mut self, hash: Digest) -> Self {
        self.hash = Some(hash);
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.policy = Some(policy.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// The durable structure of a transparency log.
///
/// Invariant: `merkle_root` is the Merkle root over `entries` in order, and
/// is `None` exactly when `entries` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogState {
    pub entries: Vec<LogEntry>,

    #[serde(rename = "merkleRoot")]
    pub merkle_root: Option<Digest>,
}
