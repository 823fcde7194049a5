//! # sealpack-log
//!
//! Append-only transparency log for sealpack, rooted in a Merkle tree.
//!
//! ## Overview
//!
//! Every completed `keygen`, `sign`, `verify`, and `install` appends one
//! `LogEntry`. After each append the Merkle root over all serialized entries
//! is recomputed and persisted with them, so altering, dropping, or
//! reordering any past entry is detected by `verify_log`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sealpack_log::{TransparencyLog, verify_log};
//! use sealpack_contracts::log::{Action, LogEntry};
//!
//! let log = TransparencyLog::new(".sealpack/transparency-log.json");
//! let (_entries, root) = log.append(LogEntry::new(Action::Demo))?;
//! let state = log.read()?.expect("just appended");
//! assert!(verify_log(&state));
//! ```

pub mod merkle;
pub mod store;

pub use merkle::{leaf_hash, merkle_root, node_hash, verify_log};
pub use store::TransparencyLog;

// ── Tests ─────────────────────────────────────────────────────────────────────
