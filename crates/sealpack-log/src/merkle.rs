//! Merkle root computation and log integrity verification.
//!
//! Tree layout (must stay bit-for-bit stable for existing logs):
//!   1. leaf = SHA-256 of the compact JSON serialization of the entry
//!   2. parent = SHA-256 of `left_hex ++ right_hex`, where both children
//!      are their 64-char lowercase hex strings
//!   3. an odd trailing node is carried up unchanged (not duplicated,
//!      not re-hashed)
//!   4. the root is the single node left; an empty log has no root

use sealpack_contracts::{
    digest::Digest,
    log::{LogEntry, LogState},
};
use sealpack_core::digest::digest_bytes;

/// Hash one entry into its Merkle leaf.
///
/// # Panics
///
/// Panics if `entry` cannot be serialized to JSON, which cannot happen for
/// the plain-data `LogEntry` type.
pub fn leaf_hash(entry: &LogEntry) -> Digest {
    let json = serde_json::to_vec(entry).expect("LogEntry must always be serializable to JSON");
    digest_bytes(&json)
}

/// Hash two sibling nodes into their parent.
pub fn node_hash(left: &Digest, right: &Digest) -> Digest {
    let mut buf = String::with_capacity(Digest::HEX_LEN * 2);
    buf.push_str(left.as_str());
    buf.push_str(right.as_str());
    digest_bytes(buf.as_bytes())
}

/// Reduce a level of leaves to the root.
///
/// Returns `None` for an empty level.
pub fn root_of_leaves(mut level: Vec<Digest>) -> Option<Digest> {
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            match pair {
                [left, right] => next.push(node_hash(left, right)),
                [carry] => next.push(carry.clone()),
                _ => unreachable!("chunks(2) yields one or two nodes"),
            }
        }
        level = next;
    }
    level.pop()
}

/// The Merkle root over `entries` in order, or `None` if there are none.
pub fn merkle_root(entries: &[LogEntry]) -> Option<Digest> {
    root_of_leaves(entries.iter().map(leaf_hash).collect())
}

/// Return `true` when `state.merkle_root` matches a fresh recomputation over
/// `state.entries`.
///
/// An empty log with no root is valid. An empty log that claims a root, or a
/// non-empty log without one, is not.
pub fn verify_log(state: &LogState) -> bool {
    merkle_root(&state.entries) == state.merkle_root
}
