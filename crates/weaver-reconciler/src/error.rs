//! Error types for reconciliation and editor transactions.

use std::ops::Range;

use thiserror::Error;

use crate::node::NodeKey;

/// Errors surfaced by an update transaction.
///
/// Any of these aborts the transaction: the editor keeps the state it had
/// before `update` was called.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReconcileError {
    /// An internal invariant of the range cache or the dirty set was broken.
    #[error("invariant violation: {0}")]
    InvariantViolation(#[from] InvariantViolation),

    /// The optimized path disagreed with the full-rebuild oracle.
    #[error("strict mode mismatch in {stage}: {detail}")]
    StrictModeMismatch { stage: &'static str, detail: String },

    /// An edit could not be applied to the flat text storage.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A transaction referenced a node that does not exist.
    #[error("unknown node: {0}")]
    UnknownNode(NodeKey),

    /// A transaction asked for a structurally impossible change.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

/// Broken invariants detected while reconciling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvariantViolation {
    /// A node's cached location disagrees with where its siblings put it.
    #[error("node {key} cached at {actual}, expected {expected}")]
    LocationMismatch {
        key: NodeKey,
        expected: usize,
        actual: usize,
    },

    /// A length component went below zero while applying deltas.
    #[error("negative {component} length for node {key}")]
    NegativeLength {
        key: NodeKey,
        component: &'static str,
    },

    /// A dirty key exists in neither the previous nor the next tree.
    #[error("dirty key {0} is in neither tree")]
    OrphanedDirtyKey(NodeKey),

    /// A node of the next tree has no range cache entry.
    #[error("missing range cache entry for {0}")]
    MissingCacheEntry(NodeKey),

    /// The range cache covers a different length than the flat storage.
    #[error("range cache covers {cached} chars but storage holds {stored}")]
    LengthMismatch { cached: usize, stored: usize },

    /// A range cache entry outlived its node.
    #[error("stale range cache entry for {0}")]
    StaleCacheEntry(NodeKey),
}

/// Errors from the flat text storage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageError {
    /// The edit range does not fit inside the stored text.
    #[error("range {range:?} out of bounds for length {len}")]
    OutOfBounds { range: Range<usize>, len: usize },
}

/// Errors loading a [`ReconcilerConfig`](crate::config::ReconcilerConfig).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// An environment variable held something that is not a boolean.
    #[error("invalid boolean for {var}: {value:?}")]
    InvalidBool { var: &'static str, value: String },

    /// An environment variable held something that is not a number.
    #[error("invalid number for {var}: {value:?}")]
    InvalidNumber { var: &'static str, value: String },
}

pub type Result<T, E = ReconcileError> = std::result::Result<T, E>;
