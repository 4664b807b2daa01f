//! Error types for sylva.

use thiserror::Error;

/// Errors that can occur while building a KD-forest.
///
/// Query paths are total: once a forest is built, searching and matching
/// cannot fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForestError {
    /// Descriptor count exceeds the 2^31 index capacity.
    #[error("descriptor count {0} exceeds index capacity")]
    CapacityExceeded(usize),

    /// Randomised partitioning exhausted all attempts on some node.
    ///
    /// Happens when a range has no dimension with enough spread to split
    /// (e.g. all descriptors identical). A caller may retry with a
    /// different seed, though a genuinely degenerate dataset will fail
    /// again.
    #[error("randomised partitioning failed after {attempts} attempts")]
    PartitionFailure { attempts: usize },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Post-build validation caught an inconsistent tree.
    ///
    /// Always a builder bug, never a data problem.
    #[error("tree invariant violated: {0}")]
    InvariantViolation(String),
}

/// Result type alias for sylva operations.
pub type Result<T> = std::result::Result<T, ForestError>;
