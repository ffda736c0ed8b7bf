use thiserror::Error;

/// Errors reported by the network construction operations.
///
/// All operations are deterministic and stateless, errors are returned
/// synchronously at the point of the offending call and are never retried.
/// No partial results are produced on failure.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Malformed feature or transformation data, e.g. a non-finite m/z value,
    /// duplicate feature identifiers or a non-positive ppm tolerance.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// An operation was invoked on an adjacency matrix in the wrong lifecycle
    /// state, e.g. retention-time correcting an already corrected matrix.
    #[error("precondition violation: {0}")]
    PreconditionViolation(String),
    /// Two matrices over different vertex sets were combined.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
}
