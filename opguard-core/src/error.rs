use thiserror::Error;

/// The full error taxonomy surfaced by the kernel. Errors are reported
/// synchronously to the caller; nothing is retried internally.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LeaseError {
    /// The guarded record does not exist
    #[error("resource {0} not found")]
    ResourceNotFound(String),

    /// No lease matches the token, or the lease already reached a terminal state
    #[error("no matching lease for token")]
    LeaseNotFound,

    /// An active, unexpired lease already exists for the resource
    #[error("active lease already held on {resource} by {holder}")]
    Conflict { resource: String, holder: String },

    /// A business rule failed given the current record state or malformed details
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// The caller is not the lease holder
    #[error("caller is not the lease holder")]
    Forbidden,

    /// The lease TTL elapsed, or the lease is no longer redeemable
    #[error("lease is expired or no longer active")]
    Expired,

    /// Redemption parameters do not match the leased operation
    #[error("redemption does not match the leased operation: {0}")]
    MismatchedOperation(String),

    /// The storage backend failed
    #[error("storage failure: {0}")]
    Storage(String),
}
