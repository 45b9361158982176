use serde::{Deserialize, Serialize};

use super::{Operation, OperationDetails, ResourceRef};

/// Lease states. Completed, Expired and Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaseStatus {
    /// Lease is held and the resource is reserved
    Active,
    /// Lease was redeemed (or explicitly released) by its holder
    Completed,
    /// Lease TTL elapsed before redemption
    Expired,
    /// Lease was abandoned by its holder without redeeming
    Cancelled,
}

impl LeaseStatus {
    pub fn is_terminal(self) -> bool {
        self != LeaseStatus::Active
    }
}

/// A short-lived reservation granting one holder the exclusive right to
/// perform one pre-validated operation against one resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lease {
    /// Opaque unique token, handed to the holder as a capability
    pub token: String,
    /// Actor holding the lease
    pub holder: String,
    /// The guarded resource
    pub resource: ResourceRef,
    /// The operation this lease authorizes
    pub operation: Operation,
    /// Operation payload validated at request time
    pub details: OperationDetails,
    /// Current lease state
    pub status: LeaseStatus,
    /// When the lease was granted
    pub requested_at: u64,
    /// Time-to-live in milliseconds
    pub ttl: u64,
    /// When the lease will expire (requestedAt + ttl)
    pub expires_at: u64,
}

impl Lease {
    pub fn new(
        token: String,
        holder: String,
        resource: ResourceRef,
        operation: Operation,
        details: OperationDetails,
        ttl: u64,
        now: u64,
    ) -> Self {
        Self {
            token,
            holder,
            resource,
            operation,
            details,
            status: LeaseStatus::Active,
            requested_at: now,
            ttl,
            expires_at: now + ttl,
        }
    }

    /// An Active lease whose TTL has elapsed. Terminal leases are never
    /// considered expired here; they already left the Active state.
    pub fn is_overdue(&self, now: u64) -> bool {
        self.status == LeaseStatus::Active && self.expires_at < now
    }
}
