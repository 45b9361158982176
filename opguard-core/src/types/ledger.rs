use serde::{Deserialize, Serialize};

use super::{Operation, ResourceRef};

/// Ledger entry states. Entries are written Pending inside the redemption
/// transaction and flipped to Completed before it commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerStatus {
    Pending,
    Completed,
    Cancelled,
    Reversed,
}

/// An immutable record of one applied mutation. The audit trail: aggregate
/// fields on guarded records are derived by applying completed entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry id
    pub id: String,
    /// The record this entry was applied to
    pub resource: ResourceRef,
    /// Token of the lease that authorized the mutation
    pub lease_token: String,
    pub operation: Operation,
    /// Signed quantity movement; zero for pure status transitions
    pub quantity: i64,
    /// Monetary value; zero when not applicable
    pub amount: f64,
    /// Transfer destination or assigned asset, when the operation has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    pub status: LedgerStatus,
    pub recorded_at: u64,
}

impl LedgerEntry {
    pub fn new(
        id: String,
        resource: ResourceRef,
        lease_token: String,
        operation: Operation,
        quantity: i64,
        amount: f64,
        destination: Option<String>,
        now: u64,
    ) -> Self {
        Self {
            id,
            resource,
            lease_token,
            operation,
            quantity,
            amount,
            destination,
            status: LedgerStatus::Pending,
            recorded_at: now,
        }
    }
}
