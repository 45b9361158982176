use crate::error::LeaseError;
use crate::types::{Lease, LeaseStatus, LedgerEntry, ResourceRecord, ResourceRef};

/// Defines the contract for storage backends.
///
/// Two properties are load-bearing and must hold in every implementation:
/// `insert_active` is an atomic conditional insert (at most one Active lease
/// per resource key, with no check-then-act window), and
/// `commit_redemption` applies the lease flip, the ledger entries and the
/// record updates in one all-or-nothing transaction.
pub trait LeaseStore {
    /// Create or replace a guarded record
    fn put_resource(&mut self, record: ResourceRecord) -> Result<(), LeaseError>;

    /// Fetch a guarded record snapshot
    fn get_resource(&self, resource: &ResourceRef) -> Option<ResourceRecord>;

    /// Atomically insert a new Active lease, failing with `Conflict` if an
    /// active, unexpired lease already exists for the resource. Overdue
    /// leases on the same resource are expired in the same call.
    fn insert_active(&mut self, lease: Lease, now: u64) -> Result<Lease, LeaseError>;

    /// Look up a lease by token, in whatever state
    fn get_lease(&self, token: &str) -> Option<Lease>;

    /// The active lease for a resource, if any. Lazily expires an overdue
    /// one in the same read path.
    fn active_for(&mut self, resource: &ResourceRef, now: u64) -> Option<Lease>;

    /// Compare-and-set a lease from Active into a terminal state. Returns
    /// false if the lease is missing or already terminal.
    fn finish_lease(&mut self, token: &str, status: LeaseStatus) -> bool;

    /// Flip every overdue Active lease to Expired. Returns how many flipped.
    fn expire_overdue(&mut self, now: u64) -> usize;

    /// All currently active leases
    fn active_leases(&self) -> Vec<Lease>;

    /// Commit a redemption: write `entries` (Pending, then Completed),
    /// write back `resources`, and CAS the lease Active -> Completed, all
    /// in one transaction. Fails with `Expired` when the lease is no longer
    /// active; any failure leaves every collection untouched.
    fn commit_redemption(
        &mut self,
        token: &str,
        resources: Vec<ResourceRecord>,
        entries: Vec<LedgerEntry>,
    ) -> Result<(), LeaseError>;

    /// The audit trail recorded against a resource
    fn ledger_for(&self, resource: &ResourceRef) -> Vec<LedgerEntry>;
}
