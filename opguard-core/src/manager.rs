//! High-level ergonomic manager that wraps the pure registry/executor pair
//! with pluggable storage. The HTTP layer in opguard-cli delegates to this.

use std::time::{SystemTime, UNIX_EPOCH};

use nanoid::nanoid;

use crate::error::LeaseError;
use crate::executor::{MutationExecutor, MutationResult, RedemptionPayload};
use crate::infrastructure::LeaseStore;
use crate::infrastructure_in_memory::InMemoryLeaseStore;
use crate::registry::ResourceRegistry;
use crate::types::{
    Lease, LeaseStatus, LedgerEntry, Operation, OperationDetails, ResourceRecord, ResourceRef,
    ResourceType,
};

/// Default reservation window: five minutes.
pub const DEFAULT_TTL_MS: u64 = 5 * 60 * 1000;

/// Wall-clock milliseconds since the epoch, for callers without their own clock.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// The main entry point for using opguard. Orchestrates lease request,
/// release, cancel, redemption and expiry against a storage backend.
///
/// Every operation takes `now` explicitly; TTL behaviour is then fully
/// deterministic and testable. Service callers pass [`now_ms`].
pub struct LeaseManager {
    store: Box<dyn LeaseStore + Send>,
    ttl: u64,
}

impl LeaseManager {
    /// Create a manager over an empty in-memory store.
    pub fn new() -> Self {
        Self::with_store(Box::new(InMemoryLeaseStore::new()))
    }

    /// Create a manager backed by SQLite at the given path.
    /// Leases, records and the ledger persist across restarts.
    #[cfg(feature = "sqlite")]
    pub fn with_sqlite(path: &str) -> Result<Self, LeaseError> {
        let store = crate::infrastructure_sqlite::SqliteLeaseStore::open(path)
            .map_err(|e| LeaseError::Storage(format!("open '{}': {}", path, e)))?;
        Ok(Self::with_store(Box::new(store)))
    }

    pub fn with_store(store: Box<dyn LeaseStore + Send>) -> Self {
        Self {
            store,
            ttl: DEFAULT_TTL_MS,
        }
    }

    /// Override the fixed TTL applied to new leases.
    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = ttl;
        self
    }

    /// Seed or update a guarded record. This is the integration path for
    /// the surrounding application's ordinary CRUD; the aggregate fields
    /// guarded by active leases must only change through [`redeem`].
    ///
    /// [`redeem`]: LeaseManager::redeem
    pub fn put_resource(&mut self, record: ResourceRecord) -> Result<(), LeaseError> {
        self.store.put_resource(record)
    }

    pub fn get_resource(&self, resource: &ResourceRef) -> Option<ResourceRecord> {
        self.store.get_resource(resource)
    }

    /// Request an exclusive-operation lease: existence check, precondition
    /// check, then atomic conditional insert. Fails fast with `Conflict`
    /// when another active lease holds the resource.
    pub fn request(
        &mut self,
        resource: ResourceRef,
        holder: &str,
        operation: Operation,
        details: OperationDetails,
        now: u64,
    ) -> Result<Lease, LeaseError> {
        let record = self
            .store
            .get_resource(&resource)
            .ok_or_else(|| LeaseError::ResourceNotFound(resource.key()))?;

        ResourceRegistry::check(&record, operation, &details)?;

        let lease = Lease::new(
            nanoid!(),
            holder.to_string(),
            resource,
            operation,
            details,
            self.ttl,
            now,
        );
        self.store.insert_active(lease, now)
    }

    /// Holder releases the lease without running any mutation: Active -> Completed.
    pub fn release(&mut self, token: &str, holder: &str, now: u64) -> Result<(), LeaseError> {
        self.finish(token, holder, LeaseStatus::Completed, now)
    }

    /// Holder abandons the reservation: Active -> Cancelled.
    pub fn cancel(&mut self, token: &str, holder: &str, now: u64) -> Result<(), LeaseError> {
        self.finish(token, holder, LeaseStatus::Cancelled, now)
    }

    fn finish(
        &mut self,
        token: &str,
        holder: &str,
        status: LeaseStatus,
        now: u64,
    ) -> Result<(), LeaseError> {
        let lease = self.store.get_lease(token).ok_or(LeaseError::LeaseNotFound)?;
        if lease.status.is_terminal() {
            return Err(LeaseError::LeaseNotFound);
        }
        if lease.is_overdue(now) {
            self.store.finish_lease(token, LeaseStatus::Expired);
            return Err(LeaseError::Expired);
        }
        if lease.holder != holder {
            return Err(LeaseError::Forbidden);
        }
        if !self.store.finish_lease(token, status) {
            // Lost a race with expiry or another state change
            return Err(LeaseError::Expired);
        }
        Ok(())
    }

    /// Read-only lookup of the active lease on a resource, lazily expiring
    /// an overdue one.
    pub fn get_active(&mut self, resource: &ResourceRef, now: u64) -> Result<Lease, LeaseError> {
        self.store
            .active_for(resource, now)
            .ok_or(LeaseError::LeaseNotFound)
    }

    /// Redeem a lease: validate possession and parameters, plan the
    /// mutation against the current snapshot, and commit it atomically.
    /// On `PreconditionFailed` the lease stays active so the holder can
    /// retry with corrected parameters or cancel.
    pub fn redeem(
        &mut self,
        token: &str,
        holder: &str,
        payload: &RedemptionPayload,
        now: u64,
    ) -> Result<MutationResult, LeaseError> {
        let lease = self.store.get_lease(token).ok_or(LeaseError::LeaseNotFound)?;
        if lease.status.is_terminal() {
            return Err(LeaseError::Expired);
        }
        if lease.is_overdue(now) {
            self.store.finish_lease(token, LeaseStatus::Expired);
            return Err(LeaseError::Expired);
        }
        if lease.holder != holder {
            return Err(LeaseError::Forbidden);
        }

        let record = self
            .store
            .get_resource(&lease.resource)
            .ok_or_else(|| LeaseError::ResourceNotFound(lease.resource.key()))?;

        let related = self.related_records(&lease, payload);
        let plan = MutationExecutor::plan(&lease, &record, &related, payload, now)?;

        self.store
            .commit_redemption(token, plan.resources, plan.entries)?;
        Ok(plan.result)
    }

    /// Stock items referenced by a purchase-order receipt, so their
    /// quantity aggregates move in the same transaction.
    fn related_records(&self, lease: &Lease, payload: &RedemptionPayload) -> Vec<ResourceRecord> {
        if lease.operation != Operation::Receive {
            return Vec::new();
        }
        let lines = if payload.lines.is_empty() {
            &lease.details.lines
        } else {
            &payload.lines
        };
        lines
            .iter()
            .filter_map(|line| {
                self.store
                    .get_resource(&ResourceRef::new(ResourceType::StockItem, line.item_id.clone()))
            })
            .collect()
    }

    /// Flip every overdue lease to Expired. Returns the number reclaimed.
    pub fn sweep_expired(&mut self, now: u64) -> usize {
        self.store.expire_overdue(now)
    }

    /// All currently active leases.
    pub fn active_leases(&self) -> Vec<Lease> {
        self.store.active_leases()
    }

    /// The audit trail recorded against a resource.
    pub fn ledger(&self, resource: &ResourceRef) -> Vec<LedgerEntry> {
        self.store.ledger_for(resource)
    }
}

impl Default for LeaseManager {
    fn default() -> Self {
        Self::new()
    }
}
