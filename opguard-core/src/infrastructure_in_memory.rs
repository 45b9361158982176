use std::collections::HashMap;

use crate::error::LeaseError;
use crate::infrastructure::LeaseStore;
use crate::types::{Lease, LeaseStatus, LedgerEntry, LedgerStatus, ResourceRecord, ResourceRef};

/// Volatile store for tests and single-process embedding. Atomicity of
/// `insert_active` and `commit_redemption` follows from `&mut self`: the
/// caller holds the only handle for the duration of the call.
pub struct InMemoryLeaseStore {
    // Map of resource key -> record
    resources: HashMap<String, ResourceRecord>,
    // Map of token -> lease
    leases: HashMap<String, Lease>,
    // Map of resource key -> token of the Active lease, kept in lockstep
    // with `leases` so conflict checks are O(1)
    active_index: HashMap<String, String>,
    ledger: Vec<LedgerEntry>,
}

impl InMemoryLeaseStore {
    pub fn new() -> Self {
        Self {
            resources: HashMap::new(),
            leases: HashMap::new(),
            active_index: HashMap::new(),
            ledger: Vec::new(),
        }
    }

    /// Expires the indexed lease for `key` if overdue, clearing the index slot.
    fn expire_slot(&mut self, key: &str, now: u64) {
        let Some(token) = self.active_index.get(key).cloned() else {
            return;
        };
        let overdue = self
            .leases
            .get(&token)
            .map(|l| l.is_overdue(now))
            .unwrap_or(false);
        if overdue {
            if let Some(lease) = self.leases.get_mut(&token) {
                lease.status = LeaseStatus::Expired;
            }
            self.active_index.remove(key);
        }
    }
}

impl Default for InMemoryLeaseStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LeaseStore for InMemoryLeaseStore {
    fn put_resource(&mut self, record: ResourceRecord) -> Result<(), LeaseError> {
        self.resources.insert(record.reference().key(), record);
        Ok(())
    }

    fn get_resource(&self, resource: &ResourceRef) -> Option<ResourceRecord> {
        self.resources.get(&resource.key()).cloned()
    }

    fn insert_active(&mut self, lease: Lease, now: u64) -> Result<Lease, LeaseError> {
        let key = lease.resource.key();
        self.expire_slot(&key, now);

        if let Some(token) = self.active_index.get(&key) {
            let holder = self
                .leases
                .get(token)
                .map(|l| l.holder.clone())
                .unwrap_or_default();
            return Err(LeaseError::Conflict {
                resource: key,
                holder,
            });
        }

        self.active_index.insert(key, lease.token.clone());
        self.leases.insert(lease.token.clone(), lease.clone());
        Ok(lease)
    }

    fn get_lease(&self, token: &str) -> Option<Lease> {
        self.leases.get(token).cloned()
    }

    fn active_for(&mut self, resource: &ResourceRef, now: u64) -> Option<Lease> {
        let key = resource.key();
        self.expire_slot(&key, now);
        let token = self.active_index.get(&key)?;
        self.leases.get(token).cloned()
    }

    fn finish_lease(&mut self, token: &str, status: LeaseStatus) -> bool {
        let Some(lease) = self.leases.get_mut(token) else {
            return false;
        };
        if lease.status != LeaseStatus::Active {
            return false;
        }
        lease.status = status;
        self.active_index.remove(&lease.resource.key());
        true
    }

    fn expire_overdue(&mut self, now: u64) -> usize {
        let mut expired = 0;
        for lease in self.leases.values_mut() {
            if lease.is_overdue(now) {
                lease.status = LeaseStatus::Expired;
                self.active_index.remove(&lease.resource.key());
                expired += 1;
            }
        }
        expired
    }

    fn active_leases(&self) -> Vec<Lease> {
        self.leases
            .values()
            .filter(|l| l.status == LeaseStatus::Active)
            .cloned()
            .collect()
    }

    fn commit_redemption(
        &mut self,
        token: &str,
        resources: Vec<ResourceRecord>,
        entries: Vec<LedgerEntry>,
    ) -> Result<(), LeaseError> {
        // Validate before touching anything; after this point every write
        // is infallible, so the commit is all-or-nothing.
        match self.leases.get(token) {
            Some(lease) if lease.status == LeaseStatus::Active => {}
            _ => return Err(LeaseError::Expired),
        }

        for mut entry in entries {
            entry.status = LedgerStatus::Completed;
            self.ledger.push(entry);
        }
        for record in resources {
            self.resources.insert(record.reference().key(), record);
        }
        self.finish_lease(token, LeaseStatus::Completed);
        Ok(())
    }

    fn ledger_for(&self, resource: &ResourceRef) -> Vec<LedgerEntry> {
        let key = resource.key();
        self.ledger
            .iter()
            .filter(|e| e.resource.key() == key)
            .cloned()
            .collect()
    }
}
