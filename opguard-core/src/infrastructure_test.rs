#[cfg(test)]
mod tests {
    use crate::error::LeaseError;
    use crate::infrastructure::LeaseStore;
    use crate::infrastructure_in_memory::InMemoryLeaseStore;
    use crate::types::*;

    fn item_ref() -> ResourceRef {
        ResourceRef::new(ResourceType::StockItem, "itm_1")
    }

    fn sale_lease(token: &str, holder: &str, now: u64) -> Lease {
        Lease::new(
            token.to_string(),
            holder.to_string(),
            item_ref(),
            Operation::Sale,
            OperationDetails {
                quantity: Some(5),
                ..Default::default()
            },
            300_000,
            now,
        )
    }

    fn stock_item(quantity: i64) -> ResourceRecord {
        ResourceRecord::StockItem(StockItemRecord {
            id: "itm_1".to_string(),
            status: StockStatus::Active,
            quantity,
        })
    }

    #[test]
    fn test_in_memory_conditional_insert_rejects_second_active() {
        let mut store = InMemoryLeaseStore::new();

        store
            .insert_active(sale_lease("tok_1", "actor_a", 1_000), 1_000)
            .expect("first insert");
        let second = store.insert_active(sale_lease("tok_2", "actor_b", 2_000), 2_000);
        let Err(LeaseError::Conflict { holder, .. }) = second else {
            panic!("expected Conflict");
        };
        assert_eq!(holder, "actor_a");
        assert_eq!(store.active_leases().len(), 1);
    }

    #[test]
    fn test_in_memory_insert_after_lazy_expiry() {
        let mut store = InMemoryLeaseStore::new();
        store
            .insert_active(sale_lease("tok_1", "actor_a", 0), 0)
            .expect("first insert");

        // The first lease is overdue by the time the second arrives
        let lease = store
            .insert_active(sale_lease("tok_2", "actor_b", 300_001), 300_001)
            .expect("insert after expiry");
        assert_eq!(lease.token, "tok_2");
        assert_eq!(
            store.get_lease("tok_1").map(|l| l.status),
            Some(LeaseStatus::Expired)
        );
    }

    #[test]
    fn test_in_memory_finish_is_compare_and_set() {
        let mut store = InMemoryLeaseStore::new();
        store
            .insert_active(sale_lease("tok_1", "actor_a", 1_000), 1_000)
            .expect("insert");

        assert!(store.finish_lease("tok_1", LeaseStatus::Cancelled));
        // Terminal states are final
        assert!(!store.finish_lease("tok_1", LeaseStatus::Completed));
        assert!(!store.finish_lease("tok_missing", LeaseStatus::Completed));
    }

    #[test]
    fn test_in_memory_expire_overdue() {
        let mut store = InMemoryLeaseStore::new();
        store
            .insert_active(sale_lease("tok_1", "actor_a", 0), 0)
            .expect("insert");

        assert_eq!(store.expire_overdue(300_000), 0);
        assert_eq!(store.expire_overdue(300_001), 1);
        assert!(store.active_leases().is_empty());
    }

    #[test]
    fn test_in_memory_commit_requires_active_lease() {
        let mut store = InMemoryLeaseStore::new();
        store.put_resource(stock_item(5)).expect("seed");
        let result = store.commit_redemption("tok_ghost", vec![stock_item(0)], Vec::new());
        assert!(matches!(result, Err(LeaseError::Expired)));

        // The record write was rolled up with the failure
        let ResourceRecord::StockItem(item) = store.get_resource(&item_ref()).expect("record")
        else {
            panic!("expected stock item");
        };
        assert_eq!(item.quantity, 5);
    }

    #[test]
    fn test_in_memory_commit_completes_entries_and_lease() {
        let mut store = InMemoryLeaseStore::new();
        store.put_resource(stock_item(5)).expect("seed");
        store
            .insert_active(sale_lease("tok_1", "actor_a", 1_000), 1_000)
            .expect("insert");

        let entry = LedgerEntry::new(
            "led_1".to_string(),
            item_ref(),
            "tok_1".to_string(),
            Operation::Sale,
            -5,
            0.0,
            None,
            2_000,
        );
        store
            .commit_redemption("tok_1", vec![stock_item(0)], vec![entry])
            .expect("commit");

        assert_eq!(
            store.get_lease("tok_1").map(|l| l.status),
            Some(LeaseStatus::Completed)
        );
        let entries = store.ledger_for(&item_ref());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, LedgerStatus::Completed);
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod sqlite_tests {
    use crate::error::LeaseError;
    use crate::infrastructure::LeaseStore;
    use crate::infrastructure_sqlite::SqliteLeaseStore;
    use crate::types::*;

    fn open_store(dir: &tempfile::TempDir) -> SqliteLeaseStore {
        let path = dir.path().join("opguard.db");
        SqliteLeaseStore::open(path.to_str().expect("utf-8 path")).expect("open store")
    }

    fn item_ref() -> ResourceRef {
        ResourceRef::new(ResourceType::StockItem, "itm_1")
    }

    fn sale_lease(token: &str, holder: &str, now: u64) -> Lease {
        Lease::new(
            token.to_string(),
            holder.to_string(),
            item_ref(),
            Operation::Sale,
            OperationDetails {
                quantity: Some(5),
                ..Default::default()
            },
            300_000,
            now,
        )
    }

    fn stock_item(quantity: i64) -> ResourceRecord {
        ResourceRecord::StockItem(StockItemRecord {
            id: "itm_1".to_string(),
            status: StockStatus::Active,
            quantity,
        })
    }

    #[test]
    fn test_sqlite_resource_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = open_store(&dir);

        store.put_resource(stock_item(7)).expect("put");
        let ResourceRecord::StockItem(item) = store.get_resource(&item_ref()).expect("get")
        else {
            panic!("expected stock item");
        };
        assert_eq!(item.quantity, 7);
    }

    #[test]
    fn test_sqlite_unique_index_rejects_second_active() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = open_store(&dir);

        store
            .insert_active(sale_lease("tok_1", "actor_a", 1_000), 1_000)
            .expect("first insert");
        let second = store.insert_active(sale_lease("tok_2", "actor_b", 2_000), 2_000);
        let Err(LeaseError::Conflict { holder, .. }) = second else {
            panic!("expected Conflict");
        };
        assert_eq!(holder, "actor_a");
    }

    #[test]
    fn test_sqlite_insert_after_expiry_and_lease_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = open_store(&dir);

        store
            .insert_active(sale_lease("tok_1", "actor_a", 0), 0)
            .expect("insert");
        store
            .insert_active(sale_lease("tok_2", "actor_b", 300_001), 300_001)
            .expect("insert after expiry");

        let expired = store.get_lease("tok_1").expect("lease one");
        assert_eq!(expired.status, LeaseStatus::Expired);

        let active = store.active_for(&item_ref(), 300_002).expect("active");
        assert_eq!(active.token, "tok_2");
        assert_eq!(active.details.quantity, Some(5));
        assert_eq!(active.operation, Operation::Sale);
    }

    #[test]
    fn test_sqlite_commit_redemption_atomicity() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = open_store(&dir);

        store.put_resource(stock_item(5)).expect("seed");
        store
            .insert_active(sale_lease("tok_1", "actor_a", 1_000), 1_000)
            .expect("insert");

        let entry = LedgerEntry::new(
            "led_1".to_string(),
            item_ref(),
            "tok_1".to_string(),
            Operation::Sale,
            -5,
            0.0,
            None,
            2_000,
        );
        store
            .commit_redemption("tok_1", vec![stock_item(0)], vec![entry.clone()])
            .expect("commit");

        let entries = store.ledger_for(&item_ref());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, LedgerStatus::Completed);
        assert_eq!(
            store.get_lease("tok_1").map(|l| l.status),
            Some(LeaseStatus::Completed)
        );

        // A second commit against the now-terminal lease rolls back fully
        let entry_2 = LedgerEntry {
            id: "led_2".to_string(),
            ..entry
        };
        let again = store.commit_redemption("tok_1", vec![stock_item(-5)], vec![entry_2]);
        assert!(matches!(again, Err(LeaseError::Expired)));
        assert_eq!(store.ledger_for(&item_ref()).len(), 1);
        let ResourceRecord::StockItem(item) = store.get_resource(&item_ref()).expect("record")
        else {
            panic!("expected stock item");
        };
        assert_eq!(item.quantity, 0);
    }
}
