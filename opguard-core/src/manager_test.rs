#[cfg(test)]
mod tests {
    use crate::error::LeaseError;
    use crate::executor::RedemptionPayload;
    use crate::manager::{LeaseManager, DEFAULT_TTL_MS};
    use crate::types::*;

    fn item_ref() -> ResourceRef {
        ResourceRef::new(ResourceType::StockItem, "itm_1")
    }

    fn manager_with_stock(quantity: i64) -> LeaseManager {
        let mut manager = LeaseManager::new();
        manager
            .put_resource(ResourceRecord::StockItem(StockItemRecord {
                id: "itm_1".to_string(),
                status: StockStatus::Active,
                quantity,
            }))
            .expect("seed");
        manager
    }

    fn sale_details(quantity: i64) -> OperationDetails {
        OperationDetails {
            quantity: Some(quantity),
            ..Default::default()
        }
    }

    fn sale_payload() -> RedemptionPayload {
        RedemptionPayload {
            operation: Operation::Sale,
            quantity: None,
            lines: Vec::new(),
        }
    }

    #[test]
    fn test_second_lease_request_conflicts() {
        let mut manager = manager_with_stock(5);

        let lease = manager
            .request(item_ref(), "actor_a", Operation::Sale, sale_details(5), 1_000)
            .expect("first lease should be granted");
        assert_eq!(lease.status, LeaseStatus::Active);
        assert_eq!(lease.expires_at, 1_000 + DEFAULT_TTL_MS);

        let second =
            manager.request(item_ref(), "actor_b", Operation::Sale, sale_details(1), 2_000);
        assert!(matches!(second, Err(LeaseError::Conflict { .. })));

        // The original lease is untouched
        let active = manager.get_active(&item_ref(), 2_000).expect("still active");
        assert_eq!(active.token, lease.token);
        assert_eq!(active.holder, "actor_a");
    }

    #[test]
    fn test_request_exceeding_stock_fails_precondition() {
        let mut manager = manager_with_stock(5);
        let result =
            manager.request(item_ref(), "actor_a", Operation::Sale, sale_details(10), 1_000);
        assert!(matches!(result, Err(LeaseError::PreconditionFailed(_))));
        assert!(manager.active_leases().is_empty());
    }

    #[test]
    fn test_request_on_missing_resource() {
        let mut manager = LeaseManager::new();
        let result =
            manager.request(item_ref(), "actor_a", Operation::Sale, sale_details(1), 1_000);
        assert!(matches!(result, Err(LeaseError::ResourceNotFound(_))));
    }

    #[test]
    fn test_expired_lease_cannot_be_redeemed_and_frees_resource() {
        let mut manager = manager_with_stock(5);
        let lease = manager
            .request(item_ref(), "actor_a", Operation::Sale, sale_details(5), 0)
            .expect("lease granted");

        // Six minutes later, one past the five minute TTL
        let later = 6 * 60 * 1000;
        let result = manager.redeem(&lease.token, "actor_a", &sale_payload(), later);
        assert!(matches!(result, Err(LeaseError::Expired)));

        // The resource is immediately leasable again
        let fresh = manager
            .request(item_ref(), "actor_b", Operation::Sale, sale_details(2), later)
            .expect("new lease after expiry");
        assert_eq!(fresh.holder, "actor_b");
    }

    #[test]
    fn test_get_active_lazily_expires() {
        let mut manager = manager_with_stock(5);
        manager
            .request(item_ref(), "actor_a", Operation::Sale, sale_details(5), 0)
            .expect("lease granted");

        assert!(manager.get_active(&item_ref(), 1_000).is_ok());
        let after_ttl = DEFAULT_TTL_MS + 1;
        assert!(matches!(
            manager.get_active(&item_ref(), after_ttl),
            Err(LeaseError::LeaseNotFound)
        ));
    }

    #[test]
    fn test_non_holder_release_is_forbidden() {
        let mut manager = manager_with_stock(5);
        let lease = manager
            .request(item_ref(), "actor_a", Operation::Sale, sale_details(5), 1_000)
            .expect("lease granted");

        let result = manager.release(&lease.token, "actor_b", 2_000);
        assert!(matches!(result, Err(LeaseError::Forbidden)));

        // Lease remains active for the real holder
        let active = manager.get_active(&item_ref(), 2_000).expect("still active");
        assert_eq!(active.status, LeaseStatus::Active);
    }

    #[test]
    fn test_release_completes_without_mutation() {
        let mut manager = manager_with_stock(5);
        let lease = manager
            .request(item_ref(), "actor_a", Operation::Sale, sale_details(5), 1_000)
            .expect("lease granted");

        manager.release(&lease.token, "actor_a", 2_000).expect("release");

        // No mutation ran: stock untouched, ledger empty
        let ResourceRecord::StockItem(item) =
            manager.get_resource(&item_ref()).expect("resource")
        else {
            panic!("expected stock item");
        };
        assert_eq!(item.quantity, 5);
        assert!(manager.ledger(&item_ref()).is_empty());

        // Terminal tokens read as not found
        assert!(matches!(
            manager.release(&lease.token, "actor_a", 3_000),
            Err(LeaseError::LeaseNotFound)
        ));
    }

    #[test]
    fn test_cancel_frees_resource() {
        let mut manager = manager_with_stock(5);
        let lease = manager
            .request(item_ref(), "actor_a", Operation::Sale, sale_details(5), 1_000)
            .expect("lease granted");

        manager.cancel(&lease.token, "actor_a", 2_000).expect("cancel");

        let stored = manager.active_leases();
        assert!(stored.is_empty());
        assert!(manager
            .request(item_ref(), "actor_b", Operation::Sale, sale_details(1), 3_000)
            .is_ok());
    }

    #[test]
    fn test_redeem_applies_mutation_once() {
        let mut manager = manager_with_stock(5);
        let lease = manager
            .request(item_ref(), "actor_a", Operation::Sale, sale_details(5), 1_000)
            .expect("lease granted");

        let result = manager
            .redeem(&lease.token, "actor_a", &sale_payload(), 2_000)
            .expect("redemption");
        assert_eq!(result.quantity, -5);
        assert_eq!(result.new_status, "Active");

        let ResourceRecord::StockItem(item) =
            manager.get_resource(&item_ref()).expect("resource")
        else {
            panic!("expected stock item");
        };
        assert_eq!(item.quantity, 0);

        let entries = manager.ledger(&item_ref());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, LedgerStatus::Completed);
        assert_eq!(entries[0].lease_token, lease.token);

        // Second redemption with the same token fails terminally
        let again = manager.redeem(&lease.token, "actor_a", &sale_payload(), 3_000);
        assert!(matches!(again, Err(LeaseError::Expired)));
    }

    #[test]
    fn test_redeem_by_non_holder_is_forbidden() {
        let mut manager = manager_with_stock(5);
        let lease = manager
            .request(item_ref(), "actor_a", Operation::Sale, sale_details(5), 1_000)
            .expect("lease granted");

        let result = manager.redeem(&lease.token, "actor_b", &sale_payload(), 2_000);
        assert!(matches!(result, Err(LeaseError::Forbidden)));
        assert_eq!(manager.active_leases().len(), 1);
    }

    #[test]
    fn test_redeem_with_wrong_operation_is_mismatched() {
        let mut manager = manager_with_stock(5);
        let lease = manager
            .request(item_ref(), "actor_a", Operation::Sale, sale_details(5), 1_000)
            .expect("lease granted");

        let wrong = RedemptionPayload {
            operation: Operation::Adjustment,
            quantity: None,
            lines: Vec::new(),
        };
        let result = manager.redeem(&lease.token, "actor_a", &wrong, 2_000);
        assert!(matches!(result, Err(LeaseError::MismatchedOperation(_))));
    }

    #[test]
    fn test_failed_redemption_leaves_everything_untouched() {
        let mut manager = manager_with_stock(5);
        let lease = manager
            .request(item_ref(), "actor_a", Operation::Sale, sale_details(5), 1_000)
            .expect("lease granted");

        // Stock drifts below the leased quantity through an external path
        manager
            .put_resource(ResourceRecord::StockItem(StockItemRecord {
                id: "itm_1".to_string(),
                status: StockStatus::Active,
                quantity: 3,
            }))
            .expect("overwrite");

        let result = manager.redeem(&lease.token, "actor_a", &sale_payload(), 2_000);
        assert!(matches!(result, Err(LeaseError::PreconditionFailed(_))));

        // All-or-nothing: no ledger entry, aggregate unchanged, lease still
        // active so the holder can cancel or retry
        assert!(manager.ledger(&item_ref()).is_empty());
        let ResourceRecord::StockItem(item) =
            manager.get_resource(&item_ref()).expect("resource")
        else {
            panic!("expected stock item");
        };
        assert_eq!(item.quantity, 3);
        assert_eq!(manager.active_leases().len(), 1);

        manager.cancel(&lease.token, "actor_a", 3_000).expect("cancel after failure");
    }

    #[test]
    fn test_partial_purchase_order_receipt() {
        let mut manager = LeaseManager::new();
        let po_ref = ResourceRef::new(ResourceType::PurchaseOrder, "po_1");

        manager
            .put_resource(ResourceRecord::PurchaseOrder(PurchaseOrderRecord {
                id: "po_1".to_string(),
                status: OrderStatus::Approved,
                lines: vec![
                    OrderLine { item_id: "itm_1".to_string(), ordered: 4, received: 0 },
                    OrderLine { item_id: "itm_2".to_string(), ordered: 6, received: 0 },
                    OrderLine { item_id: "itm_3".to_string(), ordered: 2, received: 0 },
                ],
            }))
            .expect("seed order");
        manager
            .put_resource(ResourceRecord::StockItem(StockItemRecord {
                id: "itm_1".to_string(),
                status: StockStatus::Active,
                quantity: 10,
            }))
            .expect("seed stock");

        let details = OperationDetails {
            lines: vec![
                ReceiptLine { item_id: "itm_1".to_string(), quantity: 4 },
                ReceiptLine { item_id: "itm_2".to_string(), quantity: 6 },
                ReceiptLine { item_id: "itm_3".to_string(), quantity: 2 },
            ],
            ..Default::default()
        };
        let lease = manager
            .request(po_ref.clone(), "actor_a", Operation::Receive, details, 1_000)
            .expect("receive lease");

        let payload = RedemptionPayload {
            operation: Operation::Receive,
            quantity: None,
            lines: vec![
                ReceiptLine { item_id: "itm_1".to_string(), quantity: 4 },
                ReceiptLine { item_id: "itm_2".to_string(), quantity: 6 },
            ],
        };
        let result = manager
            .redeem(&lease.token, "actor_a", &payload, 2_000)
            .expect("partial receipt");
        assert_eq!(result.new_status, "PartiallyReceived");
        assert_eq!(result.lines_applied.len(), 2);

        let ResourceRecord::PurchaseOrder(order) =
            manager.get_resource(&po_ref).expect("order")
        else {
            panic!("expected purchase order");
        };
        assert_eq!(order.status, OrderStatus::PartiallyReceived);
        assert_eq!(order.lines[0].received, 4);
        assert_eq!(order.lines[2].received, 0);

        // Inventory moved for the known stock item
        let ResourceRecord::StockItem(item) = manager
            .get_resource(&ResourceRef::new(ResourceType::StockItem, "itm_1"))
            .expect("stock")
        else {
            panic!("expected stock item");
        };
        assert_eq!(item.quantity, 14);

        // The remaining line can be received under a fresh lease
        let remainder = OperationDetails {
            lines: vec![ReceiptLine { item_id: "itm_3".to_string(), quantity: 2 }],
            ..Default::default()
        };
        let second = manager
            .request(po_ref.clone(), "actor_a", Operation::Receive, remainder, 3_000)
            .expect("second receive lease");
        let finish = RedemptionPayload {
            operation: Operation::Receive,
            quantity: None,
            lines: Vec::new(),
        };
        let result = manager
            .redeem(&second.token, "actor_a", &finish, 4_000)
            .expect("final receipt");
        assert_eq!(result.new_status, "Received");
    }

    #[test]
    fn test_sweep_reclaims_overdue_leases() {
        let mut manager = manager_with_stock(5);
        manager
            .put_resource(ResourceRecord::StockItem(StockItemRecord {
                id: "itm_2".to_string(),
                status: StockStatus::Active,
                quantity: 9,
            }))
            .expect("seed");

        manager
            .request(item_ref(), "actor_a", Operation::Sale, sale_details(1), 0)
            .expect("lease one");
        manager
            .request(
                ResourceRef::new(ResourceType::StockItem, "itm_2"),
                "actor_b",
                Operation::Sale,
                sale_details(1),
                0,
            )
            .expect("lease two");

        assert_eq!(manager.sweep_expired(DEFAULT_TTL_MS), 0);
        assert_eq!(manager.sweep_expired(DEFAULT_TTL_MS + 1), 2);
        assert!(manager.active_leases().is_empty());
    }
}
