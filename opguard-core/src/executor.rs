//! Mutation planning for lease redemption.
//!
//! `MutationExecutor` is pure: given the lease, the current record snapshot
//! and the redemption payload it either produces a `MutationPlan` (the
//! post-mutation records plus the ledger entries to write) or an error.
//! The manager commits the plan through the store in a single transaction.
//! Holder and expiry checks happen in the manager before planning.

use nanoid::nanoid;
use serde::{Deserialize, Serialize};

use crate::error::LeaseError;
use crate::registry::ResourceRegistry;
use crate::types::{
    DocumentStatus, EmployeeStatus, Lease, LedgerEntry, Operation, OperationDetails, OrderStatus,
    ReceiptLine, ResourceRecord, ResourceRef, ResourceType,
};

/// What the holder submits when redeeming. Non-quantity parameters (amount,
/// destination, reason, ...) come from the lease itself: the leased details
/// are the pre-validated mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedemptionPayload {
    pub operation: Operation,
    /// Must equal the leased quantity when present (sale)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    /// Subset of the leased receipt lines to apply (receive). Empty means
    /// the full leased set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<ReceiptLine>,
}

/// Summary returned to the caller after a successful redemption
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationResult {
    pub token: String,
    pub resource: ResourceRef,
    pub operation: Operation,
    pub quantity: i64,
    pub amount: f64,
    /// Status of the primary record after the mutation
    pub new_status: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lines_applied: Vec<ReceiptLine>,
}

/// The computed outcome of a redemption, ready to commit atomically
#[derive(Debug, Clone)]
pub struct MutationPlan {
    /// Records to write back; the primary record first, then any stock
    /// items touched by a purchase-order receipt
    pub resources: Vec<ResourceRecord>,
    /// Ledger entries to record (inserted Pending, flipped Completed inside
    /// the commit transaction)
    pub entries: Vec<LedgerEntry>,
    pub result: MutationResult,
}

pub struct MutationExecutor;

impl MutationExecutor {
    /// Validates the payload against the lease and computes the mutation.
    ///
    /// `related` carries stock item records referenced by a purchase-order
    /// receipt; other operations ignore it. Business rules are re-checked
    /// against the current snapshot, so state drift since the lease was
    /// granted (e.g. stock sold through another order) surfaces here as
    /// `PreconditionFailed` and leaves the lease active.
    pub fn plan(
        lease: &Lease,
        record: &ResourceRecord,
        related: &[ResourceRecord],
        payload: &RedemptionPayload,
        now: u64,
    ) -> Result<MutationPlan, LeaseError> {
        if payload.operation != lease.operation {
            return Err(LeaseError::MismatchedOperation(format!(
                "leased {:?}, submitted {:?}",
                lease.operation, payload.operation
            )));
        }

        let lines = Self::validated_lines(lease, payload)?;
        Self::validate_quantity(lease, payload)?;

        // Re-run the precondition against the current snapshot. For receive
        // the effective details are the submitted line subset.
        let effective = if lease.operation == Operation::Receive {
            OperationDetails {
                lines: lines.clone(),
                ..lease.details.clone()
            }
        } else {
            lease.details.clone()
        };
        ResourceRegistry::check(record, lease.operation, &effective)?;

        match lease.operation {
            Operation::Sale | Operation::Transfer | Operation::Adjustment => {
                Self::plan_stock(lease, record, now)
            }
            Operation::Receive => Self::plan_receive(lease, record, related, &lines, now),
            Operation::Cancel | Operation::Approve => Self::plan_order_status(lease, record, now),
            Operation::Payment | Operation::Cancellation | Operation::Approval => {
                Self::plan_document(lease, record, now)
            }
            Operation::StatusChange | Operation::AssetAssignment | Operation::LeaveApproval => {
                Self::plan_employee(lease, record, now)
            }
        }
    }

    /// Resolves the effective receipt lines: the submitted subset, or the
    /// full leased set when the payload carries none. Every submitted line
    /// must match a leased line exactly.
    fn validated_lines(
        lease: &Lease,
        payload: &RedemptionPayload,
    ) -> Result<Vec<ReceiptLine>, LeaseError> {
        if lease.operation != Operation::Receive {
            return Ok(Vec::new());
        }
        if payload.lines.is_empty() {
            return Ok(lease.details.lines.clone());
        }
        for line in &payload.lines {
            let leased = lease
                .details
                .lines
                .iter()
                .find(|l| l.item_id == line.item_id)
                .ok_or_else(|| {
                    LeaseError::MismatchedOperation(format!(
                        "item '{}' is not on the lease",
                        line.item_id
                    ))
                })?;
            if leased.quantity != line.quantity {
                return Err(LeaseError::MismatchedOperation(format!(
                    "item '{}': leased quantity {}, submitted {}",
                    line.item_id, leased.quantity, line.quantity
                )));
            }
        }
        Ok(payload.lines.clone())
    }

    fn validate_quantity(lease: &Lease, payload: &RedemptionPayload) -> Result<(), LeaseError> {
        if !lease.operation.carries_quantity() || lease.operation == Operation::Receive {
            return Ok(());
        }
        let leased = lease.details.quantity.ok_or_else(|| {
            LeaseError::MismatchedOperation("lease carries no quantity".to_string())
        })?;
        if let Some(submitted) = payload.quantity {
            if submitted != leased {
                return Err(LeaseError::MismatchedOperation(format!(
                    "leased quantity {}, submitted {}",
                    leased, submitted
                )));
            }
        }
        Ok(())
    }

    fn plan_stock(
        lease: &Lease,
        record: &ResourceRecord,
        now: u64,
    ) -> Result<MutationPlan, LeaseError> {
        let ResourceRecord::StockItem(item) = record else {
            return Err(kind_mismatch(record, ResourceType::StockItem));
        };
        let mut item = item.clone();

        let delta = match lease.operation {
            Operation::Sale | Operation::Transfer => {
                -lease.details.quantity.unwrap_or(0) // positive, per registry
            }
            Operation::Adjustment => lease.details.quantity.unwrap_or(0),
            _ => 0,
        };
        item.quantity += delta;

        let entry = LedgerEntry::new(
            nanoid!(),
            lease.resource.clone(),
            lease.token.clone(),
            lease.operation,
            delta,
            0.0,
            lease.details.destination.clone(),
            now,
        );
        let updated = ResourceRecord::StockItem(item);
        let result = MutationResult {
            token: lease.token.clone(),
            resource: lease.resource.clone(),
            operation: lease.operation,
            quantity: delta,
            amount: 0.0,
            new_status: updated.status_label(),
            lines_applied: Vec::new(),
        };
        Ok(MutationPlan {
            resources: vec![updated],
            entries: vec![entry],
            result,
        })
    }

    fn plan_receive(
        lease: &Lease,
        record: &ResourceRecord,
        related: &[ResourceRecord],
        lines: &[ReceiptLine],
        now: u64,
    ) -> Result<MutationPlan, LeaseError> {
        let ResourceRecord::PurchaseOrder(order) = record else {
            return Err(kind_mismatch(record, ResourceType::PurchaseOrder));
        };
        let mut order = order.clone();
        let mut resources = Vec::new();
        let mut entries = Vec::new();
        let mut total_received = 0;

        for line in lines {
            let order_line = order
                .lines
                .iter_mut()
                .find(|l| l.item_id == line.item_id)
                .ok_or_else(|| {
                    // Registry already vetted this; a miss here means drift.
                    LeaseError::PreconditionFailed(format!(
                        "item '{}' is not on the order",
                        line.item_id
                    ))
                })?;
            order_line.received += line.quantity;
            total_received += line.quantity;

            // Bump the stock item's aggregate when the record is known to
            // the store; the receipt itself stands either way.
            if let Some(ResourceRecord::StockItem(item)) = related.iter().find(
                |r| matches!(r, ResourceRecord::StockItem(s) if s.id == line.item_id),
            ) {
                let mut item = item.clone();
                item.quantity += line.quantity;
                resources.push(ResourceRecord::StockItem(item));
            }

            entries.push(LedgerEntry::new(
                nanoid!(),
                ResourceRef::new(ResourceType::StockItem, line.item_id.clone()),
                lease.token.clone(),
                Operation::Receive,
                line.quantity,
                0.0,
                None,
                now,
            ));
        }

        // Full receipt closes the order; a partial one leaves it open.
        order.status = if order.fully_received() {
            OrderStatus::Received
        } else {
            OrderStatus::PartiallyReceived
        };

        let updated = ResourceRecord::PurchaseOrder(order);
        let result = MutationResult {
            token: lease.token.clone(),
            resource: lease.resource.clone(),
            operation: lease.operation,
            quantity: total_received,
            amount: 0.0,
            new_status: updated.status_label(),
            lines_applied: lines.to_vec(),
        };
        resources.insert(0, updated);
        Ok(MutationPlan {
            resources,
            entries,
            result,
        })
    }

    fn plan_order_status(
        lease: &Lease,
        record: &ResourceRecord,
        now: u64,
    ) -> Result<MutationPlan, LeaseError> {
        let ResourceRecord::PurchaseOrder(order) = record else {
            return Err(kind_mismatch(record, ResourceType::PurchaseOrder));
        };
        let mut order = order.clone();
        order.status = match lease.operation {
            Operation::Cancel => OrderStatus::Cancelled,
            Operation::Approve => OrderStatus::Approved,
            _ => order.status,
        };
        Self::status_only_plan(lease, ResourceRecord::PurchaseOrder(order), now)
    }

    fn plan_document(
        lease: &Lease,
        record: &ResourceRecord,
        now: u64,
    ) -> Result<MutationPlan, LeaseError> {
        let ResourceRecord::Document(doc) = record else {
            return Err(kind_mismatch(record, ResourceType::Document));
        };
        let mut doc = doc.clone();
        let mut amount = 0.0;

        match lease.operation {
            Operation::Payment => {
                amount = lease.details.amount.unwrap_or(0.0);
                doc.paid += amount;
                if doc.paid >= doc.total {
                    doc.status = DocumentStatus::Paid;
                }
            }
            Operation::Cancellation => doc.status = DocumentStatus::Cancelled,
            Operation::Approval => doc.status = DocumentStatus::Approved,
            _ => {}
        }

        let entry = LedgerEntry::new(
            nanoid!(),
            lease.resource.clone(),
            lease.token.clone(),
            lease.operation,
            0,
            amount,
            None,
            now,
        );
        let updated = ResourceRecord::Document(doc);
        let result = MutationResult {
            token: lease.token.clone(),
            resource: lease.resource.clone(),
            operation: lease.operation,
            quantity: 0,
            amount,
            new_status: updated.status_label(),
            lines_applied: Vec::new(),
        };
        Ok(MutationPlan {
            resources: vec![updated],
            entries: vec![entry],
            result,
        })
    }

    fn plan_employee(
        lease: &Lease,
        record: &ResourceRecord,
        now: u64,
    ) -> Result<MutationPlan, LeaseError> {
        let ResourceRecord::Employee(emp) = record else {
            return Err(kind_mismatch(record, ResourceType::Employee));
        };
        let mut emp = emp.clone();

        match lease.operation {
            Operation::StatusChange => {
                let target = lease.details.new_status.as_deref().unwrap_or("");
                // Parse is guaranteed by the registry re-check above.
                if let Some(status) = EmployeeStatus::parse(target) {
                    emp.status = status;
                }
            }
            Operation::LeaveApproval => emp.status = EmployeeStatus::OnLeave,
            Operation::AssetAssignment => {} // ledger-only
            _ => {}
        }

        Self::status_only_plan(lease, ResourceRecord::Employee(emp), now)
    }

    /// Shared tail for pure status-transition operations: one zero-quantity
    /// ledger entry plus the updated primary record.
    fn status_only_plan(
        lease: &Lease,
        updated: ResourceRecord,
        now: u64,
    ) -> Result<MutationPlan, LeaseError> {
        let entry = LedgerEntry::new(
            nanoid!(),
            lease.resource.clone(),
            lease.token.clone(),
            lease.operation,
            0,
            0.0,
            lease.details.destination.clone(),
            now,
        );
        let result = MutationResult {
            token: lease.token.clone(),
            resource: lease.resource.clone(),
            operation: lease.operation,
            quantity: 0,
            amount: 0.0,
            new_status: updated.status_label(),
            lines_applied: Vec::new(),
        };
        Ok(MutationPlan {
            resources: vec![updated],
            entries: vec![entry],
            result,
        })
    }
}

fn kind_mismatch(record: &ResourceRecord, expected: ResourceType) -> LeaseError {
    LeaseError::PreconditionFailed(format!(
        "expected a {} record, found {}",
        expected,
        record.resource_type()
    ))
}
