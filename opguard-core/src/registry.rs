//! Precondition evaluation for the four guardable record kinds.
//! Pure logic over a record snapshot; no side effects, no retries.

use crate::error::LeaseError;
use crate::types::{
    DocumentRecord, DocumentStatus, EmployeeRecord, EmployeeStatus, Operation, OperationDetails,
    OrderStatus, PurchaseOrderRecord, ResourceRecord, ResourceType, StockItemRecord, StockStatus,
};

/// Evaluates whether an operation may be leased against a record in its
/// current state, using a precomputed applicability matrix for O(1)
/// kind/operation scoping.
pub struct ResourceRegistry;

impl ResourceRegistry {
    /// Resource-kind x operation applicability.
    /// Rows: ResourceType. Cols: Operation.
    /// True = the operation is defined for this kind.
    ///
    /// Order: Sale(0), Transfer(1), Adjustment(2), Receive(3), Cancel(4),
    /// Approve(5), Payment(6), Cancellation(7), Approval(8),
    /// StatusChange(9), AssetAssignment(10), LeaveApproval(11)
    #[rustfmt::skip]
    const APPLICABILITY: [[bool; 12]; 4] = [
        //              Sale   Tran   Adj    Recv   Canc   Appr   Pay    Cncl   Apvl   Stat   Asst   Leav
        /* Document */ [false, false, false, false, false, false, true,  true,  true,  false, false, false],
        /* Employee */ [false, false, false, false, false, false, false, false, false, true,  true,  true ],
        /* StockItm */ [true,  true,  true,  false, false, false, false, false, false, false, false, false],
        /* PurchOrd */ [false, false, false, true,  true,  true,  false, false, false, false, false, false],
    ];

    /// O(1) check that an operation is defined for a resource kind
    pub fn applies(resource_type: ResourceType, operation: Operation) -> bool {
        Self::APPLICABILITY[resource_type.to_index()][operation.to_index()]
    }

    /// Full precondition check for leasing `operation` against `record`.
    pub fn check(
        record: &ResourceRecord,
        operation: Operation,
        details: &OperationDetails,
    ) -> Result<(), LeaseError> {
        if !Self::applies(record.resource_type(), operation) {
            return Err(LeaseError::PreconditionFailed(format!(
                "operation {:?} is not defined for {}",
                operation,
                record.resource_type()
            )));
        }

        match record {
            ResourceRecord::Document(doc) => Self::check_document(doc, operation, details),
            ResourceRecord::Employee(emp) => Self::check_employee(emp, operation, details),
            ResourceRecord::StockItem(item) => Self::check_stock_item(item, operation, details),
            ResourceRecord::PurchaseOrder(order) => Self::check_order(order, operation, details),
        }
    }

    fn check_document(
        doc: &DocumentRecord,
        operation: Operation,
        details: &OperationDetails,
    ) -> Result<(), LeaseError> {
        match operation {
            Operation::Payment => {
                if doc.status == DocumentStatus::Paid {
                    return Err(fail("document is already paid"));
                }
                if doc.status == DocumentStatus::Cancelled {
                    return Err(fail("document is cancelled"));
                }
                match details.amount {
                    Some(a) if a > 0.0 => {}
                    _ => return Err(fail("payment requires a positive amount")),
                }
                if details.payment_method.is_none() {
                    return Err(fail("payment requires a payment_method"));
                }
                Ok(())
            }
            Operation::Cancellation => {
                if matches!(doc.status, DocumentStatus::Paid | DocumentStatus::Cancelled) {
                    return Err(fail("document can no longer be cancelled"));
                }
                require_reason(details)
            }
            Operation::Approval => {
                if matches!(
                    doc.status,
                    DocumentStatus::Approved | DocumentStatus::Paid | DocumentStatus::Cancelled
                ) {
                    return Err(fail("document is not awaiting approval"));
                }
                Ok(())
            }
            _ => unreachable!("scoped by applicability matrix"),
        }
    }

    fn check_employee(
        emp: &EmployeeRecord,
        operation: Operation,
        details: &OperationDetails,
    ) -> Result<(), LeaseError> {
        match operation {
            Operation::StatusChange => {
                let target = details
                    .new_status
                    .as_deref()
                    .ok_or_else(|| fail("status change requires new_status"))?;
                let status = EmployeeStatus::parse(target)
                    .ok_or_else(|| fail(&format!("unknown employee status '{}'", target)))?;
                if status.is_final() && details.reason.is_none() {
                    return Err(fail("final status change requires a reason"));
                }
                Ok(())
            }
            Operation::AssetAssignment => {
                if emp.status != EmployeeStatus::Active {
                    return Err(fail("assets can only be assigned to active employees"));
                }
                if details.destination.is_none() {
                    return Err(fail("asset assignment requires a destination asset id"));
                }
                Ok(())
            }
            Operation::LeaveApproval => {
                if emp.status != EmployeeStatus::Active {
                    return Err(fail("leave can only be approved for active employees"));
                }
                Ok(())
            }
            _ => unreachable!("scoped by applicability matrix"),
        }
    }

    fn check_stock_item(
        item: &StockItemRecord,
        operation: Operation,
        details: &OperationDetails,
    ) -> Result<(), LeaseError> {
        match operation {
            Operation::Sale => {
                if item.status != StockStatus::Active {
                    return Err(fail("stock item is not active"));
                }
                let qty = require_quantity(details)?;
                if item.quantity < qty {
                    return Err(fail(&format!(
                        "insufficient stock: available {}, requested {}",
                        item.quantity, qty
                    )));
                }
                Ok(())
            }
            Operation::Transfer => {
                if item.status != StockStatus::Active {
                    return Err(fail("stock item is not active"));
                }
                if details.destination.is_none() {
                    return Err(fail("transfer requires a destination"));
                }
                let qty = require_quantity(details)?;
                if item.quantity < qty {
                    return Err(fail(&format!(
                        "insufficient stock: available {}, requested {}",
                        item.quantity, qty
                    )));
                }
                Ok(())
            }
            Operation::Adjustment => {
                if details.reason.is_none() {
                    return Err(fail("adjustment requires a reason"));
                }
                let delta = details
                    .quantity
                    .ok_or_else(|| fail("adjustment requires a quantity delta"))?;
                if delta == 0 {
                    return Err(fail("adjustment delta must be non-zero"));
                }
                if item.quantity + delta < 0 {
                    return Err(fail("adjustment would drive stock below zero"));
                }
                Ok(())
            }
            _ => unreachable!("scoped by applicability matrix"),
        }
    }

    fn check_order(
        order: &PurchaseOrderRecord,
        operation: Operation,
        details: &OperationDetails,
    ) -> Result<(), LeaseError> {
        match operation {
            Operation::Receive => {
                // Partial receipts re-enter through PartiallyReceived.
                if !matches!(
                    order.status,
                    OrderStatus::Approved | OrderStatus::PartiallyReceived
                ) {
                    return Err(fail("purchase order is not approved for receiving"));
                }
                if details.lines.is_empty() {
                    return Err(fail("receive requires at least one line"));
                }
                for line in &details.lines {
                    if line.quantity <= 0 {
                        return Err(fail("receive line quantity must be positive"));
                    }
                    let ordered = order
                        .lines
                        .iter()
                        .find(|l| l.item_id == line.item_id)
                        .ok_or_else(|| {
                            fail(&format!("item '{}' is not on the order", line.item_id))
                        })?;
                    if ordered.remaining() < line.quantity {
                        return Err(fail(&format!(
                            "item '{}': {} remaining, {} requested",
                            line.item_id,
                            ordered.remaining(),
                            line.quantity
                        )));
                    }
                }
                Ok(())
            }
            Operation::Approve => {
                if order.status != OrderStatus::Pending {
                    return Err(fail("only pending orders can be approved"));
                }
                Ok(())
            }
            Operation::Cancel => {
                if matches!(order.status, OrderStatus::Received | OrderStatus::Cancelled) {
                    return Err(fail("purchase order can no longer be cancelled"));
                }
                Ok(())
            }
            _ => unreachable!("scoped by applicability matrix"),
        }
    }
}

fn fail(msg: &str) -> LeaseError {
    LeaseError::PreconditionFailed(msg.to_string())
}

fn require_reason(details: &OperationDetails) -> Result<(), LeaseError> {
    if details.reason.is_none() {
        return Err(fail("operation requires a reason"));
    }
    Ok(())
}

fn require_quantity(details: &OperationDetails) -> Result<i64, LeaseError> {
    match details.quantity {
        Some(q) if q > 0 => Ok(q),
        _ => Err(fail("operation requires a positive quantity")),
    }
}
