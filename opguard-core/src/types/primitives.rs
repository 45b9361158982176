use serde::{Deserialize, Serialize};

/// The four guardable ERP record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    /// A financial document (invoice, credit note)
    Document,
    /// An employee record
    Employee,
    /// A stock item with an on-hand quantity
    StockItem,
    /// A purchase order with line items
    PurchaseOrder,
}

impl ResourceType {
    /// Returns the numeric index for O(1) applicability lookup
    pub fn to_index(self) -> usize {
        match self {
            ResourceType::Document => 0,
            ResourceType::Employee => 1,
            ResourceType::StockItem => 2,
            ResourceType::PurchaseOrder => 3,
        }
    }

    /// Parses the wire form used by the HTTP layer (e.g. "STOCK_ITEM").
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "DOCUMENT" => Some(ResourceType::Document),
            "EMPLOYEE" => Some(ResourceType::Employee),
            "STOCK_ITEM" => Some(ResourceType::StockItem),
            "PURCHASE_ORDER" => Some(ResourceType::PurchaseOrder),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceType::Document => write!(f, "DOCUMENT"),
            ResourceType::Employee => write!(f, "EMPLOYEE"),
            ResourceType::StockItem => write!(f, "STOCK_ITEM"),
            ResourceType::PurchaseOrder => write!(f, "PURCHASE_ORDER"),
        }
    }
}

/// A reference to a guarded record in the system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub resource_type: ResourceType,
    /// Record identifier within its collection (e.g. "itm_204")
    pub id: String,
}

impl ResourceRef {
    pub fn new(resource_type: ResourceType, id: impl Into<String>) -> Self {
        Self {
            resource_type,
            id: id.into(),
        }
    }

    /// Creates a canonical string key for the resource (used for uniqueness and lookups)
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource_type, self.id)
    }
}

/// The exclusive operations that can be leased, scoped per resource kind
/// by the registry's applicability matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Stock item: outbound sale of a fixed quantity
    Sale,
    /// Stock item: move quantity to another location
    Transfer,
    /// Stock item: signed quantity correction with a reason
    Adjustment,
    /// Purchase order: receive ordered line items into stock
    Receive,
    /// Purchase order: abandon the order
    Cancel,
    /// Purchase order: approve a pending order
    Approve,
    /// Document: record a payment against the total
    Payment,
    /// Document: void the document with a reason
    Cancellation,
    /// Document: approve for payment
    Approval,
    /// Employee: change employment status
    StatusChange,
    /// Employee: assign a company asset
    AssetAssignment,
    /// Employee: approve a leave request
    LeaveApproval,
}

impl Operation {
    /// Returns the numeric index for O(1) applicability lookup
    pub fn to_index(self) -> usize {
        match self {
            Operation::Sale => 0,
            Operation::Transfer => 1,
            Operation::Adjustment => 2,
            Operation::Receive => 3,
            Operation::Cancel => 4,
            Operation::Approve => 5,
            Operation::Payment => 6,
            Operation::Cancellation => 7,
            Operation::Approval => 8,
            Operation::StatusChange => 9,
            Operation::AssetAssignment => 10,
            Operation::LeaveApproval => 11,
        }
    }

    /// True for operations whose redemption quantity must equal the leased
    /// quantity exactly (partial redemption by quantity is never permitted).
    pub fn carries_quantity(self) -> bool {
        matches!(self, Operation::Sale | Operation::Receive)
    }

    /// Parses the wire form used by the HTTP layer (e.g. "STATUS_CHANGE").
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SALE" => Some(Operation::Sale),
            "TRANSFER" => Some(Operation::Transfer),
            "ADJUSTMENT" => Some(Operation::Adjustment),
            "RECEIVE" => Some(Operation::Receive),
            "CANCEL" => Some(Operation::Cancel),
            "APPROVE" => Some(Operation::Approve),
            "PAYMENT" => Some(Operation::Payment),
            "CANCELLATION" => Some(Operation::Cancellation),
            "APPROVAL" => Some(Operation::Approval),
            "STATUS_CHANGE" => Some(Operation::StatusChange),
            "ASSET_ASSIGNMENT" => Some(Operation::AssetAssignment),
            "LEAVE_APPROVAL" => Some(Operation::LeaveApproval),
            _ => None,
        }
    }
}

/// One line of a purchase-order receipt: a stock item and the quantity
/// taken into stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub item_id: String,
    pub quantity: i64,
}

/// Operation-specific payload captured at lease time. Which fields are
/// required depends on the leased operation; the registry rejects
/// malformed combinations before a lease is granted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<ReceiptLine>,
}
