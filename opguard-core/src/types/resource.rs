use serde::{Deserialize, Serialize};

use super::{ResourceRef, ResourceType};

/// Financial document statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentStatus {
    Draft,
    Submitted,
    Approved,
    Paid,
    Cancelled,
}

/// Employee statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmployeeStatus {
    Active,
    OnLeave,
    Suspended,
    Terminated,
    Retired,
    Deceased,
}

impl EmployeeStatus {
    /// Parses the wire form used in `details.new_status` (e.g. "ON_LEAVE").
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ACTIVE" => Some(EmployeeStatus::Active),
            "ON_LEAVE" => Some(EmployeeStatus::OnLeave),
            "SUSPENDED" => Some(EmployeeStatus::Suspended),
            "TERMINATED" => Some(EmployeeStatus::Terminated),
            "RETIRED" => Some(EmployeeStatus::Retired),
            "DECEASED" => Some(EmployeeStatus::Deceased),
            _ => None,
        }
    }

    /// Statuses that end employment; a status change into one of these
    /// requires a recorded reason.
    pub fn is_final(self) -> bool {
        matches!(
            self,
            EmployeeStatus::Terminated | EmployeeStatus::Retired | EmployeeStatus::Deceased
        )
    }
}

/// Stock item statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockStatus {
    Active,
    Inactive,
    Discontinued,
}

/// Purchase order statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Approved,
    /// Some lines received; the order remains open
    PartiallyReceived,
    Received,
    Cancelled,
}

/// A financial document with a running paid aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub status: DocumentStatus,
    pub total: f64,
    pub paid: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub id: String,
    pub status: EmployeeStatus,
}

/// A stock item whose `quantity` aggregate is derived from ledger entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockItemRecord {
    pub id: String,
    pub status: StockStatus,
    pub quantity: i64,
}

/// One ordered line on a purchase order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: String,
    pub ordered: i64,
    pub received: i64,
}

impl OrderLine {
    pub fn remaining(&self) -> i64 {
        self.ordered - self.received
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderRecord {
    pub id: String,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
}

impl PurchaseOrderRecord {
    pub fn fully_received(&self) -> bool {
        self.lines.iter().all(|l| l.remaining() <= 0)
    }
}

/// A guarded record of any of the four kinds. Stored and transported as a
/// tagged JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResourceRecord {
    Document(DocumentRecord),
    Employee(EmployeeRecord),
    StockItem(StockItemRecord),
    PurchaseOrder(PurchaseOrderRecord),
}

impl ResourceRecord {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            ResourceRecord::Document(_) => ResourceType::Document,
            ResourceRecord::Employee(_) => ResourceType::Employee,
            ResourceRecord::StockItem(_) => ResourceType::StockItem,
            ResourceRecord::PurchaseOrder(_) => ResourceType::PurchaseOrder,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ResourceRecord::Document(d) => &d.id,
            ResourceRecord::Employee(e) => &e.id,
            ResourceRecord::StockItem(s) => &s.id,
            ResourceRecord::PurchaseOrder(p) => &p.id,
        }
    }

    pub fn reference(&self) -> ResourceRef {
        ResourceRef::new(self.resource_type(), self.id())
    }

    /// Current status rendered as its canonical string (e.g. "Approved")
    pub fn status_label(&self) -> String {
        match self {
            ResourceRecord::Document(d) => format!("{:?}", d.status),
            ResourceRecord::Employee(e) => format!("{:?}", e.status),
            ResourceRecord::StockItem(s) => format!("{:?}", s.status),
            ResourceRecord::PurchaseOrder(p) => format!("{:?}", p.status),
        }
    }
}
