use serde::{Deserialize, Serialize};

use opguard_core::types::{Lease, OperationDetails, ReceiptLine};

// ─── Validation Constants ───────────────────────────────────────────────────

const VALID_OPERATIONS: &[&str] = &[
    "SALE",
    "TRANSFER",
    "ADJUSTMENT",
    "RECEIVE",
    "CANCEL",
    "APPROVE",
    "PAYMENT",
    "CANCELLATION",
    "APPROVAL",
    "STATUS_CHANGE",
    "ASSET_ASSIGNMENT",
    "LEAVE_APPROVAL",
];

const VALID_RESOURCE_TYPES: &[&str] = &["DOCUMENT", "EMPLOYEE", "STOCK_ITEM", "PURCHASE_ORDER"];

// ─── Validation Helpers ─────────────────────────────────────────────────────

pub fn validate_operation(operation: &str) -> Result<(), String> {
    if VALID_OPERATIONS.contains(&operation.to_uppercase().as_str()) {
        Ok(())
    } else {
        Err(format!(
            "Invalid operation '{}'. Must be one of: {}",
            operation,
            VALID_OPERATIONS.join(", ")
        ))
    }
}

pub fn validate_resource_type(resource_type: &str) -> Result<(), String> {
    if VALID_RESOURCE_TYPES.contains(&resource_type.to_uppercase().as_str()) {
        Ok(())
    } else {
        Err(format!(
            "Invalid resource_type '{}'. Must be one of: {}",
            resource_type,
            VALID_RESOURCE_TYPES.join(", ")
        ))
    }
}

// ─── Request Types ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RequestLeaseBody {
    pub resource_type: String,
    pub resource_id: String,
    pub holder: String,
    pub operation: String,
    #[serde(default)]
    pub details: OperationDetails,
}

impl RequestLeaseBody {
    pub fn validate(&self) -> Result<(), String> {
        if self.resource_id.is_empty() {
            return Err("resource_id is required".to_string());
        }
        if self.holder.is_empty() {
            return Err("holder is required".to_string());
        }
        validate_resource_type(&self.resource_type)?;
        validate_operation(&self.operation)?;
        Ok(())
    }
}

#[derive(Deserialize)]
pub struct HolderBody {
    pub holder: String,
}

impl HolderBody {
    pub fn validate(&self) -> Result<(), String> {
        if self.holder.is_empty() {
            return Err("holder is required".to_string());
        }
        Ok(())
    }
}

#[derive(Deserialize)]
pub struct RedeemBody {
    pub holder: String,
    pub operation: String,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub lines: Vec<ReceiptLine>,
}

impl RedeemBody {
    pub fn validate(&self) -> Result<(), String> {
        if self.holder.is_empty() {
            return Err("holder is required".to_string());
        }
        validate_operation(&self.operation)?;
        Ok(())
    }
}

// ─── Response Types ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Lease view handed to API consumers; timestamps in both epoch millis and
/// ISO-8601 so integrators can use whichever fits.
#[derive(Serialize)]
pub struct LeaseInfo {
    pub token: String,
    pub holder: String,
    pub resource: String,
    pub operation: String,
    pub details: OperationDetails,
    pub status: String,
    pub expires_at: u64,
    pub expires_at_iso: String,
}

impl LeaseInfo {
    pub fn from_lease(lease: &Lease) -> Self {
        Self {
            token: lease.token.clone(),
            holder: lease.holder.clone(),
            resource: lease.resource.key(),
            operation: format!("{:?}", lease.operation),
            details: lease.details.clone(),
            status: format!("{:?}", lease.status),
            expires_at: lease.expires_at,
            expires_at_iso: iso_8601(lease.expires_at),
        }
    }
}

pub fn iso_8601(epoch_ms: u64) -> String {
    chrono::DateTime::from_timestamp_millis(epoch_ms as i64)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default()
}

#[derive(Serialize)]
pub struct SweepResponse {
    pub reclaimed: usize,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub active_leases: usize,
    pub version: String,
}
