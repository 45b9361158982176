//! SQLite-backed LeaseStore implementation.
//! Persists leases, guarded records and the ledger across restarts.
//!
//! Enable with the `sqlite` feature flag:
//! ```toml
//! opguard-core = { path = "../opguard-core", features = ["sqlite"] }
//! ```
//!
//! The one-active-lease-per-resource invariant is enforced by a partial
//! unique index on `(res_key) WHERE status = 'Active'`, so acquisition is
//! an atomic conditional insert rather than check-then-act. Redemption
//! uses a single transaction across the lease, ledger and resource tables.

use rusqlite::{params, Connection};

use crate::error::LeaseError;
use crate::infrastructure::LeaseStore;
use crate::types::*;

/// A persistent lease store backed by SQLite.
///
/// Uses WAL mode for concurrent read performance.
pub struct SqliteLeaseStore {
    conn: Connection,
}

fn storage(e: rusqlite::Error) -> LeaseError {
    LeaseError::Storage(e.to_string())
}

impl SqliteLeaseStore {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(path: &str) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS resources (
                key  TEXT PRIMARY KEY,
                body TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS leases (
                token        TEXT PRIMARY KEY,
                holder       TEXT NOT NULL,
                res_type     TEXT NOT NULL,
                res_id       TEXT NOT NULL,
                res_key      TEXT NOT NULL,
                operation    TEXT NOT NULL,
                details      TEXT NOT NULL,
                status       TEXT NOT NULL DEFAULT 'Active',
                requested_at INTEGER NOT NULL,
                ttl          INTEGER NOT NULL,
                expires_at   INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_leases_status ON leases(status);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_leases_one_active
                ON leases(res_key) WHERE status = 'Active';

            CREATE TABLE IF NOT EXISTS ledger (
                id          TEXT PRIMARY KEY,
                res_type    TEXT NOT NULL,
                res_id      TEXT NOT NULL,
                res_key     TEXT NOT NULL,
                lease_token TEXT NOT NULL,
                operation   TEXT NOT NULL,
                quantity    INTEGER NOT NULL,
                amount      REAL NOT NULL,
                destination TEXT,
                status      TEXT NOT NULL,
                recorded_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_ledger_resource ON ledger(res_key);",
        )?;

        Ok(Self { conn })
    }

    fn parse_operation(s: &str) -> Operation {
        match s {
            "Sale" => Operation::Sale,
            "Transfer" => Operation::Transfer,
            "Adjustment" => Operation::Adjustment,
            "Receive" => Operation::Receive,
            "Cancel" => Operation::Cancel,
            "Approve" => Operation::Approve,
            "Payment" => Operation::Payment,
            "Cancellation" => Operation::Cancellation,
            "Approval" => Operation::Approval,
            "StatusChange" => Operation::StatusChange,
            "AssetAssignment" => Operation::AssetAssignment,
            "LeaveApproval" => Operation::LeaveApproval,
            _ => Operation::Sale,
        }
    }

    fn parse_resource_type(s: &str) -> ResourceType {
        match s {
            "Document" => ResourceType::Document,
            "Employee" => ResourceType::Employee,
            "StockItem" => ResourceType::StockItem,
            "PurchaseOrder" => ResourceType::PurchaseOrder,
            _ => ResourceType::Document,
        }
    }

    fn parse_lease_status(s: &str) -> LeaseStatus {
        match s {
            "Active" => LeaseStatus::Active,
            "Completed" => LeaseStatus::Completed,
            "Expired" => LeaseStatus::Expired,
            "Cancelled" => LeaseStatus::Cancelled,
            _ => LeaseStatus::Active,
        }
    }

    fn parse_ledger_status(s: &str) -> LedgerStatus {
        match s {
            "Pending" => LedgerStatus::Pending,
            "Completed" => LedgerStatus::Completed,
            "Cancelled" => LedgerStatus::Cancelled,
            "Reversed" => LedgerStatus::Reversed,
            _ => LedgerStatus::Pending,
        }
    }

    fn row_to_lease(row: &rusqlite::Row) -> rusqlite::Result<Lease> {
        let res_type_str: String = row.get(2)?;
        let operation_str: String = row.get(5)?;
        let details_str: String = row.get(6)?;
        let status_str: String = row.get(7)?;

        Ok(Lease {
            token: row.get(0)?,
            holder: row.get(1)?,
            resource: ResourceRef::new(
                Self::parse_resource_type(&res_type_str),
                row.get::<_, String>(3)?,
            ),
            operation: Self::parse_operation(&operation_str),
            details: serde_json::from_str(&details_str).unwrap_or_default(),
            status: Self::parse_lease_status(&status_str),
            requested_at: row.get(8)?,
            ttl: row.get(9)?,
            expires_at: row.get(10)?,
        })
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<LedgerEntry> {
        let res_type_str: String = row.get(1)?;
        let operation_str: String = row.get(4)?;
        let status_str: String = row.get(8)?;

        Ok(LedgerEntry {
            id: row.get(0)?,
            resource: ResourceRef::new(
                Self::parse_resource_type(&res_type_str),
                row.get::<_, String>(2)?,
            ),
            lease_token: row.get(3)?,
            operation: Self::parse_operation(&operation_str),
            quantity: row.get(5)?,
            amount: row.get(6)?,
            destination: row.get(7)?,
            status: Self::parse_ledger_status(&status_str),
            recorded_at: row.get(9)?,
        })
    }

    fn active_holder(&self, res_key: &str) -> Option<String> {
        self.conn
            .query_row(
                "SELECT holder FROM leases WHERE res_key = ?1 AND status = 'Active'",
                params![res_key],
                |row| row.get(0),
            )
            .ok()
    }
}

const LEASE_COLUMNS: &str =
    "token, holder, res_type, res_id, res_key, operation, details, status, requested_at, ttl, expires_at";

impl LeaseStore for SqliteLeaseStore {
    fn put_resource(&mut self, record: ResourceRecord) -> Result<(), LeaseError> {
        let key = record.reference().key();
        let body = serde_json::to_string(&record).map_err(|e| LeaseError::Storage(e.to_string()))?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO resources (key, body) VALUES (?1, ?2)",
                params![key, body],
            )
            .map_err(storage)?;
        Ok(())
    }

    fn get_resource(&self, resource: &ResourceRef) -> Option<ResourceRecord> {
        let body: String = self
            .conn
            .query_row(
                "SELECT body FROM resources WHERE key = ?1",
                params![resource.key()],
                |row| row.get(0),
            )
            .ok()?;
        serde_json::from_str(&body).ok()
    }

    fn insert_active(&mut self, lease: Lease, now: u64) -> Result<Lease, LeaseError> {
        let key = lease.resource.key();

        // Lazy expiry for this resource before the conditional insert
        self.conn
            .execute(
                "UPDATE leases SET status = 'Expired'
                 WHERE res_key = ?1 AND status = 'Active' AND expires_at < ?2",
                params![key, now],
            )
            .map_err(storage)?;

        let details =
            serde_json::to_string(&lease.details).map_err(|e| LeaseError::Storage(e.to_string()))?;

        let inserted = self.conn.execute(
            "INSERT INTO leases (token, holder, res_type, res_id, res_key, operation, details, status, requested_at, ttl, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'Active', ?8, ?9, ?10)",
            params![
                lease.token,
                lease.holder,
                format!("{:?}", lease.resource.resource_type),
                lease.resource.id,
                key,
                format!("{:?}", lease.operation),
                details,
                lease.requested_at,
                lease.ttl,
                lease.expires_at,
            ],
        );

        match inserted {
            Ok(_) => Ok(lease),
            // The partial unique index rejected a second active lease
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(LeaseError::Conflict {
                    holder: self.active_holder(&key).unwrap_or_default(),
                    resource: key,
                })
            }
            Err(e) => Err(storage(e)),
        }
    }

    fn get_lease(&self, token: &str) -> Option<Lease> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM leases WHERE token = ?1", LEASE_COLUMNS),
                params![token],
                Self::row_to_lease,
            )
            .ok()
    }

    fn active_for(&mut self, resource: &ResourceRef, now: u64) -> Option<Lease> {
        let key = resource.key();
        self.conn
            .execute(
                "UPDATE leases SET status = 'Expired'
                 WHERE res_key = ?1 AND status = 'Active' AND expires_at < ?2",
                params![key, now],
            )
            .ok()?;
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM leases WHERE res_key = ?1 AND status = 'Active'",
                    LEASE_COLUMNS
                ),
                params![key],
                Self::row_to_lease,
            )
            .ok()
    }

    fn finish_lease(&mut self, token: &str, status: LeaseStatus) -> bool {
        let rows = self
            .conn
            .execute(
                "UPDATE leases SET status = ?1 WHERE token = ?2 AND status = 'Active'",
                params![format!("{:?}", status), token],
            )
            .unwrap_or(0);
        rows > 0
    }

    fn expire_overdue(&mut self, now: u64) -> usize {
        self.conn
            .execute(
                "UPDATE leases SET status = 'Expired' WHERE status = 'Active' AND expires_at < ?1",
                params![now],
            )
            .unwrap_or(0)
    }

    fn active_leases(&self) -> Vec<Lease> {
        let mut stmt = match self.conn.prepare(&format!(
            "SELECT {} FROM leases WHERE status = 'Active'",
            LEASE_COLUMNS
        )) {
            Ok(stmt) => stmt,
            Err(_) => return Vec::new(),
        };
        match stmt.query_map([], Self::row_to_lease) {
            Ok(rows) => rows.filter_map(|r| r.ok()).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn commit_redemption(
        &mut self,
        token: &str,
        resources: Vec<ResourceRecord>,
        entries: Vec<LedgerEntry>,
    ) -> Result<(), LeaseError> {
        let tx = self.conn.transaction().map_err(storage)?;

        for entry in &entries {
            tx.execute(
                "INSERT INTO ledger (id, res_type, res_id, res_key, lease_token, operation, quantity, amount, destination, status, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'Pending', ?10)",
                params![
                    entry.id,
                    format!("{:?}", entry.resource.resource_type),
                    entry.resource.id,
                    entry.resource.key(),
                    entry.lease_token,
                    format!("{:?}", entry.operation),
                    entry.quantity,
                    entry.amount,
                    entry.destination,
                    entry.recorded_at,
                ],
            )
            .map_err(storage)?;
        }

        for record in &resources {
            let key = record.reference().key();
            let body =
                serde_json::to_string(record).map_err(|e| LeaseError::Storage(e.to_string()))?;
            tx.execute(
                "INSERT OR REPLACE INTO resources (key, body) VALUES (?1, ?2)",
                params![key, body],
            )
            .map_err(storage)?;
        }

        tx.execute(
            "UPDATE ledger SET status = 'Completed' WHERE lease_token = ?1 AND status = 'Pending'",
            params![token],
        )
        .map_err(storage)?;

        let flipped = tx
            .execute(
                "UPDATE leases SET status = 'Completed' WHERE token = ?1 AND status = 'Active'",
                params![token],
            )
            .map_err(storage)?;
        if flipped == 0 {
            // Dropping the transaction rolls everything back
            return Err(LeaseError::Expired);
        }

        tx.commit().map_err(storage)
    }

    fn ledger_for(&self, resource: &ResourceRef) -> Vec<LedgerEntry> {
        let mut stmt = match self.conn.prepare(
            "SELECT id, res_type, res_id, lease_token, operation, quantity, amount, destination, status, recorded_at
             FROM ledger WHERE res_key = ?1 ORDER BY recorded_at",
        ) {
            Ok(stmt) => stmt,
            Err(_) => return Vec::new(),
        };
        match stmt.query_map(params![resource.key()], Self::row_to_entry) {
            Ok(rows) => rows.filter_map(|r| r.ok()).collect(),
            Err(_) => Vec::new(),
        }
    }
}
