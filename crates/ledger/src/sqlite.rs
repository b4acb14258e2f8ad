//! SQLite state store
//!
//! Each submitted batch runs in one SQL transaction. The outcome is
//! recorded in a `receipts` table so `poll` works across restarts; a row is
//! deleted once its status has been polled, and rows nobody polled are
//! pruned after `RECEIPT_RETENTION`.
//!
//! Versions come from the single-row `version_counter` table so they keep
//! growing across deletes and restarts.

use async_trait::async_trait;
use cosign_core::{Address, Prefix};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::Mutex;

use crate::batch::{CommitStatus, Mutation, MutationBatch, Precondition, Receipt, StateEntry};
use crate::error::{LedgerError, LedgerResult};
use crate::store::StateStore;

/// Age after which an unpolled receipt is pruned (SQLite datetime modifier)
pub const RECEIPT_RETENTION: &str = "-1 day";

/// SQLite-backed state store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at the given database path
    pub fn new<P: AsRef<Path>>(path: P) -> LedgerResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> LedgerResult<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS state (
                address TEXT PRIMARY KEY,
                data BLOB NOT NULL,
                version INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS receipts (
                id TEXT PRIMARY KEY,
                status_json TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS version_counter (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                last INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO version_counter (id, last)
             SELECT 0, COALESCE(MAX(version), 0) FROM state",
            [],
        )?;

        Ok(())
    }
}

fn version_of(conn: &Connection, address: &Address) -> rusqlite::Result<Option<u64>> {
    conn.query_row(
        "SELECT version FROM state WHERE address = ?1",
        params![address.as_str()],
        |row| row.get::<_, i64>(0),
    )
    .optional()
    .map(|v| v.map(|v| v as u64))
}

fn row_to_entry(address: String, data: Vec<u8>, version: i64) -> LedgerResult<(Address, StateEntry)> {
    Ok((
        Address::new(address)?,
        StateEntry {
            data,
            version: version as u64,
        },
    ))
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn get(&self, addresses: &[Address]) -> LedgerResult<HashMap<Address, StateEntry>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT data, version FROM state WHERE address = ?1")?;

        let mut found = HashMap::new();
        for address in addresses {
            let row = stmt
                .query_row(params![address.as_str()], |row| {
                    Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, i64>(1)?))
                })
                .optional()?;
            if let Some((data, version)) = row {
                found.insert(
                    address.clone(),
                    StateEntry {
                        data,
                        version: version as u64,
                    },
                );
            }
        }
        Ok(found)
    }

    async fn list(&self, prefix: &Prefix) -> LedgerResult<Vec<(Address, StateEntry)>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT address, data, version FROM state
             WHERE substr(address, 1, ?2) = ?1
             ORDER BY address",
        )?;

        let rows = stmt
            .query_map(
                params![prefix.as_str(), prefix.as_str().len() as i64],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(address, data, version)| row_to_entry(address, data, version))
            .collect()
    }

    async fn submit(&self, batch: MutationBatch) -> LedgerResult<Receipt> {
        let mut conn = self.conn.lock().await;
        let receipt = Receipt::generate();
        let tx = conn.transaction()?;

        // Collect current versions first; `check` takes a plain closure.
        let mut versions: HashMap<Address, Option<u64>> = HashMap::new();
        let touched = batch
            .preconditions
            .iter()
            .map(|p| match p {
                Precondition::Version { address, .. }
                | Precondition::Absent { address }
                | Precondition::Present { address } => address,
            })
            .chain(batch.mutations.iter().map(Mutation::address));
        for address in touched {
            if !versions.contains_key(address) {
                versions.insert(address.clone(), version_of(&tx, address)?);
            }
        }

        let status = match batch.check(|a| versions.get(a).copied().flatten()) {
            Err(reason) => CommitStatus::Rejected { reason },
            Ok(()) => {
                let addresses: Vec<Address> = batch.addresses().into_iter().collect();
                let mut last_version: i64 = tx.query_row(
                    "SELECT last FROM version_counter WHERE id = 0",
                    [],
                    |row| row.get(0),
                )?;
                for mutation in &batch.mutations {
                    match mutation {
                        Mutation::Set { address, data } => {
                            last_version += 1;
                            tx.execute(
                                "INSERT INTO state (address, data, version) VALUES (?1, ?2, ?3)
                                 ON CONFLICT(address) DO UPDATE
                                 SET data = excluded.data, version = excluded.version",
                                params![address.as_str(), data, last_version],
                            )?;
                        }
                        Mutation::Delete { address } => {
                            tx.execute(
                                "DELETE FROM state WHERE address = ?1",
                                params![address.as_str()],
                            )?;
                        }
                    }
                }
                tx.execute(
                    "UPDATE version_counter SET last = ?1 WHERE id = 0",
                    params![last_version],
                )?;
                CommitStatus::Committed { addresses }
            }
        };

        tx.execute(
            "DELETE FROM receipts WHERE created_at < datetime('now', ?1)",
            params![RECEIPT_RETENTION],
        )?;
        tx.execute(
            "INSERT INTO receipts (id, status_json) VALUES (?1, ?2)",
            params![receipt.0, serde_json::to_string(&status)?],
        )?;
        tx.commit()?;

        tracing::trace!(receipt = %receipt, ?status, "sqlite store batch");
        Ok(receipt)
    }

    async fn poll(&self, receipt: &Receipt) -> LedgerResult<CommitStatus> {
        let conn = self.conn.lock().await;
        let status_json: Option<String> = conn
            .query_row(
                "SELECT status_json FROM receipts WHERE id = ?1",
                params![receipt.0],
                |row| row.get(0),
            )
            .optional()?;

        let status_json =
            status_json.ok_or_else(|| LedgerError::UnknownReceipt(receipt.to_string()))?;
        let status: CommitStatus = serde_json::from_str(&status_json)?;

        // statuses are stored terminal; the receipt has served its purpose
        conn.execute("DELETE FROM receipts WHERE id = ?1", params![receipt.0])?;
        Ok(status)
    }
}
