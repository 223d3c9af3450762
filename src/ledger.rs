//! Durable ledger of applied transformations
//!
//! One SQLite table, one row per applied transformation. Rows are created
//! exactly once, at the moment the external executor completes without
//! error, and are never updated or deleted by this tool.
//!
//! The connection runs with `locking_mode=EXCLUSIVE` and takes the database
//! file lock up front, so a second runner pointed at the same ledger fails
//! fast with `LedgerBusy` instead of racing the apply loop. The lock lives
//! in the connection, not on disk: it is released on every exit path,
//! including crashes. Should two writers slip through anyway, the primary
//! key on `identifier` turns the second insert into a fatal `DuplicateKey`.

use std::collections::BTreeSet;
use std::path::Path;

use log::debug;
use rusqlite::{Connection, ErrorCode, params};

use crate::error::{KtrunError, Result};

/// Persistent record of which transformation identifiers have been applied.
#[derive(Debug)]
pub struct Ledger {
    conn: Connection,
    table: String,
}

impl Ledger {
    /// Open (creating if necessary) the ledger database, ensure the schema
    /// exists, and take the exclusive lock for the lifetime of this process.
    ///
    /// `table` must already be sanitized; it is interpolated into DDL/DML.
    pub fn open(path: &Path, table: &str) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| KtrunError::Connection {
            path: path.to_path_buf(),
            source,
        })?;
        let ledger = Self {
            conn,
            table: table.to_string(),
        };
        ledger.ensure_schema()?;
        ledger.lock_exclusive()?;
        Ok(ledger)
    }

    /// Idempotently create the ledger table.
    ///
    /// Creation is conditional, so two processes bootstrapping the same
    /// database do not trip over each other.
    pub fn ensure_schema(&self) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS \"{}\" (
                         identifier INTEGER NOT NULL PRIMARY KEY,
                         applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
                     )",
                    self.table
                ),
                [],
            )
            .map_err(map_busy)?;
        Ok(())
    }

    /// Hold the database's exclusive file lock for the connection lifetime.
    fn lock_exclusive(&self) -> Result<()> {
        // locking_mode returns the new mode as a row, so query it rather
        // than execute it
        let mode: String = self
            .conn
            .query_row("PRAGMA locking_mode = EXCLUSIVE", [], |row| row.get(0))
            .map_err(map_busy)?;
        debug!("ledger locking mode: {mode}");

        // The exclusive lock is only taken on the first write; force one so
        // a competing runner is rejected now, not mid-run
        self.conn
            .execute_batch("BEGIN EXCLUSIVE; COMMIT;")
            .map_err(map_busy)?;
        Ok(())
    }

    /// Greatest applied identifier, or `None` for an empty ledger.
    pub fn max_applied(&self) -> Result<Option<u64>> {
        let max: Option<i64> = self
            .conn
            .query_row(
                &format!("SELECT MAX(identifier) FROM \"{}\"", self.table),
                [],
                |row| row.get(0),
            )
            .map_err(map_busy)?;
        Ok(max.map(|m| m as u64))
    }

    /// Every applied identifier, ascending.
    pub fn applied_set(&self) -> Result<BTreeSet<u64>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT identifier FROM \"{}\" ORDER BY identifier",
                self.table
            ))
            .map_err(map_busy)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, i64>(0))
            .map_err(map_busy)?;

        let mut applied = BTreeSet::new();
        for identifier in rows {
            applied.insert(identifier.map_err(map_busy)? as u64);
        }
        Ok(applied)
    }

    /// Run `execute` and record `identifier` inside one transaction.
    ///
    /// The insert is issued only after `execute` returns success; an error
    /// from `execute` drops the open transaction, which rolls it back, and
    /// nothing is recorded. A primary-key conflict on the insert means some
    /// other writer got there first and is fatal.
    pub fn apply<F>(&mut self, identifier: u64, execute: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        let tx = self.conn.transaction().map_err(map_busy)?;

        execute()?;

        tx.execute(
            &format!(
                "INSERT INTO \"{}\" (identifier) VALUES (?1)",
                self.table
            ),
            params![identifier as i64],
        )
        .map_err(|err| match &err {
            rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
                KtrunError::DuplicateKey(identifier)
            }
            _ => map_busy(err),
        })?;

        tx.commit().map_err(map_busy)?;
        debug!("ledger: recorded transformation {identifier}");
        Ok(())
    }

    /// Durably append a record for `identifier` in its own transaction.
    pub fn record_applied(&mut self, identifier: u64) -> Result<()> {
        self.apply(identifier, || Ok(()))
    }
}

/// A busy/locked response from SQLite means another runner holds the ledger.
fn map_busy(err: rusqlite::Error) -> KtrunError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::DatabaseBusy || e.code == ErrorCode::DatabaseLocked =>
        {
            KtrunError::LedgerBusy
        }
        _ => err.into(),
    }
}
