// SQLite persistence layer for auction snapshots and results.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::auction::AuctionState;

/// SQLite-backed persistence for auction state snapshots and completed
/// auction records.
pub struct Store {
    conn: Mutex<Connection>,
}

/// One row from the `auction_results` table: the summary of a finished
/// auction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRecord {
    pub completed_at: String,
    pub reason: String,
    pub items_sold: usize,
    pub money_spent: u32,
}

impl Store {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS auction_snapshots (
                id       INTEGER PRIMARY KEY AUTOINCREMENT,
                saved_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                state    TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS auction_results (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                completed_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                reason       TEXT NOT NULL,
                items_sold   INTEGER NOT NULL,
                money_spent  INTEGER NOT NULL,
                state        TEXT NOT NULL
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Append a full-state snapshot. Timestamp is auto-generated by SQLite.
    /// Every successful mutation gets one of these, so the latest row is
    /// always the state to resume from after a crash.
    pub fn save_snapshot(&self, state: &AuctionState) -> Result<()> {
        let conn = self.conn();
        let json = serde_json::to_string(state).context("failed to serialize auction state")?;
        conn.execute(
            "INSERT INTO auction_snapshots (state) VALUES (?1)",
            params![json],
        )
        .context("failed to save snapshot")?;
        Ok(())
    }

    /// Load the most recently saved snapshot. Returns `None` when no
    /// snapshot has been saved yet.
    pub fn load_latest_snapshot(&self) -> Result<Option<AuctionState>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT state FROM auction_snapshots ORDER BY id DESC LIMIT 1")
            .context("failed to prepare snapshot query")?;

        let mut rows = stmt
            .query_map([], |row| {
                let json: String = row.get(0)?;
                Ok(json)
            })
            .context("failed to query snapshots")?;

        match rows.next() {
            Some(row_result) => {
                let json = row_result.context("failed to read snapshot row")?;
                let state: AuctionState = serde_json::from_str(&json)
                    .context("failed to deserialize auction state")?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    /// Return the number of stored snapshots.
    pub fn snapshot_count(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM auction_snapshots", [], |row| {
                row.get(0)
            })
            .context("failed to count snapshots")?;
        Ok(count as usize)
    }

    /// Delete all snapshots, resetting to a clean slate for a fresh auction.
    /// Completed-auction records are preserved.
    pub fn clear_snapshots(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute("DELETE FROM auction_snapshots", [])
            .context("failed to delete snapshots")?;
        Ok(())
    }

    /// Record a finished auction: the terminal reason, headline totals, and
    /// the final state as JSON.
    pub fn record_completion(&self, state: &AuctionState, reason: &str) -> Result<()> {
        let conn = self.conn();
        let json = serde_json::to_string(state).context("failed to serialize final state")?;
        conn.execute(
            "INSERT INTO auction_results (reason, items_sold, money_spent, state)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                reason,
                state.sold_count() as i64,
                state.total_spent() as i64,
                json,
            ],
        )
        .context("failed to record completion")?;
        Ok(())
    }

    /// Load all completed-auction records, oldest first.
    pub fn completion_records(&self) -> Result<Vec<CompletionRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT completed_at, reason, items_sold, money_spent
                 FROM auction_results ORDER BY id",
            )
            .context("failed to prepare results query")?;

        let records = stmt
            .query_map([], |row| {
                let items_sold: i64 = row.get(2)?;
                let money_spent: i64 = row.get(3)?;
                Ok(CompletionRecord {
                    completed_at: row.get(0)?,
                    reason: row.get(1)?,
                    items_sold: items_sold as usize,
                    money_spent: money_spent as u32,
                })
            })
            .context("failed to query results")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map result rows")?;

        Ok(records)
    }
}
