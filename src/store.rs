//! SQLite-backed relation store for the streaming join strategy.
//!
//! The `pages` and `linktargets` relations are materialized once into a local
//! database file and reused across runs. Reuse is gated on row count alone: a
//! cached relation whose row count equals the current source file's line count
//! is trusted as-is. Two different files of equal length therefore pass the
//! gate; this is an accepted limitation of the contract, not a bug to fix
//! with content hashing.
//!
//! The store owns the only long-lived mutable resource in the pipeline (the
//! connection), and hands out an interrupt handle so a run can cancel
//! in-flight work on any exit path instead of leaving a half-built relation
//! looking complete. A half-built relation fails the row-count gate on the
//! next run and is rebuilt.

use crate::config::RECORD_EXTENSION;
use crate::models::{LinkTargetRecord, PageRecord};
use crate::tsv;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, InterruptHandle, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};

/// What `ensure_*` did and what it skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOutcome {
    pub rows: u64,
    pub malformed: u64,
    pub reused: bool,
}

pub struct RelationStore {
    conn: Connection,
}

impl RelationStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open relation store: {:?}", path))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set journal mode")?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .context("Failed to set synchronous mode")?;
        Ok(Self { conn })
    }

    /// Handle for cancelling in-flight statements from another thread or a
    /// drop guard. Safe to call after the connection is idle.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.conn.get_interrupt_handle()
    }

    /// Row count of a relation, or `None` if it has never been built.
    fn relation_rows(&self, table: &str) -> Result<Option<u64>> {
        let exists: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Ok(None);
        }
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })?;
        Ok(Some(count as u64))
    }

    /// Materializes the pages relation from an extracted pages file, unless a
    /// cached copy already matches the source's line count.
    pub fn ensure_pages(&mut self, source: &Path) -> Result<BuildOutcome> {
        tsv::check_extension(source, RECORD_EXTENSION)?;
        let source_lines = tsv::count_lines(source)?;

        if self.relation_rows("pages")? == Some(source_lines) {
            info!(rows = source_lines, "Reusing cached pages relation");
            return Ok(BuildOutcome {
                rows: source_lines,
                malformed: 0,
                reused: true,
            });
        }

        info!(source = ?source, "Building pages relation");
        let mut malformed = 0u64;
        let mut rows = 0u64;
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DROP TABLE IF EXISTS pages;
             CREATE TABLE pages (
                 page_id INTEGER NOT NULL,
                 namespace INTEGER NOT NULL,
                 title TEXT NOT NULL,
                 is_redirect INTEGER NOT NULL
             );",
        )?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO pages (page_id, namespace, title, is_redirect) VALUES (?1, ?2, ?3, ?4)")?;
            let mut reader = tsv::open_tsv(source)?;
            for (line_no, result) in reader.records().enumerate() {
                let Some(record) = tsv::row_or_skip(result)? else {
                    malformed += 1;
                    continue;
                };
                match PageRecord::decode(&record) {
                    Some(page) => {
                        stmt.execute(params![
                            page.page_id as i64,
                            page.namespace,
                            page.title,
                            page.is_redirect as i64
                        ])?;
                        rows += 1;
                    }
                    None => {
                        debug!(line = line_no + 1, raw = ?record, "Skipping malformed page row");
                        malformed += 1;
                    }
                }
            }
        }
        tx.execute_batch(
            "CREATE INDEX idx_pages_id ON pages (page_id);
             CREATE INDEX idx_pages_title ON pages (namespace, title);",
        )?;
        tx.commit()?;

        info!(rows, malformed, "Pages relation built");
        Ok(BuildOutcome {
            rows,
            malformed,
            reused: false,
        })
    }

    /// Materializes the linktargets relation, with the same row-count gate.
    pub fn ensure_link_targets(&mut self, source: &Path) -> Result<BuildOutcome> {
        tsv::check_extension(source, RECORD_EXTENSION)?;
        let source_lines = tsv::count_lines(source)?;

        if self.relation_rows("linktargets")? == Some(source_lines) {
            info!(rows = source_lines, "Reusing cached linktargets relation");
            return Ok(BuildOutcome {
                rows: source_lines,
                malformed: 0,
                reused: true,
            });
        }

        info!(source = ?source, "Building linktargets relation");
        let mut malformed = 0u64;
        let mut rows = 0u64;
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DROP TABLE IF EXISTS linktargets;
             CREATE TABLE linktargets (
                 lt_id INTEGER NOT NULL,
                 namespace INTEGER NOT NULL,
                 title TEXT NOT NULL
             );",
        )?;
        {
            let mut stmt = tx
                .prepare("INSERT INTO linktargets (lt_id, namespace, title) VALUES (?1, ?2, ?3)")?;
            let mut reader = tsv::open_tsv(source)?;
            for (line_no, result) in reader.records().enumerate() {
                let Some(record) = tsv::row_or_skip(result)? else {
                    malformed += 1;
                    continue;
                };
                match LinkTargetRecord::decode(&record) {
                    Some(lt) => {
                        stmt.execute(params![lt.lt_id as i64, lt.namespace, lt.title])?;
                        rows += 1;
                    }
                    None => {
                        debug!(line = line_no + 1, raw = ?record, "Skipping malformed linktarget row");
                        malformed += 1;
                    }
                }
            }
        }
        tx.execute_batch("CREATE INDEX idx_linktargets_id ON linktargets (lt_id);")?;
        tx.commit()?;

        info!(rows, malformed, "Linktargets relation built");
        Ok(BuildOutcome {
            rows,
            malformed,
            reused: false,
        })
    }

    pub fn page_exists(&self, page_id: u64) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT 1 FROM pages WHERE page_id = ?1 LIMIT 1")?;
        let found: Option<i64> = stmt
            .query_row(params![page_id as i64], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    /// Looks up the (namespace, title) a link-target id denotes.
    ///
    /// Duplicate ids resolve to the most recently inserted row, matching the
    /// in-memory strategy's overwrite-on-insert behavior.
    pub fn link_target(&self, lt_id: u64) -> Result<Option<(i32, String)>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT namespace, title FROM linktargets WHERE lt_id = ?1 ORDER BY rowid DESC LIMIT 1",
        )?;
        let found = stmt
            .query_row(params![lt_id as i64], |row| {
                Ok((row.get::<_, i32>(0)?, row.get::<_, String>(1)?))
            })
            .optional()?;
        Ok(found)
    }

    /// Resolves a (namespace, title) pair to a page id, last write winning on
    /// duplicate titles.
    pub fn title_to_page(&self, namespace: i32, title: &str) -> Result<Option<u64>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT page_id FROM pages WHERE namespace = ?1 AND title = ?2 ORDER BY rowid DESC LIMIT 1",
        )?;
        let found: Option<i64> = stmt
            .query_row(params![namespace, title], |row| row.get(0))
            .optional()?;
        Ok(found.map(|id| id as u64))
    }
}

/// Interrupts in-flight store work on every exit path that is not an explicit
/// [`CancelGuard::disarm`]. A run acquires the guard before touching the
/// store and disarms it after the output is flushed; error and panic paths
/// then abandon the session instead of letting it run on.
pub struct CancelGuard {
    handle: InterruptHandle,
    armed: bool,
}

impl CancelGuard {
    pub fn new(handle: InterruptHandle) -> Self {
        Self {
            handle,
            armed: true,
        }
    }

    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if self.armed {
            self.handle.interrupt();
        }
    }
}
