//! SQLite-backed implementation of the local key-value store.
//!
//! Tables are described in [`super::schema`]; this module implements the
//! operations the rest of the crate needs: auth, defaults, region
//! directory persistence, alias table persistence, resolution caches, and
//! a generic `metadata` table used by the cursor codec for compound
//! cursor persistence.

use super::migrations::{self, RepairReport, SchemaIssue};
use crate::error::{Error, Result};
use crate::model::ProjectAliasEntry;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::time::Duration;

/// SQLite-backed store.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the store at `path`, applying schema and a 5s
    /// busy-timeout so concurrent invocations retry instead of failing
    /// with `SQLITE_BUSY`.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(timeout_ms.map_or(Duration::from_secs(5), Duration::from_millis))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory store, for tests.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // ── Schema management ────────────────────────────────────

    pub fn get_schema_issues(&self) -> Result<Vec<SchemaIssue>> {
        Ok(migrations::get_schema_issues(&self.conn)?)
    }

    pub fn repair_schema(&self) -> Result<RepairReport> {
        Ok(migrations::repair_schema(&self.conn)?)
    }

    pub fn init_schema(&self) -> Result<()> {
        Ok(migrations::init_schema(&self.conn)?)
    }

    /// Run `f` inside an `IMMEDIATE` transaction, committing on success and
    /// rolling back on error. Used for every multi-row mutation (bulk
    /// region upsert, alias table replace) so they are atomic.
    fn mutate<F, R>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction) -> Result<R>,
    {
        let tx = self.conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    // ── Auth ──────────────────────────────────────────────────

    pub fn get_auth(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM auth WHERE key = ?1", [key], |r| r.get(0))
            .optional()?)
    }

    pub fn set_auth(&mut self, pairs: &[(&str, &str)]) -> Result<()> {
        self.mutate(|tx| {
            for (key, value) in pairs {
                tx.execute(
                    "INSERT INTO auth (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    params![key, value],
                )?;
            }
            Ok(())
        })
    }

    /// Clears all auth rows. Also clears the region directory atomically,
    /// in the same transaction: stale region overrides must not survive
    /// a fresh login under a different account.
    pub fn clear_auth(&mut self) -> Result<()> {
        self.mutate(|tx| {
            tx.execute("DELETE FROM auth", [])?;
            tx.execute("DELETE FROM org_regions", [])?;
            Ok(())
        })
    }

    // ── Defaults (cached default org/project) ────────────────

    pub fn get_default(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM defaults WHERE key = ?1", [key], |r| r.get(0))
            .optional()?)
    }

    pub fn set_default(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO defaults (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    // ── Region directory ─────────────────────────────────────

    pub fn get_org_region(&self, org: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT url FROM org_regions WHERE org_slug = ?1", [org], |r| r.get(0))
            .optional()?)
    }

    /// Bulk upsert, transactional: either every org gets its region
    /// recorded or none do.
    pub fn set_org_regions(&mut self, pairs: &[(String, String)], now: i64) -> Result<()> {
        self.mutate(|tx| {
            for (org, url) in pairs {
                tx.execute(
                    "INSERT INTO org_regions (org_slug, url, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(org_slug) DO UPDATE SET url = excluded.url, updated_at = excluded.updated_at",
                    params![org, url, now],
                )?;
            }
            Ok(())
        })
    }

    pub fn clear_org_regions(&mut self) -> Result<()> {
        self.conn.execute("DELETE FROM org_regions", [])?;
        Ok(())
    }

    // ── Project aliases ───────────────────────────────────────

    pub fn get_project_aliases(&self) -> Result<Vec<ProjectAliasEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT alias, org_slug, project_slug FROM project_aliases")?;
        let rows = stmt.query_map([], |r| {
            Ok(ProjectAliasEntry {
                alias: r.get(0)?,
                org_slug: r.get(1)?,
                project_slug: r.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Replace the entire alias table atomically under a shared
    /// fingerprint. Never merges with prior aliases.
    pub fn set_project_aliases(
        &mut self,
        entries: &[ProjectAliasEntry],
        fingerprint: Option<&str>,
    ) -> Result<()> {
        self.mutate(|tx| {
            tx.execute("DELETE FROM project_aliases", [])?;
            for entry in entries {
                tx.execute(
                    "INSERT INTO project_aliases (alias, org_slug, project_slug, fingerprint)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        entry.alias.to_lowercase(),
                        entry.org_slug,
                        entry.project_slug,
                        fingerprint
                    ],
                )?;
            }
            Ok(())
        })
    }

    pub fn clear_project_aliases(&mut self) -> Result<()> {
        self.conn.execute("DELETE FROM project_aliases", [])?;
        Ok(())
    }

    /// Case-insensitive alias lookup. The stored fingerprint must match
    /// the caller's, or the caller must pass none. Legacy rows with no
    /// stored fingerprint always pass.
    pub fn lookup_alias(
        &self,
        alias: &str,
        fingerprint: Option<&str>,
    ) -> Result<Option<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT org_slug, project_slug, fingerprint FROM project_aliases WHERE alias = ?1",
        )?;
        let row: Option<(String, String, Option<String>)> = stmt
            .query_row([alias.to_lowercase()], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
            .optional()?;

        Ok(row.and_then(|(org, project, stored_fp)| match (stored_fp, fingerprint) {
            (Some(stored), Some(caller)) if stored != caller => None,
            _ => Some((org, project)),
        }))
    }

    // ── Resolution caches ─────────────────────────────────────

    pub fn get_cached_identifier(
        &self,
        identifier: &str,
        dir_mtime: i64,
        ttl_secs: i64,
        now: i64,
    ) -> Result<Option<(String, String)>> {
        let row: Option<(String, i64, i64, String, String)> = self
            .conn
            .query_row(
                "SELECT project_root, dir_mtime, resolved_at, org_slug, project_slug
                 FROM project_cache WHERE identifier = ?1",
                [identifier],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
            )
            .optional()?;

        Ok(row.and_then(|(_, cached_mtime, resolved_at, org, project)| {
            if cached_mtime == dir_mtime && now - resolved_at < ttl_secs {
                Some((org, project))
            } else {
                None
            }
        }))
    }

    pub fn set_cached_identifier(
        &mut self,
        identifier: &str,
        project_root: &str,
        dir_mtime: i64,
        org: &str,
        project: &str,
        now: i64,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO project_cache
                (identifier, project_root, dir_mtime, org_slug, project_slug, resolved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(identifier) DO UPDATE SET
                project_root = excluded.project_root,
                dir_mtime = excluded.dir_mtime,
                org_slug = excluded.org_slug,
                project_slug = excluded.project_slug,
                resolved_at = excluded.resolved_at",
            params![identifier, project_root, dir_mtime, org, project, now],
        )?;
        Ok(())
    }

    pub fn get_cached_dsn(
        &self,
        public_key: &str,
        ttl_secs: i64,
        now: i64,
    ) -> Result<Option<(String, String)>> {
        let row: Option<(String, String, i64)> = self
            .conn
            .query_row(
                "SELECT org_slug, project_slug, cached_at FROM dsn_cache WHERE public_key = ?1",
                [public_key],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?;

        Ok(row.and_then(|(org, project, cached_at)| {
            if now - cached_at < ttl_secs {
                Some((org, project))
            } else {
                None
            }
        }))
    }

    pub fn set_cached_dsn(&mut self, public_key: &str, org: &str, project: &str, now: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO dsn_cache (public_key, org_slug, project_slug, cached_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(public_key) DO UPDATE SET
                org_slug = excluded.org_slug, project_slug = excluded.project_slug, cached_at = excluded.cached_at",
            params![public_key, org, project, now],
        )?;
        Ok(())
    }

    pub fn get_cached_root(
        &self,
        project_root: &str,
        dir_mtime: i64,
        ttl_secs: i64,
        now: i64,
    ) -> Result<Option<Option<(String, String)>>> {
        let row: Option<(i64, i64, Option<String>, Option<String>)> = self
            .conn
            .query_row(
                "SELECT dir_mtime, resolved_at, org_slug, project_slug
                 FROM project_root_cache WHERE project_root = ?1",
                [project_root],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .optional()?;

        Ok(row.and_then(|(cached_mtime, resolved_at, org, project)| {
            if cached_mtime == dir_mtime && now - resolved_at < ttl_secs {
                Some(org.zip(project))
            } else {
                None
            }
        }))
    }

    pub fn set_cached_root(
        &mut self,
        project_root: &str,
        basename: &str,
        dir_mtime: i64,
        org: Option<&str>,
        project: Option<&str>,
        now: i64,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO project_root_cache
                (project_root, basename, dir_mtime, resolved_at, org_slug, project_slug)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(project_root) DO UPDATE SET
                basename = excluded.basename,
                dir_mtime = excluded.dir_mtime,
                resolved_at = excluded.resolved_at,
                org_slug = excluded.org_slug,
                project_slug = excluded.project_slug",
            params![project_root, basename, dir_mtime, now, org, project],
        )?;
        Ok(())
    }

    // ── Generic metadata (pagination cursor persistence) ──────

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |r| r.get(0))
            .optional()?)
    }

    pub fn set_metadata(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO metadata (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete_metadata(&mut self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM metadata WHERE key = ?1", [key])?;
        Ok(())
    }
}
